//! JSON merge for layered configuration.

use serde_json::Value;

/// Merge `overlay` into `base`, recursing into objects.
///
/// Any non-object value in `locked` at the same path blocks the override;
/// objects in `locked` are descended into so sibling keys stay writable.
pub(super) fn merge_layer(base: &mut Value, overlay: &Value, locked: Option<&Value>) {
    let lock_map = match locked {
        Some(Value::Object(map)) => Some(map),
        Some(_) => return,
        None => None,
    };
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let key_lock = lock_map.and_then(|map| map.get(key));
                if matches!(key_lock, Some(lock) if !lock.is_object()) {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => merge_layer(existing, value, key_lock),
                    None if key_lock.is_none() => {
                        base_map.insert(key.clone(), value.clone());
                    }
                    None => {
                        let mut fresh = Value::Object(serde_json::Map::new());
                        merge_layer(&mut fresh, value, key_lock);
                        base_map.insert(key.clone(), fresh);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            if lock_map.is_none() {
                *base_slot = overlay_value.clone();
            }
        }
    }
}
