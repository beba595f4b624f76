//! Capture policy applied to text before it is written into memory.

use crate::error::MemoryError;
use regex::Regex;

/// Policy for deciding what reaches the durable index.
#[derive(Debug, Clone)]
pub struct MemoryCapturePolicy {
    /// Patterns that skip the write entirely.
    pub deny_patterns: Vec<String>,
    /// Patterns replaced by `redaction_replacement`.
    pub redact_patterns: Vec<String>,
    /// Optional maximum record length in characters.
    pub max_record_chars: Option<usize>,
    /// Detect secrets using entropy heuristics.
    pub detect_secrets: bool,
    /// Entropy threshold for secret detection.
    pub secret_entropy_threshold: f32,
    /// Replacement string for redactions.
    pub redaction_replacement: String,
}

impl Default for MemoryCapturePolicy {
    /// Default capture policy settings.
    fn default() -> Self {
        Self {
            deny_patterns: Vec::new(),
            redact_patterns: Vec::new(),
            max_record_chars: None,
            detect_secrets: true,
            secret_entropy_threshold: 3.7,
            redaction_replacement: "[REDACTED]".to_string(),
        }
    }
}

/// A capture policy with its patterns compiled once up front.
#[derive(Debug, Clone)]
pub struct CaptureFilter {
    policy: MemoryCapturePolicy,
    deny: Vec<Regex>,
    redact: Vec<Regex>,
}

impl CaptureFilter {
    /// Compile every deny and redact pattern, failing on the first bad one.
    pub fn new(policy: MemoryCapturePolicy) -> Result<Self, MemoryError> {
        let deny = compile_all(&policy.deny_patterns)?;
        let redact = compile_all(&policy.redact_patterns)?;
        Ok(Self {
            policy,
            deny,
            redact,
        })
    }

    /// Apply the policy, returning `None` when the text must not be stored.
    pub fn apply(&self, text: &str) -> Option<String> {
        if self.deny.iter().any(|regex| regex.is_match(text)) {
            return None;
        }

        let policy = &self.policy;
        let mut text = text.to_string();
        for regex in &self.redact {
            text = regex
                .replace_all(&text, policy.redaction_replacement.as_str())
                .into_owned();
        }

        if policy.detect_secrets {
            text = redact_high_entropy(
                &text,
                policy.secret_entropy_threshold,
                &policy.redaction_replacement,
            );
        }

        if let Some(max_chars) = policy.max_record_chars {
            text = truncate_chars(&text, max_chars);
        }

        if text.trim().is_empty() {
            return None;
        }
        Some(text)
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, MemoryError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|err| MemoryError::Regex(format!("{pattern}: {err}")))
        })
        .collect()
}

/// Truncate a string to a maximum character count.
fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Redact high-entropy tokens that resemble secrets.
fn redact_high_entropy(content: &str, threshold: f32, replacement: &str) -> String {
    let Ok(regex) = Regex::new(r"[A-Za-z0-9+/=_\-]{20,}") else {
        return content.to_string();
    };
    regex
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let token = caps.get(0).map_or("", |m| m.as_str());
            if shannon_entropy(token) >= threshold {
                replacement.to_string()
            } else {
                token.to_string()
            }
        })
        .into_owned()
}

/// Shannon entropy of a token, in bits per byte.
fn shannon_entropy(token: &str) -> f32 {
    let bytes = token.as_bytes();
    if bytes.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 256];
    for byte in bytes {
        counts[*byte as usize] += 1;
    }
    let len = bytes.len() as f32;
    counts
        .iter()
        .filter(|count| **count > 0)
        .map(|count| {
            let p = *count as f32 / len;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{CaptureFilter, MemoryCapturePolicy, shannon_entropy, truncate_chars};
    use crate::MemoryError;
    use pretty_assertions::assert_eq;

    #[test]
    fn deny_pattern_skips_record() {
        let policy = MemoryCapturePolicy {
            deny_patterns: vec!["(?i)password".to_string()],
            ..MemoryCapturePolicy::default()
        };
        let filter = CaptureFilter::new(policy).expect("compile");
        assert_eq!(filter.apply("Question: my Password is hunter2"), None);
    }

    #[test]
    fn redacts_and_truncates() {
        let policy = MemoryCapturePolicy {
            redact_patterns: vec![r"\d{4}-\d{4}".to_string()],
            redaction_replacement: "#".to_string(),
            max_record_chars: Some(12),
            detect_secrets: false,
            ..MemoryCapturePolicy::default()
        };
        let result = CaptureFilter::new(policy)
            .expect("compile")
            .apply("card 1234-5678 on file")
            .expect("record");
        assert_eq!(result, "card # on fi");
    }

    #[test]
    fn detects_high_entropy_tokens() {
        let filter = CaptureFilter::new(MemoryCapturePolicy::default()).expect("compile");
        let result = filter
            .apply("Answer: key sk-9fQ2xLm7Rt4Wz8Kp1Vb6Nc3Hd5")
            .expect("record");
        assert_eq!(result, "Answer: key [REDACTED]");
    }

    #[test]
    fn keeps_plain_prose() {
        let text = "Question: What is the capital of Portugal?\nAnswer: Lisbon.";
        let result = CaptureFilter::new(MemoryCapturePolicy::default())
            .expect("compile")
            .apply(text)
            .expect("record");
        assert_eq!(result, text);
    }

    #[test]
    fn invalid_regex_fails_compilation() {
        let policy = MemoryCapturePolicy {
            redact_patterns: vec!["ok".to_string(), "(".to_string()],
            ..MemoryCapturePolicy::default()
        };
        let err = CaptureFilter::new(policy).expect_err("bad pattern");
        match err {
            MemoryError::Regex(message) => assert!(message.starts_with("(:")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn entropy_and_truncation_helpers() {
        assert_eq!(shannon_entropy(""), 0.0);
        assert_eq!(shannon_entropy("aaaa"), 0.0);
        assert!((shannon_entropy("ab") - 1.0).abs() < 1e-6);
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hello", 0), "");
    }
}
