//! Where config layers live on disk.

use super::{
    ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LayeredConfigOptions,
    SYSTEM_CONFIG_PATH, SYSTEM_REQUIREMENTS_PATH,
};
use crate::ConfigError;
use directories::UserDirs;
use std::path::{Path, PathBuf};

/// A location that may hold a layer.
#[derive(Debug, Clone)]
pub(super) struct Candidate {
    pub(super) source: ConfigLayerSource,
    pub(super) path: PathBuf,
    /// Missing required layers are an error; others are skipped.
    pub(super) required: bool,
}

/// Every mergeable layer location in precedence order, lowest first.
pub(super) fn candidates(options: &LayeredConfigOptions, cwd: &Path) -> Vec<Candidate> {
    let optional = |source, path: PathBuf| Candidate {
        source,
        path,
        required: false,
    };

    let mut out = Vec::new();
    if let Some(path) = &options.system_config_path {
        out.push(optional(ConfigLayerSource::System, path.clone()));
    }
    if let Some(path) = &options.user_config_path {
        out.push(optional(ConfigLayerSource::User, path.clone()));
    }

    let project_root = find_project_root(cwd, &options.project_root_markers);
    if let Some(root) = &project_root {
        out.push(optional(
            ConfigLayerSource::Project,
            root.join(DEFAULT_CONFIG_FILE),
        ));
    }
    out.push(optional(ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE)));
    if let Some(root) = &project_root {
        out.push(optional(
            ConfigLayerSource::Repo,
            root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE),
        ));
    }

    out.extend(options.runtime_paths.iter().map(|path| Candidate {
        source: ConfigLayerSource::Runtime,
        path: path.clone(),
        required: true,
    }));
    out
}

pub(super) fn default_system_config_path() -> Option<PathBuf> {
    Some(PathBuf::from(SYSTEM_CONFIG_PATH))
}

pub(super) fn default_requirements_path() -> Option<PathBuf> {
    Some(PathBuf::from(SYSTEM_REQUIREMENTS_PATH))
}

/// `~/.agentx/agentx.json5`.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| {
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE)
    })
}

/// Canonicalize when possible; a missing path is returned unchanged.
pub(super) fn normalize_path(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(err) => Err(ConfigError::Io(err)),
    }
}

/// Key used to avoid merging the same file twice.
pub(super) fn unique_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Nearest ancestor of `cwd` containing any marker entry.
fn find_project_root(cwd: &Path, markers: &[String]) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|ancestor| markers.iter().any(|marker| ancestor.join(marker).exists()))
        .map(Path::to_path_buf)
}
