use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedPaths {
    pub root: PathBuf,
    pub logs_dir: PathBuf,
    pub session_path: PathBuf,
    pub project_config_path: PathBuf,
}

impl SharedPaths {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            logs_dir: blockwise_observability::canonical_logs_dir_from_root(&root),
            session_path: root.join("session.json"),
            project_config_path: root.join("config.json"),
            root,
        }
    }
}

/// `BLOCKWISE_HOME` wins; otherwise the platform data directory.
pub fn resolve_shared_paths() -> anyhow::Result<SharedPaths> {
    if let Ok(home) = std::env::var("BLOCKWISE_HOME") {
        if !home.trim().is_empty() {
            return Ok(SharedPaths::from_root(home.trim()));
        }
    }
    let base = dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to resolve data dir"))?;
    Ok(SharedPaths::from_root(base.join("blockwise")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_root() {
        let paths = SharedPaths::from_root("/var/lib/blockwise");
        assert_eq!(paths.logs_dir, PathBuf::from("/var/lib/blockwise/logs"));
        assert_eq!(
            paths.session_path,
            PathBuf::from("/var/lib/blockwise/session.json")
        );
    }
}
