//! Local storage layout

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout for the service's own files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for configuration
    pub base_dir: PathBuf,

    /// Root for per-job temporary workspaces
    pub workspace_root: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            workspace_root: workspace_root.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the directory holding job workspaces
    pub fn workspaces_dir(&self) -> Dir {
        Dir::new(self.workspace_root.clone())
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::DeployError> {
        self.workspaces_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let workspace_root = std::env::temp_dir().join("sitedrop");

        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/etc/sitedrop");

        #[cfg(not(target_os = "linux"))]
        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitedrop");

        Self::new(base_dir, workspace_root)
    }
}
