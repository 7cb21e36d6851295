//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::{
    BlobStoreSettings, BuildSettings, OracleSettings, Settings,
};
use crate::workers::sweeper;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Server configuration
    pub server: ServerOptions,

    /// Blob store backend
    pub blob_store: BlobStoreSettings,

    /// Install/build/publish behaviour
    pub build: BuildSettings,

    /// Hosts repository URLs may point at
    pub allowed_hosts: Vec<String>,

    /// Progress stream tuning
    pub stream: StreamOptions,

    /// Sweeper worker options
    pub sweeper: sweeper::Options,

    /// Advisory oracle, if configured
    pub oracle: Option<OracleSettings>,
}

impl AppOptions {
    /// Derive options from loaded settings
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        let layout = match &settings.workspace.temp_root {
            Some(root) => StorageLayout::new(layout.base_dir, PathBuf::from(root)),
            None => layout,
        };

        Self {
            lifecycle: LifecycleOptions::default(),
            layout,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
                max_upload_bytes: settings.server.max_upload_bytes,
                serve_sites: settings.server.serve_sites,
            },
            blob_store: settings.storage.clone(),
            build: settings.build.clone(),
            allowed_hosts: settings.repository.allowed_hosts.clone(),
            stream: StreamOptions {
                poll_interval: Duration::from_millis(settings.stream.poll_interval_ms.max(10)),
                keep_alive: Duration::from_secs(settings.stream.keep_alive_secs.max(1)),
            },
            sweeper: sweeper::Options {
                interval: Duration::from_secs(settings.jobs.sweep_interval_secs.max(1)),
                retention: Duration::from_secs(settings.jobs.retention_secs),
            },
            oracle: settings.oracle.clone(),
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), StorageLayout::default())
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Largest accepted submission body
    pub max_upload_bytes: usize,

    /// Mount the `/sites` routes
    pub serve_sites: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_bytes: 100 * 1024 * 1024,
            serve_sites: true,
        }
    }
}

/// Progress stream options
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub poll_interval: Duration,
    pub keep_alive: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            keep_alive: Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_root_overrides_workspace() {
        let settings: Settings =
            serde_json::from_str(r#"{"workspace":{"temp_root":"/srv/sitedrop/work"}}"#).unwrap();
        let options = AppOptions::from_settings(&settings, StorageLayout::new("/etc/x", "/tmp/x"));
        assert_eq!(options.layout.workspace_root, PathBuf::from("/srv/sitedrop/work"));
        assert_eq!(options.stream.poll_interval, Duration::from_millis(500));
        assert_eq!(options.sweeper.retention, Duration::from_secs(3600));
    }
}
