//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Service settings, loaded from `settings.json`. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines instead of plain text
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<String>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Blob store backing published sites
    #[serde(default)]
    pub storage: BlobStoreSettings,

    /// Job retention
    #[serde(default)]
    pub jobs: JobSettings,

    /// Progress stream tuning
    #[serde(default)]
    pub stream: StreamSettings,

    /// Temporary workspace for extracted sources
    #[serde(default)]
    pub workspace: WorkspaceSettings,

    /// Install/build/publish behaviour
    #[serde(default)]
    pub build: BuildSettings,

    /// Repository submissions
    #[serde(default)]
    pub repository: RepositorySettings,

    /// Optional advisory classification/naming service
    #[serde(default)]
    pub oracle: Option<OracleSettings>,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            storage: BlobStoreSettings::default(),
            jobs: JobSettings::default(),
            stream: StreamSettings::default(),
            workspace: WorkspaceSettings::default(),
            build: BuildSettings::default(),
            repository: RepositorySettings::default(),
            oracle: None,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body (the base64 archive is inline)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Serve published sites under `/sites`
    #[serde(default = "default_true")]
    pub serve_sites: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            serve_sites: true,
        }
    }
}

/// Blob store backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreSettings {
    /// "memory", "local" or "s3"
    #[serde(default = "default_storage_kind")]
    pub kind: String,

    /// Local root directory, or bucket name for s3
    #[serde(default = "default_storage_path")]
    pub path: String,

    #[serde(default)]
    pub region: Option<String>,

    /// Endpoint override for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_storage_kind() -> String {
    "local".to_string()
}

fn default_storage_path() -> String {
    "/var/lib/sitedrop/blobs".to_string()
}

impl Default for BlobStoreSettings {
    fn default() -> Self {
        Self {
            kind: default_storage_kind(),
            path: default_storage_path(),
            region: None,
            endpoint: None,
        }
    }
}

/// Job store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// How long a finished job stays observable
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// How often the expiry sweep runs
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Progress stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_keep_alive_secs() -> u64 {
    15
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

/// Workspace settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Root for job directories; the system temp dir when absent
    #[serde(default)]
    pub temp_root: Option<String>,
}

/// Build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    #[serde(default = "default_install_command")]
    pub install_command: String,

    /// Upper bound for each install/build command; unbounded when absent
    #[serde(default)]
    pub build_timeout_secs: Option<u64>,

    /// Concurrent uploads per publish
    #[serde(default = "default_publish_concurrency")]
    pub publish_concurrency: usize,
}

fn default_install_command() -> String {
    "npm install --legacy-peer-deps".to_string()
}

fn default_publish_concurrency() -> usize {
    8
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            install_command: default_install_command(),
            build_timeout_secs: None,
            publish_concurrency: default_publish_concurrency(),
        }
    }
}

/// Repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["github.com".to_string()]
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
        }
    }
}

/// Advisory oracle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    /// Base URL of the oracle service
    pub endpoint: String,

    /// Environment variable holding the bearer token, if the oracle needs one
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,

    /// Oracle classifications below this confidence are ignored
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

fn default_oracle_timeout_secs() -> u64 {
    10
}

fn default_min_confidence() -> f32 {
    0.7
}
