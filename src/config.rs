use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Catalog-related constants
// =============================================================================

/// Default base URL of the release catalog
pub const DEFAULT_API_BASE_URL: &str = "https://releases.hashicorp.com";

/// Key ID used to prefer a key-qualified checksum signature filename
pub const DEFAULT_SIGNING_KEY_ID: &str = "72D7468F";

/// User agent sent with every catalog and download request
pub const USER_AGENT: &str = concat!("hc-install/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Time-related constants
// =============================================================================

/// Timeout for listing catalog versions (10 seconds)
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for catalog lookup + download + unpack (60 seconds)
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for a filesystem lookup including version queries (10 seconds)
pub const DEFAULT_FIND_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the pre-clone check of a build (1 minute)
pub const DEFAULT_PRE_CLONE_CHECK_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for cloning a repository (5 minutes)
pub const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Timeout for building from source (25 minutes)
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(25 * 60);

/// Caller-facing configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InstallConfig {
    /// Mirror with the same layout as the release catalog
    pub api_base_url: String,
    /// ASCII-armored public key trusted for checksum signatures
    pub armored_public_key: Option<String>,
    pub signing_key_id: String,
    pub timeouts: TimeoutConfig,
    /// Directories searched after `$PATH`
    pub extra_paths: Vec<PathBuf>,
    pub enterprise: Option<EnterpriseConfig>,
    pub include_prereleases: bool,
    pub skip_checksum_verification: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            armored_public_key: None,
            signing_key_id: DEFAULT_SIGNING_KEY_ID.to_string(),
            timeouts: TimeoutConfig::default(),
            extra_paths: Vec::new(),
            enterprise: None,
            include_prereleases: false,
            skip_checksum_verification: false,
        }
    }
}

/// Per-phase timeouts in milliseconds
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    pub list: u64,
    pub install: u64,
    pub find: u64,
    pub pre_clone_check: u64,
    pub clone: u64,
    pub build: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            list: DEFAULT_LIST_TIMEOUT.as_millis() as u64,
            install: DEFAULT_INSTALL_TIMEOUT.as_millis() as u64,
            find: DEFAULT_FIND_TIMEOUT.as_millis() as u64,
            pre_clone_check: DEFAULT_PRE_CLONE_CHECK_TIMEOUT.as_millis() as u64,
            clone: DEFAULT_CLONE_TIMEOUT.as_millis() as u64,
            build: DEFAULT_BUILD_TIMEOUT.as_millis() as u64,
        }
    }
}

impl TimeoutConfig {
    pub fn list(&self) -> Duration {
        Duration::from_millis(self.list)
    }

    pub fn install(&self) -> Duration {
        Duration::from_millis(self.install)
    }

    pub fn find(&self) -> Duration {
        Duration::from_millis(self.find)
    }

    pub fn pre_clone_check(&self) -> Duration {
        Duration::from_millis(self.pre_clone_check)
    }

    pub fn clone_repo(&self) -> Duration {
        Duration::from_millis(self.clone)
    }

    pub fn build(&self) -> Duration {
        Duration::from_millis(self.build)
    }
}

/// Enterprise edition settings
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EnterpriseConfig {
    /// Build metadata suffix such as "hsm" or "fips1402"
    pub meta: Option<String>,
    pub license_dir: PathBuf,
}

/// Returns the path of the default configuration file.
/// Uses $XDG_CONFIG_HOME/hc-install/config.json if XDG_CONFIG_HOME is set,
/// otherwise falls back to the platform config dir,
/// or ./hc-install/config.json if neither is available.
pub fn config_path() -> PathBuf {
    config_path_with_env(std::env::var("XDG_CONFIG_HOME").ok(), dirs::config_dir())
}

fn config_path_with_env(xdg_config_home: Option<String>, config_dir: Option<PathBuf>) -> PathBuf {
    let base = xdg_config_home
        .map(PathBuf::from)
        .or(config_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    base.join("hc-install").join("config.json")
}
