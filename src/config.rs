use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    /// Record downloads return the raw bytes inline instead of a streamed attachment.
    pub test_mode: bool,
    /// Maximum size of a single uploaded document in bytes
    pub max_upload_size: u64,
    /// Maximum request body size in bytes (multipart envelope included)
    pub max_request_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Primary storage root. Uploaded blobs live here and it is searched first when serving.
    pub root: String,
    /// Public mirror of the storage root, searched when the primary has no match.
    pub mirror_root: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "./storage/app/public".to_string(),
            mirror_root: "./public/storage".to_string(),
        }
    }
}

pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 2048 * 1024;
pub const DEFAULT_MAX_REQUEST_SIZE: u64 = 16 * 1024 * 1024;

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let root =
            std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage/app/public".to_string());
        let mirror_root =
            std::env::var("PUBLIC_MIRROR_ROOT").unwrap_or_else(|_| "./public/storage".to_string());

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE);

        let max_request_size = std::env::var("MAX_REQUEST_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_REQUEST_SIZE);

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig { root, mirror_root },
            test_mode,
            max_upload_size,
            max_request_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.root.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "STORAGE_ROOT cannot be empty".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        // Oversized files must reach validation (422) instead of tripping the body limit.
        if self.max_request_size < self.max_upload_size {
            return Err(ConfigError::ValidationError(
                "MAX_REQUEST_SIZE must be at least MAX_UPLOAD_SIZE".to_string(),
            ));
        }

        if self.storage.root == self.storage.mirror_root {
            tracing::warn!(
                root = %self.storage.root,
                "PUBLIC_MIRROR_ROOT equals STORAGE_ROOT; the mirror fallback is a no-op"
            );
        }

        Ok(())
    }
}
