use std::env;

/// Runtime configuration for the vault
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Per-user quota for original (physically stored) bytes (default: 10 MB)
    pub storage_quota_bytes: u64,

    /// Maximum accepted upload size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Storage backend: "s3" or "memory" (default: "s3")
    pub storage_backend: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage_quota_bytes: 10 * 1024 * 1024, // 10 MB
            max_file_size: 256 * 1024 * 1024,      // 256 MB
            storage_backend: "s3".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl VaultConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_quota_bytes: env::var("STORAGE_QUOTA_MB")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(default.storage_quota_bytes),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            storage_backend: env::var("STORAGE_BACKEND").unwrap_or(default.storage_backend),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (in-memory storage, small quota)
    pub fn development() -> Self {
        Self {
            storage_backend: "memory".to_string(),
            ..Self::default()
        }
    }
}
