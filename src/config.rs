use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// File extensions accepted by the upload endpoint.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "zip", "rar",
];

const DEFAULT_MAX_FILE_SIZE: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub qr: QrConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    pub default_size: u32,
    pub min_size: u32,
    pub max_size: u32,
    /// Logo edge length as a fraction of the QR edge length.
    pub logo_scale: f32,
    /// Pixels per QR module before the final resize.
    pub box_size: u32,
    /// Quiet zone width in modules.
    pub border: u32,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config = Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .unwrap_or(5000),
            },
            storage: StorageConfig {
                upload_dir: env::var("UPLOAD_DIR")
                    .unwrap_or_else(|_| "uploads".to_string())
                    .into(),
                max_file_size: env::var("MAX_FILE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_MAX_FILE_SIZE),
                allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect(),
            },
            qr: QrConfig {
                default_size: 250,
                min_size: 200,
                max_size: 1000,
                logo_scale: 0.25,
                box_size: 10,
                border: 4,
            },
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.max_file_size == 0 {
            anyhow::bail!("Max file size must be positive");
        }

        if self.storage.allowed_extensions.is_empty() {
            anyhow::bail!("No allowed file extensions configured");
        }

        if self.qr.min_size == 0 || self.qr.min_size > self.qr.max_size {
            anyhow::bail!(
                "Invalid QR size range: [{}, {}]",
                self.qr.min_size,
                self.qr.max_size
            );
        }

        if self.qr.default_size < self.qr.min_size || self.qr.default_size > self.qr.max_size {
            anyhow::bail!("Default QR size {} outside size range", self.qr.default_size);
        }

        if self.qr.logo_scale <= 0.0 || self.qr.logo_scale > 0.5 {
            anyhow::bail!("Logo scale must be in (0, 0.5], got {}", self.qr.logo_scale);
        }

        if self.qr.box_size == 0 {
            anyhow::bail!("QR box size must be positive");
        }

        Ok(())
    }
}

impl StorageConfig {
    pub fn is_extension_allowed(&self, ext: &str) -> bool {
        self.allowed_extensions.iter().any(|allowed| allowed == ext)
    }
}

impl QrConfig {
    /// Clamp a requested image size into the configured range.
    pub fn clamp_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_size)
            .clamp(self.min_size, self.max_size)
    }
}
