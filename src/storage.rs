use chrono::{DateTime, Utc};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct FileStorage {
    config: StorageConfig,
}

/// One stored upload. The file on disk is the only persistent record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredFile {
    pub original_name: String,
    pub file_id: String,
    pub stored_name: String,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip)]
    pub path: PathBuf,
}

impl FileStorage {
    pub fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.upload_dir)?;

        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn max_file_size(&self) -> usize {
        self.config.max_file_size
    }

    /// Save an upload under a collision-free name derived from the original.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredFile, ApiError> {
        let sanitized = sanitize_filename(original_name);

        let Some((stem, ext)) = sanitized.rsplit_once('.') else {
            return Err(ApiError::UnsupportedType(sanitized));
        };
        let ext = ext.to_ascii_lowercase();

        if !self.config.is_extension_allowed(&ext) {
            return Err(ApiError::UnsupportedType(ext));
        }

        if data.is_empty() {
            return Err(ApiError::Validation("file is empty".to_string()));
        }

        if data.len() > self.config.max_file_size {
            return Err(ApiError::PayloadTooLarge {
                limit: self.config.max_file_size,
            });
        }

        let file_id = Uuid::new_v4().simple().to_string();
        let stored_name = if stem.is_empty() {
            format!("{file_id}.{ext}")
        } else {
            format!("{stem}_{file_id}.{ext}")
        };

        let path = self.config.upload_dir.join(&stored_name);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;

        log::debug!("Saved {} ({} bytes)", stored_name, data.len());

        Ok(StoredFile {
            original_name: sanitized,
            file_id,
            stored_name,
            size: data.len(),
            uploaded_at: Utc::now(),
            path,
        })
    }

    /// Read a stored file back, with its content type.
    ///
    /// Names with traversal sequences never reach the filesystem.
    pub async fn load(&self, name: &str) -> Result<(Vec<u8>, &'static str), ApiError> {
        if !is_safe_name(name) {
            return Err(ApiError::NotFound);
        }

        let path = self.config.upload_dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok((data, content_type_for(name))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound),
            Err(e) => Err(ApiError::Internal(e.into())),
        }
    }
}

/// Reduce a client-supplied filename to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    cleaned
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("txt") => "text/plain; charset=utf-8",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("zip") => "application/zip",
        Some("rar") => "application/vnd.rar",
        _ => "application/octet-stream",
    }
}
