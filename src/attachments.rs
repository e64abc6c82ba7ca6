//! Attachment storage on local disk, served back under `/files/`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::models::Attachment;

/// Upload ceiling. Checked before a single byte is written so an oversized
/// file never costs disk or bandwidth downstream.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Attachment exceeds the 10 MB limit")]
    TooLarge { size: usize },

    #[error("File name is not usable")]
    BadName,

    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

/// Uploaded files, filed under `<root>/<sender>/<receiver>/` with a
/// timestamped disk name. The original upload name survives only in the
/// attachment metadata, never in the path.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist an upload and return the metadata a message row carries.
    /// `declared_type` is the client's own content type, trusted only when
    /// the file extension tells us nothing.
    pub fn save(
        &self,
        sender: &Uuid,
        receiver: &Uuid,
        original_name: &str,
        declared_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<Attachment, AttachmentError> {
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentError::TooLarge { size: bytes.len() });
        }
        let name = sanitize_file_name(original_name)?;

        let stored = match Path::new(&name).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!(
                "{}_{}.{ext}",
                chrono::Utc::now().timestamp_millis(),
                Uuid::new_v4().simple()
            ),
            None => format!(
                "{}_{}",
                chrono::Utc::now().timestamp_millis(),
                Uuid::new_v4().simple()
            ),
        };
        let dir = self.root.join(sender.to_string()).join(receiver.to_string());
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(&stored), bytes)?;

        let content_type = match mime_guess::from_path(&name).first() {
            Some(mime) => mime.to_string(),
            None => declared_type
                .unwrap_or("application/octet-stream")
                .to_string(),
        };
        Ok(Attachment {
            url: format!("/files/{sender}/{receiver}/{stored}"),
            name,
            content_type,
            size: bytes.len() as i64,
        })
    }
}

/// Reduce a client-supplied name to its final path component.
fn sanitize_file_name(name: &str) -> Result<String, AttachmentError> {
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(AttachmentError::BadName);
    }
    Ok(name.to_string())
}
