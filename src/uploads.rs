//! Multipart form intake and disk-backed media storage.
//!
//! Files are held in memory until the whole form has been read and validated,
//! then written under random names. Callers that fail after writing call
//! [`MediaStore::discard`] so nothing is left behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use bytes::{Bytes, BytesMut};

use crate::error::AppResult;

/// URL prefix under which stored media is served.
pub const PUBLIC_PREFIX: &str = "/static/";
pub const DEFAULT_AVATAR: &str = "/static/defaults/default-avatar.jpg";

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const MAX_TEXT_FIELD: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Unsupported file type: {0}. Allowed: JPEG, PNG, GIF, WebP")]
    UnsupportedType(String),

    #[error("Unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("{field} exceeds the {limit} byte limit")]
    TooLarge { field: String, limit: usize },

    #[error("Too many files in {field} (maximum {max})")]
    TooManyFiles { field: String, max: usize },

    #[error("Unexpected file field: {0}")]
    UnexpectedField(String),

    #[error("Form field {0} is not valid UTF-8")]
    InvalidText(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Text fields of a form. Repeated names keep every value in order; a
/// trailing `[]` on the name is ignored.
#[derive(Debug, Clone, Default)]
pub struct FormFields(HashMap<String, Vec<String>>);

impl FormFields {
    pub fn push(&mut self, name: &str, value: String) {
        self.0
            .entry(normalize_name(name).to_string())
            .or_default()
            .push(value);
    }

    /// First value of a field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn all(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

fn normalize_name(name: &str) -> &str {
    name.strip_suffix("[]").unwrap_or(name)
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub original_name: String,
    pub content_type: String,
    /// Lowercase, without the dot.
    pub extension: String,
    pub data: Bytes,
}

/// Which file fields a form accepts and how large files may be.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_file_size: usize,
    pub file_fields: Vec<(&'static str, usize)>,
}

impl UploadPolicy {
    fn max_files(&self, field: &str) -> Option<usize> {
        self.file_fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, max)| *max)
    }
}

#[derive(Debug, Default)]
pub struct ParsedForm {
    pub fields: FormFields,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl ParsedForm {
    pub fn take_files(&mut self, field: &str) -> Vec<UploadedFile> {
        self.files.remove(field).unwrap_or_default()
    }

    pub fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        self.take_files(field).into_iter().next()
    }
}

/// Read a whole multipart body, enforcing the policy as bytes arrive.
pub async fn read_form(mut multipart: Multipart, policy: &UploadPolicy) -> AppResult<ParsedForm> {
    let mut form = ParsedForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = normalize_name(field.name().unwrap_or_default()).to_string();

        let Some(original_name) = field.file_name().map(str::to_string) else {
            let data = read_limited(field, &name, MAX_TEXT_FIELD).await?;
            let text = String::from_utf8(data.to_vec())
                .map_err(|_| UploadError::InvalidText(name.clone()))?;
            form.fields.push(&name, text);
            continue;
        };

        // Browsers send an empty part when no file was chosen.
        if original_name.is_empty() {
            continue;
        }

        let max = policy
            .max_files(&name)
            .ok_or_else(|| UploadError::UnexpectedField(name.clone()))?;
        let already = form.files.get(&name).map(Vec::len).unwrap_or(0);
        if already >= max {
            return Err(UploadError::TooManyFiles { field: name, max }.into());
        }

        let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
        check_content_type(&content_type)?;
        let extension = extension_for(&original_name)?;

        let data = read_limited(field, &name, policy.max_file_size).await?;
        form.files.entry(name.clone()).or_default().push(UploadedFile {
            field: name,
            original_name,
            content_type,
            extension,
            data,
        });
    }

    Ok(form)
}

async fn read_limited(mut field: Field<'_>, name: &str, limit: usize) -> AppResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if buf.len() + chunk.len() > limit {
            return Err(UploadError::TooLarge {
                field: name.to_string(),
                limit,
            }
            .into());
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn check_content_type(content_type: &str) -> Result<(), UploadError> {
    if ALLOWED_MIME_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(UploadError::UnsupportedType(content_type.to_string()))
    }
}

/// Extension from the client's filename; files without one are stored as jpg.
fn extension_for(file_name: &str) -> Result<String, UploadError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "jpg".to_string());
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(UploadError::UnsupportedExtension(ext))
    }
}

/// Disk directory that backs `/static/`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory layout and warn about a missing default avatar.
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.root.join("defaults"))?;
        if let Some(path) = self.local_path(DEFAULT_AVATAR) {
            if !path.exists() {
                tracing::warn!(
                    "Default avatar missing; place a 200x200 image at {}",
                    path.display()
                );
            }
        }
        Ok(())
    }

    /// Write one file under a random name and return its public path.
    pub async fn save(&self, file: &UploadedFile) -> Result<String, UploadError> {
        let name = format!("{}.{}", uuid::Uuid::now_v7(), file.extension);
        tokio::fs::write(self.root.join(&name), &file.data).await?;
        tracing::debug!(
            "Stored {} ({} bytes) from {} as {}",
            file.field,
            file.data.len(),
            file.original_name,
            name
        );
        Ok(format!("{PUBLIC_PREFIX}{name}"))
    }

    /// Write several files; on failure the ones already written are removed.
    pub async fn save_all(&self, files: &[UploadedFile]) -> Result<Vec<String>, UploadError> {
        let mut saved = Vec::with_capacity(files.len());
        for file in files {
            match self.save(file).await {
                Ok(path) => saved.push(path),
                Err(e) => {
                    self.discard(&saved).await;
                    return Err(e);
                }
            }
        }
        Ok(saved)
    }

    /// Best-effort removal of previously stored files.
    pub async fn discard(&self, public_paths: &[String]) {
        for public in public_paths {
            let Some(path) = self.local_path(public) else {
                continue;
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::info!("Removed orphaned upload {}", path.display()),
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    /// Map a `/static/...` path to a file under the root. Rejects anything
    /// that could escape the root.
    pub fn local_path(&self, public_path: &str) -> Option<PathBuf> {
        let relative = public_path
            .strip_prefix(PUBLIC_PREFIX)
            .unwrap_or(public_path);
        self.resolve(relative)
    }

    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for part in relative.split('/') {
            match part {
                "" | "." => continue,
                ".." => return None,
                p if p.contains('\\') || p.contains(':') => return None,
                p => path.push(p),
            }
        }
        if path == self.root {
            None
        } else {
            Some(path)
        }
    }
}
