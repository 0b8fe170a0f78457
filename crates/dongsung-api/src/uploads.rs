use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::{FromRequest, Multipart, Request};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

/// URL prefix the uploads directory is served under.
pub const UPLOADS_ROUTE: &str = "/uploads";

const MAX_EXTENSION_LEN: usize = 10;

/// Local directory holding every uploaded file under a generated name.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Creates the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a fresh `<uuid>.<ext>` name and return its public
    /// URL path. Only the extension of `original_name` is kept.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> anyhow::Result<String> {
        let name = match extension(original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        let path = self.dir.join(&name);
        let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
            error!("Failed to create file {}: {}", path.display(), e);
            e
        })?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!("Stored upload {} ({} bytes)", name, bytes.len());
        Ok(format!("{}/{}", UPLOADS_ROUTE, name))
    }

    /// Best-effort removal of files saved for a request that was then
    /// rejected.
    pub async fn discard(&self, urls: impl IntoIterator<Item = &String>) {
        for url in urls {
            let Some(name) = url.strip_prefix(UPLOADS_ROUTE).map(|s| s.trim_start_matches('/')) else {
                continue;
            };
            if let Err(e) = tokio::fs::remove_file(self.dir.join(name)).await {
                warn!("Failed to discard upload {}: {}", url, e);
            }
        }
    }
}

/// Lowercased alphanumeric extension, if the name has a usable one.
fn extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > MAX_EXTENSION_LEN || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// A multipart form whose files have already been written to the upload
/// store. Text fields are kept by name; file fields map to the URL paths of
/// their saved files, in upload order. Empty file parts are skipped.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<String>>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// A text field that must be present and not blank.
    pub fn required(&self, name: &str) -> Result<&str, ApiError> {
        match self.text(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ApiError::invalid(format!("Missing required field '{}'", name))),
        }
    }

    pub fn files(&self, name: &str) -> &[String] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every saved file, across all fields.
    pub fn all_files(&self) -> impl Iterator<Item = &String> {
        self.files.values().flatten()
    }
}

impl FromRequest<AppState> for UploadForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state).await?;
        let mut form = UploadForm::default();

        // Files already on disk must not outlive a body that breaks off later.
        if let Err(e) = read_fields(&mut multipart, &state.uploads, &mut form).await {
            state.uploads.discard(form.all_files()).await;
            return Err(e);
        }

        Ok(form)
    }
}

async fn read_fields(multipart: &mut Multipart, store: &UploadStore, form: &mut UploadForm) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    continue;
                }
                let url = store.save(&file_name, &bytes).await?;
                form.files.entry(name).or_default().push(url);
            }
            None => {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(())
}
