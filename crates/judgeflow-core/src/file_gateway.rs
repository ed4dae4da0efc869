//! Access to submission documents.
//!
//! A [`FileRef`] is resolved either to the file's bytes (local directory
//! layout `<root>/<owner>/<name>`) or to a redirect pointing at the single
//! encoded URL of the document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use judgeflow_state::{FileKind, FileRef, StorageError};
use tracing::debug;

use crate::access::Caller;
use crate::config::FilesConfig;
use crate::domain::{Entity, Result, ReviewError};
use crate::obs;

/// Builds document links for a configured origin and route prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLinker {
    base: String,
    route_prefix: String,
}

impl DocumentLinker {
    pub fn new(base: impl Into<String>, route_prefix: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            route_prefix: route_prefix.into(),
        }
    }

    /// Same-origin paths unless `files.base_url` is set.
    pub fn from_config(files: &FilesConfig) -> Self {
        Self::new(
            files.base_url.clone().unwrap_or_default(),
            files.route_prefix.clone(),
        )
    }

    pub fn link(&self, file: &FileRef) -> String {
        file.url(&self.base, &self.route_prefix)
    }
}

/// What a gateway hands back for a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResolution {
    Content {
        content_type: &'static str,
        bytes: Vec<u8>,
    },
    Redirect {
        location: String,
    },
}

#[async_trait]
pub trait FileGateway: Send + Sync {
    async fn resolve(&self, file: &FileRef) -> Result<FileResolution>;
}

/// Serves documents from a local directory.
pub struct LocalFileGateway {
    root: PathBuf,
}

impl LocalFileGateway {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// `<root>/<owner>/<name>`; components that could leave `root` are refused.
    fn file_path(&self, file: &FileRef) -> Result<PathBuf> {
        for component in [file.owner(), file.name()] {
            if !is_plain_component(component) {
                return Err(ReviewError::unauthorized(format!(
                    "file path component {component:?} is not allowed"
                )));
            }
        }
        Ok(self.root.join(file.owner()).join(file.name()))
    }
}

fn is_plain_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\', '\0'])
}

fn not_found(file: &FileRef) -> ReviewError {
    ReviewError::not_found(Entity::File, format!("{}/{}", file.owner(), file.name()))
}

#[async_trait]
impl FileGateway for LocalFileGateway {
    async fn resolve(&self, file: &FileRef) -> Result<FileResolution> {
        let path = self.file_path(file)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => not_found(file),
            _ => ReviewError::Storage(StorageError::Backend(format!(
                "read {}: {}",
                path.display(),
                e
            ))),
        })?;
        if bytes.is_empty() {
            return Err(not_found(file));
        }
        debug!(path = %path.display(), size = bytes.len(), "resolved local document");
        Ok(FileResolution::Content {
            content_type: FileKind::content_type(file.name()),
            bytes,
        })
    }
}

/// Answers every document with a redirect to its link.
pub struct RedirectFileGateway {
    linker: DocumentLinker,
}

impl RedirectFileGateway {
    pub fn new(linker: DocumentLinker) -> Self {
        Self { linker }
    }
}

#[async_trait]
impl FileGateway for RedirectFileGateway {
    async fn resolve(&self, file: &FileRef) -> Result<FileResolution> {
        Ok(FileResolution::Redirect {
            location: self.linker.link(file),
        })
    }
}

/// Gateway selected by configuration: redirect when `base_url` is set,
/// local directory otherwise.
pub fn gateway_from_config(files: &FilesConfig) -> Arc<dyn FileGateway> {
    match files.base_url {
        Some(_) => Arc::new(RedirectFileGateway::new(DocumentLinker::from_config(files))),
        None => Arc::new(LocalFileGateway::new(&files.root)),
    }
}

/// Authenticated document viewing.
pub struct FileApi {
    gateway: Arc<dyn FileGateway>,
}

impl FileApi {
    pub fn new(gateway: Arc<dyn FileGateway>) -> Self {
        Self { gateway }
    }

    /// `owner` and `name` may arrive percent-encoded any number of times.
    pub async fn view(&self, caller: &Caller, owner: &str, name: &str) -> Result<FileResolution> {
        let outcome = async {
            caller.require_authenticated()?;
            let file = FileRef::new(owner, name);
            self.gateway.resolve(&file).await
        }
        .await;
        outcome.map_err(|e| obs::track_failure("file.view", caller, e))
    }
}
