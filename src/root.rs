//! The served root and containment checks for client-supplied names.
//!
//! Every name that arrives over HTTP is resolved through [`ServedRoot`].
//! Names are first checked lexically (no absolute paths, no `..`), then the
//! existing part of the path is canonicalized and must stay under the root so
//! that symlinks cannot lead outside of it.

use crate::error::{AppError, IoAction};
use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

#[derive(Debug, Clone)]
pub struct ServedRoot {
    path: Arc<PathBuf>,
}

impl ServedRoot {
    /// Resolves the configured root once at startup. Relative roots are
    /// joined against the working directory.
    pub fn resolve(configured: &Path) -> Result<Self, AppError> {
        let joined = if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|e| AppError::StartupConfig {
                message: "Failed to get current directory".to_string(),
                source: e,
            })?;
            cwd.join(configured)
        };

        let canonical = std::fs::canonicalize(&joined).map_err(|e| AppError::StartupConfig {
            message: format!("Failed to resolve root {}", joined.display()),
            source: e,
        })?;

        // read_dir both proves it is a directory and that we can list it
        std::fs::read_dir(&canonical).map_err(|e| AppError::StartupConfig {
            message: format!("Root {} is not a readable directory", canonical.display()),
            source: e,
        })?;

        Ok(Self {
            path: Arc::new(canonical),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Destination for an uploaded file. The file itself may not exist yet,
    /// so only its parent directory is canonicalized.
    pub async fn resolve_upload(&self, name: &str) -> Result<PathBuf, AppError> {
        let relative = checked_relative(name)?;
        let dest = self.path.join(relative);
        let (parent, file_name) = match (dest.parent(), dest.file_name()) {
            (Some(parent), Some(file_name)) => (parent, file_name),
            _ => return Err(AppError::containment(name)),
        };

        let parent = fs::canonicalize(parent)
            .await
            .map_err(|e| AppError::io(IoAction::Resolving, name, e))?;
        if !parent.starts_with(self.path()) {
            return Err(AppError::containment(name));
        }

        Ok(parent.join(file_name))
    }

    /// Existing regular file to serve for a download.
    pub async fn resolve_download(&self, name: &str) -> Result<PathBuf, AppError> {
        let (canonical, meta) = self.resolve_existing(name).await?;
        if meta.is_file() {
            Ok(canonical)
        } else {
            Err(AppError::not_found(name))
        }
    }

    /// Existing directory under the root, for browsing. An empty name is the
    /// root itself.
    pub async fn resolve_dir(&self, name: &str) -> Result<PathBuf, AppError> {
        if name.is_empty() {
            return Ok(self.path().to_path_buf());
        }
        let (canonical, meta) = self.resolve_existing(name).await?;
        if meta.is_dir() {
            Ok(canonical)
        } else {
            Err(AppError::not_found(name))
        }
    }

    async fn resolve_existing(&self, name: &str) -> Result<(PathBuf, Metadata), AppError> {
        let relative = checked_relative(name)?;
        let canonical = match fs::canonicalize(self.path.join(relative)).await {
            Ok(path) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(AppError::not_found(name)),
            Err(e) => return Err(AppError::io(IoAction::Resolving, name, e)),
        };
        if !canonical.starts_with(self.path()) {
            return Err(AppError::containment(name));
        }

        match fs::metadata(&canonical).await {
            Ok(meta) => Ok((canonical, meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(AppError::not_found(name)),
            Err(e) => Err(AppError::io(IoAction::Resolving, name, e)),
        }
    }
}

/// Lexical half of the containment check. Runs before touching the disk.
fn checked_relative(name: &str) -> Result<&Path, AppError> {
    let path = Path::new(name);
    let mut has_normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(AppError::containment(name));
            }
        }
    }

    if has_normal {
        Ok(path)
    } else {
        Err(AppError::containment(name))
    }
}
