use crate::error::{Ack, AppError, IoAction};
use crate::root::ServedRoot;
use axum::{
    extract::{multipart::Field, Multipart},
    Extension, Json,
};
use std::io;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufWriter},
};
use tracing::{debug, info};
use uuid::Uuid;

/// Multipart field that carries the uploaded files.
pub const UPLOAD_FIELD: &str = "files";
/// In-memory buffer between the multipart stream and the disk, per part.
pub const UPLOAD_BUFFER_SIZE: usize = 1_024_000;

const TEMP_SUFFIX: &str = ".upload-tmp";
// simple-format uuid, 32 hex digits
const TEMP_ID_LEN: usize = 32;

pub async fn upload_file(
    Extension(root): Extension<ServedRoot>,
    mut multipart: Multipart,
) -> Result<Json<Ack>, AppError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "skipping non-file field");
            continue;
        }
        let Some(name) = field.file_name().map(str::to_string) else {
            debug!("skipping part without a filename");
            continue;
        };

        let dest = root.resolve_upload(&name).await?;
        let written = store_field(&mut field, &dest, &name).await?;
        info!(f = name.as_str(), bytes = written, "upload file success");
    }

    Ok(Json(Ack {
        code: 0,
        msg: "Upload file success!",
    }))
}

/// Streams one part into a temporary next to `dest`, then renames it over
/// `dest`. Readers never see a half-written destination.
async fn store_field(field: &mut Field<'_>, dest: &Path, name: &str) -> Result<u64, AppError> {
    let temp = TempUpload::new(dest);
    let file = File::create(&temp.path)
        .await
        .map_err(|e| AppError::io(IoAction::Creating, name, e))?;
    let mut writer = BufWriter::with_capacity(UPLOAD_BUFFER_SIZE, file);

    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| AppError::io(IoAction::Writing, name, e))?;
        written += chunk.len() as u64;
    }
    writer
        .flush()
        .await
        .map_err(|e| AppError::io(IoAction::Writing, name, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| AppError::io(IoAction::Writing, name, e))?;

    temp.persist(dest)
        .await
        .map_err(|e| AppError::io(IoAction::Renaming, name, e))?;

    Ok(written)
}

/// Matches only names produced by [`TempUpload`]: `.<uuid>.upload-tmp`.
pub fn is_upload_temp(name: &str) -> bool {
    name.strip_prefix('.')
        .and_then(|rest| rest.strip_suffix(TEMP_SUFFIX))
        .map(|id| id.len() == TEMP_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Temporary file for an in-flight upload. Removed on drop unless it was
/// renamed into place, which also covers client disconnects.
struct TempUpload {
    path: PathBuf,
    persisted: bool,
}

impl TempUpload {
    // The client's name is left out so the temporary stays short whatever
    // length the destination name has.
    fn new(dest: &Path) -> Self {
        let temp_name = format!(".{}{}", Uuid::new_v4().simple(), TEMP_SUFFIX);
        let path = match dest.parent() {
            Some(parent) => parent.join(temp_name),
            None => PathBuf::from(temp_name),
        };
        Self {
            path,
            persisted: false,
        }
    }

    async fn persist(mut self, dest: &Path) -> io::Result<()> {
        fs::rename(&self.path, dest).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
