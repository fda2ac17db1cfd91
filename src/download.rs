use crate::error::AppError;
use crate::root::ServedRoot;
use axum::{
    extract::{Query, Request},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::path::Path;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::info;

// RFC 5987 attr-char, everything else is percent-encoded in filename*
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub file: String,
}

/// Serves one file as an attachment. Range and conditional requests are
/// handled by `ServeFile`.
pub async fn download_file(
    Extension(root): Extension<ServedRoot>,
    query: Option<Query<DownloadQuery>>,
    request: Request,
) -> Result<Response, AppError> {
    let Some(Query(DownloadQuery { file })) = query else {
        return Err(AppError::MissingQuery("file"));
    };
    let path = root.resolve_download(&file).await?;

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.into_response();

    // named after what the client asked for, not a symlink target
    if let Some(disposition) = attachment_header(Path::new(&file)) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, disposition);
    }
    info!(file = file.as_str(), status = response.status().as_u16(), "download file");

    Ok(response)
}

fn attachment_header(path: &Path) -> Option<HeaderValue> {
    let base = path.file_name()?.to_string_lossy();
    let fallback: String = base
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(&base, ATTR_CHAR)
    );
    HeaderValue::from_str(&value).ok()
}
