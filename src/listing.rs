use crate::error::{AppError, IoAction};
use crate::root::ServedRoot;
use crate::upload::is_upload_temp;
use axum::{
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Extension,
};
use handlebars::Handlebars;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::warn;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

const INDEX_TEMPLATE: &str = "index";
const INDEX_TEMPLATE_FILE: &str = "index.hbs.html";
const HOME_TITLE: &str = "File Sharer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Lists one level of `dir`, sorted by name. Entries whose names are not
/// valid UTF-8 cannot be linked to and are skipped.
pub async fn list_entries(dir: &Path) -> Result<Vec<FileEntry>, AppError> {
    let dir_display = dir.display().to_string();
    let mut read_dir = fs::read_dir(dir)
        .await
        .map_err(|e| AppError::io(IoAction::ReadingDir, dir_display.as_str(), e))?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| AppError::io(IoAction::ReadingDir, dir_display.as_str(), e))?
    {
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(dir = dir_display.as_str(), name = ?raw, "skipping entry with a non UTF-8 name");
                continue;
            }
        };
        if is_upload_temp(&name) {
            continue;
        }
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        entries.push(FileEntry { name, is_dir });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(entries)
}

/// Handlebars registry holding the embedded page templates.
pub struct Pages {
    registry: Handlebars<'static>,
}

#[derive(Serialize)]
struct IndexPage<'a> {
    title: &'a str,
    advance: bool,
    files: Vec<Link>,
}

#[derive(Serialize)]
struct Link {
    name: String,
    href: String,
}

impl Pages {
    pub fn load() -> Result<Self, AppError> {
        let source = Assets::get(INDEX_TEMPLATE_FILE).ok_or_else(|| {
            AppError::Internal(format!("{INDEX_TEMPLATE_FILE} not found in embedded assets"))
        })?;
        let source = std::str::from_utf8(&source.data)
            .map_err(|e| AppError::Internal(format!("{INDEX_TEMPLATE_FILE} is not UTF-8: {e}")))?;

        let mut registry = Handlebars::new();
        registry
            .register_template_string(INDEX_TEMPLATE, source)
            .map_err(|e| AppError::Internal(format!("invalid template {INDEX_TEMPLATE_FILE}: {e}")))?;

        Ok(Self { registry })
    }

    /// Renders a listing. With `advance` the page carries the upload form
    /// and links go through `/downloadFile`; otherwise links are relative
    /// paths for the static file server.
    pub fn render_index(
        &self,
        title: &str,
        advance: bool,
        entries: &[FileEntry],
    ) -> Result<String, AppError> {
        let files = entries
            .iter()
            .map(|entry| {
                let mut href = utf8_percent_encode(&entry.name, NON_ALPHANUMERIC).to_string();
                if entry.is_dir && !advance {
                    href.push('/');
                }
                Link {
                    name: entry.name.clone(),
                    href,
                }
            })
            .collect();

        let page = IndexPage {
            title,
            advance,
            files,
        };
        Ok(self.registry.render(INDEX_TEMPLATE, &page)?)
    }
}

pub async fn home(
    Extension(root): Extension<ServedRoot>,
    Extension(pages): Extension<Arc<Pages>>,
) -> Result<Html<String>, AppError> {
    let entries = list_entries(root.path()).await?;
    Ok(Html(pages.render_index(HOME_TITLE, true, &entries)?))
}

/// Directory listing for the basic file server, reached when no file
/// matches the request path.
pub async fn browse(
    Extension(root): Extension<ServedRoot>,
    Extension(pages): Extension<Arc<Pages>>,
    uri: Uri,
) -> Result<Html<String>, AppError> {
    let requested = percent_decode_str(uri.path())
        .decode_utf8()
        .map_err(|_| AppError::not_found(uri.path()))?;
    let relative = requested.trim_start_matches('/');

    let dir = root.resolve_dir(relative).await?;
    let entries = list_entries(&dir).await?;
    let title = format!("Index of /{relative}");

    Ok(Html(pages.render_index(&title, false, &entries)?))
}

pub async fn favicon() -> Response {
    match Assets::get("favicon.ico") {
        Some(icon) => (
            [(header::CONTENT_TYPE, "image/x-icon")],
            icon.data.into_owned(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn file(name: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            is_dir: false,
        }
    }

    #[tokio::test]
    async fn lists_one_level_including_hidden_and_dirs() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("b.txt"), b"b").unwrap();
        std::fs::write(temp.path().join(".hidden"), b"h").unwrap();
        std::fs::create_dir_all(temp.path().join("sub/nested")).unwrap();
        std::fs::write(temp.path().join("sub/inner.txt"), b"i").unwrap();

        let entries = list_entries(temp.path()).await.unwrap();
        assert_eq!(names(&entries), vec![".hidden", "b.txt", "sub"]);
        assert!(entries[2].is_dir);
        assert!(!entries[1].is_dir);
    }

    #[tokio::test]
    async fn skips_in_flight_upload_temporaries() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"a").unwrap();
        std::fs::write(
            temp.path().join(".0123456789abcdef0123456789abcdef.upload-tmp"),
            b"partial",
        )
        .unwrap();

        let entries = list_entries(temp.path()).await.unwrap();
        assert_eq!(names(&entries), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn user_files_resembling_temporaries_are_listed() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join(".x.upload-tmp"), b"mine").unwrap();
        std::fs::write(temp.path().join(".notes.txt.1234.upload-tmp"), b"mine").unwrap();

        let entries = list_entries(temp.path()).await.unwrap();
        assert_eq!(
            names(&entries),
            vec![".notes.txt.1234.upload-tmp", ".x.upload-tmp"]
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("ok.txt"), b"ok").unwrap();
        std::fs::write(temp.path().join(OsStr::from_bytes(b"bad\xff.txt")), b"bad").unwrap();

        let entries = list_entries(temp.path()).await.unwrap();
        assert_eq!(names(&entries), vec!["ok.txt"]);
    }

    #[tokio::test]
    async fn unreadable_directory_is_an_error() {
        let temp = tempdir().unwrap();
        let result = list_entries(&temp.path().join("missing")).await;
        assert!(matches!(
            result,
            Err(AppError::RequestIo {
                action: IoAction::ReadingDir,
                ..
            })
        ));
    }

    #[test]
    fn page_escapes_names_and_encodes_links() {
        let pages = Pages::load().unwrap();
        let page = pages
            .render_index(HOME_TITLE, true, &[file("<b>&x y.txt")])
            .unwrap();
        assert!(page.contains("&lt;b&gt;&amp;x y.txt"));
        assert!(!page.contains("<b>&x"));
        assert!(page.contains("href=\"/downloadFile?file=%3Cb%3E%26x%20y%2Etxt\""));
        assert!(page.contains("id=\"upload\""));
    }

    #[test]
    fn basic_page_links_relative_paths_without_upload_form() {
        let pages = Pages::load().unwrap();
        let entries = [
            file("a b.txt"),
            FileEntry {
                name: "sub".to_string(),
                is_dir: true,
            },
        ];
        let page = pages.render_index("Index of /", false, &entries).unwrap();
        assert!(page.contains("<title>Index of /</title>"));
        assert!(page.contains("href=\"a%20b%2Etxt\""));
        assert!(page.contains("href=\"sub/\""));
        assert!(!page.contains("/downloadFile"));
        assert!(!page.contains("id=\"upload\""));
    }

    #[tokio::test]
    async fn browse_renders_subdirectories() {
        let temp = tempdir().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("sub/inner.txt"), b"i").unwrap();
        let root = ServedRoot::resolve(temp.path()).unwrap();
        let pages = Arc::new(Pages::load().unwrap());

        let Html(page) = browse(Extension(root), Extension(pages), Uri::from_static("/sub/"))
            .await
            .unwrap_or_else(|e| panic!("browse failed: {e}"));
        assert!(page.contains("Index of /sub/"));
        assert!(page.contains(">inner.txt</a>"));
    }

    #[tokio::test]
    async fn browse_of_missing_directory_is_not_found() {
        let temp = tempdir().unwrap();
        let root = ServedRoot::resolve(temp.path()).unwrap();
        let pages = Arc::new(Pages::load().unwrap());

        let result = browse(Extension(root), Extension(pages), Uri::from_static("/nope/")).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[test]
    fn embedded_assets_are_present() {
        assert!(Assets::get(INDEX_TEMPLATE_FILE).is_some());
        assert!(Assets::get("favicon.ico").is_some());
    }
}
