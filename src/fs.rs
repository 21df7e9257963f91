use crate::error::AppError;
use crate::mime::{self, MimeFallback};
use crate::response::HttpResponse;
use log::{debug, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Canonicalizes `root` and checks that it is a directory.
pub fn canonical_root(root: &Path) -> Result<PathBuf, AppError> {
    let canonical = root
        .canonicalize()
        .map_err(|_| AppError::DirectoryNotFound(root.to_string_lossy().into_owned()))?;
    if !canonical.is_dir() {
        return Err(AppError::DirectoryNotFound(
            root.to_string_lossy().into_owned(),
        ));
    }
    Ok(canonical)
}

/// Maps a decoded URL path to a file under `root`.
///
/// `root` must already be canonical. A directory resolves to `default_page`
/// inside that same directory. Anything that would land outside the root,
/// lexically or through a symlink, is `Forbidden`.
pub fn resolve_path(root: &Path, url_path: &str, default_page: &str) -> Result<PathBuf, AppError> {
    let relative = Path::new(url_path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(AppError::Forbidden);
    }

    let mut target = confine(root, &root.join(relative))?;
    if target.is_dir() {
        target = confine(root, &target.join(default_page))?;
    }
    if !target.is_file() {
        return Err(AppError::NotFound);
    }
    Ok(target)
}

fn confine(root: &Path, path: &Path) -> Result<PathBuf, AppError> {
    let canonical = match path.canonicalize() {
        Ok(p) => p,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(AppError::Io(e)),
    };
    if !canonical.starts_with(root) {
        return Err(AppError::Forbidden);
    }
    Ok(canonical)
}

/// Builds the 200 response for a GET, reading the whole file into memory.
pub fn serve_file(
    root: &Path,
    url_path: &str,
    default_page: &str,
    fallback: MimeFallback,
    log_prefix: &str,
) -> Result<HttpResponse, AppError> {
    let path = resolve_path(root, url_path, default_page).map_err(|e| {
        match e {
            AppError::Forbidden => {
                warn!("{log_prefix} Potential path traversal attempt: '{url_path}'")
            }
            AppError::NotFound => debug!("{log_prefix} File not found: '{url_path}'"),
            _ => {}
        }
        e
    })?;

    let mime_type = mime::resolve(&path, fallback).map_err(|e| {
        warn!("{} Unsupported file type: '{}'", log_prefix, path.display());
        e
    })?;

    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(AppError::Io(e)),
    };

    info!(
        "{} Serving '{}' ({} bytes, {})",
        log_prefix,
        path.display(),
        data.len(),
        mime_type
    );
    Ok(HttpResponse::new(200).with_body(data, mime_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("docs")).unwrap();
        File::create(root.join("docs/page.html"))
            .unwrap()
            .write_all(b"<html></html>")
            .unwrap();
        File::create(root.join("file.html"))
            .unwrap()
            .write_all(b"root page")
            .unwrap();
        File::create(root.join("docs/file.html"))
            .unwrap()
            .write_all(b"docs page")
            .unwrap();
        (dir, root)
    }

    #[test]
    fn resolves_file_under_root() {
        let (_dir, root) = setup();
        let path = resolve_path(&root, "/docs/page.html", "file.html").unwrap();
        assert_eq!(path, root.join("docs/page.html"));
    }

    #[test]
    fn directory_uses_its_own_default_page() {
        let (_dir, root) = setup();
        assert_eq!(
            resolve_path(&root, "/docs/", "file.html").unwrap(),
            root.join("docs/file.html")
        );
        assert_eq!(
            resolve_path(&root, "/", "file.html").unwrap(),
            root.join("file.html")
        );
    }

    #[test]
    fn directory_without_default_page_is_not_found() {
        let (_dir, root) = setup();
        fs::create_dir(root.join("empty")).unwrap();
        assert!(matches!(
            resolve_path(&root, "/empty", "file.html"),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_dir, root) = setup();
        assert!(matches!(
            resolve_path(&root, "/nope.html", "file.html"),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn escapes_are_forbidden() {
        let (_dir, root) = setup();
        assert!(matches!(
            resolve_path(&root, "/../etc/passwd", "file.html"),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            resolve_path(&root, "/docs/../../x", "file.html"),
            Err(AppError::Forbidden)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_is_forbidden() {
        let (_dir, root) = setup();
        let outside = tempdir().unwrap();
        File::create(outside.path().join("secret.txt")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), root.join("link.txt"))
            .unwrap();
        assert!(matches!(
            resolve_path(&root, "/link.txt", "file.html"),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn serve_file_round_trips_bytes() {
        let (_dir, root) = setup();
        let response =
            serve_file(&root, "/docs/page.html", "file.html", MimeFallback::Reject, "[t]").unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body.as_deref(), Some(&b"<html></html>"[..]));
        assert!(response
            .headers
            .contains(&("Content-Type".to_string(), "text/html".to_string())));
    }

    #[test]
    fn unknown_extension_follows_policy() {
        let (_dir, root) = setup();
        File::create(root.join("data.weird")).unwrap();
        assert!(matches!(
            serve_file(&root, "/data.weird", "file.html", MimeFallback::Reject, "[t]"),
            Err(AppError::UnknownMimeType(_))
        ));
        let response =
            serve_file(&root, "/data.weird", "file.html", MimeFallback::default(), "[t]").unwrap();
        assert!(response
            .headers
            .contains(&("Content-Type".to_string(), "text/html".to_string())));
    }
}
