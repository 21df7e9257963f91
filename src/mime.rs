use crate::error::AppError;
use std::path::Path;

/// What to do with a file whose extension has no known content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeFallback {
    /// Refuse to serve it (500).
    Reject,
    /// Serve it with the given content type.
    DefaultTo(&'static str),
}

impl Default for MimeFallback {
    fn default() -> Self {
        MimeFallback::DefaultTo("text/html")
    }
}

/// Native MIME type lookup for common file extensions.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => return None,
    };
    Some(mime)
}

/// Resolves the content type of `path`, applying `fallback` when the
/// extension is missing or unknown.
pub fn resolve(path: &Path, fallback: MimeFallback) -> Result<&'static str, AppError> {
    let known = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_for_extension);

    match (known, fallback) {
        (Some(mime), _) => Ok(mime),
        (None, MimeFallback::DefaultTo(mime)) => Ok(mime),
        (None, MimeFallback::Reject) => Err(AppError::UnknownMimeType(
            path.to_string_lossy().into_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_are_case_insensitive() {
        assert_eq!(mime_for_extension("html"), Some("text/html"));
        assert_eq!(mime_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("bin"), None);
    }

    #[test]
    fn fallback_policy_is_applied() {
        let path = Path::new("notes.unknownext");
        assert_eq!(resolve(path, MimeFallback::default()).unwrap(), "text/html");
        assert!(matches!(
            resolve(path, MimeFallback::Reject),
            Err(AppError::UnknownMimeType(_))
        ));
        assert_eq!(
            resolve(Path::new("Makefile"), MimeFallback::DefaultTo("text/plain")).unwrap(),
            "text/plain"
        );
        assert_eq!(resolve(Path::new("a/b.css"), MimeFallback::Reject).unwrap(), "text/css");
    }
}
