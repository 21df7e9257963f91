//! Multipart uploads.
//!
//! Bodies are split on the literal WebKit boundary marker instead of the
//! boundary announced in `Content-Type`. Only `parse_multipart` knows about
//! that format, so a compliant parser can replace it without touching the
//! rest of the pipeline.

use crate::error::AppError;
use crate::request::find;
use log::{info, warn};
use std::fs;
use std::path::Path;

pub const BOUNDARY_MARKER: &[u8] = b"------WebKitFormBoundary";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name as sent by the client, quotes removed, not yet sanitized.
    pub filename: String,
    pub content: Vec<u8>,
}

/// Extracts every part that carries a filename and non-empty content.
pub fn parse_multipart(body: &[u8]) -> Vec<UploadedFile> {
    split_on_marker(body)
        .into_iter()
        .skip(1)
        .filter_map(parse_part)
        .collect()
}

fn split_on_marker(body: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    let mut rest = body;
    while let Some(pos) = find(rest, BOUNDARY_MARKER) {
        segments.push(&rest[..pos]);
        rest = &rest[pos + BOUNDARY_MARKER.len()..];
    }
    segments.push(rest);
    segments
}

fn parse_part(segment: &[u8]) -> Option<UploadedFile> {
    // The segment starts with the remainder of the boundary line.
    let line_end = segment.iter().position(|&b| b == b'\n')?;
    let boundary_tail = String::from_utf8_lossy(&segment[..line_end]);
    if boundary_tail.trim_end().ends_with("--") {
        return None;
    }
    let part = &segment[line_end + 1..];

    let (headers_end, content_start) = match find(part, b"\r\n\r\n") {
        Some(pos) => (pos, pos + 4),
        None => {
            let pos = find(part, b"\n\n")?;
            (pos, pos + 2)
        }
    };

    let headers = String::from_utf8_lossy(&part[..headers_end]);
    let filename = headers
        .lines()
        .find(|line| {
            line.trim_start()
                .to_ascii_lowercase()
                .starts_with("content-disposition:")
        })
        .and_then(disposition_filename)?;

    let mut content = &part[content_start..];
    if let Some(stripped) = content.strip_suffix(b"\r\n") {
        content = stripped;
    } else if let Some(stripped) = content.strip_suffix(b"\n") {
        content = stripped;
    }

    if filename.is_empty() || content.is_empty() {
        return None;
    }
    Some(UploadedFile {
        filename,
        content: content.to_vec(),
    })
}

// Quoted values may contain `;`.
fn disposition_filename(line: &str) -> Option<String> {
    const KEY: &str = "filename=";
    let mut rest = line;
    while let Some(pos) = rest.find(KEY) {
        let starts_param = rest[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| c == ';' || c.is_whitespace());
        let value = &rest[pos + KEY.len()..];
        if starts_param {
            let filename = match value.strip_prefix('"') {
                Some(quoted) => quoted.split('"').next().unwrap_or_default(),
                None => value.split(';').next().unwrap_or_default().trim(),
            };
            return Some(filename.to_string());
        }
        rest = value;
    }
    None
}

/// Reduces a client-supplied name to a bare file name, or `None` when
/// nothing safe is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return None;
    }
    Some(base.to_string())
}

/// A file written to the server root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedUpload {
    pub filename: String,
    pub size: usize,
}

/// Writes each upload under `root`, replacing any file with the same name.
pub fn save_uploads(
    root: &Path,
    files: Vec<UploadedFile>,
    log_prefix: &str,
) -> Result<Vec<SavedUpload>, AppError> {
    let mut saved = Vec::with_capacity(files.len());
    for file in files {
        let Some(filename) = sanitize_filename(&file.filename) else {
            warn!("{} Rejected upload filename: '{}'", log_prefix, file.filename);
            continue;
        };
        let path = root.join(&filename);
        fs::write(&path, &file.content)?;
        info!(
            "{} Saved upload '{}' ({} bytes)",
            log_prefix,
            path.display(),
            file.content.len()
        );
        saved.push(SavedUpload {
            filename,
            size: file.content.len(),
        });
    }
    Ok(saved)
}
