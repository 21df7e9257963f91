use crate::error::AppError;
use chrono::{DateTime, Utc};
use log::{debug, error};
use std::io::prelude::*;

/// Reason phrase written on the status line.
pub fn reason_phrase(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Server Busy",
        _ => "Unknown",
    }
}

/// RFC 1123 date in GMT, as used by the `Date` header.
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// One HTTP/1.0 response, written in full before the connection closes.
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Bare error response: status line, `Date`, blank line.
    pub fn error(status_code: u16) -> Self {
        Self::new(status_code)
    }

    pub fn with_body(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self.body = Some(body);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.with_body(text.as_bytes().to_vec(), "text/plain")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_at(Utc::now())
    }

    fn to_bytes_at(&self, now: DateTime<Utc>) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.0 {} {}\r\nDate: {}\r\n",
            self.status_code,
            reason_phrase(self.status_code),
            format_http_date(now)
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        if let Some(body) = &self.body {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        if let Some(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        bytes
    }

    pub fn send<W: Write>(&self, stream: &mut W, log_prefix: &str) -> Result<(), AppError> {
        debug!(
            "{} Sending response - Status: {}, Body Length: {}",
            log_prefix,
            self.status_code,
            self.body.as_ref().map_or(0, Vec::len)
        );

        stream.write_all(&self.to_bytes()).map_err(|e| {
            error!("{log_prefix} Failed to write response: {e}");
            AppError::Io(e)
        })?;

        stream.flush().map_err(|e| {
            error!("{log_prefix} Failed to flush response: {e}");
            AppError::Io(e)
        })?;

        Ok(())
    }
}
