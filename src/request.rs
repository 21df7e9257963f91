//! Request parsing for the restricted HTTP/1.0 subset the server speaks.

use crate::error::AppError;
use crate::utils::{percent_decode, strip_query};
use std::fmt;
use std::io::Read;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

impl Method {
    fn parse(token: &str) -> Result<Self, AppError> {
        if token.eq_ignore_ascii_case("GET") {
            Ok(Method::Get)
        } else if token.eq_ignore_ascii_case("POST") {
            Ok(Method::Post)
        } else {
            Err(AppError::NotImplemented(token.to_string()))
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Decoded path without query string, always starting with `/`.
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Size bounds applied while reading a request.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

/// Reads one request from `stream`.
///
/// Returns `Ok(None)` when the peer closed the connection without sending
/// anything. The head is read up to the blank line; a POST body is read up to
/// `Content-Length`, or to end of stream when no length was given.
pub fn read_request<R: Read>(stream: &mut R, limits: Limits) -> Result<Option<Request>, AppError> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&buffer, HEAD_TERMINATOR) {
            break pos;
        }
        if buffer.len() > limits.max_header_bytes {
            return Err(AppError::BadRequest("request head too large".to_string()));
        }
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            // Peer half-closed after a bare request line.
            break buffer.len();
        }
        buffer.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).into_owned();
    let leftover = buffer
        .get(head_end + HEAD_TERMINATOR.len()..)
        .unwrap_or_default()
        .to_vec();

    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let (method, path, version) = parse_request_line(request_line)?;

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    let mut request = Request {
        method,
        path,
        version,
        headers,
        body: Vec::new(),
    };

    if request.method == Method::Post {
        request.body = read_body(stream, &request, leftover, limits)?;
    }

    Ok(Some(request))
}

/// Splits `METHOD SP PATH [SP VERSION]`.
pub fn parse_request_line(line: &str) -> Result<(Method, String, String), AppError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(AppError::BadRequest(format!("malformed request line: {line:?}")));
    }

    let method = Method::parse(tokens[0])?;
    let mut path = percent_decode(strip_query(tokens[1]));
    if path.contains('\0') {
        return Err(AppError::BadRequest("NUL byte in request path".to_string()));
    }
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    let version = tokens.get(2).copied().unwrap_or("HTTP/1.0").to_string();

    Ok((method, path, version))
}

fn read_body<R: Read>(
    stream: &mut R,
    request: &Request,
    mut body: Vec<u8>,
    limits: Limits,
) -> Result<Vec<u8>, AppError> {
    match request.header("Content-Length") {
        Some(value) => {
            let expected: usize = value
                .parse()
                .map_err(|_| AppError::BadRequest(format!("invalid Content-Length: {value}")))?;
            if expected > limits.max_body_bytes {
                return Err(AppError::PayloadTooLarge);
            }
            if body.len() < expected {
                let mut rest = vec![0u8; expected - body.len()];
                stream.read_exact(&mut rest)?;
                body.extend_from_slice(&rest);
            }
            body.truncate(expected);
        }
        None => {
            let budget = (limits.max_body_bytes + 1).saturating_sub(body.len()) as u64;
            stream.by_ref().take(budget).read_to_end(&mut body)?;
            if body.len() > limits.max_body_bytes {
                return Err(AppError::PayloadTooLarge);
            }
        }
    }
    Ok(body)
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
