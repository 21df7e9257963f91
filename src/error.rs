use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Json(serde_json::Error),
    AddrParse(std::net::AddrParseError),
    BadRequest(String),
    Forbidden,
    NotFound,
    PayloadTooLarge,
    UnknownMimeType(String),
    NotImplemented(String),
    DirectoryNotFound(String),
    InvalidState(String),
    InternalServerError(String),
}

impl AppError {
    /// HTTP status used when this error ends a request.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Forbidden => 403,
            AppError::NotFound | AppError::DirectoryNotFound(_) => 404,
            AppError::PayloadTooLarge => 413,
            AppError::NotImplemented(_) => 501,
            AppError::Io(_)
            | AppError::Json(_)
            | AppError::AddrParse(_)
            | AppError::UnknownMimeType(_)
            | AppError::InvalidState(_)
            | AppError::InternalServerError(_) => 500,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "IO error: {err}"),
            AppError::Json(err) => write!(f, "JSON error: {err}"),
            AppError::AddrParse(err) => write!(f, "Address parse error: {err}"),
            AppError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            AppError::Forbidden => write!(f, "Forbidden"),
            AppError::NotFound => write!(f, "Not Found"),
            AppError::PayloadTooLarge => write!(f, "Payload too large"),
            AppError::UnknownMimeType(path) => write!(f, "Unsupported file type: {path}"),
            AppError::NotImplemented(method) => write!(f, "Method not implemented: {method}"),
            AppError::DirectoryNotFound(path) => write!(f, "Directory not found: {path}"),
            AppError::InvalidState(msg) => write!(f, "Invalid server state: {msg}"),
            AppError::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err)
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(err: std::net::AddrParseError) -> Self {
        AppError::AddrParse(err)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::AddrParse(err) => Some(err),
            _ => None,
        }
    }
}
