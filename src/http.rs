use crate::config::ServerConfig;
use crate::error::AppError;
use crate::events::EventSink;
use crate::fs::serve_file;
use crate::request::{read_request, Limits, Method, Request};
use crate::response::HttpResponse;
use crate::telemetry::TelemetrySource;
use crate::upload::{parse_multipart, save_uploads};
use log::{debug, error, info, warn};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a connection handler needs, shared by all handlers.
pub struct HandlerContext {
    /// Canonical server root.
    pub root: PathBuf,
    pub config: ServerConfig,
    pub sink: Arc<dyn EventSink>,
    pub telemetry: Option<Arc<dyn TelemetrySource>>,
}

/// Handles a single client connection. The stream is closed when this returns.
pub fn handle_client(mut stream: TcpStream, ctx: &HandlerContext, log_prefix: &str) {
    let timeout = Some(ctx.config.io_timeout);
    if let Err(e) = stream
        .set_read_timeout(timeout)
        .and_then(|_| stream.set_write_timeout(timeout))
    {
        warn!("{log_prefix} Failed to set socket timeouts: {e}");
    }

    handle_connection(&mut stream, ctx, log_prefix);
}

/// Reads one request, answers it, and reports the status sent, if any.
pub fn handle_connection<S: Read + Write>(
    stream: &mut S,
    ctx: &HandlerContext,
    log_prefix: &str,
) -> Option<u16> {
    let limits = Limits {
        max_header_bytes: ctx.config.max_header_bytes,
        max_body_bytes: ctx.config.max_body_bytes,
    };

    let request = match read_request(stream, limits) {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!("{log_prefix} Connection closed without a request");
            return None;
        }
        Err(AppError::Io(e)) => {
            warn!("{log_prefix} Failed to read request: {e}");
            ctx.sink.publish(format!("Error reading request: {e}"));
            return None;
        }
        Err(e) => {
            warn!("{log_prefix} Rejected request: {e}");
            return send(stream, HttpResponse::error(e.status_code()), ctx, log_prefix, None);
        }
    };

    debug!(
        "{} Request line: {} {} {}",
        log_prefix, request.method, request.path, request.version
    );

    let response = match route(&request, ctx, log_prefix) {
        Ok(response) => response,
        Err(e) => {
            let status = e.status_code();
            if status >= 500 {
                error!("{} {} {} failed: {}", log_prefix, request.method, request.path, e);
                ctx.sink
                    .publish(format!("Error serving {} {}: {}", request.method, request.path, e));
            } else {
                info!("{} {} {} -> {}", log_prefix, request.method, request.path, e);
            }
            HttpResponse::error(status)
        }
    };

    send(stream, response, ctx, log_prefix, Some(&request))
}

fn route(request: &Request, ctx: &HandlerContext, log_prefix: &str) -> Result<HttpResponse, AppError> {
    match request.method {
        Method::Get => {
            if let Some(source) = &ctx.telemetry {
                if request.path == ctx.config.telemetry_path {
                    return serve_telemetry(source.as_ref(), log_prefix);
                }
            }
            serve_file(
                &ctx.root,
                &request.path,
                &ctx.config.default_page,
                ctx.config.mime_fallback,
                log_prefix,
            )
        }
        Method::Post if request.path == ctx.config.upload_path => {
            handle_upload(request, ctx, log_prefix)
        }
        Method::Post => Err(AppError::NotFound),
    }
}

fn handle_upload(request: &Request, ctx: &HandlerContext, log_prefix: &str) -> Result<HttpResponse, AppError> {
    info!(
        "{} Upload started ({} body bytes)",
        log_prefix,
        request.body.len()
    );
    let files = parse_multipart(&request.body);
    let saved = save_uploads(&ctx.root, files, log_prefix)?;
    for upload in &saved {
        ctx.sink
            .publish(format!("Uploaded {} ({} bytes)", upload.filename, upload.size));
    }
    Ok(HttpResponse::new(200).with_text("File uploaded successfully"))
}

fn serve_telemetry(source: &dyn TelemetrySource, log_prefix: &str) -> Result<HttpResponse, AppError> {
    let snapshot = source.snapshot().ok_or_else(|| {
        AppError::InternalServerError("Error collecting telemetry data".to_string())
    })?;
    let body = serde_json::to_vec(&snapshot)?;
    debug!("{log_prefix} Telemetry snapshot: {} bytes", body.len());
    Ok(HttpResponse::new(200)
        .with_body(body, "application/json")
        .add_header("Access-Control-Allow-Origin", "*"))
}

fn send<S: Write>(
    stream: &mut S,
    response: HttpResponse,
    ctx: &HandlerContext,
    log_prefix: &str,
    request: Option<&Request>,
) -> Option<u16> {
    let status = response.status_code;
    if response.send(stream, log_prefix).is_err() {
        ctx.sink
            .publish(format!("Error writing response with status {status}"));
        return None;
    }
    match request {
        Some(request) => ctx.sink.publish(format!(
            "Request served: {} {} -> {}",
            request.method, request.path, status
        )),
        None => ctx.sink.publish(format!("Request rejected -> {status}")),
    }
    Some(status)
}
