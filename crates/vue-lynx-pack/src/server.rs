//! Variant server
//!
//! A minimal HTTP/1.1 server exposing every file of an output directory at
//! `/<file-name>`, for loading artifacts on a device. One request per
//! connection; the connection is closed after the response.

use std::fmt::Write as _;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use vue_lynx_bundle::decode;

/// Default port of `serve`
pub const DEFAULT_PORT: u16 = 3471;

/// Upper bound on a request head
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Time a client gets to send its request head
const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounds on discarding unread input before closing a rejected connection
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_DRAIN_BYTES: u64 = 1024 * 1024;

/// An HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Header fields in emission order
    pub headers: Vec<(String, String)>,
    /// Body bytes
    pub body: Vec<u8>,
}

impl Response {
    fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        let mut response = Self {
            status,
            headers: Vec::new(),
            body,
        };
        response.header("Content-Type", content_type);
        response.header("Access-Control-Allow-Origin", "*");
        response
    }

    fn text(status: u16, body: &str) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body.as_bytes().to_vec())
    }

    fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    fn header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_string(), value.into()));
    }

    /// First header named `name`, case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Serialize the head; `Content-Length` always reflects the body
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, status_text(self.status));
        for (name, value) in &self.headers {
            let _ = write!(head, "{}: {}\r\n", name, value);
        }
        let _ = write!(
            head,
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        );
        head.into_bytes()
    }
}

/// Answer a request for `target` from the files in `dir`
///
/// The query string is ignored. Only plain file names directly inside
/// `dir` are served; anything else is 404.
pub fn route(dir: &Path, method: &str, target: &str) -> Response {
    if method != "GET" && method != "HEAD" {
        let mut response = Response::text(405, "Method Not Allowed");
        response.header("Allow", "GET, HEAD");
        return response;
    }

    let path = target.split(['?', '#']).next().unwrap_or("");
    if path == "/" || path.is_empty() {
        return index(dir);
    }

    let name = match path.strip_prefix('/') {
        Some(name) if is_servable_name(name) => name,
        _ => return Response::not_found(),
    };
    let file = dir.join(name);
    if !file.is_file() {
        return Response::not_found();
    }
    match std::fs::read(&file) {
        Ok(bytes) => artifact_response(name, bytes),
        Err(err) => {
            tracing::warn!(path = %file.display(), error = %err, "failed to read artifact");
            Response::not_found()
        }
    }
}

fn is_servable_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name != ".."
}

fn artifact_response(name: &str, bytes: Vec<u8>) -> Response {
    let decoded = decode(&bytes).ok().map(|bundle| bundle.header);
    let content_type = if decoded.is_some() {
        "application/octet-stream"
    } else {
        content_type_for(name)
    };

    let mut response = Response::new(200, content_type, bytes);
    response.header("Cache-Control", "no-cache, no-store, must-revalidate");
    response.header(
        "Content-Disposition",
        format!("attachment; filename=\"{}\"", name),
    );
    if let Some(header) = decoded {
        response.header("X-Lynx-Bundle-Type", header.content_format.as_str());
        response.header("X-Lynx-Platform", header.platform.as_str());
    }
    response
}

fn content_type_for(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("js") => "application/javascript",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Servable file names in `dir`, sorted
pub fn list_artifacts(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_servable_name(name))
        .collect();
    names.sort();
    names
}

fn index(dir: &Path) -> Response {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Lynx bundles</title></head>\n<body>\n<h1>Lynx bundles</h1>\n<ul>\n",
    );
    for name in list_artifacts(dir) {
        let escaped = escape_html(&name);
        let _ = writeln!(html, "<li><a href=\"/{0}\">{0}</a></li>", escaped);
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    Response::new(200, "text/html; charset=utf-8", html.into_bytes())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        408 => "Request Timeout",
        405 => "Method Not Allowed",
        431 => "Request Header Fields Too Large",
        _ => "Unknown",
    }
}

/// Bind `0.0.0.0:port`
pub async fn bind(port: u16) -> io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
}

/// Serve `dir` on `listener` until the task is cancelled
///
/// Per-connection failures are logged and never stop the server.
pub async fn serve(listener: TcpListener, dir: PathBuf) -> io::Result<()> {
    let dir = Arc::new(dir);
    tracing::info!(addr = %listener.local_addr()?, dir = %dir.display(), "serving bundles");
    loop {
        let (stream, peer) = listener.accept().await?;
        let dir = Arc::clone(&dir);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, &dir).await {
                tracing::debug!(peer = %peer, error = %err, "connection failed");
            }
        });
    }
}

/// Bind `port` and serve `dir`
pub async fn serve_variants(port: u16, dir: PathBuf) -> io::Result<()> {
    let listener = bind(port).await?;
    serve(listener, dir).await
}

/// Outcome of reading a request head
enum Head {
    Request { method: String, target: String },
    Malformed,
    TooLarge,
    TimedOut,
}

async fn handle_connection(stream: TcpStream, dir: &Path) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read.take(MAX_HEAD_BYTES as u64 + 1));

    let head = match tokio::time::timeout(HEAD_TIMEOUT, read_head(&mut reader)).await {
        Ok(head) => head?,
        Err(_) => Head::TimedOut,
    };

    let (response, send_body, rejected) = match head {
        Head::Request { method, target } => {
            let dir = dir.to_path_buf();
            let (m, t) = (method.clone(), target.clone());
            let response = tokio::task::spawn_blocking(move || route(&dir, &m, &t))
                .await
                .map_err(io::Error::other)?;
            tracing::info!(method = %method, target = %target, status = response.status, "request");
            (response, method != "HEAD", false)
        }
        Head::Malformed => (Response::text(400, "Bad Request"), true, true),
        Head::TooLarge => (Response::text(431, "Request Header Fields Too Large"), true, true),
        Head::TimedOut => (Response::text(408, "Request Timeout"), true, true),
    };

    write.write_all(&response.head_bytes()).await?;
    if send_body {
        write.write_all(&response.body).await?;
    }
    write.shutdown().await?;

    if rejected {
        // Closing with unread input would reset the connection before the
        // client reads the response.
        drain(reader.into_inner().into_inner()).await;
    }
    Ok(())
}

/// Read the request line and header lines, at most `MAX_HEAD_BYTES`
async fn read_head<R>(reader: &mut R) -> io::Result<Head>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut request_line = String::new();
    let mut head_len = reader.read_line(&mut request_line).await?;
    if head_len > MAX_HEAD_BYTES {
        return Ok(Head::TooLarge);
    }
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        head_len += n;
        if head_len > MAX_HEAD_BYTES {
            return Ok(Head::TooLarge);
        }
        if n == 0 || line.trim().is_empty() {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    Ok(match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => Head::Request {
            method: method.to_string(),
            target: target.to_string(),
        },
        _ => Head::Malformed,
    })
}

async fn drain(mut read: OwnedReadHalf) {
    let mut limited = (&mut read).take(MAX_DRAIN_BYTES);
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, tokio::io::copy(&mut limited, &mut tokio::io::sink())).await;
}
