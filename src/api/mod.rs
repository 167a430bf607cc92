use crate::assess::{Assessment, ThreatAssessor};
use crate::transport::parse_model_payload;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

// Model payloads can carry many detections per image.
const MAX_REQUEST_BYTES: usize = 1 << 20;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8787".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    assessor: Arc<ThreatAssessor>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, assessor: Arc<ThreatAssessor>) -> Self {
        Self { cfg, assessor }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "api configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let assessor = self.assessor.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, assessor, shutdown_thread) {
                log::error!("assessment api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    assessor: Arc<ThreatAssessor>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, &assessor) {
                    log::warn!("assessment api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ThresholdUpdate {
    confidence_threshold: f64,
}

fn handle_connection(mut stream: TcpStream, assessor: &ThreatAssessor) -> Result<()> {
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, r#"{"error":"forbidden"}"#)?;
        return Ok(());
    }

    let request = read_request(&mut stream)?;
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => {
            let body = serde_json::to_vec(&serde_json::json!({
                "status": "ok",
                "confidence_threshold": assessor.confidence_threshold(),
                "classes": assessor.table().classes(),
            }))?;
            write_response(&mut stream, 200, "application/json", &body)?;
        }
        ("GET", "/threshold") => {
            let body = serde_json::to_vec(&serde_json::json!({
                "confidence_threshold": assessor.confidence_threshold(),
            }))?;
            write_response(&mut stream, 200, "application/json", &body)?;
        }
        ("PUT", "/threshold") => match serde_json::from_slice::<ThresholdUpdate>(&request.body) {
            Ok(update) => match assessor.set_confidence_threshold(update.confidence_threshold) {
                Ok(()) => {
                    let body = serde_json::to_vec(&serde_json::json!({
                        "confidence_threshold": assessor.confidence_threshold(),
                    }))?;
                    write_response(&mut stream, 200, "application/json", &body)?;
                }
                Err(err) => {
                    let body =
                        serde_json::to_vec(&serde_json::json!({ "error": err.to_string() }))?;
                    write_response(&mut stream, 400, "application/json", &body)?;
                }
            },
            Err(err) => {
                let body = serde_json::to_vec(
                    &serde_json::json!({ "error": format!("invalid body: {}", err) }),
                )?;
                write_response(&mut stream, 400, "application/json", &body)?;
            }
        },
        ("POST", "/assess") => match parse_model_payload(&request.body) {
            Ok(batch) => {
                let assessment = assessor.assess(
                    &batch.detections,
                    batch.image_width,
                    batch.image_height,
                    batch.confidence_threshold,
                );
                let body = serde_json::to_vec(&assessment)?;
                write_response(&mut stream, 200, "application/json", &body)?;
            }
            Err(err) => {
                let failure = Assessment::failure(format!("unusable payload: {}", err));
                let body = serde_json::to_vec(&failure)?;
                write_response(&mut stream, 400, "application/json", &body)?;
            }
        },
        ("GET", _) | ("POST", _) | ("PUT", _) => {
            write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#)?;
        }
        _ => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)?;
        }
    }
    Ok(())
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break data.windows(4).position(|w| w == b"\r\n\r\n");
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break Some(pos);
        }
    };
    let header_end = header_end.ok_or_else(|| anyhow!("malformed request"))?;

    let header_text = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| anyhow!("missing method"))?
        .to_string();
    let raw_path = parts
        .next()
        .ok_or_else(|| anyhow!("missing path"))?
        .to_string();

    let mut content_length = 0usize;
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            if k.trim().eq_ignore_ascii_case("content-length") {
                content_length = v
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid content-length"))?;
            }
        }
    }
    if content_length > MAX_REQUEST_BYTES {
        return Err(anyhow!("request body too large"));
    }

    let body_start = (header_end + 4).min(data.len());
    let mut body = data[body_start..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
        if body.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
    }
    body.truncate(content_length);

    let path = raw_path
        .split('?')
        .next()
        .unwrap_or(&raw_path)
        .to_string();
    Ok(HttpRequest { method, path, body })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}
