//! HTTP server exposing the reconciliation API.
//!
//! Minimal HTTP/1.1 over a blocking TcpListener: one request per
//! connection, `Connection: close`. Each request opens its own database
//! connection; the identify transaction serializes concurrent writers.

use anyhow::{anyhow, Result};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::types::{ErrorResponse, HealthResponse};
use crate::db::Database;
use crate::models::IdentifyRequest;

/// HTTP server for identity reconciliation.
pub struct IdentifyServer {
    port: u16,
    db_path: PathBuf,
    start_time: Instant,
}

impl IdentifyServer {
    /// Create a new server bound to the default database location.
    pub fn new(port: u16, db: &Database) -> Result<Self> {
        // Request handlers open their own connections at this path.
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not find config directory"))?;
        let db_path = config_dir.join("idlink").join("contacts.db");

        // Verify the store is reachable before accepting traffic.
        let _ = db.contact_stats()?;

        Ok(Self {
            port,
            db_path,
            start_time: Instant::now(),
        })
    }

    /// Start the server (blocking).
    pub fn start(&self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))?;
        listener.set_nonblocking(true)?;

        println!("Identify API listening on 0.0.0.0:{}", self.port);

        while !shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _peer_addr)) => {
                    if let Err(e) = self.handle_connection(stream) {
                        eprintln!("Request error: {}", e);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
                Err(e) => {
                    eprintln!("Accept error: {}", e);
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        stream.set_read_timeout(Some(std::time::Duration::from_secs(30)))?;
        stream.set_write_timeout(Some(std::time::Duration::from_secs(30)))?;

        let mut reader = BufReader::new(stream.try_clone()?);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        let parts: Vec<&str> = request_line.trim().split_whitespace().collect();
        if parts.len() < 2 {
            return self.send_response(&mut stream, 400, "Bad Request");
        }

        let method = parts[0];
        let path = parts[1];

        // Parse headers; only Content-Length matters here.
        let mut content_length = 0usize;
        loop {
            let mut header_line = String::new();
            reader.read_line(&mut header_line)?;
            let header_line = header_line.trim();
            if header_line.is_empty() {
                break;
            }
            if let Some((key, value)) = header_line.split_once(':') {
                if key.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }

        // Read body
        let mut body = vec![0u8; content_length];
        if content_length > 0 {
            std::io::Read::read_exact(&mut reader, &mut body)?;
        }

        // Route request
        match (method, path) {
            ("POST", "/identify") => self.handle_identify(&mut stream, &body),
            ("GET", "/health") => self.handle_health(&mut stream),
            ("GET", "/ping") => self.send_response(&mut stream, 200, "pong"),
            _ => self.send_response(&mut stream, 404, "Not Found"),
        }
    }

    /// Reconcile one identity fragment.
    fn handle_identify(&self, stream: &mut TcpStream, body: &[u8]) -> Result<()> {
        let mut request: IdentifyRequest = match serde_json::from_slice(body) {
            Ok(r) => r,
            Err(e) => {
                let response =
                    ErrorResponse::with_details("Invalid request body", e.to_string());
                return self.send_json_response(stream, 400, &response);
            }
        };

        if let Err(e) = request.normalize_and_validate() {
            let response = ErrorResponse::new(e.to_string());
            return self.send_json_response(stream, 400, &response);
        }

        let db = Database::open_at(self.db_path.clone())?;
        match db.identify(&request) {
            Ok(view) => self.send_json_response(stream, 200, &view),
            Err(e) => {
                // Store and consistency failures stay server-side.
                eprintln!("identify failed: {}", e);
                let response = ErrorResponse::new("Internal server error");
                self.send_json_response(stream, 500, &response)
            }
        }
    }

    /// Health check endpoint.
    fn handle_health(&self, stream: &mut TcpStream) -> Result<()> {
        let db = Database::open_at(self.db_path.clone())?;
        let contact_count = db.contact_stats().map(|s| s.total).unwrap_or(0);

        let health = HealthResponse {
            status: "ok".to_string(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            contact_count,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        self.send_json_response(stream, 200, &health)
    }

    fn send_response(&self, stream: &mut TcpStream, status: u16, message: &str) -> Result<()> {
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status, status_text(status), message.len(), message
        );

        stream.write_all(response.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    fn send_json_response<T: serde::Serialize>(
        &self,
        stream: &mut TcpStream,
        status: u16,
        body: &T,
    ) -> Result<()> {
        let json_body = serde_json::to_string(body)?;

        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status, status_text(status), json_body.len(), json_body
        );

        stream.write_all(response.as_bytes())?;
        stream.flush()?;
        Ok(())
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(200), "OK");
        assert_eq!(status_text(400), "Bad Request");
        assert_eq!(status_text(404), "Not Found");
        assert_eq!(status_text(500), "Internal Server Error");
        assert_eq!(status_text(418), "Unknown");
    }
}
