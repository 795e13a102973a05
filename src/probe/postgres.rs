//! PostgreSQL liveness handshake.
//!
//! Speaks just enough of the startup protocol to prove the server is
//! accepting connections: an SSLRequest negotiation followed, on
//! plaintext connections, by a StartupMessage carrying the configured
//! user and database.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{connect, ProbeError};
use crate::models::Target;

const SSL_REQUEST_CODE: u32 = 80877103;
const PROTOCOL_VERSION: u32 = 196608; // 3.0

/// Largest error-response body we bother reading.
const MAX_ERROR_BODY: usize = 4096;

pub(super) async fn check(target: &Target) -> Result<(), ProbeError> {
    let mut stream = connect(target).await?;

    stream
        .write_all(&build_ssl_request())
        .await
        .map_err(wire_err)?;

    let mut answer = [0u8; 1];
    stream.read_exact(&mut answer).await.map_err(wire_err)?;

    match answer[0] {
        // Willing to negotiate TLS: the server parsed and answered our
        // request, which is all a liveness probe needs.
        b'S' => Ok(()),
        b'N' if target.tls_required => Err(ProbeError::Protocol(
            "server refused TLS but the target requires it".to_string(),
        )),
        b'N' => startup_exchange(&mut stream, target).await,
        other => Err(ProbeError::Protocol(format!(
            "unexpected SSLRequest answer: 0x{:02x}",
            other
        ))),
    }
}

async fn startup_exchange(stream: &mut TcpStream, target: &Target) -> Result<(), ProbeError> {
    stream
        .write_all(&build_startup_message(&target.user, &target.database))
        .await
        .map_err(wire_err)?;

    let mut header = [0u8; 5];
    stream.read_exact(&mut header).await.map_err(wire_err)?;
    let body_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

    match header[0] {
        // Any AuthenticationRequest means the server is alive and
        // talking to us; completing authentication is out of scope.
        b'R' => Ok(()),
        b'E' => {
            if body_len < 4 {
                return Err(ProbeError::Protocol("truncated error response".to_string()));
            }
            let mut body = vec![0u8; (body_len - 4).min(MAX_ERROR_BODY)];
            stream.read_exact(&mut body).await.map_err(wire_err)?;
            Err(ProbeError::Server(parse_error_fields(&body)))
        }
        other => Err(ProbeError::Protocol(format!(
            "unexpected startup response type: 0x{:02x}",
            other
        ))),
    }
}

fn wire_err(e: std::io::Error) -> ProbeError {
    ProbeError::Protocol(e.to_string())
}

fn build_ssl_request() -> [u8; 8] {
    let mut packet = [0u8; 8];
    packet[..4].copy_from_slice(&8u32.to_be_bytes());
    packet[4..].copy_from_slice(&SSL_REQUEST_CODE.to_be_bytes());
    packet
}

/// Build a StartupMessage for the given user and database.
///
/// An empty user falls back to "postgres" so the server always gets a
/// syntactically valid startup packet.
fn build_startup_message(user: &str, database: &str) -> Vec<u8> {
    let user = if user.is_empty() { "postgres" } else { user };

    let mut params = Vec::with_capacity(64);
    params.extend_from_slice(b"user\0");
    params.extend_from_slice(user.as_bytes());
    params.push(0);
    if !database.is_empty() {
        params.extend_from_slice(b"database\0");
        params.extend_from_slice(database.as_bytes());
        params.push(0);
    }
    params.push(0); // parameter list terminator

    let len = (8 + params.len()) as u32;
    let mut packet = Vec::with_capacity(len as usize);
    packet.extend_from_slice(&len.to_be_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.extend_from_slice(&params);
    packet
}

/// Pull the human-readable message ('M' field) out of an ErrorResponse
/// body.
fn parse_error_fields(body: &[u8]) -> String {
    let mut i = 0;
    while i < body.len() && body[i] != 0 {
        let tag = body[i];
        let rest = &body[i + 1..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        if tag == b'M' {
            return String::from_utf8_lossy(&rest[..end]).into_owned();
        }
        i += 1 + end + 1;
    }
    "server returned an error response".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_request_layout() {
        let packet = build_ssl_request();
        assert_eq!(&packet[..4], &8u32.to_be_bytes());
        assert_eq!(&packet[4..], &SSL_REQUEST_CODE.to_be_bytes());
    }

    #[test]
    fn test_startup_message_layout() {
        let packet = build_startup_message("monitor", "appdb");
        let len = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]);
        assert_eq!(len as usize, packet.len());
        assert_eq!(
            u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]),
            PROTOCOL_VERSION
        );
        let body = &packet[8..];
        assert!(body.windows(8).any(|w| w == b"monitor\0"));
        assert!(body.windows(6).any(|w| w == b"appdb\0"));
        // Double terminator at the end of the parameter list.
        assert_eq!(&packet[packet.len() - 2..], &[0, 0]);
    }

    #[test]
    fn test_startup_message_defaults_user() {
        let packet = build_startup_message("", "");
        assert!(packet.windows(9).any(|w| w == b"postgres\0"));
    }

    #[test]
    fn test_parse_error_fields() {
        let mut body = Vec::new();
        body.extend_from_slice(b"SFATAL\0");
        body.extend_from_slice(b"C28000\0");
        body.extend_from_slice(b"Mpassword authentication failed\0");
        body.push(0);
        assert_eq!(parse_error_fields(&body), "password authentication failed");
    }

    #[test]
    fn test_parse_error_fields_missing_message() {
        let body = b"SFATAL\0\0".to_vec();
        assert_eq!(parse_error_fields(&body), "server returned an error response");
    }
}
