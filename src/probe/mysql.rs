//! MySQL/MariaDB liveness handshake.
//!
//! The server speaks first: reading its initial handshake packet is
//! enough to prove liveness. An error packet in its place (too many
//! connections, host blocked) carries the failure message.

use tokio::io::AsyncReadExt;

use super::{connect, ProbeError};
use crate::models::Target;

const PROTOCOL_V10: u8 = 10;
const ERR_PACKET: u8 = 0xFF;

/// Largest handshake payload we bother reading.
const MAX_PAYLOAD: usize = 4096;

pub(super) async fn check(target: &Target) -> Result<(), ProbeError> {
    let mut stream = connect(target).await?;

    // Packet header: 3-byte little-endian length plus a sequence id.
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.map_err(wire_err)?;
    let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    if len == 0 {
        return Err(ProbeError::Protocol("empty handshake packet".to_string()));
    }

    let mut payload = vec![0u8; len.min(MAX_PAYLOAD)];
    stream.read_exact(&mut payload).await.map_err(wire_err)?;

    match payload[0] {
        ERR_PACKET => Err(ProbeError::Server(parse_error_packet(&payload))),
        PROTOCOL_V10 => {
            if let Some(version) = read_cstring(&payload[1..]) {
                tracing::debug!("{} answered: server version {}", target.name, version);
            }
            Ok(())
        }
        // Pre-4.1 servers greet with protocol 9; any greeting counts.
        _ => Ok(()),
    }
}

fn wire_err(e: std::io::Error) -> ProbeError {
    ProbeError::Protocol(e.to_string())
}

/// Decode an ERR packet: 0xFF, 2-byte code, optional '#' + SQL state,
/// then the message.
fn parse_error_packet(payload: &[u8]) -> String {
    if payload.len() < 3 {
        return "server sent a truncated error packet".to_string();
    }
    let code = u16::from_le_bytes([payload[1], payload[2]]);
    let mut rest = &payload[3..];
    if rest.first() == Some(&b'#') && rest.len() >= 6 {
        rest = &rest[6..];
    }
    let message = String::from_utf8_lossy(rest);
    format!("error {}: {}", code, message.trim())
}

fn read_cstring(bytes: &[u8]) -> Option<String> {
    let end = bytes.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
}
