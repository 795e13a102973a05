//! SQL Server liveness handshake.
//!
//! Sends a minimal TDS PRELOGIN packet and validates the server's
//! reply. The reply's ENCRYPTION option is checked against the
//! target's TLS requirement.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{connect, ProbeError};
use crate::models::Target;

const PACKET_PRELOGIN: u8 = 0x12;
const PACKET_REPLY: u8 = 0x04;
const STATUS_EOM: u8 = 0x01;

const OPT_VERSION: u8 = 0x00;
const OPT_ENCRYPTION: u8 = 0x01;
const OPT_TERMINATOR: u8 = 0xFF;

const ENCRYPT_NOT_SUP: u8 = 0x02;

/// Largest PRELOGIN reply payload we bother reading.
const MAX_PAYLOAD: usize = 4096;

pub(super) async fn check(target: &Target) -> Result<(), ProbeError> {
    let mut stream = connect(target).await?;

    stream
        .write_all(&build_prelogin())
        .await
        .map_err(wire_err)?;

    let mut header = [0u8; 8];
    stream.read_exact(&mut header).await.map_err(wire_err)?;
    if header[0] != PACKET_REPLY {
        return Err(ProbeError::Protocol(format!(
            "unexpected TDS packet type: 0x{:02x}",
            header[0]
        )));
    }

    let total_len = u16::from_be_bytes([header[2], header[3]]) as usize;
    if total_len < 8 {
        return Err(ProbeError::Protocol("truncated PRELOGIN reply".to_string()));
    }

    let mut payload = vec![0u8; (total_len - 8).min(MAX_PAYLOAD)];
    stream.read_exact(&mut payload).await.map_err(wire_err)?;

    if target.tls_required && parse_option(&payload, OPT_ENCRYPTION) == Some(ENCRYPT_NOT_SUP) {
        return Err(ProbeError::Protocol(
            "server does not support encryption but the target requires it".to_string(),
        ));
    }

    Ok(())
}

fn wire_err(e: std::io::Error) -> ProbeError {
    ProbeError::Protocol(e.to_string())
}

/// Build a PRELOGIN packet advertising VERSION and ENCRYPTION.
fn build_prelogin() -> Vec<u8> {
    const VERSION: [u8; 6] = [9, 0, 0, 0, 0, 0];

    // Two 5-byte option entries plus the terminator.
    let table_len = 2 * 5 + 1;
    let payload_len = table_len + VERSION.len() + 1;
    let total_len = (8 + payload_len) as u16;

    let mut packet = Vec::with_capacity(total_len as usize);
    packet.push(PACKET_PRELOGIN);
    packet.push(STATUS_EOM);
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&[0, 0]); // spid
    packet.push(1); // packet id
    packet.push(0); // window

    packet.push(OPT_VERSION);
    packet.extend_from_slice(&(table_len as u16).to_be_bytes());
    packet.extend_from_slice(&(VERSION.len() as u16).to_be_bytes());

    packet.push(OPT_ENCRYPTION);
    packet.extend_from_slice(&((table_len + VERSION.len()) as u16).to_be_bytes());
    packet.extend_from_slice(&1u16.to_be_bytes());

    packet.push(OPT_TERMINATOR);
    packet.extend_from_slice(&VERSION);
    packet.push(ENCRYPT_NOT_SUP);
    packet
}

/// Walk a PRELOGIN option table and return the first byte of the given
/// option's data, if present.
fn parse_option(payload: &[u8], token: u8) -> Option<u8> {
    let mut i = 0;
    while i + 5 <= payload.len() && payload[i] != OPT_TERMINATOR {
        let entry_token = payload[i];
        let offset = u16::from_be_bytes([payload[i + 1], payload[i + 2]]) as usize;
        let length = u16::from_be_bytes([payload[i + 3], payload[i + 4]]) as usize;
        if entry_token == token && length >= 1 && offset < payload.len() {
            return Some(payload[offset]);
        }
        i += 5;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelogin_layout() {
        let packet = build_prelogin();
        assert_eq!(packet[0], PACKET_PRELOGIN);
        assert_eq!(packet[1], STATUS_EOM);
        let total_len = u16::from_be_bytes([packet[2], packet[3]]) as usize;
        assert_eq!(total_len, packet.len());
        // Option table starts right after the 8-byte header.
        assert_eq!(packet[8], OPT_VERSION);
    }

    #[test]
    fn test_parse_option_roundtrip() {
        // The request payload uses the same table layout as the reply.
        let packet = build_prelogin();
        let payload = &packet[8..];
        assert_eq!(parse_option(payload, OPT_ENCRYPTION), Some(ENCRYPT_NOT_SUP));
        assert_eq!(parse_option(payload, OPT_VERSION), Some(9));
        assert_eq!(parse_option(payload, 0x42), None);
    }

    #[test]
    fn test_parse_option_empty_payload() {
        assert_eq!(parse_option(&[], OPT_ENCRYPTION), None);
        assert_eq!(parse_option(&[OPT_TERMINATOR], OPT_ENCRYPTION), None);
    }
}
