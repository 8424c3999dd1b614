//! # AX.25-over-KISS Decoder
//!
//! Turns a candidate KISS frame into a [`DecodedFrame`].

use super::protocol::*;
use crate::error::{DashboardError, Result};

/// Decode a candidate frame
///
/// # Arguments
///
/// * `candidate` - Bytes between two delimiters, starting with the KISS type byte
/// * `station_callsign` - Own callsign, substring-matched against the source
///
/// # Returns
///
/// * `Result<DecodedFrame>` - Decoded frame, or error if rejected
///
/// # Errors
///
/// Returns `FrameMalformed` if:
/// - Frame is empty
/// - Type byte is not a data frame (0x00)
/// - Frame is not longer than type byte + 16-byte header + 2-byte trailer
///
/// Returns `DecodeFailed` if the header slices cannot be taken. Never panics.
pub fn decode_frame(candidate: &CandidateFrame, station_callsign: &str) -> Result<DecodedFrame> {
    let bytes = candidate.as_bytes();

    let Some(&frame_type) = bytes.first() else {
        return Err(DashboardError::FrameMalformed("Empty frame".to_string()));
    };

    if frame_type != KISS_DATA_FRAME {
        return Err(DashboardError::FrameMalformed(format!(
            "Not a data frame: type 0x{:02X}",
            frame_type
        )));
    }

    if bytes.len() <= KISS_FRAME_OVERHEAD {
        return Err(DashboardError::FrameMalformed(format!(
            "Frame too short: {} bytes, need more than {}",
            bytes.len(),
            KISS_FRAME_OVERHEAD
        )));
    }

    // Type byte and trailer are dropped; the trailer is never verified
    let ax25 = &bytes[1..bytes.len() - AX25_TRAILER_LEN];

    let destination = decode_callsign(ax25, AX25_DEST_RANGE)?;
    let source = decode_callsign(ax25, AX25_SRC_RANGE)?;

    let info = ax25
        .get(AX25_HEADER_LEN..)
        .ok_or_else(|| DashboardError::DecodeFailed("Missing info field".to_string()))?;
    let payload = String::from_utf8_lossy(info).trim().to_string();

    Ok(DecodedFrame::new(source, destination, payload, station_callsign))
}

/// Decode a shifted AX.25 address field into text
///
/// Each byte carries one ASCII character shifted left by one bit; trailing
/// padding (spaces or NUL) is trimmed.
fn decode_callsign(header: &[u8], range: std::ops::Range<usize>) -> Result<String> {
    let field = header.get(range.clone()).ok_or_else(|| {
        DashboardError::DecodeFailed(format!(
            "Header too short for address bytes {}..{}",
            range.start, range.end
        ))
    })?;

    let callsign: String = field.iter().map(|&b| char::from(b >> 1)).collect();
    Ok(callsign.trim_end_matches(|c: char| c == ' ' || c == '\0').to_string())
}

/// Encode a callsign as a shifted, space-padded 6-byte AX.25 address field
///
/// Counterpart of the decoder, used to build frames for tests and tooling.
pub fn encode_callsign(callsign: &str) -> [u8; 6] {
    let mut field = [b' ' << 1; 6];
    for (slot, byte) in field.iter_mut().zip(callsign.bytes()) {
        *slot = byte << 1;
    }
    field
}

/// Build a complete KISS data frame body (without delimiters)
///
/// SSID bytes carry SSID 0, control is UI (0x03), PID is "no layer 3" (0xF0)
/// and the trailer is zeroed.
pub fn encode_frame(source: &str, destination: &str, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(KISS_FRAME_OVERHEAD + payload.len());
    frame.push(KISS_DATA_FRAME);
    frame.extend_from_slice(&encode_callsign(destination));
    frame.push(0x60);
    frame.extend_from_slice(&encode_callsign(source));
    frame.push(0x61);
    frame.push(0x03);
    frame.push(0xF0);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&[0x00; AX25_TRAILER_LEN]);
    frame
}
