//! Packet framing - RSP envelopes.
//!
//! A packet on the wire is `$<payload>#XX` where `XX` is the sum of the
//! payload bytes mod 256 as two lowercase hex digits. Replies arrive in
//! arbitrary read-sized chunks, so unwrapping operates on an accumulator
//! that the caller keeps feeding: "incomplete" is a normal outcome, a
//! checksum mismatch is not.

use super::{Blob, WireError};

pub const PACKET_START: u8 = b'$';
pub const CHECKSUM_DELIM: u8 = b'#';

/// Outcome of scanning the accumulator for one envelope.
#[derive(Debug, PartialEq, Eq)]
pub enum Unwrapped {
    /// A complete, checksum-valid envelope was removed; here is its payload.
    Payload(Blob),
    /// No full envelope yet; keep the accumulator and read more.
    Incomplete,
}

/// Sum of payload bytes mod 256.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Wrap a payload for the wire: start marker, payload, delimiter, checksum.
pub fn add_envelope(payload: &Blob) -> Blob {
    let mut wire = Blob::new();
    wire.append(&[PACKET_START]);
    wire.append(payload.as_slice());
    wire.append(&[CHECKSUM_DELIM]);
    wire.append(format!("{:02x}", checksum(payload.as_slice())).as_bytes());
    wire
}

/// Scan `accumulator` for a complete envelope.
///
/// Bytes preceding the start marker (stray acks, remnants of a timed-out
/// reply) are discarded. On success the whole envelope is consumed and any
/// trailing bytes stay in the accumulator for the next scan. A checksum
/// mismatch consumes the bad envelope and returns an error.
pub fn remove_envelope(accumulator: &mut Blob) -> Result<Unwrapped, WireError> {
    let start = match accumulator
        .as_slice()
        .iter()
        .position(|&b| b == PACKET_START)
    {
        Some(pos) => pos,
        None => {
            accumulator.clear();
            return Ok(Unwrapped::Incomplete);
        }
    };
    if start > 0 {
        log::trace!("discarding {start} bytes before packet start");
        accumulator.pop_front(start);
    }

    let delim = match accumulator
        .as_slice()
        .iter()
        .position(|&b| b == CHECKSUM_DELIM)
    {
        Some(pos) => pos,
        None => return Ok(Unwrapped::Incomplete),
    };
    if accumulator.len() < delim + 3 {
        return Ok(Unwrapped::Incomplete);
    }

    let envelope = accumulator.pop_front(delim + 3);
    let payload = envelope.peek(1, delim - 1);
    let received = hex::decode(&envelope.as_slice()[delim + 1..delim + 3])?[0];
    let computed = checksum(payload.as_slice());
    if received != computed {
        return Err(WireError::ChecksumMismatch { computed, received });
    }
    Ok(Unwrapped::Payload(payload))
}
