//! RSP wire layer - byte buffers and packet framing.
//!
//! Everything the client exchanges with a debug stub goes through this
//! module: payloads are built as [`Blob`]s, wrapped into checksummed
//! envelopes by [`packet`], and unwrapped back out of the receive
//! accumulator.

pub mod blob;
pub mod packet;

pub use blob::Blob;
pub use packet::{add_envelope, remove_envelope, Unwrapped};

use thiserror::Error;

/// Wire-level data errors
#[derive(Error, Debug)]
pub enum WireError {
    #[error("malformed hex payload: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("no integer token at buffer front")]
    MissingInteger,

    #[error("integer token does not fit in 64 bits")]
    IntegerOverflow,

    #[error("packet checksum mismatch: computed {computed:02x}, received {received:02x}")]
    ChecksumMismatch { computed: u8, received: u8 },
}
