//! rsplink - Remote Serial Protocol debugging client.
//!
//! Talks to a remote debug stub over a blocking byte-stream connection:
//! - checksummed RSP packet framing over a growable byte buffer
//! - register and memory access via hex-encoded payloads
//! - software breakpoints by byte-patching a trap opcode
//! - thread enumeration and selection
//! - translation between the sandboxed flat address space and logical
//!   instruction-pointer addresses
//!
//! The stub side of the protocol, symbol resolution and process supervision
//! are all out of scope; addresses flow in from an external resolver and the
//! stub owns the target process.

pub mod client;
pub mod config;
pub mod registers;
pub mod rsp;
pub mod transport;

pub use client::{ClientError, RspClient};
pub use config::SessionConfig;
pub use registers::Arch;
pub use rsp::Blob;
