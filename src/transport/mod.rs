//! Transport - blocking byte-stream connection to the debug stub.
//!
//! The client never assumes a single read yields a full packet; it polls
//! [`Transport::read_available`] with a deadline and accumulates. The trait
//! seam lets tests substitute a scripted peer for a real socket.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

/// Connection-level errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to resolve {host}:{port}")]
    Resolve { host: String, port: u16 },

    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("connection i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A blocking byte-stream connection.
pub trait Transport {
    /// Whether the connection is still considered live.
    fn is_connected(&self) -> bool;

    /// Read whatever bytes are available within `timeout`, returning the
    /// number placed into `buf`. Zero means the timeout expired with
    /// nothing to read; it is not end-of-stream.
    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Write the whole buffer or fail.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// TCP transport used against a live debug stub.
pub struct TcpTransport {
    stream: TcpStream,
    connected: bool,
}

impl TcpTransport {
    /// Connect to `host:port`, bounded by `timeout`.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve {
                host: host.to_string(),
                port,
            })?
            .next()
            .ok_or_else(|| TransportError::Resolve {
                host: host.to_string(),
                port,
            })?;

        let stream =
            TcpStream::connect_timeout(&addr, timeout).map_err(|source| TransportError::Connect {
                host: host.to_string(),
                port,
                source,
            })?;
        stream.set_nodelay(true)?;
        log::info!("connected to debug stub at {}:{}", host, port);

        Ok(Self {
            stream,
            connected: true,
        })
    }
}

impl Transport for TcpTransport {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        // A zero Duration would mean "no timeout" to the socket layer.
        let timeout = timeout.max(Duration::from_millis(1));
        self.stream.set_read_timeout(Some(timeout))?;
        match self.stream.read(buf) {
            Ok(0) => {
                self.connected = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => {
                self.connected = false;
                Err(e.into())
            }
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes).map_err(|e| {
            self.connected = false;
            e.into()
        })
    }
}
