//! RSP session / debug client.
//!
//! Owns one transport connection for the lifetime of a debug session and
//! speaks the stub's request/reply protocol over it: every operation sends
//! one command packet and blocks until a complete, checksum-valid reply
//! envelope arrives or the per-operation deadline expires. No pipelining,
//! no background threads.
//!
//! Register, memory and breakpoint operations require a stopped target and
//! fail fast otherwise; resume operations block until the next stop reply
//! and surface its raw signal number.

pub mod types;

pub use types::{signal, Breakpoint, DebugStatus, StopKind, StopReply};

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::SessionConfig;
use crate::registers::{Arch, RegisterError, RegisterSet};
use crate::rsp::{packet, Blob, Unwrapped, WireError};
use crate::transport::{TcpTransport, Transport, TransportError};

/// Single-byte trap instruction patched over breakpoint addresses.
pub const TRAP_OPCODE: u8 = 0xcc;

const READ_CHUNK: usize = 256;
const STOP_POLL_SLEEP: Duration = Duration::from_millis(500);

/// Client operation errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Register(#[from] RegisterError),

    #[error("timed out after {timeout:?} waiting for reply to {command:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("stub reported error {code:#04x} for {command:?}")]
    Stub { command: String, code: u8 },

    #[error("malformed reply {reply:?} to {command:?}")]
    MalformedReply { command: String, reply: String },

    #[error("short memory read at {address:#x}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        address: u64,
        wanted: usize,
        got: usize,
    },

    #[error("a breakpoint is already set at {address:#x}")]
    BreakpointAlreadySet { address: u64 },

    #[error("no breakpoint is set")]
    NoBreakpoint,

    #[error("failed to save the original byte at {address:#x} while inserting breakpoint")]
    BreakpointSave {
        address: u64,
        #[source]
        source: Box<ClientError>,
    },

    #[error("failed to patch the trap opcode at {address:#x} while inserting breakpoint")]
    BreakpointPatch {
        address: u64,
        #[source]
        source: Box<ClientError>,
    },

    #[error("target is running; {operation} requires a stopped target")]
    TargetRunning { operation: &'static str },
}

/// Debug client speaking RSP to a remote stub.
pub struct RspClient {
    transport: Box<dyn Transport>,
    config: SessionConfig,
    registers: RegisterSet,
    /// Receive accumulator; replies arrive in arbitrary chunks.
    rx: Blob,
    /// Single breakpoint slot.
    breakpoint: Option<Breakpoint>,
    /// Memory base offset, fetched once via qOffsets and cached.
    mem_base: Option<u64>,
    status: DebugStatus,
}

impl RspClient {
    /// Connect to the stub named by `config` over TCP.
    pub fn connect(config: SessionConfig) -> Result<Self, ClientError> {
        let transport = TcpTransport::connect(&config.host, config.port, config.op_timeout)?;
        Ok(Self::with_transport(Box::new(transport), config))
    }

    /// Build a client over an already-established connection. The target is
    /// presumed running until a stop reply is observed.
    pub fn with_transport(transport: Box<dyn Transport>, config: SessionConfig) -> Self {
        let registers = RegisterSet::new(config.arch);
        Self {
            transport,
            config,
            registers,
            rx: Blob::new(),
            breakpoint: None,
            mem_base: None,
            status: DebugStatus::Running,
        }
    }

    pub fn status(&self) -> DebugStatus {
        self.status
    }

    pub fn arch(&self) -> Arch {
        self.registers.arch()
    }

    pub fn register_set(&self) -> &RegisterSet {
        &self.registers
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// The currently set breakpoint, if any.
    pub fn breakpoint(&self) -> Option<&Breakpoint> {
        self.breakpoint.as_ref()
    }

    /// Tear the session down, closing the connection.
    pub fn disconnect(self) {
        log::info!("closing debug session");
    }

    /// Raw request/reply exchange: send `text` as a packet, return the reply
    /// payload as text. No reply-grammar checking and no status guard; the
    /// typed operations below are built on this.
    pub fn command(&mut self, text: &str) -> Result<String, ClientError> {
        self.transact(&Blob::from_text(text)).map(|reply| reply.text())
    }

    /// Query the stop reason (`?`). Usable while the target runs; a stop
    /// reply transitions the session to `Stopped`.
    pub fn query_stop_reason(&mut self) -> Result<StopReply, ClientError> {
        let reply = self.transact(&Blob::from_text("?"))?;
        let stop = parse_stop_reply("?", &reply)?;
        self.status = DebugStatus::Stopped;
        Ok(stop)
    }

    /// Poll the stop reason until the stub reports `expected`, bounded by
    /// `overall`. Used to catch the stop-at-launch signal while the target
    /// is still coming up.
    pub fn wait_for_signal(&mut self, expected: u8, overall: Duration) -> Result<StopReply, ClientError> {
        let deadline = Instant::now() + overall;
        loop {
            match self.query_stop_reason() {
                Ok(stop) if stop.signal == expected => return Ok(stop),
                Ok(other) => {
                    log::debug!("waiting for signal {expected:#04x}, saw {:#04x}", other.signal)
                }
                Err(ClientError::Timeout { .. }) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(ClientError::Timeout {
                    command: "?".to_string(),
                    timeout: overall,
                });
            }
            std::thread::sleep(STOP_POLL_SLEEP);
        }
    }

    /// Continue execution (`c`), blocking until the next stop reply.
    pub fn continue_execution(&mut self) -> Result<StopReply, ClientError> {
        self.resume("c", "continue")
    }

    /// Single-step one instruction (`s`), blocking until the stop reply.
    pub fn single_step(&mut self) -> Result<StopReply, ClientError> {
        self.resume("s", "step")
    }

    fn resume(&mut self, command: &'static str, operation: &'static str) -> Result<StopReply, ClientError> {
        self.ensure_stopped(operation)?;
        self.status = DebugStatus::Running;
        let reply = self.transact(&Blob::from_text(command))?;
        let stop = parse_stop_reply(command, &reply)?;
        self.status = DebugStatus::Stopped;
        Ok(stop)
    }

    /// Read the full register blob (`g`).
    pub fn read_registers(&mut self) -> Result<Blob, ClientError> {
        self.ensure_stopped("read_registers")?;
        let reply = self.transact(&Blob::from_text("g"))?;
        if let Some(code) = parse_stub_error(&reply) {
            return Err(ClientError::Stub {
                command: "g".to_string(),
                code,
            });
        }
        let regs = Blob::from_hex(&reply.text())?;
        if regs.len() != self.registers.blob_len() {
            return Err(RegisterError::SizeMismatch {
                expected: self.registers.blob_len(),
                got: regs.len(),
            }
            .into());
        }
        Ok(regs)
    }

    /// Write the full register blob (`G`). Succeeds only on an explicit OK.
    pub fn write_registers(&mut self, regs: &Blob) -> Result<(), ClientError> {
        self.ensure_stopped("write_registers")?;
        let reply = self.transact(&Blob::from_text(&format!("G{}", regs.to_hex())))?;
        expect_ok("G", &reply)
    }

    /// Read `len` bytes of target memory. Fails if the stub returns anything
    /// other than exactly `len` bytes.
    pub fn read_memory(&mut self, address: u64, len: usize) -> Result<Blob, ClientError> {
        self.ensure_stopped("read_memory")?;
        let command = format!("m{address:x},{len:x}");
        let reply = self.transact(&Blob::from_text(&command))?;
        if let Some(code) = parse_stub_error(&reply) {
            return Err(ClientError::Stub { command, code });
        }
        let data = Blob::from_hex(&reply.text())?;
        if data.len() != len {
            return Err(ClientError::ShortRead {
                address,
                wanted: len,
                got: data.len(),
            });
        }
        Ok(data)
    }

    /// Write bytes into target memory. Succeeds only on an explicit OK.
    pub fn write_memory(&mut self, address: u64, data: &Blob) -> Result<(), ClientError> {
        self.ensure_stopped("write_memory")?;
        let command = format!("M{address:x},{:x}:{}", data.len(), data.to_hex());
        let reply = self.transact(&Blob::from_text(&command))?;
        expect_ok(&format!("M{address:x},{:x}", data.len()), &reply)
    }

    /// Insert a software breakpoint: save the byte at `address`, then patch
    /// the trap opcode over it. Only one breakpoint may be outstanding.
    pub fn set_breakpoint(&mut self, address: u64) -> Result<(), ClientError> {
        self.ensure_stopped("set_breakpoint")?;
        if let Some(bp) = &self.breakpoint {
            return Err(ClientError::BreakpointAlreadySet {
                address: bp.address,
            });
        }
        let saved = self
            .read_memory(address, 1)
            .map_err(|e| ClientError::BreakpointSave {
                address,
                source: Box::new(e),
            })?;
        let original_byte = saved.as_slice()[0];
        self.write_memory(address, &Blob::from_bytes(&[TRAP_OPCODE]))
            .map_err(|e| ClientError::BreakpointPatch {
                address,
                source: Box::new(e),
            })?;
        log::debug!("breakpoint set at {address:#x}, saved byte {original_byte:#04x}");
        self.breakpoint = Some(Breakpoint {
            address,
            original_byte,
        });
        Ok(())
    }

    /// Restore the saved byte of the current breakpoint. The slot is kept on
    /// a failed write so the restore can be retried.
    pub fn delete_breakpoint(&mut self) -> Result<(), ClientError> {
        self.ensure_stopped("delete_breakpoint")?;
        let bp = self.breakpoint.take().ok_or(ClientError::NoBreakpoint)?;
        match self.write_memory(bp.address, &Blob::from_bytes(&[bp.original_byte])) {
            Ok(()) => {
                log::debug!("breakpoint at {:#x} deleted", bp.address);
                Ok(())
            }
            Err(e) => {
                self.breakpoint = Some(bp);
                Err(e)
            }
        }
    }

    /// Read one named register via a full register fetch.
    pub fn read_register(&mut self, name: &str) -> Result<u64, ClientError> {
        let regs = self.read_registers()?;
        Ok(self.registers.read(&regs, name)?)
    }

    /// Read the instruction pointer.
    pub fn read_ip(&mut self) -> Result<u64, ClientError> {
        self.read_register("ip")
    }

    /// Overwrite the instruction pointer, leaving all other registers as
    /// they are.
    pub fn write_ip(&mut self, ip: u64) -> Result<(), ClientError> {
        let mut regs = self.read_registers()?;
        self.registers.write("ip", ip, &mut regs)?;
        self.write_registers(&regs)
    }

    /// Read a 32-bit little-endian value from target memory.
    pub fn read_u32(&mut self, address: u64) -> Result<u32, ClientError> {
        Ok(self.read_scalar(address, 4)? as u32)
    }

    /// Read a 64-bit little-endian value from target memory.
    pub fn read_u64(&mut self, address: u64) -> Result<u64, ClientError> {
        self.read_scalar(address, 8)
    }

    fn read_scalar(&mut self, address: u64, len: usize) -> Result<u64, ClientError> {
        let mut data = self.read_memory(address, len)?;
        // The wire carries bytes in memory order and the target is
        // little-endian, so the most significant byte arrives last.
        data.reverse();
        let mut value: u64 = 0;
        for &b in data.as_slice() {
            value = (value << 8) | u64::from(b);
        }
        Ok(value)
    }

    /// Id of the thread that reported the last stop (`qC`).
    pub fn current_thread(&mut self) -> Result<u64, ClientError> {
        let reply = self.transact(&Blob::from_text("qC"))?;
        if !reply.starts_with(b"QC") {
            return Err(ClientError::MalformedReply {
                command: "qC".to_string(),
                reply: reply.text(),
            });
        }
        let mut rest = reply;
        rest.pop_front(2);
        Ok(rest.pop_int_from_front()?)
    }

    /// Ordered list of live thread ids (`qfThreadInfo`). Tokens that do not
    /// parse as hex integers are skipped, not fatal.
    pub fn thread_list(&mut self) -> Result<Vec<u64>, ClientError> {
        let reply = self.transact(&Blob::from_text("qfThreadInfo"))?;
        if reply.first() != Some(b'm') {
            return Err(ClientError::MalformedReply {
                command: "qfThreadInfo".to_string(),
                reply: reply.text(),
            });
        }
        let mut rest = reply;
        rest.pop_front(1);
        let mut tids = Vec::new();
        for mut token in rest.split(b",") {
            if let Ok(tid) = token.pop_int_from_front() {
                tids.push(tid);
            }
        }
        Ok(tids)
    }

    /// Select the thread subsequent step/continue operations apply to
    /// (`Hc<tid>`); `None` selects any thread (`Hc-1`).
    pub fn set_current_thread(&mut self, tid: Option<u64>) -> Result<(), ClientError> {
        let command = match tid {
            Some(tid) => format!("Hc{tid:x}"),
            None => "Hc-1".to_string(),
        };
        let reply = self.transact(&Blob::from_text(&command))?;
        expect_ok(&command, &reply)
    }

    /// Whether the stub considers thread `tid` alive (`T<tid>`). A stub
    /// error reply means "no such thread", not a failed operation.
    pub fn is_thread_alive(&mut self, tid: u64) -> Result<bool, ClientError> {
        let command = format!("T{tid:x}");
        let reply = self.transact(&Blob::from_text(&command))?;
        if reply.as_slice() == b"OK" {
            return Ok(true);
        }
        if parse_stub_error(&reply).is_some() {
            return Ok(false);
        }
        Err(ClientError::MalformedReply {
            command,
            reply: reply.text(),
        })
    }

    /// Memory base offset of the sandboxed target, from `qOffsets`. Queried
    /// once per session and cached.
    pub fn memory_base(&mut self) -> Result<u64, ClientError> {
        if let Some(base) = self.mem_base {
            return Ok(base);
        }
        let reply = self.transact(&Blob::from_text("qOffsets"))?;
        let text = reply.text();
        // Reply shape: Text=<hex>;Data=<hex>. Discard through the field
        // separator, then through the key/value separator, and parse the
        // rest.
        let mut rest = reply;
        rest.pop_front_until(b';');
        rest.pop_front_until(b'=');
        let base = rest
            .pop_int_from_front()
            .map_err(|_| ClientError::MalformedReply {
                command: "qOffsets".to_string(),
                reply: text,
            })?;
        log::info!("memory base offset {base:#x}");
        self.mem_base = Some(base);
        Ok(base)
    }

    /// Translate a logical code address to the flat address space. 64-bit
    /// code addresses are sandbox-relative, so the base is added; 32-bit
    /// code addresses are already flat.
    pub fn code_to_flat(&mut self, address: u64) -> Result<u64, ClientError> {
        if self.arch().is_64bit() {
            Ok(address + self.memory_base()?)
        } else {
            Ok(address)
        }
    }

    /// Translate a flat code address back to its logical form. Inverse of
    /// [`Self::code_to_flat`].
    pub fn flat_to_code(&mut self, address: u64) -> Result<u64, ClientError> {
        if self.arch().is_64bit() {
            Ok(address - self.memory_base()?)
        } else {
            Ok(address)
        }
    }

    /// Translate a logical data address to the flat address space. The
    /// convention is the mirror image of code addresses: 64-bit data
    /// addresses already include the base, 32-bit ones do not.
    pub fn data_to_flat(&mut self, address: u64) -> Result<u64, ClientError> {
        if self.arch().is_64bit() {
            Ok(address)
        } else {
            Ok(address + self.memory_base()?)
        }
    }

    fn ensure_stopped(&self, operation: &'static str) -> Result<(), ClientError> {
        if self.status == DebugStatus::Running {
            return Err(ClientError::TargetRunning { operation });
        }
        Ok(())
    }

    /// One synchronous exchange: wrap, send, accumulate reads until a full
    /// envelope unwraps or the deadline expires. The accumulator is cleared
    /// on timeout and corruption so stale bytes cannot poison the next
    /// exchange.
    fn transact(&mut self, payload: &Blob) -> Result<Blob, ClientError> {
        let command = payload.text();
        let wire = packet::add_envelope(payload);
        log::debug!("-> {command}");
        self.transport.write_all(wire.as_slice())?;

        let deadline = Instant::now() + self.config.op_timeout;
        loop {
            match packet::remove_envelope(&mut self.rx) {
                Ok(Unwrapped::Payload(reply)) => {
                    log::debug!("<- {reply}");
                    return Ok(reply);
                }
                Ok(Unwrapped::Incomplete) => {}
                Err(e) => {
                    self.rx.clear();
                    return Err(e.into());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                self.rx.clear();
                return Err(ClientError::Timeout {
                    command,
                    timeout: self.config.op_timeout,
                });
            }
            let mut buf = [0u8; READ_CHUNK];
            let n = self.transport.read_available(&mut buf, deadline - now)?;
            if n > 0 {
                self.rx.append(&buf[..n]);
            }
        }
    }
}

/// Recognize an `E<2-hex>` stub error reply.
fn parse_stub_error(reply: &Blob) -> Option<u8> {
    let bytes = reply.as_slice();
    if bytes.len() == 3 && bytes[0] == b'E' {
        let digits = std::str::from_utf8(&bytes[1..3]).ok()?;
        return u8::from_str_radix(digits, 16).ok();
    }
    None
}

/// Parse an `S<2-hex>` stop reply.
fn parse_stop_reply(command: &str, reply: &Blob) -> Result<StopReply, ClientError> {
    let bytes = reply.as_slice();
    if bytes.len() == 3 && bytes[0] == b'S' {
        if let Ok(signal) = u8::from_str_radix(&reply.text()[1..3], 16) {
            return Ok(StopReply { signal });
        }
    }
    if let Some(code) = parse_stub_error(reply) {
        return Err(ClientError::Stub {
            command: command.to_string(),
            code,
        });
    }
    Err(ClientError::MalformedReply {
        command: command.to_string(),
        reply: reply.text(),
    })
}

/// Accept exactly `OK`; map stub errors and anything else to typed failures.
fn expect_ok(command: &str, reply: &Blob) -> Result<(), ClientError> {
    if reply.as_slice() == b"OK" {
        return Ok(());
    }
    if let Some(code) = parse_stub_error(reply) {
        return Err(ClientError::Stub {
            command: command.to_string(),
            code,
        });
    }
    Err(ClientError::MalformedReply {
        command: command.to_string(),
        reply: reply.text(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Scripted transport: each written packet queues the next canned reply's
    /// wire bytes for subsequent reads.
    struct ScriptTransport {
        replies: VecDeque<Vec<u8>>,
        incoming: Vec<u8>,
        sent: Rc<RefCell<Vec<String>>>,
    }

    impl ScriptTransport {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|payload| {
                        packet::add_envelope(&Blob::from_text(payload))
                            .into_vec()
                    })
                    .collect(),
                incoming: Vec::new(),
                sent: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn sent_log(&self) -> Rc<RefCell<Vec<String>>> {
            Rc::clone(&self.sent)
        }

        /// Queue raw wire bytes instead of a framed payload.
        fn push_raw_reply(&mut self, bytes: &[u8]) {
            self.replies.push_back(bytes.to_vec());
        }
    }

    impl Transport for ScriptTransport {
        fn is_connected(&self) -> bool {
            true
        }

        fn read_available(
            &mut self,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<usize, TransportError> {
            let n = buf.len().min(self.incoming.len());
            buf[..n].copy_from_slice(&self.incoming[..n]);
            self.incoming.drain(..n);
            Ok(n)
        }

        fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            self.sent
                .borrow_mut()
                .push(String::from_utf8_lossy(bytes).into_owned());
            if let Some(reply) = self.replies.pop_front() {
                self.incoming.extend_from_slice(&reply);
            }
            Ok(())
        }
    }

    fn test_config(arch: Arch) -> SessionConfig {
        SessionConfig {
            host: "test".to_string(),
            port: 0,
            arch,
            op_timeout: Duration::from_millis(50),
        }
    }

    /// Client with a scripted stub, driven to the stopped state. The first
    /// scripted entry must answer the initial `?`.
    fn stopped_client(arch: Arch, replies: &[&str]) -> RspClient {
        let mut script = vec!["S05"];
        script.extend_from_slice(replies);
        let transport = ScriptTransport::new(&script);
        let mut client = RspClient::with_transport(Box::new(transport), test_config(arch));
        client.query_stop_reason().unwrap();
        client
    }

    #[test]
    fn command_round_trip() {
        let transport = ScriptTransport::new(&["S13"]);
        let mut client =
            RspClient::with_transport(Box::new(transport), test_config(Arch::Win64));
        assert_eq!(client.command("?").unwrap(), "S13");
    }

    #[test]
    fn timeout_clears_accumulator() {
        let mut transport = ScriptTransport::new(&[]);
        // Half an envelope, never finished.
        transport.push_raw_reply(b"$S0");
        let mut client =
            RspClient::with_transport(Box::new(transport), test_config(Arch::Win64));
        assert!(matches!(
            client.command("?"),
            Err(ClientError::Timeout { .. })
        ));
        // The stale partial bytes must not corrupt the next exchange.
        assert!(client.rx.is_empty());
    }

    #[test]
    fn stale_bytes_before_reply_are_skipped() {
        let mut transport = ScriptTransport::new(&[]);
        let mut wire = b"05#xx".to_vec();
        wire.extend_from_slice(packet::add_envelope(&Blob::from_text("S05")).as_slice());
        transport.push_raw_reply(&wire);
        let mut client =
            RspClient::with_transport(Box::new(transport), test_config(Arch::Win64));
        assert_eq!(client.command("?").unwrap(), "S05");
    }

    #[test]
    fn corrupt_reply_fails_the_command() {
        let mut transport = ScriptTransport::new(&[]);
        transport.push_raw_reply(b"$OK#00");
        let mut client =
            RspClient::with_transport(Box::new(transport), test_config(Arch::Win64));
        assert!(matches!(
            client.command("?"),
            Err(ClientError::Wire(WireError::ChecksumMismatch { .. }))
        ));
        assert!(client.rx.is_empty());
    }

    #[test]
    fn operations_fail_fast_while_running() {
        let transport = ScriptTransport::new(&[]);
        let mut client =
            RspClient::with_transport(Box::new(transport), test_config(Arch::Win64));
        assert_eq!(client.status(), DebugStatus::Running);
        assert!(matches!(
            client.read_registers(),
            Err(ClientError::TargetRunning {
                operation: "read_registers"
            })
        ));
        assert!(matches!(
            client.set_breakpoint(0x1000),
            Err(ClientError::TargetRunning { .. })
        ));
    }

    #[test]
    fn resume_transitions_status() {
        let mut client = stopped_client(Arch::Win64, &["S05"]);
        assert_eq!(client.status(), DebugStatus::Stopped);
        let stop = client.continue_execution().unwrap();
        assert!(stop.is_trap());
        assert_eq!(client.status(), DebugStatus::Stopped);
    }

    #[test]
    fn resume_timeout_leaves_target_running() {
        let mut client = stopped_client(Arch::Win64, &[]);
        assert!(matches!(
            client.continue_execution(),
            Err(ClientError::Timeout { .. })
        ));
        assert_eq!(client.status(), DebugStatus::Running);
        assert!(matches!(
            client.read_registers(),
            Err(ClientError::TargetRunning { .. })
        ));
    }

    #[test]
    fn breakpoint_slot_is_single() {
        let mut client = stopped_client(Arch::Win64, &["55", "OK"]);
        client.set_breakpoint(0x1000).unwrap();
        assert_eq!(
            client.breakpoint(),
            Some(&Breakpoint {
                address: 0x1000,
                original_byte: 0x55
            })
        );
        assert!(matches!(
            client.set_breakpoint(0x2000),
            Err(ClientError::BreakpointAlreadySet { address: 0x1000 })
        ));
    }

    #[test]
    fn breakpoint_set_reports_failing_half() {
        // Save succeeds, patch is rejected by the stub.
        let mut client = stopped_client(Arch::Win64, &["55", "E01"]);
        assert!(matches!(
            client.set_breakpoint(0x1000),
            Err(ClientError::BreakpointPatch { address: 0x1000, .. })
        ));
        assert!(client.breakpoint().is_none());

        let mut client = stopped_client(Arch::Win64, &["E01"]);
        assert!(matches!(
            client.set_breakpoint(0x1000),
            Err(ClientError::BreakpointSave { address: 0x1000, .. })
        ));
    }

    #[test]
    fn delete_without_breakpoint_fails() {
        let mut client = stopped_client(Arch::Win64, &[]);
        assert!(matches!(
            client.delete_breakpoint(),
            Err(ClientError::NoBreakpoint)
        ));
    }

    #[test]
    fn read_u32_reverses_wire_order() {
        // Memory bytes 78 56 34 12 decode to 0x12345678.
        let mut client = stopped_client(Arch::Win64, &["78563412"]);
        assert_eq!(client.read_u32(0x4000).unwrap(), 0x12345678);
    }

    #[test]
    fn read_u64_reverses_wire_order() {
        let mut client = stopped_client(Arch::Win64, &["efcdab8967452301"]);
        assert_eq!(client.read_u64(0x4000).unwrap(), 0x0123456789abcdef);
    }

    #[test]
    fn short_memory_read_is_an_error() {
        let mut client = stopped_client(Arch::Win64, &["aabb"]);
        assert!(matches!(
            client.read_memory(0x2000, 4),
            Err(ClientError::ShortRead {
                address: 0x2000,
                wanted: 4,
                got: 2
            })
        ));
    }

    #[test]
    fn select_any_thread_sends_minus_one() {
        let transport = ScriptTransport::new(&["S05", "OK"]);
        let sent = transport.sent_log();
        let mut client =
            RspClient::with_transport(Box::new(transport), test_config(Arch::Win64));
        client.query_stop_reason().unwrap();
        client.set_current_thread(None).unwrap();
        let sent = sent.borrow();
        assert!(sent[1].starts_with("$Hc-1#"), "sent {:?}", sent[1]);
    }

    #[test]
    fn thread_list_requires_list_marker() {
        let mut client = stopped_client(Arch::Win64, &["l"]);
        assert!(matches!(
            client.thread_list(),
            Err(ClientError::MalformedReply { .. })
        ));
    }

    #[test]
    fn thread_list_skips_unparsable_tokens() {
        let mut client = stopped_client(Arch::Win64, &["m12,zz,34"]);
        assert_eq!(client.thread_list().unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn is_thread_alive_folds_stub_error() {
        let mut client = stopped_client(Arch::Win64, &["OK", "E0b"]);
        assert!(client.is_thread_alive(0x1).unwrap());
        assert!(!client.is_thread_alive(0x2).unwrap());
    }

    #[test]
    fn memory_base_is_cached() {
        let mut client =
            stopped_client(Arch::Win64, &["Text=c00000000;Data=c00000000"]);
        assert_eq!(client.memory_base().unwrap(), 0xc00000000);
        // Script is exhausted; a second fetch would time out if it issued
        // another command.
        assert_eq!(client.memory_base().unwrap(), 0xc00000000);
    }

    #[test]
    fn address_translation_is_asymmetric() {
        let mut client =
            stopped_client(Arch::Win64, &["Text=c00000000;Data=c00000000"]);
        assert_eq!(client.code_to_flat(0x1000).unwrap(), 0xc00001000);
        assert_eq!(client.flat_to_code(0xc00001000).unwrap(), 0x1000);
        assert_eq!(client.data_to_flat(0x2000).unwrap(), 0x2000);

        let mut client = stopped_client(Arch::Win32, &["Text=1000000;Data=1000000"]);
        // 32-bit code addresses are already flat; no qOffsets issued.
        assert_eq!(client.code_to_flat(0x1000).unwrap(), 0x1000);
        assert_eq!(client.flat_to_code(0x1000).unwrap(), 0x1000);
        assert_eq!(client.data_to_flat(0x10).unwrap(), 0x1000010);
    }

    #[test]
    fn wait_for_signal_returns_on_match() {
        let transport = ScriptTransport::new(&["S13"]);
        let mut client =
            RspClient::with_transport(Box::new(transport), test_config(Arch::Win64));
        let stop = client
            .wait_for_signal(signal::SIGSTOP, Duration::from_secs(1))
            .unwrap();
        assert_eq!(stop.kind(), StopKind::StopAtLaunch);
        assert_eq!(client.status(), DebugStatus::Stopped);
    }

    #[test]
    fn stop_reply_parsing() {
        let reply = Blob::from_text("S0b");
        let stop = parse_stop_reply("c", &reply).unwrap();
        assert_eq!(stop.signal, 0x0b);
        assert_eq!(stop.kind(), StopKind::AccessViolation);

        assert!(matches!(
            parse_stop_reply("c", &Blob::from_text("E02")),
            Err(ClientError::Stub { code: 0x02, .. })
        ));
        assert!(matches!(
            parse_stop_reply("c", &Blob::from_text("banana")),
            Err(ClientError::MalformedReply { .. })
        ));
    }
}
