//! rsplink - interactive console for a remote RSP debug stub.
//!
//! Entry point that handles CLI argument parsing, connects to the stub and
//! drops into a reedline REPL over the debug client.

use std::borrow::Cow;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use reedline::{
    Prompt, PromptHistorySearch, PromptHistorySearchStatus, Reedline, Signal,
};

use rsplink::client::{DebugStatus, RspClient, StopReply};
use rsplink::config::SessionConfig;
use rsplink::registers::Arch;
use rsplink::rsp::Blob;

/// rsplink: Remote Serial Protocol debug console
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Debug stub host (overrides TARGET_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Debug stub port (overrides TARGET_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Target architecture size, 32 or 64 (overrides ARCH_SIZE)
    #[arg(long)]
    arch_size: Option<u32>,

    /// Per-operation timeout in seconds (overrides ONE_OP_TIMEOUT)
    #[arg(long)]
    timeout: Option<u64>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger with verbosity level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        },
    ))
    .init();

    let mut config = SessionConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(size) = args.arch_size {
        config.arch = Arch::from_size(size)
            .ok_or_else(|| anyhow::anyhow!("--arch-size must be 32 or 64"))?;
    }
    if let Some(secs) = args.timeout {
        config.op_timeout = Duration::from_secs(secs);
    }

    println!(
        "[*] rsplink v{} - {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.host,
        config.port
    );
    log::debug!("config: {:?}", config);

    let client = RspClient::connect(config)?;
    run_repl(client)
}

/// Custom prompt showing session status and the last known instruction
/// pointer.
struct ConsolePrompt {
    current_address: u64,
    status: DebugStatus,
}

impl ConsolePrompt {
    fn new() -> Self {
        Self {
            current_address: 0,
            status: DebugStatus::Running,
        }
    }

    fn set_address(&mut self, addr: u64) {
        self.current_address = addr;
    }

    fn set_status(&mut self, status: DebugStatus) {
        self.status = status;
    }
}

impl Prompt for ConsolePrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        let status = match self.status {
            DebugStatus::Running => "run",
            DebugStatus::Stopped => "stp",
            DebugStatus::Disconnected => "---",
        };
        Cow::Owned(format!("[{}:{:#x}]", status, self.current_address))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "(failed) ",
        };
        Cow::Owned(format!("(search: {}{}) ", prefix, history_search.term))
    }
}

/// Command parsing result
#[derive(Debug)]
enum ParsedCommand {
    /// Query stop reason: dq
    StopReason,
    /// Show registers: dr
    Registers,
    /// Read/print instruction pointer: ip
    ReadIp,
    /// Write instruction pointer: ip <addr>
    WriteIp(u64),
    /// Read memory: dm <addr> <len>
    ReadMemory(u64, usize),
    /// Write memory: dw <addr> <hex>
    WriteMemory(u64, String),
    /// Set breakpoint: db <addr>
    BreakpointSet(u64),
    /// Delete breakpoint: db-
    BreakpointDelete,
    /// Continue execution: dc
    Continue,
    /// Step instruction: ds
    StepInto,
    /// List threads: dt
    Threads,
    /// Current thread: dtc
    CurrentThread,
    /// Is-thread-alive: dta <tid>
    ThreadAlive(u64),
    /// Memory base offset: base
    MemoryBase,
    /// Raw packet passthrough: raw <text>
    Raw(String),
    /// Help: ? or help
    Help,
    /// Quit: q or exit
    Quit,
    /// Unknown command
    Unknown(String),
}

/// Parse a command string into a structured command
fn parse_command(input: &str) -> ParsedCommand {
    let input = input.trim();
    let parts: Vec<&str> = input.split_whitespace().collect();
    let cmd = parts.first().copied().unwrap_or("");

    match cmd {
        "dq" | "status" => ParsedCommand::StopReason,
        "dr" | "regs" => ParsedCommand::Registers,
        "ip" => match parts.get(1) {
            Some(addr_str) => match parse_address(addr_str) {
                Ok(addr) => ParsedCommand::WriteIp(addr),
                Err(_) => ParsedCommand::Unknown(input.to_string()),
            },
            None => ParsedCommand::ReadIp,
        },
        "dm" => {
            if let (Some(addr), Some(len)) = (
                parts.get(1).and_then(|s| parse_address(s).ok()),
                parts.get(2).and_then(|s| parse_address(s).ok()),
            ) {
                return ParsedCommand::ReadMemory(addr, len as usize);
            }
            ParsedCommand::Unknown(input.to_string())
        }
        "dw" => {
            if let (Some(addr), Some(hex)) = (
                parts.get(1).and_then(|s| parse_address(s).ok()),
                parts.get(2),
            ) {
                return ParsedCommand::WriteMemory(addr, hex.to_string());
            }
            ParsedCommand::Unknown(input.to_string())
        }
        "db" => {
            if let Some(addr) = parts.get(1).and_then(|s| parse_address(s).ok()) {
                return ParsedCommand::BreakpointSet(addr);
            }
            ParsedCommand::Unknown(input.to_string())
        }
        "db-" => ParsedCommand::BreakpointDelete,
        "dc" | "continue" | "c" => ParsedCommand::Continue,
        "ds" | "step" => ParsedCommand::StepInto,
        "dt" | "threads" => ParsedCommand::Threads,
        "dtc" => ParsedCommand::CurrentThread,
        "dta" => {
            if let Some(tid) = parts.get(1).and_then(|s| parse_address(s).ok()) {
                return ParsedCommand::ThreadAlive(tid);
            }
            ParsedCommand::Unknown(input.to_string())
        }
        "base" => ParsedCommand::MemoryBase,
        "raw" => {
            if parts.len() > 1 {
                return ParsedCommand::Raw(parts[1..].join(" "));
            }
            ParsedCommand::Unknown(input.to_string())
        }
        "?" | "help" => ParsedCommand::Help,
        "q" | "quit" | "exit" => ParsedCommand::Quit,
        _ => ParsedCommand::Unknown(input.to_string()),
    }
}

/// Parse an address string (0x-prefixed or bare hex)
fn parse_address(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.trim();
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(hex, 16)
}

/// Print the help message
fn print_help() {
    println!("{}", "rsplink Console Commands".bold().cyan());
    println!("{}", "═".repeat(50).cyan());

    println!("\n{}", "Execution:".bold().yellow());
    println!("  {}               Query stop reason", "dq".green());
    println!("  {}               Continue execution", "dc".green());
    println!("  {}               Step one instruction", "ds".green());

    println!("\n{}", "Registers:".bold().yellow());
    println!("  {}               Show all registers", "dr".green());
    println!("  {}               Show instruction pointer", "ip".green());
    println!("  {}        Set instruction pointer", "ip <addr>".green());

    println!("\n{}", "Memory:".bold().yellow());
    println!("  {}  Read memory", "dm <addr> <len>".green());
    println!("  {}  Write memory", "dw <addr> <hex>".green());
    println!("  {}             Show memory base offset", "base".green());

    println!("\n{}", "Breakpoints:".bold().yellow());
    println!("  {}        Set breakpoint", "db <addr>".green());
    println!("  {}              Delete breakpoint", "db-".green());

    println!("\n{}", "Threads:".bold().yellow());
    println!("  {}               List thread ids", "dt".green());
    println!("  {}              Current thread id", "dtc".green());
    println!("  {}        Is thread alive", "dta <tid>".green());

    println!("\n{}", "Other:".bold().yellow());
    println!("  {}       Send a raw packet", "raw <text>".green());
    println!("  {}                Show this help", "?".green());
    println!("  {}                Quit", "q".green());
}

fn report_stop(stop: StopReply, prompt: &mut ConsolePrompt, client: &mut RspClient) {
    println!(
        "[*] Stopped: signal {:#04x} ({:?})",
        stop.signal,
        stop.kind()
    );
    prompt.set_status(client.status());
    if let Ok(ip) = client.read_ip() {
        prompt.set_address(ip);
    }
}

fn report_error(err: impl std::fmt::Display) {
    println!("{} {}", "[!]".red(), err);
}

/// Execute a parsed command against the live session. Returns false when the
/// REPL should exit.
fn execute_command(client: &mut RspClient, prompt: &mut ConsolePrompt, cmd: ParsedCommand) -> bool {
    match cmd {
        ParsedCommand::StopReason => match client.query_stop_reason() {
            Ok(stop) => report_stop(stop, prompt, client),
            Err(e) => report_error(e),
        },
        ParsedCommand::Registers => match client.read_registers() {
            Ok(regs) => {
                let names: Vec<&'static str> = client.register_set().names().collect();
                for name in names {
                    match client.register_set().read(&regs, name) {
                        Ok(value) => {
                            println!("    {:>6} = {:#018x}", name.to_uppercase(), value)
                        }
                        Err(e) => report_error(e),
                    }
                }
            }
            Err(e) => report_error(e),
        },
        ParsedCommand::ReadIp => match client.read_ip() {
            Ok(ip) => {
                println!("[*] ip = {:#x}", ip);
                prompt.set_address(ip);
            }
            Err(e) => report_error(e),
        },
        ParsedCommand::WriteIp(addr) => match client.write_ip(addr) {
            Ok(()) => {
                println!("[*] ip set to {:#x}", addr);
                prompt.set_address(addr);
            }
            Err(e) => report_error(e),
        },
        ParsedCommand::ReadMemory(addr, len) => match client.read_memory(addr, len) {
            Ok(data) => println!("[*] {:#x}: {}", addr, data.to_hex()),
            Err(e) => report_error(e),
        },
        ParsedCommand::WriteMemory(addr, hex) => match Blob::from_hex(&hex) {
            Ok(data) => match client.write_memory(addr, &data) {
                Ok(()) => println!("[*] Wrote {} bytes at {:#x}", data.len(), addr),
                Err(e) => report_error(e),
            },
            Err(e) => report_error(e),
        },
        ParsedCommand::BreakpointSet(addr) => match client.set_breakpoint(addr) {
            Ok(()) => println!("[*] Breakpoint set at {:#x}", addr),
            Err(e) => report_error(e),
        },
        ParsedCommand::BreakpointDelete => match client.delete_breakpoint() {
            Ok(()) => println!("[*] Breakpoint deleted"),
            Err(e) => report_error(e),
        },
        ParsedCommand::Continue => {
            println!("[*] Continuing...");
            match client.continue_execution() {
                Ok(stop) => report_stop(stop, prompt, client),
                Err(e) => {
                    prompt.set_status(client.status());
                    report_error(e);
                }
            }
        }
        ParsedCommand::StepInto => match client.single_step() {
            Ok(stop) => report_stop(stop, prompt, client),
            Err(e) => {
                prompt.set_status(client.status());
                report_error(e);
            }
        },
        ParsedCommand::Threads => match client.thread_list() {
            Ok(tids) => {
                let rendered: Vec<String> = tids.iter().map(|t| format!("{t:#x}")).collect();
                println!("[*] Threads: {}", rendered.join(", "));
            }
            Err(e) => report_error(e),
        },
        ParsedCommand::CurrentThread => match client.current_thread() {
            Ok(tid) => println!("[*] Current thread: {:#x}", tid),
            Err(e) => report_error(e),
        },
        ParsedCommand::ThreadAlive(tid) => match client.is_thread_alive(tid) {
            Ok(alive) => println!("[*] Thread {:#x} alive: {}", tid, alive),
            Err(e) => report_error(e),
        },
        ParsedCommand::MemoryBase => match client.memory_base() {
            Ok(base) => println!("[*] Memory base: {:#x}", base),
            Err(e) => report_error(e),
        },
        ParsedCommand::Raw(text) => match client.command(&text) {
            Ok(reply) => println!("[*] Reply: {:?}", reply),
            Err(e) => report_error(e),
        },
        ParsedCommand::Help => print_help(),
        ParsedCommand::Quit => {
            println!("[*] Shutting down...");
            return false;
        }
        ParsedCommand::Unknown(input) => {
            if !input.is_empty() {
                println!("{} Unknown command: '{}'", "[!]".red(), input);
                println!("    Type '?' for help");
            }
        }
    }
    true
}

/// Run the console REPL
fn run_repl(mut client: RspClient) -> Result<()> {
    let mut line_editor = Reedline::create();
    let mut prompt = ConsolePrompt::new();

    println!(
        "{}",
        "rsplink console - type '?' for help, 'q' to quit".cyan()
    );

    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(line) => {
                let cmd = parse_command(&line);
                if !execute_command(&mut client, &mut prompt, cmd) {
                    break;
                }
            }
            Signal::CtrlC | Signal::CtrlD => {
                println!("[*] Shutting down...");
                break;
            }
        }
    }

    client.disconnect();
    Ok(())
}
