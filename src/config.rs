//! Session configuration.
//!
//! One explicit struct instead of process-wide globals. The environment
//! loader keeps the variable names the surrounding tooling already exports
//! (`TARGET_HOST`, `TARGET_PORT`, `ARCH_SIZE`, `ONE_OP_TIMEOUT`).

use std::time::Duration;

use crate::registers::Arch;

pub const DEFAULT_TARGET_HOST: &str = "localhost";
pub const DEFAULT_TARGET_PORT: u16 = 4014;
pub const DEFAULT_OP_TIMEOUT_SECS: u64 = 10;

/// Everything a debug session needs to know up front. Immutable once the
/// session is constructed.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Debug stub host.
    pub host: String,
    /// Debug stub RSP port.
    pub port: u16,
    /// Target architecture profile.
    pub arch: Arch,
    /// Deadline for one command/reply exchange.
    pub op_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TARGET_HOST.to_string(),
            port: DEFAULT_TARGET_PORT,
            arch: Arch::Win64,
            op_timeout: Duration::from_secs(DEFAULT_OP_TIMEOUT_SECS),
        }
    }
}

impl SessionConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let size = int_env("ARCH_SIZE", 64);
        let arch = Arch::from_size(size as u32).unwrap_or_else(|| {
            log::warn!("ARCH_SIZE={size} is not 32 or 64, assuming 64");
            Arch::Win64
        });
        Self {
            host: string_env("TARGET_HOST", &defaults.host),
            port: int_env("TARGET_PORT", i64::from(defaults.port)) as u16,
            arch,
            op_timeout: Duration::from_secs(
                int_env("ONE_OP_TIMEOUT", DEFAULT_OP_TIMEOUT_SECS as i64) as u64,
            ),
        }
    }
}

fn string_env(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn int_env(name: &str, default: i64) -> i64 {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            log::warn!("{name}={value:?} is not an integer, using {default}");
            default
        }),
        Err(_) => default,
    }
}
