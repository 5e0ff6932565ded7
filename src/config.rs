//! Constants from §6.1/§6.3 and the small set of environment-driven knobs
//! from §8.3. Reading the environment happens exactly once, behind a
//! [`std::sync::OnceLock`]; nothing here panics on a missing or malformed
//! variable, per the "never raise on the fast path" rule in §7; malformed
//! values fall back to the default with a `tracing::warn!`.

use std::env;
use std::io;

pub const MAX_WORKERS: u32 = 1024;
pub const DEFAULT_SLICE_NS: u64 = 5_000_000;
pub const GRACE_PERIOD_NS: u64 = 100_000_000;
pub const RINGBUF_SIZE: u32 = 262_144;

const DEFAULT_PACER_MIN_INTERVAL: u64 = 100;
const DEFAULT_PACER_MAX_INTERVAL: u64 = 10_000;
const DEFAULT_DEFENSIVE_RECOVERY_COUNT: u32 = 64;

const ENV_SCB_MAP: &str = "MORPHEUS_SCB_MAP";
const ENV_HINT_RINGBUF: &str = "MORPHEUS_HINT_RINGBUF";
const ENV_GLOBAL_PRESSURE_MAP: &str = "MORPHEUS_GLOBAL_PRESSURE_MAP";
const ENV_PACER_MIN_INTERVAL: &str = "MORPHEUS_PACER_MIN_INTERVAL";
const ENV_PACER_MAX_INTERVAL: &str = "MORPHEUS_PACER_MAX_INTERVAL";
const ENV_DEFENSIVE_RECOVERY_COUNT: &str = "MORPHEUS_DEFENSIVE_RECOVERY_COUNT";

/// Process-wide runtime configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub max_workers: u32,
    pub ringbuf_size: u32,
    pub pacer_min_interval: u64,
    pub pacer_max_interval: u64,
    pub defensive_recovery_count: u32,
    scb_map: Option<String>,
    hint_ringbuf: Option<String>,
    global_pressure_map: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            max_workers: MAX_WORKERS,
            ringbuf_size: RINGBUF_SIZE,
            pacer_min_interval: parse_env_u64(ENV_PACER_MIN_INTERVAL, DEFAULT_PACER_MIN_INTERVAL),
            pacer_max_interval: parse_env_u64(ENV_PACER_MAX_INTERVAL, DEFAULT_PACER_MAX_INTERVAL),
            defensive_recovery_count: parse_env_u32(
                ENV_DEFENSIVE_RECOVERY_COUNT,
                DEFAULT_DEFENSIVE_RECOVERY_COUNT,
            ),
            scb_map: env::var(ENV_SCB_MAP).ok(),
            hint_ringbuf: env::var(ENV_HINT_RINGBUF).ok(),
            global_pressure_map: env::var(ENV_GLOBAL_PRESSURE_MAP).ok(),
        }
    }

    pub fn scb_map_path(&self) -> io::Result<&str> {
        self.scb_map.as_deref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "MORPHEUS_SCB_MAP is not set")
        })
    }

    pub fn hint_ringbuf_path(&self) -> Option<&str> {
        self.hint_ringbuf.as_deref()
    }

    pub fn global_pressure_map_path(&self) -> Option<&str> {
        self.global_pressure_map.as_deref()
    }
}

fn parse_env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %v, "invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn parse_env_u32(name: &str, default: u32) -> u32 {
    match env::var(name) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %v, "invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}
