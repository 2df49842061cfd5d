/*!
 * Server Configuration
 */

use std::time::Duration;

use anyhow::{bail, Result};

use crate::aof::FsyncPolicy;

/// Redis-compatible default port.
pub const DEFAULT_PORT: u16 = 6379;
/// Log file name, relative to the working directory.
pub const DEFAULT_AOF_PATH: &str = "appendonly.aof";

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub aof_path: String,
    pub fsync: FsyncPolicy,
    /// Period of the reactor's housekeeping callback.
    pub tick_interval: Duration,
    /// Readiness events drained per wait.
    pub max_events: usize,
    /// Keys collected per active-expiry cycle.
    pub active_expire_batch: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            aof_path: DEFAULT_AOF_PATH.to_string(),
            fsync: FsyncPolicy::EverySec,
            tick_interval: Duration::from_millis(100),
            max_events: 128,
            active_expire_batch: 200,
        }
    }
}

impl Config {
    /// CLI surface: one optional positional argument, the TCP port.
    pub fn from_args(args: impl Iterator<Item = String>) -> Result<Config> {
        let mut config = Config::default();
        let mut args = args.skip(1);
        if let Some(arg) = args.next() {
            match arg.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => bail!("invalid port '{}'", arg),
            }
        }
        Ok(config)
    }
}
