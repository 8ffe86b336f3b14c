//! Console logger.
//!
//! Implements `log::Log`. Progress messages (`info`) go to stdout bare, so the
//! normal output reads like plain status lines. Everything else goes to stderr
//! with a level prefix.

use anyhow::{anyhow, Result};
use log::{Level, LevelFilter, Metadata, Record};
use std::io::Write;

static LOGGER: ConsoleLogger = ConsoleLogger;

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().starts_with("strata")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match record.level() {
            Level::Info => println!("{}", record.args()),
            Level::Warn => eprintln!("warning: {}", record.args()),
            Level::Error => eprintln!("error: {}", record.args()),
            Level::Debug | Level::Trace => {
                eprintln!("[{}] {}", record.level().as_str().to_lowercase(), record.args());
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Pick the level: `--debug` wins, then `STRATA_LOG`, then info.
pub fn level_for(debug: bool, env: Option<&str>) -> LevelFilter {
    if debug {
        return LevelFilter::Debug;
    }
    env.and_then(|v| v.parse().ok()).unwrap_or(LevelFilter::Info)
}

/// Install the logger. Fails if a logger is already set.
pub fn init(max_level: LevelFilter) -> Result<()> {
    log::set_logger(&LOGGER).map_err(|e| anyhow!("Failed to set logger: {e}"))?;
    log::set_max_level(max_level);
    Ok(())
}
