//! CLI command implementations

pub mod cat;
pub mod configure;
pub mod cp;
pub mod ls;
pub mod mb;
pub mod policy;
pub mod presign;
pub mod rb;
pub mod rm;
pub mod stat;
pub mod watch;

use crate::config::Config;
use crate::s3_client::create_client;
use crate::OutputFormat;
use anyhow::Result;
use quiver_client::Client;
use serde::Serialize;

/// Context passed to all commands
pub struct CommandContext {
    pub config: Config,
    pub profile: Option<String>,
    pub output_format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn client(&self) -> Result<Client> {
        create_client(&self.config)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print info message if not quiet
    pub fn info(&self, msg: &str) {
        if !self.quiet && !self.is_json() {
            println!("{}", msg);
        }
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg);
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
