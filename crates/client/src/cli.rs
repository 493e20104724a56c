// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The `keel` command line.
//!
//! Every subcommand goes through [`Client`], so the CLI sees the same
//! caching, fallback, and error behavior as library callers.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use kl_core::command::batch_requests;
use kl_core::{Method, Request};
use serde_json::Value;
use thiserror::Error;

use crate::batch;
use crate::client::Client;
use crate::config::{default_config_path, ClientConfig, ConfigError};
use crate::error::ClientError;

const QUICKSTART_HELP: &str = "\
Examples:
  keel request get --body '{\"name\":\"k\"}'
  keel request set --method post --body '{\"name\":\"k\",\"value\":1}'
  keel batch requests.json
  keel status";

#[derive(Parser, Debug)]
#[command(name = "keel", version)]
#[command(about = "Send requests to a remote data service")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Config file [default: $XDG_CONFIG_HOME/keel/config.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Issue a single request and print its result
    Request {
        /// Command name, e.g. get, set, add
        command: String,

        /// Request body as JSON
        #[arg(short, long, default_value = "{}")]
        body: String,

        /// HTTP-style method
        #[arg(short, long, value_enum, default_value_t = MethodArg::Get)]
        method: MethodArg,
    },

    /// Send the requests in a JSON file as one batch
    ///
    /// The file holds an array of {command, body, method} objects, or an
    /// object with such an array under "requests".
    Batch {
        /// Path to the batch file
        file: PathBuf,
    },

    /// Show configured transports and try the persistent channel
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Get,
    Post,
    Delete,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Get => Method::Get,
            MethodArg::Post => Method::Post,
            MethodArg::Delete => Method::Delete,
        }
    }
}

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("invalid JSON body: {0}")]
    InvalidBody(String),

    #[error("invalid batch file {path}: {message}")]
    InvalidBatch { path: PathBuf, message: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type CliResult<T> = Result<T, CliError>;

/// Installs the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file (explicit path, else the default location if it
/// exists, else defaults) and applies environment overrides.
pub fn load_config(path: Option<&Path>) -> CliResult<ClientConfig> {
    let mut config = match path {
        Some(path) => ClientConfig::load(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => ClientConfig::load(&path)?,
            None => ClientConfig::default(),
        },
    };
    config.apply_env();
    Ok(config)
}

pub async fn run(cli: Cli) -> CliResult<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Request {
            command,
            body,
            method,
        } => {
            let body = parse_body(&body)?;
            let client = Client::new(&config)?;
            let result = client
                .request_value(Request::new(command, body, method.into()))
                .await;
            client.close().await;
            print_json(&result?);
        }
        Command::Batch { file } => {
            let requests = read_batch_file(&file)?;
            let client = Client::new(&config)?;
            let results = client.batch(requests).await;
            client.close().await;
            print_json(&batch::report(&results?));
        }
        Command::Status => {
            let client = Client::new(&config)?;
            let kinds: Vec<String> = client.transports().iter().map(ToString::to_string).collect();
            println!("transports: {}", kinds.join(", "));
            if client.connection_state().is_some() {
                if let Err(e) = client.warm_up().await {
                    println!("channel unavailable: {}", e);
                }
            }
            println!("{}", client.status());
            client.close().await;
        }
    }
    Ok(())
}

fn parse_body(body: &str) -> CliResult<Value> {
    serde_json::from_str(body).map_err(|e| CliError::InvalidBody(e.to_string()))
}

/// Reads `[{command, body, method}, ..]` or `{"requests": [..]}`.
pub fn read_batch_file(path: &Path) -> CliResult<Vec<Request>> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let invalid = |message: String| CliError::InvalidBatch {
        path: path.to_path_buf(),
        message,
    };
    let value: Value = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    match value {
        Value::Array(_) => serde_json::from_value(value).map_err(|e| invalid(e.to_string())),
        other => batch_requests(&other).map_err(|e| invalid(e.to_string())),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
