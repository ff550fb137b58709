//! CLI utilities for hubgate
//!
//! This crate provides:
//! - SQLite-based decision storage
//! - Terminal consent prompts
//! - A settings listing of stored decisions
//! - A JSON configuration file that wires these into a coordinator

pub mod config;
mod error;
pub mod prompt;
pub mod settings;
pub mod store;

pub use config::{load_config_file, ConsentConfig};
pub use error::CliError;
pub use prompt::{
    parse_choice, print_confirmation, print_prompt, LineReader, StdinReader, TerminalPromptSink,
};
pub use settings::{format_decision, format_decisions, print_decisions};
pub use store::SqliteDecisionStore;
