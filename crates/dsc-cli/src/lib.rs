//! # dsc-cli — Dataspace Connector Command-Line Interface
//!
//! ## Subcommands
//!
//! - `policy list` — registered policy templates with their descriptions
//! - `policy show <key>` — one template as JSON
//! - `policy evaluate` — evaluate a template or a policy file against
//!   attributes given on the command line or in a context file
//! - `demo` — run the full provider/consumer handshake in-process
//!
//! Argument parsing lives next to each handler; handlers return a
//! [`Report`] and `main` decides how to print it and which exit code to use.

pub mod demo;
pub mod policy;

use serde_json::Value;

/// What a subcommand produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Printed as pretty JSON on stdout.
    pub output: Value,
    /// `false` maps to a non-zero exit code (e.g. a denied evaluation).
    pub success: bool,
}

impl Report {
    pub fn ok(output: Value) -> Self {
        Self {
            output,
            success: true,
        }
    }

    pub fn failed(output: Value) -> Self {
        Self {
            output,
            success: false,
        }
    }
}
