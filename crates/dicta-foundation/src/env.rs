//! Environment flags controlling terminal output and startup behaviour.
//!
//! The stdout transport is protocol-bearing, so diagnostic output stays in
//! the log file unless explicitly requested:
//!
//! - `CT_VERBOSE=1` mirrors every log label to stdout.
//! - `CT_LOG_WHITELIST=LABEL1,LABEL2` mirrors only the named labels.
//! - `CT_LIGHT_MODE=1` skips heavy model loads at startup.

use std::env;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TerminalPolicy {
    pub verbose: bool,
    pub whitelist: Vec<String>,
}

impl TerminalPolicy {
    pub fn from_env() -> Self {
        Self {
            verbose: flag_set("CT_VERBOSE"),
            whitelist: env::var("CT_LOG_WHITELIST")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Whether a log label may be echoed to the terminal.
    pub fn allows(&self, label: &str) -> bool {
        self.verbose || self.whitelist.iter().any(|w| w == label)
    }
}

/// True when heavy model loads should be skipped at startup.
pub fn light_mode() -> bool {
    flag_set("CT_LIGHT_MODE")
}

fn flag_set(name: &str) -> bool {
    env::var(name).map(|v| v == "1").unwrap_or(false)
}
