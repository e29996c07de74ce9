//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `dutycheck` exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success, invoice and checklist agree                           |
//! | 1    | Discrepancies found (difference report is non-empty)           |
//! | 2    | CLI usage error (bad args, nothing to reconcile)               |
//! | 3    | Invalid configuration (TOML parse or validation failure)       |
//! | 4    | Degraded run (an input stage failed and was replaced by empty) |
//! | 5    | Output write failure                                           |
//!
//! A degraded run reports 4 even when discrepancies were also found,
//! since the report is known to be incomplete.
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

/// Success - command completed and nothing needs revising.
pub const EXIT_SUCCESS: u8 = 0;

/// Differences found between invoice and checklist.
/// Like `diff(1)`, exit 1 means "inputs differ."
pub const EXIT_DISCREPANCIES: u8 = 1;

/// Usage error - bad arguments, missing required inputs.
pub const EXIT_USAGE: u8 = 2;

/// Config file failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// At least one stage failed; results are partial.
pub const EXIT_DEGRADED: u8 = 4;

/// An output file or the JSON document could not be written.
pub const EXIT_WRITE_FAILED: u8 = 5;
