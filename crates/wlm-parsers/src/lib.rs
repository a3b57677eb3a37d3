//! Shared parsing utilities for Slurm command output.
//!
//! This crate turns the text printed by the Slurm command-line tools into
//! typed values: timestamps, durations, memory sizes, and `Key=Value`
//! records mapped through declarative field tables.

pub mod command;
pub mod memory;
pub mod record;
pub mod time;

pub use command::{CommandError, CommandOutput, capture_command, find_binary, run_command};
pub use memory::parse_memory_mb;
pub use record::{Field, RawRecord, RecordError, Setter, fill_record, parse_key_values, split_blocks};
pub use time::{DurationError, TimeError, parse_duration, parse_exit_code, parse_slurm_timestamp};

/// Split a `|`-separated line (sacct `--parsable` style), requiring at
/// least `min_fields` pieces. Extra trailing pieces are kept.
pub fn split_delimited(line: &str, min_fields: usize) -> Result<Vec<&str>, String> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < min_fields {
        return Err(format!(
            "expected {min_fields} '|'-separated fields, got {}: {line:?}",
            fields.len()
        ));
    }
    Ok(fields)
}
