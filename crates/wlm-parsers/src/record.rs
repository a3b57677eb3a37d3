//! `Key=Value` record parsing for scontrol-style output.
//!
//! scontrol prints one record per blank-line separated block, each block a
//! whitespace separated run of `Key=Value` tokens. Records are mapped onto
//! typed structs through a table of [`Field`]s: the scheduler key, how to
//! parse its value and where to store the result. Keys missing from the
//! table are ignored, and so are table entries missing from the input.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::memory::parse_memory_mb;
use crate::time::{DurationError, TimeError, parse_duration, parse_slurm_timestamp};

/// Raw `Key=Value` pairs of one block.
pub type RawRecord<'a> = HashMap<&'a str, &'a str>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("field {key}: {source}")]
    Time {
        key: String,
        #[source]
        source: TimeError,
    },
    #[error("field {key}: {source}")]
    Duration {
        key: String,
        #[source]
        source: DurationError,
    },
    #[error("field {key}: invalid value {value:?}")]
    Invalid { key: String, value: String },
}

/// How a field's value is parsed and stored.
pub enum Setter<T> {
    /// Stored verbatim.
    Text(fn(&mut T, String)),
    /// Slurm timestamp. Placeholders such as `Unknown` leave the field unset.
    Time(fn(&mut T, DateTime<Utc>)),
    /// Slurm duration. `UNLIMITED` leaves the field unset.
    Duration(fn(&mut T, Duration)),
    /// Non-negative integer.
    Count(fn(&mut T, u64)),
    /// Memory size in megabytes. `UNLIMITED` leaves the field unset.
    Memory(fn(&mut T, u64)),
}

/// One row of a field table.
pub struct Field<'a, T> {
    pub key: &'a str,
    pub setter: Setter<T>,
}

impl<'a, T> Field<'a, T> {
    pub const fn text(key: &'a str, set: fn(&mut T, String)) -> Self {
        Self {
            key,
            setter: Setter::Text(set),
        }
    }

    pub const fn time(key: &'a str, set: fn(&mut T, DateTime<Utc>)) -> Self {
        Self {
            key,
            setter: Setter::Time(set),
        }
    }

    pub const fn duration(key: &'a str, set: fn(&mut T, Duration)) -> Self {
        Self {
            key,
            setter: Setter::Duration(set),
        }
    }

    pub const fn count(key: &'a str, set: fn(&mut T, u64)) -> Self {
        Self {
            key,
            setter: Setter::Count(set),
        }
    }

    pub const fn memory(key: &'a str, set: fn(&mut T, u64)) -> Self {
        Self {
            key,
            setter: Setter::Memory(set),
        }
    }

    fn apply(&self, target: &mut T, value: &str) -> Result<(), RecordError> {
        match self.setter {
            Setter::Text(set) => set(target, value.to_string()),
            Setter::Time(set) => {
                let parsed = parse_slurm_timestamp(value).map_err(|source| RecordError::Time {
                    key: self.key.to_string(),
                    source,
                })?;
                if let Some(t) = parsed {
                    set(target, t);
                }
            }
            Setter::Duration(set) => match parse_duration(value) {
                Ok(d) => set(target, d),
                Err(DurationError::Unlimited) => {}
                Err(source) => {
                    return Err(RecordError::Duration {
                        key: self.key.to_string(),
                        source,
                    });
                }
            },
            Setter::Count(set) => {
                let n = value.trim().parse::<u64>().map_err(|_| self.invalid(value))?;
                set(target, n);
            }
            Setter::Memory(set) => {
                if value.eq_ignore_ascii_case("UNLIMITED") {
                    return Ok(());
                }
                let mb = parse_memory_mb(value).ok_or_else(|| self.invalid(value))?;
                set(target, mb);
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str) -> RecordError {
        RecordError::Invalid {
            key: self.key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Split one block into its `Key=Value` pairs.
///
/// Tokens that do not split into exactly two parts on `=` are skipped; they
/// are fragments of values with embedded spaces or nested assignments such
/// as `TRES=cpu=1,mem=4G`. A repeated key keeps its last value.
pub fn parse_key_values(block: &str) -> RawRecord<'_> {
    block
        .split_whitespace()
        .filter_map(|token| {
            let mut parts = token.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => Some((key, value)),
                _ => None,
            }
        })
        .collect()
}

/// Split command output into blank-line separated blocks.
pub fn split_blocks(output: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Build a `T` from raw pairs using a field table.
///
/// Entries are applied in table order; the first value that fails to parse
/// aborts the whole record.
pub fn fill_record<T: Default>(table: &[Field<'_, T>], raw: &RawRecord<'_>) -> Result<T, RecordError> {
    let mut record = T::default();
    for field in table {
        if let Some(value) = raw.get(field.key) {
            field.apply(&mut record, value)?;
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        name: String,
        started: Option<DateTime<Utc>>,
        limit: Option<Duration>,
        nodes: u64,
        mem_mb: u64,
    }

    const SAMPLE_FIELDS: &[Field<'static, Sample>] = &[
        Field::text("Name", |s: &mut Sample, v| s.name = v),
        Field::time("Start", |s: &mut Sample, v| s.started = Some(v)),
        Field::duration("Limit", |s: &mut Sample, v| s.limit = Some(v)),
        Field::count("Nodes", |s: &mut Sample, v| s.nodes = v),
        Field::memory("Mem", |s: &mut Sample, v| s.mem_mb = v),
    ];

    #[test]
    fn test_parse_key_values_skips_fragments() {
        let raw = parse_key_values("JobId=42 Reason=None TRES=cpu=1,mem=4G Command=/bin/run with args");
        assert_eq!(raw.get("JobId"), Some(&"42"));
        assert_eq!(raw.get("Reason"), Some(&"None"));
        assert_eq!(raw.get("Command"), Some(&"/bin/run"));
        assert!(!raw.contains_key("TRES"));
        assert_eq!(raw.len(), 3);
    }

    #[test]
    fn test_parse_key_values_keeps_empty_values() {
        let raw = parse_key_values("Comment= Name=x");
        assert_eq!(raw.get("Comment"), Some(&""));
    }

    #[test]
    fn test_split_blocks() {
        let output = "\nA=1 B=2\n   C=3\n\nA=4\n\n\n";
        let blocks = split_blocks(output);
        assert_eq!(blocks, vec!["A=1 B=2\n   C=3".to_string(), "A=4".to_string()]);
        assert!(split_blocks("  \n\n").is_empty());
    }

    #[test]
    fn test_fill_record() {
        let raw = parse_key_values(
            "Name=sample Start=2024-01-15T10:00:00 Limit=01:00:00 Nodes=3 Mem=4G Extra=ignored",
        );
        let sample: Sample = fill_record(SAMPLE_FIELDS, &raw).unwrap();
        assert_eq!(sample.name, "sample");
        assert!(sample.started.is_some());
        assert_eq!(sample.limit, Some(Duration::from_secs(3600)));
        assert_eq!(sample.nodes, 3);
        assert_eq!(sample.mem_mb, 4096);
    }

    #[test]
    fn test_fill_record_leaves_missing_and_unlimited_unset() {
        let raw = parse_key_values("Start=Unknown Limit=UNLIMITED Mem=UNLIMITED");
        let sample: Sample = fill_record(SAMPLE_FIELDS, &raw).unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn test_fill_record_reports_offending_value() {
        let raw = parse_key_values("Limit=soon");
        let err = fill_record::<Sample>(SAMPLE_FIELDS, &raw).unwrap_err();
        assert_eq!(
            err,
            RecordError::Duration {
                key: "Limit".to_string(),
                source: DurationError::Invalid("soon".to_string()),
            }
        );
        assert!(err.to_string().contains("soon"));

        let raw = parse_key_values("Nodes=many");
        let err = fill_record::<Sample>(SAMPLE_FIELDS, &raw).unwrap_err();
        assert!(matches!(err, RecordError::Invalid { ref key, ref value } if key == "Nodes" && value == "many"));
    }
}
