//! Query SLURM job history via sacct.

use crate::types::JobStepInfo;
use wlm_parsers::{TimeError, parse_exit_code, parse_slurm_timestamp, split_delimited};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SacctError {
    #[error("{0}")]
    Fields(String),
    #[error("invalid exit code {0:?}")]
    ExitCode(String),
    #[error(transparent)]
    Time(#[from] TimeError),
}

/// Fields requested from sacct, in the order [`parse_sacct_line`] reads them.
pub const SACCT_FIELDS: &str = "start,end,exitcode,state,jobid,jobname";

/// Parse a single line of `sacct -p -n -o start,end,exitcode,state,jobid,jobname`.
///
/// `--parsable` ends every line with a trailing `|`, so the line has seven
/// pieces of which six are used.
fn parse_sacct_line(line: &str) -> Result<JobStepInfo, SacctError> {
    let fields = split_delimited(line, 6).map_err(SacctError::Fields)?;

    let exit_code =
        parse_exit_code(fields[2]).ok_or_else(|| SacctError::ExitCode(fields[2].to_string()))?;

    Ok(JobStepInfo {
        started_at: parse_slurm_timestamp(fields[0])?,
        finished_at: parse_slurm_timestamp(fields[1])?,
        exit_code,
        state: fields[3].to_string(),
        id: fields[4].to_string(),
        name: fields[5].to_string(),
    })
}

/// Parse sacct output, one step per non-empty line, in input order.
pub fn parse_sacct_response(output: &str) -> Result<Vec<JobStepInfo>, SacctError> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_sacct_line)
        .collect()
}
