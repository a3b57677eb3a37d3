//! Client for a local Slurm cluster that shells out to the Slurm binaries.

use std::fs::File;
use std::process::ExitStatus;

use camino::Utf8Path;
use thiserror::Error;
use tokio::process::Command;
use wlm_files::{ArchiveError, FileError, TailReader};
use wlm_parsers::{CommandError, RecordError, capture_command, find_binary, run_command};

use crate::sacct::{SACCT_FIELDS, SacctError, parse_sacct_response};
use crate::scontrol::{parse_job_info, parse_partition_names, parse_resources};
use crate::types::{JobInfo, JobStepInfo, ResourceKeys, Resources};

#[derive(Error, Debug)]
pub enum SlurmError {
    #[error("no slurm binaries found: {}", .0.join(", "))]
    MissingBinaries(Vec<String>),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("submission failed: sbatch {status}")]
    SubmitFailed { status: ExitStatus, output: String },
    #[error("could not parse job id from {0:?}")]
    InvalidJobId(String),
    #[error("cancellation failed: scancel {status}")]
    CancelFailed { status: ExitStatus, output: String },
    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: CommandError,
    },
    #[error("could not parse scontrol response: {0}")]
    InvalidRecord(#[from] RecordError),
    #[error("unable to parse sacct response: {0}")]
    InvalidSacct(#[from] SacctError),
    #[error("could not parse version output {0:?}")]
    InvalidVersion(String),
    #[error(transparent)]
    File(#[from] FileError),
    #[error("could not archive: {0}")]
    Archive(#[from] ArchiveError),
}

impl SlurmError {
    /// True when [`SlurmClient::open`] or [`SlurmClient::tail`] hit a missing file.
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, SlurmError::File(e) if e.is_not_found())
    }
}

/// Executables the client invokes.
///
/// Bare names are resolved on `PATH`; paths are used as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmBinaries {
    pub sbatch: String,
    pub scancel: String,
    pub scontrol: String,
    pub sacct: String,
    pub sinfo: String,
}

impl Default for SlurmBinaries {
    fn default() -> Self {
        Self {
            sbatch: "sbatch".to_string(),
            scancel: "scancel".to_string(),
            scontrol: "scontrol".to_string(),
            sacct: "sacct".to_string(),
            sinfo: "sinfo".to_string(),
        }
    }
}

impl SlurmBinaries {
    fn all(&self) -> [&str; 5] {
        [
            &self.sacct,
            &self.sbatch,
            &self.scancel,
            &self.scontrol,
            &self.sinfo,
        ]
    }
}

/// Talks to Slurm by running its command-line tools to completion.
///
/// The client holds no mutable state; clone it freely or share it between
/// tasks. Nothing is retried.
#[derive(Debug, Clone)]
pub struct SlurmClient {
    bins: SlurmBinaries,
    resource_keys: ResourceKeys,
}

impl SlurmClient {
    /// Client using the standard binary names, which must all be on `PATH`.
    pub fn new() -> Result<Self, SlurmError> {
        Self::with_binaries(SlurmBinaries::default())
    }

    /// Client using the given executables.
    ///
    /// Fails with [`SlurmError::MissingBinaries`] naming every executable
    /// that cannot be found.
    pub fn with_binaries(bins: SlurmBinaries) -> Result<Self, SlurmError> {
        let missing: Vec<String> = bins
            .all()
            .into_iter()
            .filter(|bin| find_binary(bin).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(SlurmError::MissingBinaries(missing));
        }

        Ok(Self {
            bins,
            resource_keys: ResourceKeys::default(),
        })
    }

    /// Override the partition keys read by [`SlurmClient::resources`].
    pub fn with_resource_keys(mut self, keys: ResourceKeys) -> Self {
        self.resource_keys = keys;
        self
    }

    /// Submit a batch script and return the new job id.
    ///
    /// The script is written to sbatch's stdin. An empty `partition` leaves
    /// the choice to Slurm.
    pub async fn submit(&self, script: &str, partition: Option<&str>) -> Result<u64, SlurmError> {
        let mut cmd = Command::new(&self.bins.sbatch);
        cmd.arg("--parsable");
        if let Some(partition) = partition.filter(|p| !p.is_empty()) {
            cmd.arg(format!("--partition={partition}"));
        }

        let output = capture_command(&mut cmd, "sbatch", Some(script.as_bytes())).await?;
        if !output.success() {
            let combined = output.combined();
            tracing::warn!(output = %combined.trim_end(), "sbatch failed");
            return Err(SlurmError::SubmitFailed {
                status: output.status,
                output: combined,
            });
        }

        let id = parse_job_id(&output.stdout)
            .ok_or_else(|| SlurmError::InvalidJobId(output.stdout.clone()))?;
        tracing::info!(job_id = id, "job submitted");
        Ok(id)
    }

    /// Cancel a job. Unknown or finished jobs are whatever scancel makes of them.
    pub async fn cancel(&self, job_id: u64) -> Result<(), SlurmError> {
        let mut cmd = Command::new(&self.bins.scancel);
        cmd.arg(job_id.to_string());

        let output = capture_command(&mut cmd, "scancel", None).await?;
        if !output.success() {
            let combined = output.combined();
            tracing::warn!(job_id, output = %combined.trim_end(), "scancel failed");
            return Err(SlurmError::CancelFailed {
                status: output.status,
                output: combined,
            });
        }
        Ok(())
    }

    /// Details of a job. Array jobs yield one entry per task.
    pub async fn job_info(&self, job_id: u64) -> Result<Vec<JobInfo>, SlurmError> {
        let mut cmd = Command::new(&self.bins.scontrol);
        cmd.args(["show", "jobid", &job_id.to_string()]);

        let stdout = run_command(&mut cmd, "scontrol")
            .await
            .map_err(|source| SlurmError::Query {
                context: format!("failed to get info for jobid {job_id}"),
                source,
            })?;

        Ok(parse_job_info(&stdout)?)
    }

    /// Accounting history of a job, one entry per step row.
    pub async fn job_steps(&self, job_id: u64) -> Result<Vec<JobStepInfo>, SlurmError> {
        let mut cmd = Command::new(&self.bins.sacct);
        cmd.args(["-p", "-n", "-j", &job_id.to_string(), "-o", SACCT_FIELDS]);

        let stdout = run_command(&mut cmd, "sacct")
            .await
            .map_err(|source| SlurmError::Query {
                context: format!("failed to get steps for jobid {job_id}"),
                source,
            })?;

        Ok(parse_sacct_response(&stdout)?)
    }

    /// Capacity of one partition.
    pub async fn resources(&self, partition: &str) -> Result<Resources, SlurmError> {
        let mut cmd = Command::new(&self.bins.scontrol);
        cmd.args(["show", "partition", partition]);

        let stdout = run_command(&mut cmd, "scontrol")
            .await
            .map_err(|source| SlurmError::Query {
                context: format!("could not get info for partition {partition}"),
                source,
            })?;

        Ok(parse_resources(&stdout, &self.resource_keys)?)
    }

    /// Names of all partitions.
    pub async fn partitions(&self) -> Result<Vec<String>, SlurmError> {
        let mut cmd = Command::new(&self.bins.scontrol);
        cmd.args(["show", "partition"]);

        let stdout = run_command(&mut cmd, "scontrol")
            .await
            .map_err(|source| SlurmError::Query {
                context: "could not get partition info".to_string(),
                source,
            })?;

        Ok(parse_partition_names(&stdout))
    }

    /// Slurm version, e.g. `21.08.5`.
    pub async fn version(&self) -> Result<String, SlurmError> {
        let mut cmd = Command::new(&self.bins.sinfo);
        cmd.arg("-V");

        let stdout = run_command(&mut cmd, "sinfo")
            .await
            .map_err(|source| SlurmError::Query {
                context: "could not get slurm info".to_string(),
                source,
            })?;

        parse_version(&stdout).ok_or(SlurmError::InvalidVersion(stdout))
    }

    /// Open a file for reading.
    pub fn open(&self, path: &Utf8Path) -> Result<File, SlurmError> {
        Ok(wlm_files::open(path)?)
    }

    /// Create a file for writing, along with its parent directories.
    pub fn create(&self, path: &Utf8Path) -> Result<File, SlurmError> {
        Ok(wlm_files::create(path)?)
    }

    /// Follow a file that may still be growing, such as a running job's log.
    pub fn tail(&self, path: &Utf8Path) -> Result<TailReader, SlurmError> {
        Ok(TailReader::open(path)?)
    }

    /// Zip `path` into `target`. Blocks while the tree is walked.
    pub fn zip(&self, path: &Utf8Path, target: &Utf8Path) -> Result<(), SlurmError> {
        Ok(wlm_files::zip_tree(path, target)?)
    }

    /// Extract the zip at `source` below `path`. Blocks while extracting.
    pub fn unzip(&self, source: &Utf8Path, path: &Utf8Path) -> Result<(), SlurmError> {
        Ok(wlm_files::unzip_archive(source, path)?)
    }
}

/// `sbatch --parsable` prints `<id>` or `<id>;<cluster>`.
fn parse_job_id(stdout: &str) -> Option<u64> {
    let line = stdout.trim();
    let id = line.split_once(';').map_or(line, |(id, _cluster)| id);
    id.trim().parse().ok()
}

/// `sinfo -V` prints `slurm <version>`.
fn parse_version(stdout: &str) -> Option<String> {
    let fields: Vec<&str> = stdout.trim().split(' ').collect();
    match fields.as_slice() {
        [_, version] if !version.is_empty() => Some(version.to_string()),
        _ => None,
    }
}
