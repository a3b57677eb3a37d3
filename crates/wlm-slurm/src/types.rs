//! SLURM job and partition types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use wlm_parsers::Field;

/// One job as reported by `scontrol show jobid`.
///
/// Array jobs expand to one `JobInfo` per task, all sharing `array_job_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: String,
    pub user_id: String,
    pub array_job_id: String,
    pub name: String,
    /// Raw `exit_code:signal` pair.
    pub exit_code: String,
    /// Scheduler state token, e.g. `RUNNING` or `COMPLETED`.
    pub state: String,
    pub submit_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    /// Unset when the scheduler reports it as unlimited. Integer
    /// nanoseconds in JSON.
    #[serde(with = "opt_nanos", default)]
    pub run_time: Option<Duration>,
    /// Unset when the scheduler reports it as unlimited. Integer
    /// nanoseconds in JSON.
    #[serde(with = "opt_nanos", default)]
    pub time_limit: Option<Duration>,
    pub work_dir: String,
    pub std_out: String,
    pub std_err: String,
    pub partition: String,
    pub node_list: String,
    pub batch_host: String,
    pub num_nodes: String,
}

/// `Option<Duration>` as an integer count of nanoseconds, or `null`.
mod opt_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, ser};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => {
                let nanos = u64::try_from(d.as_nanos())
                    .map_err(|_| ser::Error::custom(format!("duration {d:?} overflows nanoseconds")))?;
                serializer.serialize_some(&nanos)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_nanos))
    }
}

/// scontrol key -> JobInfo field. Keys not listed here are ignored.
pub const JOB_INFO_FIELDS: &[Field<'static, JobInfo>] = &[
    Field::text("JobId", |j: &mut JobInfo, v| j.id = v),
    Field::text("UserId", |j: &mut JobInfo, v| j.user_id = v),
    Field::text("ArrayJobId", |j: &mut JobInfo, v| j.array_job_id = v),
    Field::text("JobName", |j: &mut JobInfo, v| j.name = v),
    Field::text("ExitCode", |j: &mut JobInfo, v| j.exit_code = v),
    Field::text("JobState", |j: &mut JobInfo, v| j.state = v),
    Field::time("SubmitTime", |j: &mut JobInfo, v| j.submit_time = Some(v)),
    Field::time("StartTime", |j: &mut JobInfo, v| j.start_time = Some(v)),
    Field::duration("RunTime", |j: &mut JobInfo, v| j.run_time = Some(v)),
    Field::duration("TimeLimit", |j: &mut JobInfo, v| j.time_limit = Some(v)),
    Field::text("WorkDir", |j: &mut JobInfo, v| j.work_dir = v),
    Field::text("StdOut", |j: &mut JobInfo, v| j.std_out = v),
    Field::text("StdErr", |j: &mut JobInfo, v| j.std_err = v),
    Field::text("Partition", |j: &mut JobInfo, v| j.partition = v),
    Field::text("NodeList", |j: &mut JobInfo, v| j.node_list = v),
    Field::text("BatchHost", |j: &mut JobInfo, v| j.batch_host = v),
    Field::text("NumNodes", |j: &mut JobInfo, v| j.num_nodes = v),
];

/// One row of `sacct` history for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStepInfo {
    /// Step id, e.g. `42`, `42.batch` or `42.0`.
    pub id: String,
    pub name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: i32,
    pub state: String,
}

/// A capability advertised by a partition.
///
/// Nothing populates these yet; [`Resources::features`] is always empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub version: String,
    pub quantity: u64,
}

/// Capacity snapshot of one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub nodes: u64,
    /// Megabytes; 0 when the partition does not cap memory.
    pub mem_per_node: u64,
    pub cpu_per_node: u64,
    /// None means unlimited. Integer nanoseconds in JSON.
    #[serde(with = "opt_nanos", default)]
    pub wall_time: Option<Duration>,
    pub features: Vec<Feature>,
}

/// Partition-detail keys read into [`Resources`].
///
/// Slurm has renamed partition keys between releases, so the names are
/// configurable rather than fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKeys {
    /// Node count of the partition.
    pub nodes: String,
    /// CPU count summed over all nodes; divided by `nodes` for the per-node value.
    pub total_cpus: String,
    /// Per-node memory cap.
    pub mem_per_node: String,
    /// Wall-time ceiling.
    pub wall_time: String,
}

impl Default for ResourceKeys {
    fn default() -> Self {
        Self {
            nodes: "TotalNodes".to_string(),
            total_cpus: "TotalCPUs".to_string(),
            mem_per_node: "MaxMemPerNode".to_string(),
            wall_time: "MaxTime".to_string(),
        }
    }
}
