//! Parse `scontrol show` output for jobs and partitions.

use std::time::Duration;

use wlm_parsers::{Field, RecordError, fill_record, parse_key_values, split_blocks};

use crate::types::{JOB_INFO_FIELDS, JobInfo, ResourceKeys, Resources};

/// Parse `scontrol show jobid <id>` output into one `JobInfo` per block.
pub fn parse_job_info(output: &str) -> Result<Vec<JobInfo>, RecordError> {
    split_blocks(output)
        .iter()
        .map(|block| fill_record(JOB_INFO_FIELDS, &parse_key_values(block)))
        .collect()
}

/// Partition-wide totals before they are turned into per-node numbers.
#[derive(Debug, Default)]
struct PartitionTotals {
    nodes: u64,
    cpus: u64,
    mem_per_node: u64,
    wall_time: Option<Duration>,
}

fn partition_fields(keys: &ResourceKeys) -> [Field<'_, PartitionTotals>; 4] {
    [
        Field::count(&keys.nodes, |p: &mut PartitionTotals, v| p.nodes = v),
        Field::count(&keys.total_cpus, |p: &mut PartitionTotals, v| p.cpus = v),
        Field::memory(&keys.mem_per_node, |p: &mut PartitionTotals, v| {
            p.mem_per_node = v
        }),
        Field::duration(&keys.wall_time, |p: &mut PartitionTotals, v| {
            p.wall_time = Some(v)
        }),
    ]
}

/// Parse `scontrol show partition <name>` output into a capacity snapshot.
///
/// Only the first block is read. An `UNLIMITED` wall time leaves
/// `wall_time` unset.
pub fn parse_resources(output: &str, keys: &ResourceKeys) -> Result<Resources, RecordError> {
    let blocks = split_blocks(output);
    let Some(block) = blocks.first() else {
        return Ok(Resources::default());
    };

    let totals: PartitionTotals = fill_record(&partition_fields(keys), &parse_key_values(block))?;
    let cpu_per_node = if totals.nodes > 0 {
        totals.cpus / totals.nodes
    } else {
        0
    };

    Ok(Resources {
        nodes: totals.nodes,
        mem_per_node: totals.mem_per_node,
        cpu_per_node,
        wall_time: totals.wall_time,
        features: Vec::new(),
    })
}

/// Extract partition names from `scontrol show partition` output, in
/// first-seen order without duplicates.
pub fn parse_partition_names(output: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for block in split_blocks(output) {
        if let Some(name) = parse_key_values(&block).get("PartitionName") {
            if !names.iter().any(|n| n == *name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlm_parsers::DurationError;

    const RUNNING_JOB: &str = "\
JobId=12345 JobName=align_reads
   UserId=alice(1000) GroupId=lab(1000) MCS_label=N/A
   Priority=4294901758 Nice=0 Account=(null) QOS=normal
   JobState=RUNNING Reason=None Dependency=(null)
   Requeue=1 Restarts=0 BatchFlag=1 Reboot=0 ExitCode=0:0
   RunTime=00:05:12 TimeLimit=01:00:00 TimeMin=N/A
   SubmitTime=2024-01-15T10:00:00 EligibleTime=2024-01-15T10:00:00
   StartTime=2024-01-15T10:01:00 EndTime=2024-01-15T11:01:00 Deadline=N/A
   Partition=short AllocNode:Sid=login01:4242
   NodeList=node[01-02] BatchHost=node01
   NumNodes=2 NumCPUs=8 NumTasks=2 CPUs/Task=4 ReqB:S:C:T=0:0:*:*
   TRES=cpu=8,mem=16G,node=2,billing=8
   Command=/home/alice/run.sh
   WorkDir=/home/alice/project
   StdErr=/home/alice/project/slurm-12345.err
   StdIn=/dev/null
   StdOut=/home/alice/project/slurm-12345.out
";

    #[test]
    fn test_parse_job_info_running_job() {
        let jobs = parse_job_info(RUNNING_JOB).unwrap();
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.id, "12345");
        assert_eq!(job.name, "align_reads");
        assert_eq!(job.user_id, "alice(1000)");
        assert_eq!(job.state, "RUNNING");
        assert_eq!(job.exit_code, "0:0");
        assert_eq!(job.run_time, Some(Duration::from_secs(312)));
        assert_eq!(job.time_limit, Some(Duration::from_secs(3600)));
        assert_eq!(
            job.submit_time.unwrap().format("%Y-%m-%dT%H:%M:%S").to_string(),
            "2024-01-15T10:00:00"
        );
        assert!(job.start_time.is_some());
        assert_eq!(job.partition, "short");
        assert_eq!(job.node_list, "node[01-02]");
        assert_eq!(job.batch_host, "node01");
        assert_eq!(job.num_nodes, "2");
        assert_eq!(job.work_dir, "/home/alice/project");
        assert_eq!(job.std_out, "/home/alice/project/slurm-12345.out");
        assert_eq!(job.std_err, "/home/alice/project/slurm-12345.err");
        assert_eq!(job.array_job_id, "");
    }

    #[test]
    fn test_parse_job_info_array_job() {
        let output = "\
JobId=101 ArrayJobId=100 ArrayTaskId=1 JobName=sweep JobState=COMPLETED
   TimeLimit=UNLIMITED StartTime=Unknown

JobId=102 ArrayJobId=100 ArrayTaskId=2 JobName=sweep JobState=PENDING
   TimeLimit=UNLIMITED StartTime=Unknown
";
        let jobs = parse_job_info(output).unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.array_job_id == "100"));
        assert_eq!(jobs[0].id, "101");
        assert_eq!(jobs[1].id, "102");
        assert!(jobs.iter().all(|j| j.time_limit.is_none()));
        assert!(jobs.iter().all(|j| j.start_time.is_none()));
    }

    #[test]
    fn test_parse_job_info_bad_duration_aborts() {
        let err = parse_job_info("JobId=1 RunTime=later").unwrap_err();
        assert_eq!(
            err,
            RecordError::Duration {
                key: "RunTime".to_string(),
                source: DurationError::Invalid("later".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_job_info_bad_time_aborts() {
        let err = parse_job_info("JobId=1 SubmitTime=yesterday").unwrap_err();
        assert!(matches!(err, RecordError::Time { ref key, .. } if key == "SubmitTime"));
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_parse_job_info_empty_output() {
        assert!(parse_job_info("\n").unwrap().is_empty());
    }

    const PARTITIONS: &str = "\
PartitionName=debug
   AllowGroups=ALL AllowAccounts=ALL AllowQos=ALL
   Default=YES QoS=N/A
   MaxNodes=UNLIMITED MaxTime=UNLIMITED MinNodes=0 LLN=NO MaxCPUsPerNode=UNLIMITED
   Nodes=node[01-04]
   State=UP TotalCPUs=16 TotalNodes=4 SelectTypeParameters=NONE
   DefMemPerNode=UNLIMITED MaxMemPerNode=UNLIMITED

PartitionName=gpu
   MaxTime=2-00:00:00
   State=UP TotalCPUs=64 TotalNodes=2
   MaxMemPerNode=256000

PartitionName=debug
   State=DOWN
";

    #[test]
    fn test_parse_partition_names() {
        assert_eq!(parse_partition_names(PARTITIONS), vec!["debug", "gpu"]);
        assert!(parse_partition_names("").is_empty());
    }

    #[test]
    fn test_parse_resources_unlimited() {
        let debug = PARTITIONS.split("\n\n").next().unwrap();
        let res = parse_resources(debug, &ResourceKeys::default()).unwrap();
        assert_eq!(res.nodes, 4);
        assert_eq!(res.cpu_per_node, 4);
        assert_eq!(res.mem_per_node, 0);
        assert_eq!(res.wall_time, None);
        assert!(res.features.is_empty());
    }

    #[test]
    fn test_parse_resources_limits() {
        let gpu = PARTITIONS.split("\n\n").nth(1).unwrap();
        let res = parse_resources(gpu, &ResourceKeys::default()).unwrap();
        assert_eq!(res.nodes, 2);
        assert_eq!(res.cpu_per_node, 32);
        assert_eq!(res.mem_per_node, 256000);
        assert_eq!(res.wall_time, Some(Duration::from_secs(2 * 86400)));
    }

    #[test]
    fn test_parse_resources_custom_keys() {
        let keys = ResourceKeys {
            nodes: "Nodes".to_string(),
            total_cpus: "CPUs".to_string(),
            mem_per_node: "Mem".to_string(),
            wall_time: "Wall".to_string(),
        };
        let res = parse_resources("Nodes=3 CPUs=12 Mem=8G Wall=30", &keys).unwrap();
        assert_eq!(res.nodes, 3);
        assert_eq!(res.cpu_per_node, 4);
        assert_eq!(res.mem_per_node, 8192);
        assert_eq!(res.wall_time, Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_parse_resources_zero_nodes() {
        let res = parse_resources("TotalNodes=0 TotalCPUs=0", &ResourceKeys::default()).unwrap();
        assert_eq!(res.cpu_per_node, 0);
    }
}
