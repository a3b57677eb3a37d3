//! SLURM integration for the workload bridge.
//!
//! Submit, cancel and inspect jobs via sbatch, scancel, scontrol, sacct
//! and sinfo.

pub mod client;
pub mod sacct;
pub mod scontrol;
pub mod types;

pub use client::{SlurmBinaries, SlurmClient, SlurmError};
pub use types::{Feature, JobInfo, JobStepInfo, ResourceKeys, Resources};
