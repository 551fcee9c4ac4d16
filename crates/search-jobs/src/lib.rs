//! Search-Jobs: Composable Job Combinators for the Search Engine
//!
//! Re-exports the job tree, its combinators and the supporting pieces a
//! query planner needs to build and run one.
//!
//! ## Layer 1 - Jobs
//!
//! Focus: Running trees of cancellable search jobs and merging what they
//! stream. Backends plug in as [`LeafJob`]s.
//!
//! ## Key Components
//!
//! - `Job`: closed set of combinators plus opaque leaves
//! - `RepoPagerJob`: binds a template to each page of resolved repositories
//! - `Mapper` / `order_racing_jobs`: side-effect-free tree rewrites
//! - `execute`: runs a tree as one observed query

pub mod assemble;
pub mod combinators;
pub mod config;
pub mod engine;
pub mod fakes;
pub mod job;
pub mod mapper;
pub mod metrics;
pub mod obs;
pub mod repo_pager;
pub mod streaming;
pub mod telemetry;

pub use job::{Job, JobKind, LeafHandle, LeafJob};

pub use combinators::{
    apply_sub_repo_filtering, AlertJob, AndJob, LimitJob, OrJob, ParallelJob, PriorityJob,
    SanitizeJob, SelectJob, SequentialJob, SubRepoPermsFilterJob, TimeoutJob,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_PRIORITY_GRACE,
};

pub use streaming::{
    CountingSender, DedupSender, Deduper, LimitSender, Merger, SelectSender,
    StatsObservingSender,
};

pub use repo_pager::{PartialJob, RepoPagerJob, ReposPartialJob};

pub use mapper::{map_kind, order_racing_jobs, Mapper};

pub use assemble::{
    and_job, and_operands, plan_job, priority_job, BasicJobWrapping, RacingOrder,
};

pub use config::{ConfigError, EngineConfig};

pub use engine::execute;

pub use metrics::METRICS;

pub use telemetry::{init_tracing, init_tracing_from_env, LogFormat};
