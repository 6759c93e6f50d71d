//! Campaign execution for matbench.
//!
//! An [`ExperimentDescription`] is expanded into lazy [`Combinations`]; the
//! [`Scheduler`] skips the ones a [`Registry`](matbench_store::Registry)
//! already records and passes the others to an [`ExecutionBackend`]: a dry
//! preview, a local synchronous runner, or a remote bash script emitter.

pub mod backend;
pub mod description;
mod expand;
mod interrupt;
mod report;
mod run_id;
pub mod scheduler;

pub use backend::{DryRun, ExecOutcome, ExecRequest, ExecutionBackend, LocalBackend, RemoteScript};
pub use description::{load_description, ExperimentDescription, ExperimentSettings, SettingSpec};
pub use expand::Combinations;
pub use interrupt::InterruptFlag;
pub use report::{RunCounters, RunReport};
pub use run_id::{new_run_id, ClockRunIds, RunIdSource};
pub use scheduler::{apply_extra, CombinationState, Scheduler};
