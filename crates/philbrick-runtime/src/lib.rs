//! Command-queue service for a Philbrick machine.
//!
//! The machine lives on a dedicated thread. Clients talk to it through a
//! cloneable [`MachineHandle`]; every request is queued and answered in
//! arrival order, so graph edits and clock advances never interleave.
//!
//! While a run is executing the service keeps serving the queue between
//! steps: reads are answered, cancel and shutdown stop the run, and edits
//! are refused with [`EngineStateError::RunInProgress`](philbrick::EngineStateError).

mod command;
mod service;

pub use command::{Command, Reply, RunSummary, Snapshot};
pub use service::{MachineHandle, MachineService};
