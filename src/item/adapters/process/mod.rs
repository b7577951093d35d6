//! OS process adapter for the supervisor port.

mod signal;
mod supervisor;

pub use supervisor::TokioProcessSupervisor;
