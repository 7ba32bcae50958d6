//! Periodic tasks: the checkpointed poller and the verification sweep,
//! sharing one backoff abstraction.

pub mod backoff;
pub mod poller;
pub mod sweep;

pub use backoff::{Backoff, BackoffPolicy};
pub use poller::{PollSummary, Poller, PollerSettings, WATCHER_CHECKPOINT};
pub use sweep::{SweepSettings, SweepSummary, VerificationSweep};
