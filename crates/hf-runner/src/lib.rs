//! hf-runner: the actuation simulation pipeline.
//!
//! ```text
//! broker ─► Intake ─► work queue ─► MirrorLane / GraphWorker ─► Publisher ─► broker
//!                                          ▲
//!                         FixtureRunner ───┘ (ticks, start/stop)
//! ```
//!
//! Broker callbacks only enqueue. All waiting, evaluation and broker writes
//! happen on runner-owned worker threads.

pub mod error;
pub mod handles;
pub mod intake;
pub mod lifecycle;
pub mod options;
pub mod publisher;
pub mod scheduler;
pub mod stats;
pub mod work;

pub use error::{RuntimeFault, StartupError, StartupResult};
pub use handles::HandleTable;
pub use intake::Intake;
pub use lifecycle::{EngineFactory, FixtureRunner, LifecycleState, StopSignal};
pub use options::RunnerOptions;
pub use publisher::Publisher;
pub use stats::{RunnerStats, StatsSnapshot};
pub use work::{PendingWork, WorkItem};
