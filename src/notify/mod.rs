//! Update and notification lifecycle
//!
//! - [`lifecycle`]: worker update state machine
//! - [`poller`]: periodic and on-focus update checks
//! - [`push`]: push payload normalization and click handling

pub mod lifecycle;
pub mod poller;
pub mod push;

pub use lifecycle::{LifecycleEvent, UpdateLifecycle, WorkerState};
pub use poller::{run_update_poller, script_digest, HttpUpdateChecker, UpdateChecker, UpdateDetected};
pub use push::{handle_click, normalize_push, ClickOutcome, Notification};
