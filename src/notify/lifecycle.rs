//! Worker update state machine
//!
//! Tracks the lifecycle of a newly installed worker script and tells the
//! host when to prompt, when to ask the worker to take over and when to
//! reload.

use std::fmt;

/// Lifecycle state of the newest worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    None,
    Installing,
    /// Installed and waiting for the current worker to let go
    InstalledWaiting,
    Activating,
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Installing => "installing",
            Self::InstalledWaiting => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
        };
        write!(f, "{}", name)
    }
}

/// Action the host must take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Show the "new version available" prompt
    UpdateAvailable,
    /// Tell the waiting worker to skip waiting
    SkipWaiting,
    /// Reload the application
    Reload,
}

/// Update flow for one page lifetime
///
/// An update is only offered when a worker already controls the page; on
/// first install there is nothing to replace. Each event fires at most once
/// per waiting worker.
#[derive(Debug, Clone, Default)]
pub struct UpdateLifecycle {
    state: WorkerState,
    controlled: bool,
    prompted: bool,
    showing: bool,
    accepted: bool,
}

impl UpdateLifecycle {
    /// Create the state machine
    ///
    /// # Arguments
    ///
    /// * `controlled` - Whether an active worker already controls the page
    pub fn new(controlled: bool) -> Self {
        Self {
            controlled,
            ..Self::default()
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Whether the update prompt is currently showing
    pub fn update_pending(&self) -> bool {
        self.showing
    }

    /// Feed a state change of the newest worker
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::notify::{LifecycleEvent, UpdateLifecycle, WorkerState};
    ///
    /// let mut lifecycle = UpdateLifecycle::new(true);
    /// assert_eq!(lifecycle.on_worker_state(WorkerState::Installing), None);
    /// assert_eq!(
    ///     lifecycle.on_worker_state(WorkerState::InstalledWaiting),
    ///     Some(LifecycleEvent::UpdateAvailable)
    /// );
    /// ```
    pub fn on_worker_state(&mut self, state: WorkerState) -> Option<LifecycleEvent> {
        tracing::debug!(from = %self.state, to = %state, "Worker state changed");
        if state == WorkerState::Installing {
            // A newer worker restarts the flow
            self.prompted = false;
            self.showing = false;
            self.accepted = false;
        }
        self.state = state;

        match state {
            WorkerState::InstalledWaiting if self.controlled && !self.prompted => {
                self.prompted = true;
                self.showing = true;
                tracing::info!("New version available, waiting to activate");
                Some(LifecycleEvent::UpdateAvailable)
            }
            WorkerState::Activated if self.accepted => {
                self.accepted = false;
                self.prompted = false;
                self.controlled = true;
                tracing::info!("Waiting worker activated, reloading");
                Some(LifecycleEvent::Reload)
            }
            WorkerState::Activated => {
                self.controlled = true;
                None
            }
            _ => None,
        }
    }

    /// The user accepted the update prompt
    ///
    /// Returns `SkipWaiting` when a worker is waiting, otherwise `Reload`.
    pub fn accept_update(&mut self) -> LifecycleEvent {
        self.showing = false;
        if self.state == WorkerState::InstalledWaiting {
            self.accepted = true;
            LifecycleEvent::SkipWaiting
        } else {
            LifecycleEvent::Reload
        }
    }

    /// The user dismissed the prompt; it is not shown again for this worker
    pub fn dismiss(&mut self) {
        self.showing = false;
        self.accepted = false;
    }
}
