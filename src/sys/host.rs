//! The host task registry: the operating system's list of running tasks and
//! the primitives that act on them.
//!
//! Every call may fail. The switcher never retries and never surfaces these
//! failures to the user; it converts them into a [`HostStatus`] and decides
//! explicitly to ignore it.

use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use tracing::debug;

use crate::model::color::Color;
use crate::model::task::{LaunchDescriptor, PersistentTaskId, StackId, TaskHandle};
use crate::sys::package::PackageResolver;

/// One entry of the host's running task list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunningTask {
    pub handle: TaskHandle,
    pub persistent_id: PersistentTaskId,
    pub launch: LaunchDescriptor,
    pub stack_id: StackId,
    pub split_screen_capable: bool,
    pub docked: bool,
    pub last_active: SystemTime,
    /// Whether the task's process is still alive.
    pub running: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationOptions {
    #[default]
    None,
    Default,
    /// The quick cross-fade used when toggling to the previous app.
    Custom,
}

/// Colors the host recorded for a task's window decorations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskColors {
    pub primary: Option<Color>,
    pub background: Option<Color>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("operation not permitted")]
    NotPermitted,
    #[error("task {0} no longer exists")]
    TaskGone(PersistentTaskId),
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Outcome of a best-effort host call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[must_use]
pub enum HostStatus {
    Ok,
    NotPermitted,
    TaskGone,
    Unavailable,
}

impl HostStatus {
    pub fn of<T>(result: &HostResult<T>) -> HostStatus {
        match result {
            Ok(_) => HostStatus::Ok,
            Err(HostError::NotPermitted) => HostStatus::NotPermitted,
            Err(HostError::TaskGone(_)) => HostStatus::TaskGone,
            Err(HostError::Unavailable(_)) => HostStatus::Unavailable,
        }
    }

    pub fn is_ok(self) -> bool { self == HostStatus::Ok }

    /// Drops a non-fatal status after logging it.
    pub fn ignore(self, op: &str) {
        if !self.is_ok() {
            debug!(op, status = %self, "ignoring failed host call");
        }
    }
}

impl<T> From<HostResult<T>> for HostStatus {
    fn from(result: HostResult<T>) -> Self { HostStatus::of(&result) }
}

/// Access to the host's task registry.
///
/// Calls block until the host answers; none of them carries a timeout.
pub trait TaskRegistry: Send + Sync {
    /// Running tasks, most recently used first.
    fn list_running_tasks(&self, limit: usize) -> HostResult<Vec<RunningTask>>;
    fn bring_task_to_front(&self, id: PersistentTaskId, options: AnimationOptions) -> HostResult<()>;
    fn remove_task(&self, id: PersistentTaskId) -> HostResult<()>;
    fn force_stop_package(&self, package: &str) -> HostResult<()>;
    fn is_in_lock_mode(&self) -> HostResult<bool>;
    fn enter_lock_mode(&self, id: PersistentTaskId) -> HostResult<()>;
    fn exit_lock_mode(&self) -> HostResult<()>;
    /// Encoded screenshot of the task.
    fn task_thumbnail(&self, id: PersistentTaskId) -> HostResult<Vec<u8>>;
    fn task_colors(&self, id: PersistentTaskId) -> HostResult<TaskColors>;
    fn boot_time(&self) -> SystemTime;
    fn go_home(&self) -> HostResult<()>;
    fn power_hint(&self, boost: bool) -> HostResult<()>;
}

/// The host collaborators the switcher and its loader talk to.
#[derive(Clone)]
pub struct HostServices {
    pub tasks: Arc<dyn TaskRegistry>,
    pub packages: Arc<dyn PackageResolver>,
}

impl HostServices {
    /// Uses one object for both roles.
    pub fn from_host<H: TaskRegistry + PackageResolver + 'static>(host: Arc<H>) -> HostServices {
        HostServices { tasks: host.clone(), packages: host }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mirrors_error_kind() {
        assert_eq!(HostStatus::Ok, HostStatus::from(Ok::<_, HostError>(())));
        assert_eq!(HostStatus::NotPermitted, HostStatus::from(Err::<(), _>(HostError::NotPermitted)));
        assert_eq!(
            HostStatus::TaskGone,
            HostStatus::from(Err::<(), _>(HostError::TaskGone(PersistentTaskId(3))))
        );
        assert_eq!(
            HostStatus::Unavailable,
            HostStatus::from(Err::<(), _>(HostError::Unavailable("dead".into())))
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!("task #4 no longer exists", HostError::TaskGone(PersistentTaskId(4)).to_string());
        assert_eq!("TaskGone", HostStatus::TaskGone.to_string());
    }
}
