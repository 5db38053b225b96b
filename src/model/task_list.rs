//! The authoritative task list and its filtered view.
//!
//! The switcher keeps one owned collection of every task the host reported.
//! What the user sees is computed on read by applying a [`TaskFilter`], so
//! every visible entry is the same `Arc` as its unfiltered counterpart.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::common::collections::HashSet;
use crate::model::task::{PersistentTaskId, Task};

/// Snapshot of the filter settings taken when a list was fetched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskFilter {
    /// Packages never shown.
    pub hidden: BTreeSet<String>,
    /// Tasks last active before this instant are dropped.
    pub window_start: Option<SystemTime>,
    /// Tasks last active before the host booted are dropped.
    pub boot_time: Option<SystemTime>,
    pub running_only: bool,
    /// Maximum number of visible entries; 0 means unlimited.
    pub limit: usize,
}

impl TaskFilter {
    pub fn accepts(&self, task: &Task) -> bool {
        if task.is_killed() || self.hidden.contains(task.package()) {
            return false;
        }
        if let Some(start) = self.window_start
            && task.last_active() < start
        {
            return false;
        }
        if let Some(boot) = self.boot_time
            && task.last_active() < boot
        {
            return false;
        }
        !self.running_only || task.is_running()
    }
}

#[derive(Clone, Debug, Default)]
pub struct TaskList {
    tasks: Vec<Arc<Task>>,
    filter: TaskFilter,
}

impl TaskList {
    /// Builds a list, keeping only the first entry for each persistent id.
    pub fn new(tasks: Vec<Arc<Task>>, filter: TaskFilter) -> TaskList {
        let mut seen = HashSet::default();
        let before = tasks.len();
        let tasks: Vec<_> = tasks.into_iter().filter(|t| seen.insert(t.persistent_id())).collect();
        if tasks.len() != before {
            debug!(dropped = before - tasks.len(), "dropped duplicate task ids");
        }
        TaskList { tasks, filter }
    }

    pub fn filter(&self) -> &TaskFilter { &self.filter }

    /// Every task, including ones the filter hides. Used by bulk operations.
    pub fn all(&self) -> &[Arc<Task>] { &self.tasks }

    /// The tasks the user sees, in list order.
    pub fn visible(&self) -> Vec<Arc<Task>> {
        let visible = self.tasks.iter().filter(|t| self.filter.accepts(t)).cloned();
        match self.filter.limit {
            0 => visible.collect(),
            n => visible.take(n).collect(),
        }
    }

    pub fn len(&self) -> usize { self.tasks.len() }
    pub fn is_empty(&self) -> bool { self.tasks.is_empty() }

    pub fn first(&self) -> Option<&Arc<Task>> { self.tasks.first() }
    pub fn get(&self, index: usize) -> Option<&Arc<Task>> { self.tasks.get(index) }

    pub fn find(&self, id: PersistentTaskId) -> Option<&Arc<Task>> {
        self.tasks.iter().find(|t| t.persistent_id() == id)
    }

    pub fn contains(&self, id: PersistentTaskId) -> bool { self.find(id).is_some() }

    pub fn remove(&mut self, id: PersistentTaskId) -> Option<Arc<Task>> {
        let index = self.tasks.iter().position(|t| t.persistent_id() == id)?;
        Some(self.tasks.remove(index))
    }

    /// Drops every task that has been marked killed.
    pub fn prune_killed(&mut self) { self.tasks.retain(|t| !t.is_killed()); }

    pub fn clear(&mut self) { self.tasks.clear(); }
}
