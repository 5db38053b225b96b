//! The task entity: one running application screen as reported by the host,
//! plus the presentation state the loader fills in over time.
//!
//! Tasks are shared as `Arc<Task>` between the switcher (which owns the list)
//! and loader workers (which attach artwork). Identity never changes after
//! construction; everything else sits behind a mutex.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use bitflags::bitflags;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;
use tracing::trace;

use crate::model::bitmap::Bitmap;
use crate::model::color::Color;
use crate::sys::host::RunningTask;

/// Ephemeral per-session task handle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TaskHandle(pub i32);

/// Identifier that survives reordering of the host's task registry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PersistentTaskId(pub i32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct StackId(pub i32);

impl fmt::Display for PersistentTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Everything needed to relaunch or identify an application.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaunchDescriptor {
    pub package: String,
    pub component: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl LaunchDescriptor {
    pub fn new(package: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            component: component.into(),
            extras: BTreeMap::new(),
        }
    }

    /// Parses the `package/component` form stored in the favorites list.
    pub fn parse(s: &str) -> Option<LaunchDescriptor> {
        let (package, component) = s.split_once('/')?;
        if package.is_empty() || component.is_empty() {
            return None;
        }
        Some(LaunchDescriptor::new(package, component))
    }
}

impl fmt::Display for LaunchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.component)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TaskFlags: u8 {
        /// Terminal. A killed task is never shown or acted on again.
        const KILLED = 1 << 0;
        /// Pinned by the user; exempt from bulk kills.
        const LOCKED = 1 << 1;
        const DOCKED = 1 << 2;
        const SPLIT_SCREEN = 1 << 3;
        /// Set after a lock toggle so the view redraws the entry.
        const NEEDS_UPDATE = 1 << 4;
        /// A thumbnail fetch is in flight.
        const THUMB_LOADING = 1 << 5;
        /// Icon, label and colors have been resolved.
        const INFO_LOADED = 1 << 6;
    }
}

/// A view element that displays one task at a time and wants its thumbnail.
///
/// Tasks only hold a weak reference to their listener. Before every delivery
/// the task asks the listener which task it is showing *now*; if the element
/// has been recycled for another task the thumbnail is dropped.
pub trait ThumbListener: Send + Sync {
    fn reported_task_id(&self) -> Option<PersistentTaskId>;
    fn on_thumb_ready(&self, task: PersistentTaskId, thumb: Arc<Bitmap>);
}

/// Metadata resolved by the loader for one task.
#[derive(Clone, Debug, Default)]
pub struct TaskInfo {
    pub label: Option<String>,
    pub icon: Option<Arc<Bitmap>>,
    pub primary_color: Option<Color>,
    pub background_color: Option<Color>,
}

#[derive(Default)]
struct Presentation {
    label: Option<String>,
    icon: Option<Arc<Bitmap>>,
    thumb: Option<Arc<Bitmap>>,
    primary_color: Color,
    background_color: Color,
    use_light_text: bool,
    flags: TaskFlags,
}

pub struct Task {
    handle: TaskHandle,
    persistent_id: PersistentTaskId,
    launch: LaunchDescriptor,
    stack_id: StackId,
    last_active: SystemTime,
    running: bool,
    state: Mutex<Presentation>,
    listener: Mutex<Option<Weak<dyn ThumbListener>>>,
}

assert_impl_all!(Task: Send, Sync);

impl Task {
    pub fn new(record: RunningTask) -> Task {
        let mut flags = TaskFlags::empty();
        flags.set(TaskFlags::SPLIT_SCREEN, record.split_screen_capable);
        flags.set(TaskFlags::DOCKED, record.docked);
        Task {
            handle: record.handle,
            persistent_id: record.persistent_id,
            launch: record.launch,
            stack_id: record.stack_id,
            last_active: record.last_active,
            running: record.running,
            state: Mutex::new(Presentation { flags, ..Default::default() }),
            listener: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> TaskHandle { self.handle }
    pub fn persistent_id(&self) -> PersistentTaskId { self.persistent_id }
    pub fn launch(&self) -> &LaunchDescriptor { &self.launch }
    pub fn package(&self) -> &str { &self.launch.package }
    pub fn stack_id(&self) -> StackId { self.stack_id }
    pub fn last_active(&self) -> SystemTime { self.last_active }
    pub fn is_running(&self) -> bool { self.running }

    pub fn label(&self) -> Option<String> { self.state.lock().label.clone() }
    pub fn icon(&self) -> Option<Arc<Bitmap>> { self.state.lock().icon.clone() }
    pub fn thumb(&self) -> Option<Arc<Bitmap>> { self.state.lock().thumb.clone() }
    pub fn primary_color(&self) -> Color { self.state.lock().primary_color }
    pub fn background_color(&self) -> Color { self.state.lock().background_color }
    pub fn use_light_text_on_primary_color(&self) -> bool { self.state.lock().use_light_text }

    pub fn flags(&self) -> TaskFlags { self.state.lock().flags }
    pub fn is_killed(&self) -> bool { self.flags().contains(TaskFlags::KILLED) }
    pub fn is_locked(&self) -> bool { self.flags().contains(TaskFlags::LOCKED) }
    pub fn is_docked(&self) -> bool { self.flags().contains(TaskFlags::DOCKED) }
    pub fn supports_split_screen(&self) -> bool { self.flags().contains(TaskFlags::SPLIT_SCREEN) }
    pub fn needs_update(&self) -> bool { self.flags().contains(TaskFlags::NEEDS_UPDATE) }
    pub fn is_thumb_loading(&self) -> bool { self.flags().contains(TaskFlags::THUMB_LOADING) }
    pub fn is_info_loaded(&self) -> bool { self.flags().contains(TaskFlags::INFO_LOADED) }

    fn set_flag(&self, flag: TaskFlags, value: bool) { self.state.lock().flags.set(flag, value); }

    /// One-directional; there is no way back.
    pub fn mark_killed(&self) { self.set_flag(TaskFlags::KILLED, true); }

    pub fn set_locked(&self, locked: bool) { self.set_flag(TaskFlags::LOCKED, locked); }
    pub fn set_needs_update(&self, value: bool) { self.set_flag(TaskFlags::NEEDS_UPDATE, value); }
    pub fn set_docked(&self) { self.set_flag(TaskFlags::DOCKED, true); }

    /// Claims the thumbnail slot. Returns `false` if a fetch is already running.
    pub fn try_begin_thumb_load(&self) -> bool {
        let mut state = self.state.lock();
        if state.flags.contains(TaskFlags::THUMB_LOADING) {
            return false;
        }
        state.flags.insert(TaskFlags::THUMB_LOADING);
        true
    }

    pub fn end_thumb_load(&self) { self.set_flag(TaskFlags::THUMB_LOADING, false); }

    pub fn set_label(&self, label: impl Into<String>) { self.state.lock().label = Some(label.into()); }

    pub fn set_icon(&self, icon: Arc<Bitmap>) { self.state.lock().icon = Some(icon); }

    pub fn set_background_color(&self, color: Color) { self.state.lock().background_color = color; }

    /// Stores the primary color and whether light text is legible on it.
    pub fn set_primary_color(&self, color: Color) {
        let use_light_text = color.use_light_text();
        let mut state = self.state.lock();
        state.primary_color = color;
        state.use_light_text = use_light_text;
    }

    pub fn apply_info(&self, info: TaskInfo) {
        if let Some(color) = info.primary_color {
            self.set_primary_color(color);
        }
        let mut state = self.state.lock();
        if let Some(label) = info.label {
            state.label = Some(label);
        }
        if let Some(icon) = info.icon {
            state.icon = Some(icon);
        }
        if let Some(color) = info.background_color {
            state.background_color = color;
        }
        state.flags.insert(TaskFlags::INFO_LOADED);
    }

    /// Marks the resolved icon as stale so the next lookup runs again.
    pub fn invalidate_info(&self) { self.set_flag(TaskFlags::INFO_LOADED, false); }

    /// Replaces the listener. Single slot, last writer wins.
    pub fn attach_thumb_listener(&self, listener: Weak<dyn ThumbListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub fn detach_thumb_listener(&self) { self.listener.lock().take(); }

    /// Stores the thumbnail and, if `notify`, hands it to the attached
    /// listener provided that listener still reports this task. Returns
    /// whether the listener was called.
    pub fn set_thumb(&self, thumb: Arc<Bitmap>, notify: bool) -> bool {
        self.state.lock().thumb = Some(thumb.clone());
        if !notify {
            return false;
        }

        // Never call out while holding our own locks.
        let listener = self.listener.lock().as_ref().and_then(Weak::upgrade);
        let Some(listener) = listener else {
            return false;
        };
        if listener.reported_task_id() != Some(self.persistent_id) {
            trace!(task = %self.persistent_id, "listener moved on; dropping thumbnail");
            return false;
        }
        listener.on_thumb_ready(self.persistent_id, thumb);
        true
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("persistent_id", &self.persistent_id)
            .field("launch", &self.launch.to_string())
            .field("flags", &self.flags())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::{Duration, SystemTime};

    use super::*;

    pub fn running_task(id: i32, package: &str) -> RunningTask {
        RunningTask {
            handle: TaskHandle(id + 1000),
            persistent_id: PersistentTaskId(id),
            launch: LaunchDescriptor::new(package, format!("{package}.Main")),
            stack_id: StackId(0),
            split_screen_capable: true,
            docked: false,
            last_active: SystemTime::now() - Duration::from_secs(id.unsigned_abs() as u64),
            running: true,
        }
    }

    pub fn make_task(id: i32, package: &str) -> Arc<Task> { Arc::new(Task::new(running_task(id, package))) }

    /// A view cell that can be pointed at different tasks.
    #[derive(Default)]
    pub struct Cell {
        pub showing: Mutex<Option<PersistentTaskId>>,
        pub delivered: Mutex<Vec<PersistentTaskId>>,
    }

    impl Cell {
        pub fn showing(id: i32) -> Arc<Cell> {
            let cell = Arc::new(Cell::default());
            *cell.showing.lock() = Some(PersistentTaskId(id));
            cell
        }

        pub fn show(&self, id: i32) { *self.showing.lock() = Some(PersistentTaskId(id)); }

        pub fn bind(self: &Arc<Self>, task: &Task) {
            let weak: Weak<Cell> = Arc::downgrade(self);
            task.attach_thumb_listener(weak);
        }

        pub fn delivered(&self) -> Vec<PersistentTaskId> { self.delivered.lock().clone() }
    }

    impl ThumbListener for Cell {
        fn reported_task_id(&self) -> Option<PersistentTaskId> { *self.showing.lock() }

        fn on_thumb_ready(&self, task: PersistentTaskId, _thumb: Arc<Bitmap>) {
            self.delivered.lock().push(task);
        }
    }
}
