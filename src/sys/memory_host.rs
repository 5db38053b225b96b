//! An in-process host: a task registry and package resolver backed by plain
//! data. The CLI drives the switcher against it, and tests use the call log
//! to check which host primitives an operation reached.

use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tracing::trace;

use crate::common::collections::{BTreeMap, HashMap};
use crate::model::bitmap::Bitmap;
use crate::model::color::Color;
use crate::model::task::{LaunchDescriptor, PersistentTaskId, StackId, TaskHandle};
use crate::sys::host::{
    AnimationOptions, HostError, HostResult, RunningTask, TaskColors, TaskRegistry,
};
use crate::sys::package::{PackageItem, PackageResolver};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostCall {
    ListRunningTasks(usize),
    BringTaskToFront(PersistentTaskId, AnimationOptions),
    RemoveTask(PersistentTaskId),
    ForceStopPackage(String),
    IsInLockMode,
    EnterLockMode(PersistentTaskId),
    ExitLockMode,
    TaskThumbnail(PersistentTaskId),
    GoHome,
    PowerHint(bool),
}

impl HostCall {
    /// Calls that destroy tasks.
    pub fn is_removal(&self) -> bool {
        matches!(self, HostCall::RemoveTask(_) | HostCall::ForceStopPackage(_))
    }
}

#[derive(Clone, Debug)]
struct Package {
    component: String,
    label: String,
    icon: Option<Vec<u8>>,
}

#[derive(Debug)]
struct HostState {
    tasks: Vec<RunningTask>,
    packages: BTreeMap<String, Package>,
    thumbnails: HashMap<PersistentTaskId, Vec<u8>>,
    colors: HashMap<PersistentTaskId, TaskColors>,
    lock_mode: Option<PersistentTaskId>,
    boot_time: SystemTime,
    unavailable: bool,
    calls: Vec<HostCall>,
}

#[derive(Debug)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

impl Default for InMemoryHost {
    fn default() -> Self { Self::new() }
}

impl InMemoryHost {
    pub fn new() -> Self {
        InMemoryHost {
            state: Mutex::new(HostState {
                tasks: Vec::new(),
                packages: BTreeMap::new(),
                thumbnails: HashMap::default(),
                colors: HashMap::default(),
                lock_mode: None,
                boot_time: SystemTime::now() - Duration::from_secs(24 * 3600),
                unavailable: false,
                calls: Vec::new(),
            }),
        }
    }

    /// A host with a handful of apps, for the CLI.
    pub fn demo() -> Self {
        let host = Self::new();
        let apps = [
            ("org.example.browser", "Browser", Color::from_rgb(0x1a, 0x73, 0xe8)),
            ("org.example.mail", "Mail", Color::from_rgb(0xd9, 0x30, 0x25)),
            ("org.example.notes", "Notes", Color::from_rgb(0xfb, 0xbc, 0x04)),
            ("org.example.terminal", "Terminal", Color::from_rgb(0x20, 0x20, 0x20)),
            ("org.example.music", "Music", Color::from_rgb(0x1d, 0xb9, 0x54)),
        ];
        for (package, label, color) in apps {
            host.install(package, label, Some(Bitmap::solid(48, 48, color)));
            let id = host.push_task(package);
            host.set_task_colors(id, TaskColors {
                primary: Some(color),
                background: Some(Color::WHITE),
            });
            host.set_thumbnail(id, Bitmap::solid(90, 160, color));
            trace!(package, %id, "demo task");
        }
        host
    }

    /// Registers an installed package with an optional icon.
    pub fn install(&self, package: &str, label: &str, icon: Option<Bitmap>) {
        let icon = icon.and_then(|b| b.encode_png().ok());
        self.state.lock().packages.insert(package.to_string(), Package {
            component: format!("{package}.Main"),
            label: label.to_string(),
            icon,
        });
    }

    pub fn uninstall(&self, package: &str) { self.state.lock().packages.remove(package); }

    /// Registers an icon that is not a decodable image.
    pub fn set_raw_icon(&self, package: &str, bytes: Vec<u8>) {
        if let Some(p) = self.state.lock().packages.get_mut(package) {
            p.icon = Some(bytes);
        }
    }

    /// Appends a task for `package`; the list is most recent first, so each
    /// new task is older than the previous ones.
    pub fn push_task(&self, package: &str) -> PersistentTaskId {
        let mut state = self.state.lock();
        let n = state.tasks.len() as i32;
        let id = PersistentTaskId(100 + n);
        let component = state
            .packages
            .get(package)
            .map(|p| p.component.clone())
            .unwrap_or_else(|| format!("{package}.Main"));
        state.tasks.push(RunningTask {
            handle: TaskHandle(n),
            persistent_id: id,
            launch: LaunchDescriptor::new(package, component),
            stack_id: StackId(1),
            split_screen_capable: true,
            docked: false,
            last_active: SystemTime::now() - Duration::from_secs(60 * n as u64),
            running: true,
        });
        id
    }

    pub fn push_running_task(&self, task: RunningTask) { self.state.lock().tasks.push(task); }

    pub fn set_thumbnail(&self, id: PersistentTaskId, bitmap: Bitmap) {
        if let Ok(bytes) = bitmap.encode_png() {
            self.state.lock().thumbnails.insert(id, bytes);
        }
    }

    pub fn set_raw_thumbnail(&self, id: PersistentTaskId, bytes: Vec<u8>) {
        self.state.lock().thumbnails.insert(id, bytes);
    }

    pub fn set_task_colors(&self, id: PersistentTaskId, colors: TaskColors) {
        self.state.lock().colors.insert(id, colors);
    }

    pub fn set_boot_time(&self, boot_time: SystemTime) { self.state.lock().boot_time = boot_time; }

    /// Makes every call fail as if the host had gone away.
    pub fn set_unavailable(&self, unavailable: bool) { self.state.lock().unavailable = unavailable; }

    pub fn task_ids(&self) -> Vec<PersistentTaskId> {
        self.state.lock().tasks.iter().map(|t| t.persistent_id).collect()
    }

    pub fn lock_mode_task(&self) -> Option<PersistentTaskId> { self.state.lock().lock_mode }

    pub fn calls(&self) -> Vec<HostCall> { self.state.lock().calls.clone() }

    pub fn take_calls(&self) -> Vec<HostCall> { std::mem::take(&mut self.state.lock().calls) }

    fn record(&self, call: HostCall) -> parking_lot::MutexGuard<'_, HostState> {
        let mut state = self.state.lock();
        state.calls.push(call);
        state
    }

    fn available(state: &HostState) -> HostResult<()> {
        if state.unavailable {
            return Err(HostError::Unavailable("host went away".into()));
        }
        Ok(())
    }
}

impl TaskRegistry for InMemoryHost {
    fn list_running_tasks(&self, limit: usize) -> HostResult<Vec<RunningTask>> {
        let state = self.record(HostCall::ListRunningTasks(limit));
        Self::available(&state)?;
        Ok(state.tasks.iter().take(limit).cloned().collect())
    }

    fn bring_task_to_front(&self, id: PersistentTaskId, options: AnimationOptions) -> HostResult<()> {
        let mut state = self.record(HostCall::BringTaskToFront(id, options));
        Self::available(&state)?;
        let index = state
            .tasks
            .iter()
            .position(|t| t.persistent_id == id)
            .ok_or(HostError::TaskGone(id))?;
        let mut task = state.tasks.remove(index);
        task.last_active = SystemTime::now();
        state.tasks.insert(0, task);
        Ok(())
    }

    fn remove_task(&self, id: PersistentTaskId) -> HostResult<()> {
        let mut state = self.record(HostCall::RemoveTask(id));
        Self::available(&state)?;
        let before = state.tasks.len();
        state.tasks.retain(|t| t.persistent_id != id);
        if state.tasks.len() == before {
            return Err(HostError::TaskGone(id));
        }
        Ok(())
    }

    fn force_stop_package(&self, package: &str) -> HostResult<()> {
        let mut state = self.record(HostCall::ForceStopPackage(package.to_string()));
        Self::available(&state)?;
        state.tasks.retain(|t| t.launch.package != package);
        Ok(())
    }

    fn is_in_lock_mode(&self) -> HostResult<bool> {
        let state = self.record(HostCall::IsInLockMode);
        Self::available(&state)?;
        Ok(state.lock_mode.is_some())
    }

    fn enter_lock_mode(&self, id: PersistentTaskId) -> HostResult<()> {
        let mut state = self.record(HostCall::EnterLockMode(id));
        Self::available(&state)?;
        if !state.tasks.iter().any(|t| t.persistent_id == id) {
            return Err(HostError::TaskGone(id));
        }
        state.lock_mode = Some(id);
        Ok(())
    }

    fn exit_lock_mode(&self) -> HostResult<()> {
        let mut state = self.record(HostCall::ExitLockMode);
        Self::available(&state)?;
        state.lock_mode = None;
        Ok(())
    }

    fn task_thumbnail(&self, id: PersistentTaskId) -> HostResult<Vec<u8>> {
        let state = self.record(HostCall::TaskThumbnail(id));
        Self::available(&state)?;
        state.thumbnails.get(&id).cloned().ok_or(HostError::TaskGone(id))
    }

    fn task_colors(&self, id: PersistentTaskId) -> HostResult<TaskColors> {
        let state = self.state.lock();
        Self::available(&state)?;
        Ok(state.colors.get(&id).copied().unwrap_or_default())
    }

    fn boot_time(&self) -> SystemTime { self.state.lock().boot_time }

    fn go_home(&self) -> HostResult<()> {
        let state = self.record(HostCall::GoHome);
        Self::available(&state)
    }

    fn power_hint(&self, boost: bool) -> HostResult<()> {
        let state = self.record(HostCall::PowerHint(boost));
        Self::available(&state)
    }
}

impl PackageResolver for InMemoryHost {
    fn resolve(&self, launch: &LaunchDescriptor) -> Option<PackageItem> {
        let state = self.state.lock();
        let package = state.packages.get(&launch.package)?;
        (package.component == launch.component).then(|| PackageItem {
            package: launch.package.clone(),
            component: package.component.clone(),
            label: package.label.clone(),
        })
    }

    fn icon_data(&self, item: &PackageItem) -> Option<Vec<u8>> {
        self.state.lock().packages.get(&item.package)?.icon.clone()
    }
}
