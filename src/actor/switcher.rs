//! The switcher is the actor that owns the task list shown in the overlay.
//!
//! It asks the [`TaskLoader`] for fresh lists, swaps them in when they
//! arrive (dropping anything from a superseded fetch), publishes them to the
//! view, and carries out the user's actions against the host. All state is
//! touched only from the switcher thread; loader results arrive as events.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, trace, warn};

use crate::actor::{self, loader::TaskLoader};
use crate::common::config::{Config, Settings};
use crate::common::prefs::SharedPrefs;
use crate::model::bitmap::Bitmap;
use crate::model::generation::Generation;
use crate::model::statistics::LaunchStatistics;
use crate::model::task::{LaunchDescriptor, PersistentTaskId, Task, TaskInfo};
use crate::model::task_list::TaskList;
use crate::sys::executor::Executor;
use crate::sys::host::{AnimationOptions, HostServices, HostStatus};
use crate::sys::view::{DisplayMetrics, GestureView, SwitcherView};

#[cfg(test)]
pub(crate) mod testing;

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Debug)]
pub enum Event {
    Command(Command),
    TasksLoaded {
        generation: Generation,
        list: TaskList,
        include_thumbnails: bool,
        notify: bool,
    },
    TaskInfoLoaded {
        task: Arc<Task>,
        info: TaskInfo,
    },
    ThumbnailLoaded {
        task: Arc<Task>,
        thumb: Arc<Bitmap>,
    },
    ConfigUpdated(Box<Config>),
    PackagesChanged,
    DisplayChanged(DisplayMetrics),
    /// Replies once no list fetch is outstanding.
    WhenLoaded(oneshot::Sender<()>),
    Shutdown,
}

/// User actions. Tasks are named by persistent id and looked up in the
/// current list; unknown ids are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Show,
    BeforePreloadTasks,
    ShowPreloaded,
    Hide {
        #[serde(default)]
        fast: bool,
    },
    Reload,
    SwitchTask {
        task: PersistentTaskId,
        #[serde(default)]
        close: bool,
        #[serde(default)]
        animate: bool,
    },
    KillTask {
        task: PersistentTaskId,
        #[serde(default)]
        close: bool,
    },
    ForceStop {
        task: PersistentTaskId,
        #[serde(default)]
        close: bool,
    },
    KillAll {
        #[serde(default)]
        close: bool,
    },
    KillOther {
        #[serde(default)]
        close: bool,
    },
    KillCurrent {
        #[serde(default)]
        close: bool,
    },
    ToggleLastApp {
        #[serde(default)]
        close: bool,
    },
    LockToApp {
        task: PersistentTaskId,
        #[serde(default)]
        close: bool,
    },
    LockToCurrentApp {
        #[serde(default)]
        close: bool,
    },
    StopLockToApp {
        #[serde(default)]
        close: bool,
    },
    ToggleLockToApp {
        #[serde(default)]
        close: bool,
    },
    ToggleLockedApp {
        task: PersistentTaskId,
        #[serde(default)]
        refresh: bool,
    },
    HideApp(String),
    UnhideApp(String),
    AddFavorite(String),
    RemoveFavorite(String),
    PruneFavorites,
    FavoritesFromStatistics(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum_macros::Display)]
pub enum OverlayState {
    #[default]
    Hidden,
    /// Visible, waiting for the first list of this showing.
    Loading,
    Showing,
}

pub struct Switcher {
    config: Config,
    host: HostServices,
    prefs: SharedPrefs,
    loader: TaskLoader,
    view: Box<dyn SwitcherView>,
    gesture: Option<Box<dyn GestureView>>,
    stats: LaunchStatistics,
    stats_path: Option<PathBuf>,
    tasks: TaskList,
    state: OverlayState,
    /// The fetch whose result we are waiting for.
    awaiting: Option<Generation>,
    when_loaded: Vec<oneshot::Sender<()>>,
    boosting: bool,
}

impl Switcher {
    pub fn new(
        config: Config,
        host: HostServices,
        prefs: SharedPrefs,
        view: Box<dyn SwitcherView>,
        events_tx: Sender,
    ) -> Switcher {
        let loader = TaskLoader::new(host.clone(), prefs.clone(), config.settings.clone(), events_tx);
        Switcher {
            config,
            host,
            prefs,
            loader,
            view,
            gesture: None,
            stats: LaunchStatistics::default(),
            stats_path: None,
            tasks: TaskList::default(),
            state: OverlayState::Hidden,
            awaiting: None,
            when_loaded: Vec::new(),
            boosting: false,
        }
    }

    pub fn with_gesture_view(mut self, gesture: Box<dyn GestureView>) -> Self {
        self.gesture = Some(gesture);
        self
    }

    /// Loads launch statistics from `path` and saves them back after every
    /// traced launch.
    pub fn with_statistics_file(mut self, path: PathBuf) -> Self {
        self.stats = LaunchStatistics::load_or_default(&path).unwrap_or_else(|e| {
            warn!("Could not read launch statistics: {e}");
            LaunchStatistics::default()
        });
        self.stats_path = Some(path);
        self
    }

    /// Runs a switcher on its own thread.
    pub fn spawn(
        config: Config,
        host: HostServices,
        prefs: SharedPrefs,
        view: Box<dyn SwitcherView>,
        gesture: Option<Box<dyn GestureView>>,
        stats_path: Option<PathBuf>,
    ) -> (Sender, JoinHandle<()>) {
        let (events_tx, events_rx) = actor::channel();
        let tx = events_tx.clone();
        let handle = thread::Builder::new()
            .name("switcher".to_string())
            .spawn(move || {
                let mut switcher = Switcher::new(config, host, prefs, view, events_tx);
                if let Some(gesture) = gesture {
                    switcher = switcher.with_gesture_view(gesture);
                }
                if let Some(path) = stats_path {
                    switcher = switcher.with_statistics_file(path);
                }
                Executor::run(switcher.run(events_rx));
            })
            .expect("failed to spawn switcher thread");
        (tx, handle)
    }

    pub async fn run(mut self, mut events: Receiver) {
        while let Some((span, event)) = events.recv().await {
            let _guard = span.enter();
            let shutdown = matches!(event, Event::Shutdown);
            self.handle_event(event);
            if shutdown {
                break;
            }
        }
        self.shutdown();
    }

    #[instrument(name = "switcher::handle_event", skip(self))]
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Command(cmd) => self.handle_command(cmd),
            Event::TasksLoaded {
                generation,
                list,
                include_thumbnails,
                notify,
            } => {
                if !self.loader.is_current(generation) {
                    trace!(?generation, "dropping stale task list");
                    return;
                }
                self.awaiting = None;
                self.update(list, include_thumbnails, notify);
                for tx in self.when_loaded.drain(..) {
                    _ = tx.send(());
                }
            }
            Event::TaskInfoLoaded { task, info } => {
                self.loader.apply_task_info(&task, info);
                if self.is_current_entity(&task) {
                    self.view.task_info_changed(&task);
                }
            }
            Event::ThumbnailLoaded { task, thumb } => {
                task.end_thumb_load();
                if !task.is_killed() {
                    task.set_thumb(thumb, true);
                }
            }
            Event::ConfigUpdated(config) => {
                self.config = *config;
                self.loader.update_settings(self.config.settings.clone());
                if self.is_showing() {
                    self.reload();
                }
            }
            Event::PackagesChanged => {
                self.loader.invalidate_icons();
                self.prune_favorites();
                if self.is_showing() {
                    self.reload();
                }
            }
            Event::DisplayChanged(metrics) => {
                if !self.loader.set_display_metrics(metrics) {
                    return;
                }
                for task in self.tasks.all() {
                    task.invalidate_info();
                }
                if self.is_showing() {
                    for task in self.tasks.visible() {
                        self.loader.load_task_info(&task);
                    }
                    self.refresh();
                }
            }
            Event::WhenLoaded(tx) => {
                if self.awaiting.is_none() {
                    _ = tx.send(());
                } else {
                    self.when_loaded.push(tx);
                }
            }
            Event::Shutdown => self.shutdown(),
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        debug!(?cmd, "switcher command");
        match cmd {
            Command::Show => self.show(),
            Command::BeforePreloadTasks => self.before_preload_tasks(),
            Command::ShowPreloaded => self.show_preloaded(),
            Command::Hide { fast } => self.hide(fast),
            Command::Reload => self.reload(),
            Command::SwitchTask { task, close, animate } => {
                if let Some(task) = self.lookup(task) {
                    self.switch_task(&task, close, animate);
                }
            }
            Command::KillTask { task, close } => {
                if let Some(task) = self.lookup(task) {
                    self.kill_task(&task, close);
                }
            }
            Command::ForceStop { task, close } => {
                if let Some(task) = self.lookup(task) {
                    self.force_stop(&task, close);
                }
            }
            Command::KillAll { close } => self.kill_all(close),
            Command::KillOther { close } => self.kill_other(close),
            Command::KillCurrent { close } => self.kill_current(close),
            Command::ToggleLastApp { close } => self.toggle_last_app(close),
            Command::LockToApp { task, close } => {
                if let Some(task) = self.lookup(task) {
                    self.lock_to_app(&task, close);
                }
            }
            Command::LockToCurrentApp { close } => self.lock_to_current_app(close),
            Command::StopLockToApp { close } => self.stop_lock_to_app(close),
            Command::ToggleLockToApp { close } => self.toggle_lock_to_app(close),
            Command::ToggleLockedApp { task, refresh } => {
                if let Some(task) = self.lookup(task) {
                    let was_locked = task.is_locked();
                    self.toggle_locked_app(&task, was_locked, refresh);
                }
            }
            Command::HideApp(package) => self.hide_app(&package),
            Command::UnhideApp(package) => self.unhide_app(&package),
            Command::AddFavorite(item) => self.add_favorite(&item),
            Command::RemoveFavorite(item) => self.remove_favorite(&item),
            Command::PruneFavorites => self.prune_favorites(),
            Command::FavoritesFromStatistics(count) => self.favorites_from_statistics(count),
        }
    }

    fn lookup(&self, id: PersistentTaskId) -> Option<Arc<Task>> {
        let task = self.tasks.find(id).cloned();
        if task.is_none() {
            debug!(task = %id, "no such task in the current list");
        }
        task
    }

    fn is_current_entity(&self, task: &Arc<Task>) -> bool {
        self.tasks.find(task.persistent_id()).is_some_and(|t| Arc::ptr_eq(t, task))
    }

    fn settings(&self) -> &Settings { &self.config.settings }

    pub fn state(&self) -> OverlayState { self.state }
    pub fn is_showing(&self) -> bool { self.state != OverlayState::Hidden }
    pub fn is_loading(&self) -> bool { self.awaiting.is_some() }
    pub fn tasks(&self) -> &TaskList { &self.tasks }
    pub fn visible_tasks(&self) -> Vec<Arc<Task>> { self.tasks.visible() }
    pub fn statistics(&self) -> &LaunchStatistics { &self.stats }
    pub fn loader(&self) -> &TaskLoader { &self.loader }

    // Showing and hiding.

    /// Opens the overlay and starts a fresh fetch. The overlay is visible
    /// immediately and fills in as results arrive.
    pub fn show(&mut self) {
        if self.is_showing() {
            return;
        }
        info!("showing switcher");
        self.start_boost();
        self.clear_tasks();
        self.loader.cancel_loading_tasks();
        self.awaiting = Some(self.loader.load_tasks_in_background(0, true, true));
        self.state = OverlayState::Loading;
        self.view.show();
    }

    /// Prepares for a show that is likely to follow shortly, e.g. while a
    /// drag gesture is in progress. The list is fetched without notifying
    /// the view; [`Switcher::show_preloaded`] publishes it.
    pub fn before_preload_tasks(&mut self) {
        if self.is_showing() {
            return;
        }
        self.start_boost();
        self.clear_tasks();
        self.loader.cancel_loading_tasks();
        self.awaiting = Some(self.loader.load_tasks_in_background(0, true, false));
    }

    /// Opens the overlay without fetching.
    pub fn show_preloaded(&mut self) {
        if self.is_showing() {
            return;
        }
        info!("showing preloaded switcher");
        self.state = if self.awaiting.is_some() {
            OverlayState::Loading
        } else {
            OverlayState::Showing
        };
        self.view.show();
        if self.awaiting.is_none() {
            self.publish();
        }
    }

    /// Closes the overlay. Also ends a preload that never got shown.
    pub fn hide(&mut self, fast: bool) {
        if !self.is_showing() {
            self.stop_boost();
            return;
        }
        info!(fast, "hiding switcher");
        self.state = OverlayState::Hidden;
        self.view.hide(fast);
        self.stop_boost();
    }

    /// Fetches a new list while keeping the current one on screen.
    pub fn reload(&mut self) {
        self.loader.cancel_loading_tasks();
        self.awaiting = Some(self.loader.load_tasks_in_background(0, true, true));
    }

    /// Replaces the list wholesale and, if asked to (or if the overlay is
    /// already up), publishes it.
    pub fn update(&mut self, list: TaskList, include_thumbnails: bool, notify: bool) {
        self.tasks = list;
        if self.state == OverlayState::Loading {
            self.state = OverlayState::Showing;
        }
        debug!(
            total = self.tasks.len(),
            visible = self.tasks.visible().len(),
            "task list updated"
        );
        if notify || self.is_showing() {
            self.publish();
        }
        for task in self.tasks.visible() {
            self.loader.load_task_info(&task);
            if include_thumbnails {
                self.loader.load_thumbnail(&task);
            }
        }
    }

    fn publish(&mut self) {
        let visible = self.tasks.visible();
        self.view.update(&visible);
        if let Some(gesture) = &mut self.gesture {
            gesture.update(&visible);
        }
    }

    fn refresh(&mut self) {
        let visible = self.tasks.visible();
        self.view.refresh(&visible);
        if let Some(gesture) = &mut self.gesture {
            gesture.update(&visible);
        }
    }

    fn clear_tasks(&mut self) {
        self.tasks.clear();
        self.refresh();
    }

    // Switching.

    /// Brings `task` to the front. Best effort; failures are logged and
    /// otherwise ignored.
    pub fn switch_task(&mut self, task: &Arc<Task>, close: bool, animate: bool) {
        if task.is_killed() {
            return;
        }
        if close {
            self.hide(true);
        }
        let options = if animate {
            AnimationOptions::Custom
        } else {
            AnimationOptions::Default
        };
        let status = HostStatus::from(self.host.tasks.bring_task_to_front(task.persistent_id(), options));
        if status.is_ok() {
            debug!(task = %task.persistent_id(), launch = %task.launch(), "switched to task");
            if self.settings().launch_stats {
                self.trace_launch(task.launch());
            }
        }
        status.ignore("bring_task_to_front");
    }

    /// Switches to the second entry of the unfiltered list.
    pub fn toggle_last_app(&mut self, close: bool) {
        let Some(task) = self.tasks.get(1).cloned() else {
            if close {
                self.hide(true);
            }
            return;
        };
        self.switch_task(&task, close, true);
    }

    fn trace_launch(&mut self, launch: &LaunchDescriptor) {
        self.stats.trace_launch(launch);
        if let Some(path) = &self.stats_path
            && let Err(e) = self.stats.save(path)
        {
            warn!("Failed to save launch statistics: {e}");
        }
    }

    // Killing.

    fn refuse_in_restricted_mode(&self, op: &str) -> bool {
        if self.settings().restricted_mode {
            debug!(op, "refused in restricted mode");
            return true;
        }
        false
    }

    fn remove_from_host(&self, task: &Task) {
        HostStatus::from(self.host.tasks.remove_task(task.persistent_id())).ignore("remove_task");
        debug!(task = %task.persistent_id(), launch = %task.launch(), "killed task");
        task.mark_killed();
    }

    /// Removes `task` from the host and the list. A locked task is unlocked
    /// first. With `close` the overlay hides instead of refreshing.
    pub fn kill_task(&mut self, task: &Arc<Task>, close: bool) {
        if self.refuse_in_restricted_mode("kill_task") {
            return;
        }
        if close {
            self.hide(false);
        }
        if task.is_locked() {
            self.toggle_locked_app(task, true, false);
        }
        self.remove_from_host(task);
        self.tasks.remove(task.persistent_id());
        if !close {
            self.refresh();
        }
    }

    /// Force-stops the task's package. Every task of that package leaves the
    /// list.
    pub fn force_stop(&mut self, task: &Arc<Task>, close: bool) {
        if self.refuse_in_restricted_mode("force_stop") {
            return;
        }
        if close {
            self.hide(false);
        }
        HostStatus::from(self.host.tasks.force_stop_package(task.package())).ignore("force_stop_package");
        debug!(package = task.package(), "force stopped");
        task.mark_killed();
        for other in self.tasks.all() {
            if other.package() == task.package() {
                other.mark_killed();
            }
        }
        self.tasks.prune_killed();
        if !close {
            self.refresh();
        }
    }

    /// Kills every unlocked task, including ones the filter hides, then goes
    /// home.
    pub fn kill_all(&mut self, close: bool) {
        if self.refuse_in_restricted_mode("kill_all") {
            return;
        }
        if self.tasks.is_empty() {
            if close {
                self.hide(true);
            }
            return;
        }
        for task in self.tasks.all() {
            if !task.is_locked() {
                self.remove_from_host(task);
            }
        }
        self.tasks.prune_killed();
        self.go_home(close);
        if !close {
            self.refresh();
        }
    }

    /// Kills every unlocked task except the topmost one.
    pub fn kill_other(&mut self, close: bool) {
        if self.refuse_in_restricted_mode("kill_other") {
            return;
        }
        if self.tasks.len() <= 1 {
            if close {
                self.hide(true);
            }
            return;
        }
        for task in self.tasks.all().iter().skip(1) {
            if !task.is_locked() {
                self.remove_from_host(task);
            }
        }
        self.tasks.prune_killed();
        if close {
            self.hide(true);
        } else {
            self.refresh();
        }
    }

    /// Kills the topmost task, unlocking it first if needed.
    pub fn kill_current(&mut self, close: bool) {
        if self.refuse_in_restricted_mode("kill_current") {
            return;
        }
        if let Some(task) = self.tasks.first().cloned() {
            if task.is_locked() {
                self.toggle_locked_app(&task, true, false);
            }
            self.remove_from_host(&task);
            self.tasks.remove(task.persistent_id());
        }
        if close {
            self.hide(true);
        } else {
            self.refresh();
        }
    }

    fn go_home(&mut self, close: bool) {
        if close {
            self.hide(true);
        }
        HostStatus::from(self.host.tasks.go_home()).ignore("go_home");
    }

    // Lock task mode.

    fn query_lock_mode(&self) -> Option<bool> {
        match self.host.tasks.is_in_lock_mode() {
            Ok(locked) => Some(locked),
            Err(e) => {
                HostStatus::from(Err::<(), _>(e)).ignore("is_in_lock_mode");
                None
            }
        }
    }

    /// Switches to `task` and pins the host to it, unless the host is
    /// already in lock mode.
    pub fn lock_to_app(&mut self, task: &Arc<Task>, close: bool) {
        if !task.is_killed() && self.query_lock_mode() == Some(false) {
            self.switch_task(task, false, false);
            HostStatus::from(self.host.tasks.enter_lock_mode(task.persistent_id()))
                .ignore("enter_lock_mode");
            debug!(task = %task.persistent_id(), "locked to app");
        }
        if close {
            self.hide(true);
        }
    }

    pub fn lock_to_current_app(&mut self, close: bool) {
        if let Some(task) = self.tasks.first().cloned() {
            self.lock_to_app(&task, close);
        }
    }

    pub fn stop_lock_to_app(&mut self, close: bool) {
        if self.query_lock_mode() == Some(true) {
            HostStatus::from(self.host.tasks.exit_lock_mode()).ignore("exit_lock_mode");
            debug!("stopped lock to app");
        }
        if close {
            self.hide(true);
        }
    }

    pub fn toggle_lock_to_app(&mut self, close: bool) {
        match self.query_lock_mode() {
            Some(true) => self.stop_lock_to_app(false),
            Some(false) => self.lock_to_current_app(false),
            None => {}
        }
        if close {
            self.hide(true);
        }
    }

    // Persisted app lists.

    /// Flips whether the task's package is locked, in the persisted set and
    /// on every entity of that package together.
    pub fn toggle_locked_app(&mut self, task: &Arc<Task>, was_locked: bool, refresh: bool) {
        {
            let mut prefs = self.prefs.write();
            if was_locked {
                prefs.remove_from_locked_apps(task.package());
            } else {
                prefs.add_to_locked_apps(task.package());
            }
        }
        for t in self.tasks.all().iter().filter(|t| t.package() == task.package()) {
            t.set_locked(!was_locked);
            t.set_needs_update(true);
        }
        task.set_locked(!was_locked);
        task.set_needs_update(true);
        if refresh {
            self.refresh();
        }
    }

    pub fn hide_app(&mut self, package: &str) {
        if self.prefs.write().add_to_hidden_apps(package) && self.is_showing() {
            self.reload();
        }
    }

    pub fn unhide_app(&mut self, package: &str) {
        if self.prefs.write().remove_from_hidden_apps(package) && self.is_showing() {
            self.reload();
        }
    }

    fn favorites_changed(&mut self) {
        let favorites = self.prefs.read().lists().favorites.clone();
        self.view.favorites_changed(&favorites);
    }

    pub fn add_favorite(&mut self, item: &str) {
        if self.prefs.write().add_to_favorites(item) {
            self.favorites_changed();
        }
    }

    pub fn remove_favorite(&mut self, item: &str) {
        if self.prefs.write().remove_from_favorites(item) {
            self.favorites_changed();
        }
    }

    /// Drops favorites that no longer resolve to an installed component.
    pub fn prune_favorites(&mut self) {
        let favorites = self.prefs.read().lists().favorites.clone();
        let kept: Vec<String> = favorites
            .iter()
            .filter(|f| {
                LaunchDescriptor::parse(f).is_some_and(|launch| self.host.packages.is_installed(&launch))
            })
            .cloned()
            .collect();
        if kept.len() != favorites.len() {
            debug!(dropped = favorites.len() - kept.len(), "pruned stale favorites");
            self.prefs.write().set_favorites(kept);
            self.favorites_changed();
        }
    }

    /// Replaces the favorites with the `count` most launched apps.
    pub fn favorites_from_statistics(&mut self, count: usize) {
        let top = self.stats.topmost_launches(count);
        self.prefs.write().set_favorites(top);
        self.favorites_changed();
    }

    // Power hints.

    pub fn start_boost(&mut self) {
        if self.settings().use_power_hint && !self.boosting {
            HostStatus::from(self.host.tasks.power_hint(true)).ignore("power_hint");
            self.boosting = true;
        }
    }

    pub fn stop_boost(&mut self) {
        if self.boosting {
            HostStatus::from(self.host.tasks.power_hint(false)).ignore("power_hint");
            self.boosting = false;
        }
    }

    /// Hides the overlay and tears down the loader. Nothing is fetched
    /// afterwards.
    pub fn shutdown(&mut self) {
        self.hide(true);
        self.loader.shutdown();
        self.tasks.clear();
        self.awaiting = None;
        for tx in self.when_loaded.drain(..) {
            _ = tx.send(());
        }
    }
}
