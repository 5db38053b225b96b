use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::*;
use crate::common::prefs::{AppLists, PreferenceStore};
use crate::sys::memory_host::{HostCall, InMemoryHost};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCall {
    Show,
    Hide(bool),
    Update(Vec<i32>),
    Refresh(Vec<i32>),
    TaskInfoChanged(i32),
    FavoritesChanged(Vec<String>),
    GestureUpdate(Vec<i32>),
}

fn ids(tasks: &[Arc<Task>]) -> Vec<i32> { tasks.iter().map(|t| t.persistent_id().0).collect() }

#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<ViewCall>>>);

impl Recorder {
    fn push(&self, call: ViewCall) { self.0.lock().push(call); }

    pub fn calls(&self) -> Vec<ViewCall> { self.0.lock().clone() }

    pub fn take(&self) -> Vec<ViewCall> { std::mem::take(&mut *self.0.lock()) }

    pub fn updates(&self) -> Vec<Vec<i32>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ViewCall::Update(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }
}

pub struct RecordingView(pub Recorder);

impl SwitcherView for RecordingView {
    fn show(&mut self) { self.0.push(ViewCall::Show); }
    fn hide(&mut self, fast: bool) { self.0.push(ViewCall::Hide(fast)); }
    fn update(&mut self, tasks: &[Arc<Task>]) { self.0.push(ViewCall::Update(ids(tasks))); }
    fn refresh(&mut self, tasks: &[Arc<Task>]) { self.0.push(ViewCall::Refresh(ids(tasks))); }

    fn task_info_changed(&mut self, task: &Arc<Task>) {
        self.0.push(ViewCall::TaskInfoChanged(task.persistent_id().0));
    }

    fn favorites_changed(&mut self, favorites: &[String]) {
        self.0.push(ViewCall::FavoritesChanged(favorites.to_vec()));
    }
}

pub struct RecordingGesture(pub Recorder);

impl GestureView for RecordingGesture {
    fn update(&mut self, tasks: &[Arc<Task>]) { self.0.push(ViewCall::GestureUpdate(ids(tasks))); }
}

/// Waits for the next event the loader sends to the switcher.
pub fn recv_event(rx: &mut Receiver, timeout: Duration) -> Option<Event> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok((_span, event)) = rx.try_recv() {
            return Some(event);
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

pub struct Fixture {
    pub host: Arc<InMemoryHost>,
    pub prefs: SharedPrefs,
    pub switcher: Switcher,
    pub rx: Receiver,
    pub view: Recorder,
}

impl Fixture {
    pub fn new(packages: &[&str]) -> Fixture {
        Fixture::with(packages, Config::default(), AppLists::default())
    }

    /// A host running one task per package (ids 100, 101, ... in order) and
    /// a switcher with a recording view and gesture layer.
    pub fn with(packages: &[&str], config: Config, lists: AppLists) -> Fixture {
        let host = InMemoryHost::new();
        for p in packages {
            host.install(p, p, Some(Bitmap::solid(8, 8, crate::model::color::Color::BLACK)));
            let id = host.push_task(p);
            host.set_thumbnail(id, Bitmap::solid(4, 6, crate::model::color::Color::WHITE));
        }
        let host = Arc::new(host);
        let prefs = PreferenceStore::in_memory(lists).into_shared();
        let view = Recorder::default();
        let (tx, rx) = actor::channel();
        let switcher = Switcher::new(
            config,
            HostServices::from_host(host.clone()),
            prefs.clone(),
            Box::new(RecordingView(view.clone())),
            tx,
        )
        .with_gesture_view(Box::new(RecordingGesture(view.clone())));
        Fixture { host, prefs, switcher, rx, view }
    }

    /// Shows the switcher, waits for the list and all artwork, then forgets
    /// every host and view call made so far.
    pub fn shown(mut self) -> Fixture {
        self.switcher.show();
        self.wait_for_load();
        self.settle();
        self.host.take_calls();
        self.view.take();
        self
    }

    pub fn pump_until(&mut self, cond: impl Fn(&Switcher) -> bool) {
        while !cond(&self.switcher) {
            let event = recv_event(&mut self.rx, Duration::from_secs(5))
                .expect("timed out waiting for switcher event");
            self.switcher.handle_event(event);
        }
    }

    pub fn wait_for_load(&mut self) { self.pump_until(|s| !s.is_loading()); }

    /// Handles events until the loader has been quiet for a little while.
    pub fn settle(&mut self) {
        while let Some(event) = recv_event(&mut self.rx, Duration::from_millis(100)) {
            self.switcher.handle_event(event);
        }
    }

    pub fn task(&self, id: i32) -> Arc<Task> {
        self.switcher.tasks().find(PersistentTaskId(id)).cloned().expect("no such task")
    }

    pub fn all_ids(&self) -> Vec<i32> { ids(self.switcher.tasks().all()) }

    pub fn visible_ids(&self) -> Vec<i32> { ids(&self.switcher.visible_tasks()) }

    pub fn removals(&self) -> Vec<HostCall> {
        self.host.calls().into_iter().filter(HostCall::is_removal).collect()
    }
}
