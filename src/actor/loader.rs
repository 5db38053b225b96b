//! The task loader fetches the host's task list and each task's artwork on
//! background threads and hands the results to the switcher.
//!
//! There is one `task-loader` thread for full-list fetches and a small pool
//! of `artwork-loader` threads for icons, labels, colors and thumbnails.
//! Full-list fetches are tagged with a [`Generation`]; only the newest
//! generation is ever applied. Entities are never reused across fetches.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use crossbeam_channel::{Receiver as WorkQueue, Sender as WorkSender, unbounded};
use dashmap::DashSet;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, trace, warn};

use crate::actor::switcher;
use crate::common::config::Settings;
use crate::common::prefs::SharedPrefs;
use crate::model::bitmap::Bitmap;
use crate::model::color::Color;
use crate::model::generation::{Generation, GenerationStore};
use crate::model::icon_cache::IconCache;
use crate::model::task::{Task, TaskInfo};
use crate::model::task_list::{TaskFilter, TaskList};
use crate::sys::host::{HostError, HostServices};
use crate::sys::view::DisplayMetrics;

const PLACEHOLDER_THUMB: Color = Color(0xFF30_3030);
const PLACEHOLDER_ICON: Color = Color(0xFF9E_9E9E);

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("undecodable image: {0}")]
    Decode(#[from] image::ImageError),
}

struct FetchRequest {
    span: Span,
    generation: Generation,
    token: CancellationToken,
    num_tasks: usize,
    include_thumbnails: bool,
    notify: bool,
}

enum ArtworkRequest {
    Info(Span, Arc<Task>),
    Thumbnail(Span, Arc<Task>),
}

/// Placeholder bitmaps for the density they were rendered at.
struct Placeholders {
    density: f32,
    thumb: Arc<Bitmap>,
    icon: Arc<Bitmap>,
}

/// State shared between the loader handle and its worker threads.
struct Shared {
    host: HostServices,
    prefs: SharedPrefs,
    settings: RwLock<Settings>,
    metrics: RwLock<DisplayMetrics>,
    icons: IconCache,
    generations: GenerationStore,
    /// Tasks with an info request queued or running, by allocation address.
    pending_info: DashSet<usize>,
    placeholders: Mutex<Option<Placeholders>>,
    consumer: switcher::Sender,
}

pub struct TaskLoader {
    shared: Arc<Shared>,
    fetch_tx: Option<WorkSender<FetchRequest>>,
    artwork_tx: Option<WorkSender<ArtworkRequest>>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskLoader {
    pub fn new(
        host: HostServices,
        prefs: SharedPrefs,
        settings: Settings,
        consumer: switcher::Sender,
    ) -> TaskLoader {
        let shared = Arc::new(Shared {
            host,
            prefs,
            icons: IconCache::new(&settings.icon_cache),
            metrics: RwLock::new(DisplayMetrics::default()),
            generations: GenerationStore::new(),
            pending_info: DashSet::new(),
            placeholders: Mutex::new(None),
            consumer,
            settings: RwLock::new(settings),
        });

        let (fetch_tx, fetch_rx) = unbounded();
        let (artwork_tx, artwork_rx) = unbounded();
        let mut workers = Vec::new();

        let worker_shared = shared.clone();
        workers.push(
            thread::Builder::new()
                .name("task-loader".to_string())
                .spawn(move || fetch_worker(worker_shared, fetch_rx))
                .expect("failed to spawn task-loader thread"),
        );

        let artwork_workers = shared.settings.read().artwork_workers.max(1);
        for i in 0..artwork_workers {
            let worker_shared = shared.clone();
            let rx = artwork_rx.clone();
            workers.push(
                thread::Builder::new()
                    .name(format!("artwork-loader-{i}"))
                    .spawn(move || artwork_worker(worker_shared, rx))
                    .expect("failed to spawn artwork-loader thread"),
            );
        }

        TaskLoader {
            shared,
            fetch_tx: Some(fetch_tx),
            artwork_tx: Some(artwork_tx),
            workers,
        }
    }

    /// Abandons the in-flight full-list fetch, if any. Whatever it already
    /// produced is discarded on arrival.
    pub fn cancel_loading_tasks(&self) {
        if self.shared.generations.cancel() {
            debug!("cancelled in-flight task fetch");
        }
    }

    /// Starts a new full-list fetch, superseding any previous one.
    #[instrument(skip(self))]
    pub fn load_tasks_in_background(
        &self,
        num_tasks: usize,
        include_thumbnails: bool,
        notify: bool,
    ) -> Generation {
        let (generation, token) = self.shared.generations.begin();
        let Some(tx) = &self.fetch_tx else {
            debug!("loader is shut down");
            self.shared.generations.cancel();
            return generation;
        };
        let request = FetchRequest {
            span: Span::current(),
            generation,
            token,
            num_tasks,
            include_thumbnails,
            notify,
        };
        if tx.send(request).is_err() {
            warn!("task-loader thread is gone");
        }
        generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.shared.generations.is_current(generation)
    }

    /// Queues an icon/label/color lookup unless one already ran or is queued.
    pub fn load_task_info(&self, task: &Arc<Task>) {
        if task.is_info_loaded() || task.is_killed() {
            return;
        }
        let key = Arc::as_ptr(task) as usize;
        if !self.shared.pending_info.insert(key) {
            return;
        }
        let sent = self
            .artwork_tx
            .as_ref()
            .is_some_and(|tx| tx.send(ArtworkRequest::Info(Span::current(), task.clone())).is_ok());
        if !sent {
            self.shared.pending_info.remove(&key);
        }
    }

    /// Applies a resolved lookup to its task. Called on the switcher thread.
    pub fn apply_task_info(&self, task: &Arc<Task>, info: TaskInfo) {
        task.apply_info(info);
        self.shared.pending_info.remove(&(Arc::as_ptr(task) as usize));
    }

    /// Queues a thumbnail fetch unless one is already running for `task`.
    pub fn load_thumbnail(&self, task: &Arc<Task>) {
        if task.is_killed() || !task.try_begin_thumb_load() {
            return;
        }
        let sent = self
            .artwork_tx
            .as_ref()
            .is_some_and(|tx| tx.send(ArtworkRequest::Thumbnail(Span::current(), task.clone())).is_ok());
        if !sent {
            task.end_thumb_load();
        }
    }

    /// The placeholder thumbnail for the current display density.
    pub fn default_thumb(&self) -> Arc<Bitmap> { self.shared.default_thumb() }

    pub fn default_icon(&self) -> Arc<Bitmap> { self.shared.default_icon() }

    /// Swaps the settings used by later fetches and applies new icon cache
    /// bounds. The worker pool keeps the size it started with.
    pub fn update_settings(&self, settings: Settings) {
        self.shared.icons.resize(&settings.icon_cache);
        let mut current = self.shared.settings.write();
        if current.artwork_workers != settings.artwork_workers {
            warn!(
                running = current.artwork_workers,
                requested = settings.artwork_workers,
                "artwork_workers only takes effect on restart"
            );
        }
        *current = settings;
    }

    /// Returns whether the density changed, in which case every cached icon
    /// and placeholder was dropped.
    pub fn set_display_metrics(&self, metrics: DisplayMetrics) -> bool {
        *self.shared.metrics.write() = metrics;
        if !self.shared.icons.set_density(metrics.density) {
            return false;
        }
        self.shared.placeholders.lock().take();
        true
    }

    /// Drops cached icons after the installed package set changed.
    pub fn invalidate_icons(&self) { self.shared.icons.invalidate_all(); }

    pub fn icon_cache(&self) -> &IconCache { &self.shared.icons }

    pub fn pending_info_count(&self) -> usize { self.shared.pending_info.len() }

    /// Cancels outstanding work, stops the worker threads and releases
    /// cached bitmaps. The loader accepts no work afterwards.
    pub fn shutdown(&mut self) {
        if self.fetch_tx.is_none() && self.workers.is_empty() {
            return;
        }
        info!("shutting down task loader");
        self.shared.generations.cancel();
        self.fetch_tx.take();
        self.artwork_tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("loader thread panicked");
            }
        }
        self.shared.pending_info.clear();
        self.shared.icons.invalidate_all();
        self.shared.placeholders.lock().take();
    }
}

impl Drop for TaskLoader {
    fn drop(&mut self) {
        // Workers exit on their own once the queues close.
        self.shared.generations.cancel();
    }
}

impl Shared {
    fn placeholders(&self) -> (Arc<Bitmap>, Arc<Bitmap>) {
        let metrics = *self.metrics.read();
        let mut slot = self.placeholders.lock();
        if let Some(p) = slot.as_ref()
            && p.density == metrics.density
        {
            return (p.thumb.clone(), p.icon.clone());
        }
        let settings = self.settings.read();
        let (w, h) = thumb_size(&settings, metrics);
        let icon_px = metrics.px(settings.icon_size_dp);
        let p = Placeholders {
            density: metrics.density,
            thumb: Arc::new(Bitmap::solid(w, h, PLACEHOLDER_THUMB)),
            icon: Arc::new(Bitmap::solid(icon_px, icon_px, PLACEHOLDER_ICON)),
        };
        let out = (p.thumb.clone(), p.icon.clone());
        *slot = Some(p);
        out
    }

    fn default_thumb(&self) -> Arc<Bitmap> { self.placeholders().0 }

    fn default_icon(&self) -> Arc<Bitmap> { self.placeholders().1 }

    fn fetch_tasks(&self, request: FetchRequest) {
        let FetchRequest {
            span,
            generation,
            token,
            num_tasks,
            include_thumbnails,
            notify,
        } = request;
        let _guard = span.enter();

        if token.is_cancelled() {
            trace!(?generation, "fetch cancelled before it started");
            return;
        }

        let settings = self.settings.read().clone();
        let records = match self.host.tasks.list_running_tasks(settings.max_tasks) {
            Ok(records) => records,
            Err(e) => {
                debug!("listing running tasks failed: {e}");
                Vec::new()
            }
        };

        // Resolving records calls into the host; the prefs lock must not be held.
        let locked = self.prefs.read().lists().locked.clone();
        let mut tasks = Vec::with_capacity(records.len());
        for record in records {
            if token.is_cancelled() {
                trace!(?generation, "fetch cancelled while resolving");
                return;
            }
            if self.host.packages.resolve(&record.launch).is_none() {
                debug!(launch = %record.launch, "skipping unresolvable task");
                continue;
            }
            let task = Arc::new(Task::new(record));
            task.set_locked(locked.iter().any(|p| p == task.package()));
            tasks.push(task);
        }

        if settings.revert_recents {
            tasks.reverse();
        }
        if settings.top_sort_locked_apps {
            tasks.sort_by_key(|t| !t.is_locked());
        }

        let filter = TaskFilter {
            hidden: self.prefs.read().lists().hidden.clone(),
            window_start: settings.filter_time().and_then(|d| SystemTime::now().checked_sub(d)),
            boot_time: settings.filter_boot.then(|| self.host.tasks.boot_time()),
            running_only: settings.filter_running,
            limit: num_tasks,
        };

        if token.is_cancelled() {
            trace!(?generation, "fetch cancelled before delivery");
            return;
        }
        self.generations.finish(generation);
        debug!(?generation, count = tasks.len(), "fetched tasks");
        self.consumer.send(switcher::Event::TasksLoaded {
            generation,
            list: TaskList::new(tasks, filter),
            include_thumbnails,
            notify,
        });
    }

    fn fetch_info(&self, task: Arc<Task>) {
        let settings = self.settings.read().clone();
        let metrics = *self.metrics.read();
        let item = self.host.packages.resolve(task.launch());

        let icon = item
            .as_ref()
            .and_then(|i| {
                self.icons.get_resized(&*self.host.packages, i, metrics, settings.icon_size_dp)
            })
            .unwrap_or_else(|| self.default_icon());
        let colors = self.host.tasks.task_colors(task.persistent_id()).unwrap_or_else(|e| {
            debug!(task = %task.persistent_id(), "no task colors: {e}");
            Default::default()
        });

        let info = TaskInfo {
            label: Some(item.map_or_else(|| task.package().to_string(), |i| i.label)),
            icon: Some(icon),
            primary_color: colors.primary,
            background_color: colors.background,
        };
        self.consumer.send(switcher::Event::TaskInfoLoaded { task, info });
    }

    fn fetch_thumbnail(&self, task: &Task) -> Result<Arc<Bitmap>, LoaderError> {
        let bytes = self.host.tasks.task_thumbnail(task.persistent_id())?;
        let bitmap = Bitmap::decode(&bytes)?;
        let (w, h) = thumb_size(&self.settings.read(), *self.metrics.read());
        Ok(Arc::new(bitmap.resized(w, h)))
    }

    fn load_thumbnail(&self, task: Arc<Task>) {
        let thumb = self.fetch_thumbnail(&task).unwrap_or_else(|e| {
            debug!(task = %task.persistent_id(), "using placeholder thumbnail: {e}");
            self.default_thumb()
        });
        self.consumer.send(switcher::Event::ThumbnailLoaded { task, thumb });
    }
}

fn thumb_size(settings: &Settings, metrics: DisplayMetrics) -> (u32, u32) {
    let scale = |dp: u32| ((dp as f64 * settings.thumbnail.ratio).round() as u32).max(1);
    (
        metrics.px(scale(settings.thumbnail.width_dp)),
        metrics.px(scale(settings.thumbnail.height_dp)),
    )
}

fn fetch_worker(shared: Arc<Shared>, queue: WorkQueue<FetchRequest>) {
    while let Ok(request) = queue.recv() {
        shared.fetch_tasks(request);
    }
    trace!("task-loader exiting");
}

fn artwork_worker(shared: Arc<Shared>, queue: WorkQueue<ArtworkRequest>) {
    while let Ok(request) = queue.recv() {
        match request {
            ArtworkRequest::Info(span, task) => {
                let _guard = span.enter();
                shared.fetch_info(task);
            }
            ArtworkRequest::Thumbnail(span, task) => {
                let _guard = span.enter();
                shared.load_thumbnail(task);
            }
        }
    }
    trace!("artwork-loader exiting");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::actor;
    use crate::common::prefs::{AppLists, PreferenceStore};
    use crate::model::task::{LaunchDescriptor, PersistentTaskId};
    use crate::sys::memory_host::{HostCall, InMemoryHost};
    use crate::sys::package::{PackageItem, PackageResolver};

    struct Harness {
        host: Arc<InMemoryHost>,
        loader: TaskLoader,
        rx: switcher::Receiver,
    }

    fn harness(host: InMemoryHost, lists: AppLists, settings: Settings) -> Harness {
        let host = Arc::new(host);
        let (tx, rx) = actor::channel();
        let prefs = PreferenceStore::in_memory(lists).into_shared();
        let loader = TaskLoader::new(HostServices::from_host(host.clone()), prefs, settings, tx);
        Harness { host, loader, rx }
    }

    fn host_with(packages: &[&str]) -> InMemoryHost {
        let host = InMemoryHost::new();
        for p in packages {
            host.install(p, &p.to_uppercase(), Some(Bitmap::solid(8, 8, Color::BLACK)));
            let id = host.push_task(p);
            host.set_thumbnail(id, Bitmap::solid(20, 30, Color::WHITE));
        }
        host
    }

    fn next_event(rx: &mut switcher::Receiver) -> switcher::Event {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            match rx.try_recv() {
                Ok((_span, event)) => return event,
                Err(_) if std::time::Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(2))
                }
                Err(e) => panic!("no event from loader: {e}"),
            }
        }
    }

    fn ids(list: &TaskList) -> Vec<i32> { list.all().iter().map(|t| t.persistent_id().0).collect() }

    #[test]
    fn it_delivers_fetched_tasks_with_locked_flags_and_filter() {
        let lists = AppLists {
            locked: vec!["com.b".into()],
            hidden: ["com.c".to_string()].into(),
            ..Default::default()
        };
        let mut h = harness(host_with(&["com.a", "com.b", "com.c"]), lists, Settings::default());

        let generation = h.loader.load_tasks_in_background(0, true, true);
        match next_event(&mut h.rx) {
            switcher::Event::TasksLoaded { generation: g, list, include_thumbnails, notify } => {
                assert_eq!(generation, g);
                assert!(h.loader.is_current(g));
                assert!(include_thumbnails && notify);
                assert_eq!(vec![100, 101, 102], ids(&list));
                assert!(list.all()[1].is_locked());
                assert_eq!(2, list.visible().len());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    /// Blocks every `resolve` until the test lets it through.
    struct GatedResolver {
        inner: Arc<InMemoryHost>,
        entered: crossbeam_channel::Sender<()>,
        gate: crossbeam_channel::Receiver<()>,
    }

    impl PackageResolver for GatedResolver {
        fn resolve(&self, launch: &LaunchDescriptor) -> Option<PackageItem> {
            let _ = self.entered.send(());
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
            self.inner.resolve(launch)
        }

        fn icon_data(&self, item: &PackageItem) -> Option<Vec<u8>> { self.inner.icon_data(item) }
    }

    #[test]
    fn it_leaves_prefs_writable_while_resolving_records() {
        let host = Arc::new(host_with(&["com.a", "com.b", "com.c"]));
        let (entered_tx, entered_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let services = HostServices {
            tasks: host.clone(),
            packages: Arc::new(GatedResolver { inner: host, entered: entered_tx, gate: gate_rx }),
        };
        let prefs = PreferenceStore::in_memory(AppLists::default()).into_shared();
        let (tx, mut rx) = actor::channel();
        let mut loader = TaskLoader::new(services, prefs.clone(), Settings::default(), tx);

        loader.load_tasks_in_background(0, false, true);
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let mut store = prefs.try_write_for(Duration::from_millis(500)).expect("prefs stayed locked");
        assert!(store.add_to_hidden_apps("com.b"));
        drop(store);

        for _ in 0..3 {
            gate_tx.send(()).unwrap();
        }
        let switcher::Event::TasksLoaded { list, .. } = next_event(&mut rx) else {
            panic!("expected tasks");
        };
        assert_eq!(vec![100, 101, 102], ids(&list));
        assert_eq!(2, list.visible().len());
        loader.shutdown();
    }

    #[test]
    fn it_skips_entries_that_no_longer_resolve() {
        let host = host_with(&["com.a", "com.b"]);
        host.uninstall("com.a");
        let mut h = harness(host, AppLists::default(), Settings::default());

        h.loader.load_tasks_in_background(0, false, true);
        let switcher::Event::TasksLoaded { list, .. } = next_event(&mut h.rx) else {
            panic!("expected tasks");
        };
        assert_eq!(vec![101], ids(&list));
    }

    #[test]
    fn it_orders_locked_apps_first_when_configured() {
        let lists = AppLists { locked: vec!["com.c".into()], ..Default::default() };
        let settings = Settings {
            top_sort_locked_apps: true,
            revert_recents: true,
            ..Default::default()
        };
        let mut h = harness(host_with(&["com.a", "com.b", "com.c"]), lists, settings);

        h.loader.load_tasks_in_background(0, false, true);
        let switcher::Event::TasksLoaded { list, .. } = next_event(&mut h.rx) else {
            panic!("expected tasks");
        };
        // Reversed: c, b, a. Locked c stays first.
        assert_eq!(vec![102, 101, 100], ids(&list));
    }

    #[test]
    fn it_supersedes_older_generations() {
        let mut h = harness(host_with(&["com.a"]), AppLists::default(), Settings::default());
        let first = h.loader.load_tasks_in_background(0, true, true);
        let second = h.loader.load_tasks_in_background(0, true, false);
        assert!(!h.loader.is_current(first));

        let mut current = Vec::new();
        loop {
            if let switcher::Event::TasksLoaded { generation, notify, .. } = next_event(&mut h.rx) {
                if h.loader.is_current(generation) {
                    current.push(notify);
                }
                if generation == second {
                    break;
                }
            }
        }
        assert_eq!(vec![false], current);
    }

    #[test]
    fn it_discards_a_cancelled_fetch() {
        let mut h = harness(host_with(&["com.a"]), AppLists::default(), Settings::default());
        let generation = h.loader.load_tasks_in_background(0, true, true);
        h.loader.cancel_loading_tasks();
        assert!(!h.loader.is_current(generation));
        // Safe with nothing in flight.
        h.loader.cancel_loading_tasks();

        h.loader.shutdown();
        while let Ok((_, event)) = h.rx.try_recv() {
            if let switcher::Event::TasksLoaded { generation: g, .. } = event {
                assert!(!h.loader.is_current(g));
            }
        }
    }

    #[test]
    fn it_fetches_each_tasks_info_once() {
        let mut h = harness(host_with(&["com.a"]), AppLists::default(), Settings::default());
        h.loader.load_tasks_in_background(0, false, true);
        let switcher::Event::TasksLoaded { list, .. } = next_event(&mut h.rx) else {
            panic!("expected tasks");
        };
        let task = list.all()[0].clone();

        h.loader.load_task_info(&task);
        h.loader.load_task_info(&task);
        let switcher::Event::TaskInfoLoaded { task: t, info } = next_event(&mut h.rx) else {
            panic!("expected info");
        };
        assert!(Arc::ptr_eq(&task, &t));
        assert_eq!(Some("COM.A".to_string()), info.label);
        assert_eq!(1, h.loader.pending_info_count());

        h.loader.apply_task_info(&t, info);
        assert_eq!(0, h.loader.pending_info_count());
        h.loader.load_task_info(&task);
        h.loader.shutdown();
        assert!(h.rx.try_recv().is_err());
    }

    #[test]
    fn it_falls_back_to_placeholders() {
        let host = host_with(&["com.a"]);
        host.set_raw_icon("com.a", b"nope".to_vec());
        host.set_raw_thumbnail(PersistentTaskId(100), b"nope".to_vec());
        let mut h = harness(host, AppLists::default(), Settings::default());
        h.loader.load_tasks_in_background(0, true, true);
        let switcher::Event::TasksLoaded { list, .. } = next_event(&mut h.rx) else {
            panic!("expected tasks");
        };
        let task = list.all()[0].clone();

        h.loader.load_thumbnail(&task);
        let switcher::Event::ThumbnailLoaded { thumb, .. } = next_event(&mut h.rx) else {
            panic!("expected thumbnail");
        };
        assert!(Arc::ptr_eq(&h.loader.default_thumb(), &thumb));

        h.loader.load_task_info(&task);
        let switcher::Event::TaskInfoLoaded { info, .. } = next_event(&mut h.rx) else {
            panic!("expected info");
        };
        assert!(Arc::ptr_eq(&h.loader.default_icon(), &info.icon.unwrap()));
    }

    #[test]
    fn it_guards_concurrent_thumbnail_fetches() {
        let mut h = harness(host_with(&["com.a"]), AppLists::default(), Settings::default());
        h.loader.load_tasks_in_background(0, true, true);
        let switcher::Event::TasksLoaded { list, .. } = next_event(&mut h.rx) else {
            panic!("expected tasks");
        };
        let task = list.all()[0].clone();
        h.host.take_calls();

        h.loader.load_thumbnail(&task);
        h.loader.load_thumbnail(&task);
        let switcher::Event::ThumbnailLoaded { thumb, .. } = next_event(&mut h.rx) else {
            panic!("expected thumbnail");
        };
        assert_eq!((160, 240), (thumb.width(), thumb.height()));
        h.loader.shutdown();
        assert_eq!(vec![HostCall::TaskThumbnail(PersistentTaskId(100))], h.host.calls());
    }

    #[test]
    fn default_thumb_follows_density() {
        let h = harness(InMemoryHost::new(), AppLists::default(), Settings::default());
        let first = h.loader.default_thumb();
        assert!(Arc::ptr_eq(&first, &h.loader.default_thumb()));

        assert!(!h.loader.set_display_metrics(DisplayMetrics { density: 1.0 }));
        assert!(Arc::ptr_eq(&first, &h.loader.default_thumb()));

        assert!(h.loader.set_display_metrics(DisplayMetrics { density: 2.0 }));
        let dense = h.loader.default_thumb();
        assert_eq!(320, dense.width());
    }

    #[test]
    fn it_applies_new_icon_cache_bounds() {
        let h = harness(host_with(&["com.a", "com.b", "com.c"]), AppLists::default(), Settings::default());
        let resolver = &*h.loader.shared.host.packages;
        for p in ["com.a", "com.b", "com.c"] {
            let launch = LaunchDescriptor::new(p, format!("{p}.Main"));
            let item = resolver.resolve(&launch).unwrap();
            h.loader.icon_cache().get_package_icon_cached(resolver, &item);
        }
        assert_eq!(3, h.loader.icon_cache().len());

        let mut settings = Settings::default();
        settings.icon_cache.max_entries = 1;
        h.loader.update_settings(settings);
        assert_eq!(1, h.loader.icon_cache().len());
        assert_eq!(1, h.loader.shared.settings.read().icon_cache.max_entries);
    }

    #[test]
    fn shutdown_releases_everything_and_refuses_work() {
        let mut h = harness(host_with(&["com.a"]), AppLists::default(), Settings::default());
        h.loader.default_thumb();
        h.loader.shutdown();
        h.loader.shutdown();
        assert!(h.loader.icon_cache().is_empty());

        let generation = h.loader.load_tasks_in_background(0, true, true);
        assert!(!h.loader.is_current(generation));
        thread::sleep(Duration::from_millis(20));
        assert!(h.rx.try_recv().is_err());
    }
}
