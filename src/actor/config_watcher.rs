use std::collections::HashSet;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::time::Duration;
use std::{fs, thread};

use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, DebouncedEvent, DebouncedEventKind, new_debouncer};
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::actor::config::{self as config_actor, Event as ConfigEvent};
use crate::common::config::{self, ConfigCommand};

/// Watches the config file and asks the config actor to reload it while
/// `hot_reload` is enabled.
pub struct ConfigWatcher {
    file: PathBuf,
    real_file: Option<PathBuf>,
    real_file_id: Option<(u64, u64)>,
    config_tx: config_actor::Sender,
    enabled: bool,
}

impl ConfigWatcher {
    fn new(config_tx: config_actor::Sender, config: &config::Config, file: PathBuf) -> ConfigWatcher {
        let real_file = fs::canonicalize(&file).ok();
        let real_file_id = real_file
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| (m.dev(), m.ino()));
        ConfigWatcher {
            file,
            real_file,
            real_file_id,
            config_tx,
            enabled: config.settings.hot_reload,
        }
    }

    pub fn spawn(config_tx: config_actor::Sender, config: config::Config, config_path: PathBuf) {
        thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || {
                let actor = ConfigWatcher::new(config_tx, &config, config_path);
                crate::sys::executor::Executor::run(async move {
                    if let Err(e) = actor.run().await {
                        warn!("config-watcher: error: {e:?}");
                    }
                })
            })
            .expect("failed to spawn config-watcher thread");
    }

    async fn run(mut self) -> notify::Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<DebouncedEvent>();

        let mut debouncer = new_debouncer(Duration::from_millis(250), move |res: DebounceEventResult| {
            if let Ok(events) = res {
                for e in events {
                    if e.kind == DebouncedEventKind::Any {
                        let _ = tx.send(e);
                    }
                }
            }
        })?;

        let watcher = debouncer.watcher();

        let mut parents: HashSet<PathBuf> = HashSet::new();
        if let Some(p) = self.file.parent() {
            parents.insert(p.to_path_buf());
        }
        if let Some(real) = &self.real_file
            && let Some(p) = real.parent()
        {
            parents.insert(p.to_path_buf());
        }

        for dir in parents.iter() {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            info!("watching {:?}", dir);
        }

        while let Some(event) = rx.recv().await {
            if !self.is_relevant(&event) {
                continue;
            }

            trace!("change detected (debounced): {:?} {:?}", event.kind, event.path);

            if !self.enabled {
                debug!("hot reload disabled, ignoring change");
                continue;
            }

            match self.request_reload().await {
                Ok(()) => {
                    if let Ok(new_config) = self.query_config().await {
                        self.enabled = new_config.settings.hot_reload;
                        debug!("config reloaded successfully");
                    }
                }
                Err(e) => warn!("config reload failed: {e}"),
            }
        }

        Ok(())
    }

    fn is_relevant(&self, event: &DebouncedEvent) -> bool {
        if event.path == self.file {
            return true;
        }

        if let Some(real) = &self.real_file {
            if event.path == *real {
                return true;
            }

            if let Ok(ev_real) = fs::canonicalize(&event.path)
                && ev_real == *real
            {
                return true;
            }

            if let Ok(meta) = fs::metadata(&event.path)
                && let Some((dev, ino)) = self.real_file_id
                && meta.dev() == dev
                && meta.ino() == ino
            {
                return true;
            }
        }

        event.path.file_name().is_some_and(|n| Some(n) == self.file.file_name())
    }

    async fn request_reload(&self) -> Result<(), String> {
        info!("requesting config reload");
        let (tx, rx) = oneshot::channel();
        let msg = ConfigEvent::ApplyConfig {
            cmd: ConfigCommand::ReloadConfig,
            response: tx,
        };
        if self.config_tx.try_send(msg).is_err() {
            return Err("Config actor unavailable".to_string());
        }
        rx.await.map_err(|_| "Config actor dropped the request".to_string())?
    }

    async fn query_config(&self) -> Result<config::Config, ()> {
        let (tx, rx) = oneshot::channel();
        if self.config_tx.try_send(ConfigEvent::QueryConfig(tx)).is_err() {
            return Err(());
        }
        rx.await.map_err(|_| ())
    }
}
