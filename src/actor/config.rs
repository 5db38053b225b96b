use std::path::PathBuf;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::actor::{self, switcher};
use crate::common::config::{Config, ConfigCommand};

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Debug)]
pub enum Event {
    QueryConfig(oneshot::Sender<Config>),
    ApplyConfig {
        cmd: ConfigCommand,
        response: oneshot::Sender<Result<(), String>>,
    },
}

pub struct ConfigActor {
    config: Config,
    switcher_tx: switcher::Sender,
    config_path: PathBuf,
}

impl ConfigActor {
    pub fn spawn(config: Config, switcher_tx: switcher::Sender) -> Sender {
        Self::spawn_with_path(config, switcher_tx, crate::common::config::config_file())
    }

    pub fn spawn_with_path(
        config: Config,
        switcher_tx: switcher::Sender,
        config_path: PathBuf,
    ) -> Sender {
        let (tx, rx) = actor::channel();
        std::thread::Builder::new()
            .name("config".to_string())
            .spawn(move || {
                let actor = ConfigActor { config, switcher_tx, config_path };
                crate::sys::executor::Executor::run(actor.run(rx));
            })
            .expect("failed to spawn config thread");
        tx
    }

    async fn run(mut self, mut events: Receiver) {
        while let Some((span, event)) = events.recv().await {
            let _guard = span.enter();
            match event {
                Event::QueryConfig(resp) => {
                    _ = resp.send(self.config.clone());
                }
                Event::ApplyConfig { cmd, response } => {
                    let res = self.handle_config_command(cmd);
                    _ = response.send(res);
                }
            }
        }
    }

    fn handle_config_command(&mut self, cmd: ConfigCommand) -> Result<(), String> {
        debug!("Applying config command: {:?}", cmd);

        let mut new_config = self.config.clone();
        let mut config_changed = false;
        let mut errors: Vec<String> = Vec::new();

        macro_rules! set_value {
            ($path:expr, $value:expr, $name:literal) => {{
                $path = $value;
                config_changed = true;
                info!("Updated {} to: {}", $name, $value);
            }};
        }

        match cmd {
            ConfigCommand::SetRestrictedMode(v) => {
                set_value!(new_config.settings.restricted_mode, v, "restricted_mode")
            }
            ConfigCommand::SetUsePowerHint(v) => {
                set_value!(new_config.settings.use_power_hint, v, "use_power_hint")
            }
            ConfigCommand::SetFilterTime(v) => {
                set_value!(new_config.settings.filter_time_hours, v, "filter_time_hours")
            }
            ConfigCommand::SetFilterBoot(v) => set_value!(new_config.settings.filter_boot, v, "filter_boot"),
            ConfigCommand::SetFilterRunning(v) => {
                set_value!(new_config.settings.filter_running, v, "filter_running")
            }
            ConfigCommand::SetTopSortLockedApps(v) => {
                set_value!(new_config.settings.top_sort_locked_apps, v, "top_sort_locked_apps")
            }
            ConfigCommand::SetLaunchStats(v) => {
                set_value!(new_config.settings.launch_stats, v, "launch_stats")
            }

            ConfigCommand::Set { key, value } => match serde_json::to_value(&new_config) {
                Ok(mut cfg_val) => {
                    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
                    if parts.is_empty() {
                        errors.push("Empty config key provided".to_string());
                    } else {
                        let mut cur = &mut cfg_val;
                        let mut failed = false;
                        for (i, part) in parts.iter().enumerate() {
                            let Some(obj) = cur.as_object_mut() else {
                                errors.push(format!("Invalid config path: {}", key));
                                failed = true;
                                break;
                            };
                            if i + 1 == parts.len() {
                                obj.insert(part.to_string(), value.clone());
                                break;
                            }
                            cur = obj.entry(part.to_string()).or_insert_with(|| serde_json::json!({}));
                        }

                        if !failed {
                            match serde_json::from_value::<Config>(cfg_val) {
                                Ok(cfg2) => {
                                    new_config = cfg2;
                                    config_changed = true;
                                    info!("Updated {} to {}", key, value);
                                }
                                Err(e) => {
                                    errors.push(format!(
                                        "Failed to deserialize config after setting '{}': {}",
                                        key, e
                                    ));
                                }
                            }
                        }
                    }
                }
                Err(e) => errors.push(format!("Failed to serialize config for modification: {}", e)),
            },

            ConfigCommand::GetConfig => {
                let config_json = serde_json::to_string_pretty(&self.config)
                    .unwrap_or_else(|e| format!("Error serializing config: {}", e));
                info!("Current config:\n{}", config_json);
                return Ok(());
            }
            ConfigCommand::SaveConfig => {
                return match self.config.save(&self.config_path) {
                    Ok(()) => {
                        info!("Config saved successfully");
                        Ok(())
                    }
                    Err(e) => Err(format!("Failed to save config: {}", e)),
                };
            }
            ConfigCommand::ReloadConfig => match self.load_config_from_file() {
                Ok(cfg) => {
                    info!("Config reloaded successfully");
                    config_changed = true;
                    new_config = cfg;
                }
                Err(e) => return Err(format!("Failed to reload config: {}", e)),
            },
        }

        if !errors.is_empty() {
            return Err(errors.join("; "));
        }

        let validation_issues = new_config.validate();
        if !validation_issues.is_empty() {
            return Err(validation_issues.join("; "));
        }

        if config_changed && new_config != self.config {
            self.config = new_config;
            self.switcher_tx
                .send(switcher::Event::ConfigUpdated(Box::new(self.config.clone())));
        }

        Ok(())
    }

    fn load_config_from_file(&self) -> anyhow::Result<Config> {
        if self.config_path.exists() {
            Config::read(&self.config_path)
        } else {
            anyhow::bail!("Config file not found")
        }
    }
}
