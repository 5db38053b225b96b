use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use switcher::actor::config::ConfigActor;
use switcher::actor::config_watcher::ConfigWatcher;
use switcher::actor::switcher::{Command, Event, Switcher};
use switcher::common::config::{Config, config_file, prefs_file, stats_file};
use switcher::common::log;
use switcher::common::prefs::{AppLists, PreferenceStore};
use switcher::model::Task;
use switcher::sys::host::HostServices;
use switcher::sys::memory_host::InMemoryHost;
use switcher::sys::view::SwitcherView;
use tokio::sync::oneshot;
use tracing::warn;

#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to the persisted app lists (overrides default).
    #[arg(long, value_name = "PATH")]
    prefs: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the switcher against a demo host, printing the task list after
    /// every change.
    Run {
        /// Commands to run in order, as JSON, e.g. '"show"' or
        /// '{"kill_task":{"task":101}}'.
        commands: Vec<String>,

        /// Keep running after the commands until interrupted, reloading the
        /// config file when it changes.
        #[arg(long)]
        stay: bool,
    },
    /// Check the configuration file without starting anything.
    Validate,
    /// Print the persisted app lists.
    Prefs,
}

fn main() {
    sigpipe::reset();
    let opt = Cli::parse();
    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let prefs_path = opt.prefs.clone().unwrap_or_else(prefs_file);

    match opt.command {
        Commands::Validate => validate(&config_path),
        Commands::Prefs => print_prefs(&prefs_path),
        Commands::Run { commands, stay } => {
            if std::env::var_os("RUST_BACKTRACE").is_none() {
                // SAFETY: We are single threaded at this point.
                unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
            }
            log::init_logging();
            install_panic_hook();
            run(config_path, prefs_path, &commands, stay);
        }
    }
}

fn validate(config_path: &std::path::Path) {
    let config = match Config::read(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", config_path.display());
            process::exit(1);
        }
    };
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config validation passed");
    } else {
        for issue in issues {
            eprintln!("{}", issue);
        }
        process::exit(1);
    }
}

fn print_prefs(prefs_path: &std::path::Path) {
    match PreferenceStore::open(prefs_path) {
        Ok(store) => print!("{}", render_lists(store.lists())),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn render_lists(lists: &AppLists) -> String {
    use ascii_tree::Tree;
    let leaf = |items: Vec<String>| Tree::Leaf(items);
    let tree = Tree::Node("prefs".to_string(), vec![
        Tree::Node("locked".to_string(), vec![leaf(lists.locked.clone())]),
        Tree::Node("hidden".to_string(), vec![leaf(lists.hidden.iter().cloned().collect())]),
        Tree::Node("favorites".to_string(), vec![leaf(lists.favorites.clone())]),
    ]);
    let mut out = String::new();
    _ = ascii_tree::write_tree(&mut out, &tree);
    out
}

fn run(config_path: PathBuf, prefs_path: PathBuf, commands: &[String], stay: bool) {
    let commands: Vec<Command> = match commands.iter().map(|c| serde_json::from_str(c)).collect() {
        Ok(commands) => commands,
        Err(e) => {
            eprintln!("Invalid command: {e}");
            process::exit(1);
        }
    };

    let config = match Config::read_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", config_path.display());
            process::exit(1);
        }
    };
    let issues = config.validate();
    if !issues.is_empty() {
        for issue in issues {
            eprintln!("{}", issue);
        }
        process::exit(1);
    }

    let prefs = PreferenceStore::open(&prefs_path).unwrap_or_else(|e| {
        warn!("Falling back to empty app lists: {e}");
        PreferenceStore::in_memory(AppLists::default())
    });
    let stats_path = config.settings.launch_stats.then(stats_file);

    let host = Arc::new(InMemoryHost::demo());
    let (events_tx, switcher_thread) = Switcher::spawn(
        config.clone(),
        HostServices::from_host(host),
        prefs.into_shared(),
        Box::new(TerminalView),
        None,
        stats_path,
    );

    for cmd in commands {
        events_tx.send(Event::Command(cmd));
        let (tx, rx) = oneshot::channel();
        events_tx.send(Event::WhenLoaded(tx));
        _ = rx.blocking_recv();
    }

    if stay {
        let config_tx = ConfigActor::spawn_with_path(config.clone(), events_tx.clone(), config_path.clone());
        ConfigWatcher::spawn(config_tx, config, config_path);

        let events_tx_for_signal = events_tx.clone();
        ctrlc::set_handler(move || {
            events_tx_for_signal.send(Event::Shutdown);
        })
        .expect("Error setting Ctrl+C handler");
    } else {
        events_tx.send(Event::Shutdown);
    }

    if switcher_thread.join().is_err() {
        process::exit(1);
    }
}

/// Prints the published list as a tree.
struct TerminalView;

impl TerminalView {
    fn print(&self, title: &str, tasks: &[Arc<Task>]) {
        use ascii_tree::Tree;
        let nodes = tasks
            .iter()
            .map(|task| {
                let mut details = vec![task.launch().to_string()];
                if task.is_locked() {
                    details.push("locked".to_string());
                }
                Tree::Node(
                    format!("{} {}", task.persistent_id(), task.label().as_deref().unwrap_or(task.package())),
                    vec![Tree::Leaf(details)],
                )
            })
            .collect();
        let mut out = String::new();
        _ = ascii_tree::write_tree(&mut out, &Tree::Node(title.to_string(), nodes));
        print!("{out}");
    }
}

impl SwitcherView for TerminalView {
    fn show(&mut self) { println!("shown"); }
    fn hide(&mut self, fast: bool) { println!("hidden{}", if fast { " (fast)" } else { "" }); }
    fn update(&mut self, tasks: &[Arc<Task>]) { self.print("tasks", tasks); }

    fn refresh(&mut self, tasks: &[Arc<Task>]) {
        if !tasks.is_empty() {
            self.print("tasks", tasks);
        }
    }
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // Abort on panic instead of propagating panics to the main thread.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
