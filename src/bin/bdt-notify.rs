extern crate birthday_tracker as lib;

use chrono::{Local, NaiveTime};
use flexi_logger::{Duplicate, FileSpec, Logger};
use lib::config::{load_suitable_config, Config};
use lib::reminder::{duration_until_next_check, notify_due, DesktopNotifier, ReminderLog};
use lib::store::{StoreWatcher, Storelike, TomlStore};
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "bdt-notify",
    author = "Julian Bigge <j.reedts@gmail.com>",
    about = "Reminder daemon of the birthday tracker."
)]
pub struct Args {
    #[structopt(
        name = "CONFIG",
        short = "c",
        long = "config",
        help = "path to config file",
        parse(from_os_str)
    )]
    pub configfile: Option<PathBuf>,

    #[structopt(long = "log-file", help = "path to log file", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    #[structopt(long = "once", help = "scan once and exit")]
    pub once: bool,
}

fn reload_config(path: Option<&Path>, current: Config) -> Config {
    match load_suitable_config(path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Keeping previous configuration: {}", e);
            current
        }
    }
}

fn open_watcher(store: &TomlStore) -> Option<StoreWatcher> {
    match store.watch() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            log::warn!("Not watching '{}' for changes: {}", store.path().display(), e);
            None
        }
    }
}

/// Switches to the store named by `config` if it moved. Returns whether it did.
fn follow_store(
    store: &mut TomlStore,
    watcher: &mut Option<StoreWatcher>,
    config: &Config,
) -> lib::Result<bool> {
    if store.path() == config.store_path {
        return Ok(false);
    }

    let moved = TomlStore::open(&config.store_path)?;
    log::info!(
        "Store moved from '{}' to '{}'",
        store.path().display(),
        moved.path().display()
    );
    *watcher = open_watcher(&moved);
    *store = moved;
    Ok(true)
}

fn scan(store: &TomlStore, config: &Config, notifier: &mut DesktopNotifier, sent: &mut ReminderLog) {
    let today = Local::now().date_naive();

    match store.all() {
        Ok(birthdays) => {
            let delivered = notify_due(&birthdays, &config.preferences, today, notifier, sent);
            log::info!(
                "Checked {} birthdays for {}, sent {} reminders",
                birthdays.len(),
                today,
                delivered
            );
        }
        Err(e) => log::error!("Could not read birthdays: {}", e),
    }
}

fn past_check_time(check_time: NaiveTime) -> bool {
    Local::now().time() >= check_time
}

/// Blocks until the next check is due. Returns early with `true` if the
/// store was modified in the meantime.
fn wait(watcher: Option<&StoreWatcher>, timeout: std::time::Duration) -> bool {
    let Some(watcher) = watcher else {
        std::thread::sleep(timeout);
        return false;
    };

    match watcher.events().recv_timeout(timeout) {
        Ok(_) => {
            // A single write shows up as several file system events
            while watcher.events().try_recv().is_ok() {}
            true
        }
        Err(RecvTimeoutError::Timeout) => false,
        Err(RecvTimeoutError::Disconnected) => {
            std::thread::sleep(timeout);
            false
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::from_args();

    let mut logger = Logger::try_with_env_or_str("info")?.duplicate_to_stderr(Duplicate::Warn);

    if let Some(log_file) = args.log_file {
        logger = logger
            .log_to_file(FileSpec::try_from(log_file)?)
            .print_message();
    }

    let _logger = logger.start()?;

    // Runs unattended, so the report goes to the log as well
    std::panic::set_hook(Box::new(|info| {
        let backtrace = backtrace::Backtrace::new();
        log::error!("bdt-notify ran into a fatal error: {}\n{:?}", info, backtrace);
        eprintln!(
            "Consider filing an issue with a log file and the backtrace below at {}",
            env!("CARGO_PKG_REPOSITORY")
        );
        eprintln!("{}", info);
        eprintln!("{:?}", backtrace);
    }));

    let mut config = load_suitable_config(args.configfile.as_deref())?;
    let mut store = TomlStore::open(&config.store_path)?;
    let mut watcher = open_watcher(&store);

    let mut notifier = DesktopNotifier;
    let mut sent = ReminderLog::default();

    scan(&store, &config, &mut notifier, &mut sent);

    if args.once {
        return Ok(());
    }

    loop {
        let to_sleep = duration_until_next_check(Local::now().naive_local(), config.check_time.0);
        log::info!("Sleeping {} until next check at {}", to_sleep, config.check_time);

        // Chrono duration may be negative, in which case we do not want to sleep
        let modified = wait(
            watcher.as_ref(),
            to_sleep.to_std().unwrap_or(std::time::Duration::ZERO),
        );

        config = reload_config(args.configfile.as_deref(), config);

        let moved = match follow_store(&mut store, &mut watcher, &config) {
            Ok(moved) => moved,
            Err(e) => {
                log::warn!("Keeping store '{}': {}", store.path().display(), e);
                false
            }
        };

        if modified || moved {
            if !past_check_time(config.check_time.0) {
                log::debug!("Store changed before check time, waiting");
                continue;
            }
            log::info!("Store changed, checking again");
        }

        scan(&store, &config, &mut notifier, &mut sent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib::NewBirthday;

    #[test]
    fn follows_moved_store() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().hyphenated().to_string());
        let mut store = TomlStore::open(&dir.join("old.toml")).unwrap();
        let mut watcher = None;

        let mut config = Config::default();
        config.store_path = dir.join("old.toml");
        assert!(!follow_store(&mut store, &mut watcher, &config).unwrap());
        assert!(watcher.is_none());

        config.store_path = dir.join("new.toml");
        let mut moved = TomlStore::open(&config.store_path).unwrap();
        moved.insert(NewBirthday::new("Bob", 6, 12)).unwrap();

        assert!(follow_store(&mut store, &mut watcher, &config).unwrap());
        assert_eq!(store.path(), config.store_path.as_path());
        assert_eq!(store.all().unwrap()[0].name, "Bob");
        assert!(watcher.is_some());

        drop(watcher);
        let _ = std::fs::remove_dir_all(dir);
    }
}
