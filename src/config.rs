use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

const CONFIG_PATH_ENV_VAR: &str = "BIRTHDAY_TRACKER_CONFIG_FILE";
const APP_DIR: &str = "birthday-tracker";

pub(crate) fn find_configfile_locations() -> io::Result<Vec<PathBuf>> {
    let config_env = env::var(CONFIG_PATH_ENV_VAR).ok().map(PathBuf::from);

    let home = dirs::home_dir().ok_or_else(|| {
        io::Error::new(io::ErrorKind::Other, "Unable to find home directory")
    })?;

    let home_config = home.join(".birthday-tracker.toml");

    let config_xdg = dirs::config_dir()
        .unwrap_or_else(|| home.join(".config"))
        .join(APP_DIR)
        .join("config.toml");

    let mut locations = vec![config_xdg, home_config];

    if let Some(path) = config_env {
        locations.insert(0, path);
    }

    Ok(locations)
}

/// Loads the config from `path`, or from the first existing default location.
/// Without any config file the defaults are used.
pub fn load_suitable_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load(path);
    }

    let locations = find_configfile_locations()?;

    match locations.iter().find(|p| p.is_file()) {
        Some(path) => Config::load(path),
        None => {
            log::info!("No config file found, using defaults");
            Ok(Config {
                source: locations.into_iter().next(),
                ..Config::default()
            })
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_default()
        .join("birthdays.toml")
}

/// Time of day, written as `HH:MM` (seconds are accepted but ignored on output).
#[derive(Clone, Copy, Debug, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct CheckTime(pub NaiveTime);

impl Default for CheckTime {
    fn default() -> Self {
        CheckTime(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

impl fmt::Display for CheckTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for CheckTime {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(CheckTime)
            .map_err(|e| {
                Error::new(
                    ErrorKind::Config,
                    &format!("Invalid time '{}': {}", s, e),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "store")]
    pub store_path: PathBuf,
    /// Local time of the daily reminder scan.
    pub check_time: CheckTime,
    pub preferences: Preferences,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_path: default_store_path(),
            check_time: CheckTime::default(),
            preferences: Preferences::default(),
            source: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content).map_err(|e| {
            Error::new(
                ErrorKind::Config,
                &format!("Could not parse '{}': {}", path.display(), e),
            )
        })?;

        log::debug!("Loaded config from '{}'", path.display());
        config.source = Some(path.to_owned());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(self).map_err(|e| {
            Error::new(
                ErrorKind::Config,
                &format!("Could not write '{}': {}", path.display(), e),
            )
        })?;
        fs::write(path, content)?;
        log::info!("Saved config to '{}'", path.display());
        Ok(())
    }

    /// Where this config was read from, or where it should be written to.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub enum DefaultView {
    #[default]
    List,
    Calendar,
}

impl fmt::Display for DefaultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultView::List => write!(f, "list"),
            DefaultView::Calendar => write!(f, "calendar"),
        }
    }
}

impl FromStr for DefaultView {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "list" => Ok(DefaultView::List),
            "calendar" => Ok(DefaultView::Calendar),
            _ => Err(Error::new(
                ErrorKind::Config,
                &format!("View '{}' not recognized", s),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::System => write!(f, "system"),
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Theme::System),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(Error::new(
                ErrorKind::Config,
                &format!("Theme '{}' not recognized", s),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub default_view: DefaultView,
    pub theme: Theme,
    pub notify_day_of: bool,
    pub notify_week_before: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            default_view: DefaultView::List,
            theme: Theme::System,
            notify_day_of: true,
            notify_week_before: true,
        }
    }
}

impl Preferences {
    pub const KEYS: [&'static str; 4] = [
        "default-view",
        "theme",
        "notify-day-of",
        "notify-week-before",
    ];

    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "default-view" => Ok(self.default_view.to_string()),
            "theme" => Ok(self.theme.to_string()),
            "notify-day-of" => Ok(self.notify_day_of.to_string()),
            "notify-week-before" => Ok(self.notify_week_before.to_string()),
            _ => Err(unknown_key(key)),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "default-view" => self.default_view = value.parse()?,
            "theme" => self.theme = value.parse()?,
            "notify-day-of" => self.notify_day_of = parse_bool(key, value)?,
            "notify-week-before" => self.notify_week_before = parse_bool(key, value)?,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn unknown_key(key: &str) -> Error {
    Error::new(
        ErrorKind::Config,
        &format!(
            "Unknown setting '{}', expected one of {}",
            key,
            Preferences::KEYS.join(", ")
        ),
    )
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(Error::new(
            ErrorKind::Config,
            &format!("'{}' expects true or false, got '{}'", key, value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let prefs = Preferences::default();
        assert_eq!(prefs.default_view, DefaultView::List);
        assert_eq!(prefs.theme, Theme::System);
        assert!(prefs.notify_day_of && prefs.notify_week_before);
        assert_eq!(Config::default().check_time.to_string(), "09:00");
    }

    #[test]
    fn partial_config_file() {
        let config: Config = toml::from_str(
            r#"
store = "/tmp/bd.toml"
check_time = "07:30"

[preferences]
theme = "Dark"
notify_week_before = false
"#,
        )
        .unwrap();

        assert_eq!(config.store_path, PathBuf::from("/tmp/bd.toml"));
        assert_eq!(config.check_time.0, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert!("7 o'clock".parse::<CheckTime>().is_err());
        assert_eq!(config.preferences.theme, Theme::Dark);
        assert_eq!(config.preferences.default_view, DefaultView::List);
        assert!(config.preferences.notify_day_of);
        assert!(!config.preferences.notify_week_before);
    }

    #[test]
    fn settings_by_key() {
        let mut prefs = Preferences::default();
        prefs.set("default-view", "calendar").unwrap();
        prefs.set("notify-day-of", "off").unwrap();

        assert_eq!(prefs.get("default-view").unwrap(), "calendar");
        assert_eq!(prefs.get("notify-day-of").unwrap(), "false");

        assert!(prefs.set("theme", "purple").is_err());
        assert!(prefs.set("notify-week-before", "maybe").is_err());
        assert!(prefs.get("colour").is_err());
        assert_eq!(prefs.theme, Theme::System);
    }

    #[test]
    fn save_and_load() {
        let path = std::env::temp_dir()
            .join(uuid::Uuid::new_v4().hyphenated().to_string())
            .join("config.toml");

        let mut config = Config::default();
        config.preferences.set("theme", "light").unwrap();
        config.save(&path).unwrap();

        let loaded = load_suitable_config(Some(&path)).unwrap();
        assert_eq!(loaded.preferences.theme, Theme::Light);
        assert_eq!(loaded.source(), Some(path.as_path()));
        assert_eq!(loaded.store_path, config.store_path);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_config_is_a_config_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().hyphenated().to_string());
        let path = dir.join("config.toml");

        let config = Config {
            store_path: PathBuf::from(OsStr::from_bytes(b"/tmp/\xffbirthdays.toml")),
            ..Config::default()
        };

        let err = config.save(&path).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Config));
        assert!(!path.exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn env_var_config_comes_first() {
        let path = std::env::temp_dir()
            .join(uuid::Uuid::new_v4().hyphenated().to_string())
            .join("config.toml");

        let mut config = Config::default();
        config.check_time = "06:15".parse().unwrap();
        config.save(&path).unwrap();

        env::set_var(CONFIG_PATH_ENV_VAR, &path);
        let locations = find_configfile_locations();
        let loaded = load_suitable_config(None);
        env::remove_var(CONFIG_PATH_ENV_VAR);

        let locations = locations.unwrap();
        assert_eq!(locations.len(), 3);
        assert_eq!(locations[0], path);
        assert!(locations[1].ends_with("birthday-tracker/config.toml"));
        assert!(locations[2].ends_with(".birthday-tracker.toml"));

        let loaded = loaded.unwrap();
        assert_eq!(loaded.source(), Some(path.as_path()));
        assert_eq!(loaded.check_time.to_string(), "06:15");

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
