use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::birthday::{Birthday, NewBirthday, Uid};
use crate::error::{Error, ErrorKind, Result};

/// Persistence for birthday records, keyed by [`Uid`].
pub trait Storelike {
    /// Snapshot of all records, ordered by month, day and name.
    fn all(&self) -> Result<Vec<Birthday>>;
    fn get(&self, uid: &Uid) -> Result<Option<Birthday>>;
    fn insert(&mut self, new_birthday: NewBirthday) -> Result<Birthday>;
    fn update(&mut self, birthday: Birthday) -> Result<()>;
    fn remove(&mut self, uid: &Uid) -> Result<Birthday>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default, rename = "birthday")]
    birthdays: Vec<Birthday>,
}

/// All birthdays in a single TOML file, re-read on every access so that
/// changes made by other processes are picked up.
pub struct TomlStore {
    path: PathBuf,
}

impl TomlStore {
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Err(Error::new(
                ErrorKind::StoreParse,
                &format!("'{}' is a directory", path.display()),
            ));
        }

        Ok(TomlStore {
            path: path.to_owned(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }

        let content = fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| {
            Error::from(e).with_msg(&format!("Store '{}' is corrupt", self.path.display()))
        })
    }

    fn save(&self, mut file: StoreFile) -> Result<()> {
        sort(&mut file.birthdays);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, toml::to_string(&file)?)?;
        fs::rename(&tmp_path, &self.path)?;

        log::info!(
            "Wrote {} birthdays to '{}'",
            file.birthdays.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Subscribes to changes of the store file made by anyone, including us.
    pub fn watch(&self) -> Result<StoreWatcher> {
        use notify::{RecursiveMode, Watcher};

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_owned(),
            None => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let file_name = self.path.file_name().map(OsString::from);
        let (queue_writer, queue_reader) = mpsc::channel();

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if is_store_modification(&event, file_name.as_deref()) {
                        let _ = queue_writer.send(StoreEvent::Modified);
                    }
                }
                Err(e) => log::error!("watch error: {:?}", e),
            })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(StoreWatcher {
            _watcher: watcher,
            events: queue_reader,
        })
    }
}

fn sort(birthdays: &mut [Birthday]) {
    birthdays.sort_by(|a, b| {
        (a.month, a.day, &a.name, &a.uid).cmp(&(b.month, b.day, &b.name, &b.uid))
    });
}

fn is_store_modification(event: &notify::Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    use notify::event::*;

    let touches_store = event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == file_name);

    touches_store
        && matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        )
}

impl Storelike for TomlStore {
    fn all(&self) -> Result<Vec<Birthday>> {
        let mut birthdays = self.load()?.birthdays;
        sort(&mut birthdays);
        Ok(birthdays)
    }

    fn get(&self, uid: &Uid) -> Result<Option<Birthday>> {
        Ok(self.load()?.birthdays.into_iter().find(|b| &b.uid == uid))
    }

    fn insert(&mut self, new_birthday: NewBirthday) -> Result<Birthday> {
        let mut file = self.load()?;

        let mut uid = Uid::new();
        while file.birthdays.iter().any(|b| b.uid == uid) {
            uid = Uid::new();
        }

        let birthday = new_birthday.finish(uid);
        file.birthdays.push(birthday.clone());
        self.save(file)?;

        Ok(birthday)
    }

    fn update(&mut self, birthday: Birthday) -> Result<()> {
        let mut file = self.load()?;

        let slot = file
            .birthdays
            .iter_mut()
            .find(|b| b.uid == birthday.uid)
            .ok_or_else(|| not_found(&birthday.uid))?;
        *slot = birthday;

        self.save(file)
    }

    fn remove(&mut self, uid: &Uid) -> Result<Birthday> {
        let mut file = self.load()?;

        let idx = file
            .birthdays
            .iter()
            .position(|b| &b.uid == uid)
            .ok_or_else(|| not_found(uid))?;
        let removed = file.birthdays.remove(idx);

        self.save(file)?;
        Ok(removed)
    }
}

fn not_found(uid: &Uid) -> Error {
    Error::new(ErrorKind::NotFound, &format!("No birthday with uid '{}'", uid))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Modified,
}

pub struct StoreWatcher {
    _watcher: notify::RecommendedWatcher,
    events: mpsc::Receiver<StoreEvent>,
}

impl StoreWatcher {
    pub fn events(&self) -> &mpsc::Receiver<StoreEvent> {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (TomlStore, PathBuf) {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().hyphenated().to_string());
        let store = TomlStore::open(&dir.join("birthdays.toml")).unwrap();
        (store, dir)
    }

    #[test]
    fn missing_file_is_empty() {
        let (store, _dir) = temp_store();
        assert!(store.all().unwrap().is_empty());
        assert!(store.get(&Uid::new()).unwrap().is_none());
    }

    #[test]
    fn insert_update_remove() {
        let (mut store, dir) = temp_store();

        let bob = store
            .insert(NewBirthday::new("Bob", 6, 12).category("Family"))
            .unwrap();
        let alice = store
            .insert(NewBirthday::new("Alice", 3, 1).year(2000))
            .unwrap();
        assert_ne!(bob.uid, alice.uid);

        let all = store.all().unwrap();
        assert_eq!(all, vec![alice.clone(), bob.clone()]);

        let mut renamed = bob.clone();
        renamed.name = "Robert".to_owned();
        store.update(renamed.clone()).unwrap();
        assert_eq!(store.get(&bob.uid).unwrap(), Some(renamed));

        let removed = store.remove(&alice.uid).unwrap();
        assert_eq!(removed, alice);
        assert_eq!(store.all().unwrap().len(), 1);

        // Reopening sees the same data
        let reopened = TomlStore::open(&dir.join("birthdays.toml")).unwrap();
        assert_eq!(reopened.all().unwrap()[0].name, "Robert");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_uid() {
        let (mut store, _dir) = temp_store();
        let ghost = NewBirthday::new("Ghost", 1, 1).finish(Uid::from("nope"));

        assert!(store.update(ghost).unwrap_err().is_not_found());
        assert!(store.remove(&Uid::from("nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn watch_reports_changes() {
        let (mut store, dir) = temp_store();
        let watcher = store.watch().unwrap();

        store.insert(NewBirthday::new("Bob", 6, 12)).unwrap();

        let event = watcher
            .events()
            .recv_timeout(std::time::Duration::from_secs(5));
        assert_eq!(event, Ok(StoreEvent::Modified));

        drop(watcher);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn reads_hand_written_file() {
        let (store, dir) = temp_store();
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            store.path(),
            r#"
[[birthday]]
uid = "b"
name = "Zed"
month = 12
day = 24

[[birthday]]
uid = "a"
name = "Leap"
month = 2
day = 29
year = 1996
category = "Friend"
"#,
        )
        .unwrap();

        let all = store.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Leap");
        assert_eq!(all[0].year, Some(1996));
        assert_eq!(all[1].category, "");

        fs::write(store.path(), "[[birthday]]\nname = 3").unwrap();
        assert!(matches!(
            store.all().unwrap_err().kind,
            ErrorKind::StoreParse
        ));

        let _ = fs::remove_dir_all(dir);
    }
}
