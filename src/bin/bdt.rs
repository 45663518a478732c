extern crate birthday_tracker as lib;

use chrono::{Local, NaiveDate};
use flexi_logger::{FileSpec, Logger};
use lib::agenda::{Agenda, Entry, SortOption};
use lib::calendar::{MonthGrid, MonthIndex};
use lib::config::{Config, DefaultView, Preferences};
use lib::occurrence::{current_age, next_occurrence};
use lib::store::{Storelike, TomlStore};
use lib::{Birthday, Error, ErrorKind, NewBirthday, Uid};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "bdt",
    author = "Julian Bigge <j.reedts@gmail.com>",
    about = "Birthday tracker - keeps track of birthdays and who is next."
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

    #[structopt(
        long = "today",
        help = "use this date (YYYY-MM-DD) instead of the current day"
    )]
    pub today: Option<NaiveDate>,

    #[structopt(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    #[structopt(about = "list all birthdays")]
    List {
        #[structopt(long = "sort", default_value = "date", help = "date, name or category")]
        sort: SortOption,
        #[structopt(long = "desc", help = "reverse the order")]
        desc: bool,
        #[structopt(long = "search", default_value = "", help = "only names containing this")]
        search: String,
    },
    #[structopt(about = "add a birthday")]
    Add {
        name: String,
        #[structopt(help = "month and day as MM-DD")]
        date: String,
        #[structopt(long = "year")]
        year: Option<i32>,
        #[structopt(long = "category", default_value = "")]
        category: String,
    },
    #[structopt(about = "change a birthday")]
    Edit {
        uid: String,
        #[structopt(long = "name")]
        name: Option<String>,
        #[structopt(long = "date", help = "month and day as MM-DD")]
        date: Option<String>,
        #[structopt(long = "year", conflicts_with = "no-year")]
        year: Option<i32>,
        #[structopt(long = "no-year", help = "forget the birth year")]
        no_year: bool,
        #[structopt(long = "category")]
        category: Option<String>,
    },
    #[structopt(about = "delete a birthday")]
    Remove { uid: String },
    #[structopt(about = "show a single birthday")]
    Show { uid: String },
    #[structopt(about = "show the next upcoming birthday")]
    Next,
    #[structopt(about = "show today's birthdays")]
    Today,
    #[structopt(about = "show a month calendar")]
    Month {
        #[structopt(long = "month")]
        month: Option<u32>,
        #[structopt(long = "year")]
        year: Option<i32>,
    },
    #[structopt(about = "show or change settings")]
    Settings {
        key: Option<String>,
        value: Option<String>,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Accepts a full uid or any unambiguous prefix of one.
fn resolve_uid(store: &impl Storelike, prefix: &str) -> lib::Result<Uid> {
    let matches: Vec<Uid> = store
        .all()?
        .into_iter()
        .map(|b| b.uid)
        .filter(|uid| uid.as_str().starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [uid] => Ok(uid.clone()),
        [] => Err(Error::new(
            ErrorKind::NotFound,
            &format!("No birthday with uid '{}'", prefix),
        )),
        _ => Err(Error::new(
            ErrorKind::NotFound,
            &format!("Uid '{}' is ambiguous", prefix),
        )),
    }
}

fn fetch(store: &impl Storelike, prefix: &str) -> lib::Result<Birthday> {
    let uid = resolve_uid(store, prefix)?;
    store.get(&uid)?.ok_or_else(|| {
        Error::new(
            ErrorKind::NotFound,
            &format!("Birthday '{}' no longer exists", uid),
        )
    })
}

fn describe_days(days: Option<i64>) -> String {
    match days {
        Some(0) => "today".to_owned(),
        Some(1) => "tomorrow".to_owned(),
        Some(n) => format!("in {} days", n),
        None => "invalid date".to_owned(),
    }
}

fn print_entry(entry: &Entry, is_next: bool) {
    let marker = if entry.is_today {
        '*'
    } else if is_next {
        '>'
    } else {
        ' '
    };
    let short_uid: String = entry.birthday.uid.as_str().chars().take(8).collect();
    let age = entry
        .age
        .map(|age| format!("Age {}", age))
        .unwrap_or_default();
    let category = if entry.birthday.category.is_empty() {
        "-"
    } else {
        entry.birthday.category.as_str()
    };

    println!(
        "{} {}  {}  {:<24} {:<12} {:<14} {}",
        marker,
        short_uid,
        entry.birthday.month_day_str(),
        entry.birthday.name,
        category,
        describe_days(entry.days_until),
        age
    );
}

fn print_birthday(birthday: &Birthday, today: NaiveDate) {
    println!("{}", birthday.name);
    println!("  uid:      {}", birthday.uid);
    match birthday.birth_date() {
        Some(date) => println!("  born:     {}", date),
        None => println!("  born:     {}", birthday.month_day_str()),
    }
    if !birthday.category.is_empty() {
        println!("  category: {}", birthday.category);
    }
    if let Some(age) = current_age(birthday, today) {
        println!("  age:      {}", age);
    }
    match next_occurrence(birthday, today) {
        Ok(next) => println!(
            "  next:     {} ({})",
            next,
            describe_days(Some(next.signed_duration_since(today).num_days()))
        ),
        Err(e) => println!("  next:     {}", e),
    }
}

fn list(agenda: &Agenda, sort: SortOption, desc: bool, search: &str, today: NaiveDate) {
    if agenda.is_empty() {
        println!("No birthdays yet. Add one with 'bdt add NAME MM-DD'.");
        return;
    }

    let next = agenda.next_upcoming(today).map(|b| b.uid.clone());
    for entry in agenda.list(search, sort, !desc, today) {
        print_entry(&entry, Some(&entry.birthday.uid) == next.as_ref());
    }
}

fn month(agenda: &Agenda, index: MonthIndex, today: NaiveDate) {
    let grid = MonthGrid::new(index, agenda, today);
    print!("{}", grid);

    let birthdays = agenda.birthdays_of_month(index.number());
    if !birthdays.is_empty() {
        println!();
        println!("Birthdays this month:");
        for birthday in birthdays {
            println!("  {:>2}  {}", birthday.day, birthday.name);
        }
    }
}

fn settings(
    config: &mut Config,
    key: Option<String>,
    value: Option<String>,
) -> lib::Result<()> {
    match (key, value) {
        (None, _) => {
            for key in Preferences::KEYS {
                println!("{} = {}", key, config.preferences.get(key)?);
            }
        }
        (Some(key), None) => println!("{}", config.preferences.get(&key)?),
        (Some(key), Some(value)) => {
            config.preferences.set(&key, &value)?;
            let path = config.source().map(PathBuf::from).ok_or_else(|| {
                Error::new(ErrorKind::Config, "No location to save settings to")
            })?;
            config.save(&path)?;
        }
    }
    Ok(())
}

fn run(args: Args, mut config: Config, today: NaiveDate) -> CliResult {
    let mut store = TomlStore::open(&config.store_path)?;

    let cmd = args.cmd.unwrap_or(match config.preferences.default_view {
        DefaultView::List => Command::List {
            sort: SortOption::default(),
            desc: false,
            search: String::new(),
        },
        DefaultView::Calendar => Command::Month {
            month: None,
            year: None,
        },
    });

    match cmd {
        Command::List { sort, desc, search } => {
            list(&Agenda::from_store(&store)?, sort, desc, &search, today)
        }
        Command::Add {
            name,
            date,
            year,
            category,
        } => {
            let (month, day) = lib::birthday::parse_month_day(&date)?;
            let draft = NewBirthday::new(&name, month, day)
                .year_opt(year)
                .category(&category);
            draft.validate(today)?;
            let birthday = store.insert(draft)?;
            println!("Birthday added successfully ({})", birthday.uid);
        }
        Command::Edit {
            uid,
            name,
            date,
            year,
            no_year,
            category,
        } => {
            let current = fetch(&store, &uid)?;

            let mut draft = NewBirthday::from(&current);
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(date) = date {
                let (month, day) = lib::birthday::parse_month_day(&date)?;
                draft.month = month;
                draft.day = day;
            }
            if no_year {
                draft.year = None;
            } else if year.is_some() {
                draft.year = year;
            }
            if let Some(category) = category {
                draft.category = category;
            }

            draft.validate(today)?;
            store.update(draft.finish(current.uid))?;
            println!("Birthday updated successfully");
        }
        Command::Remove { uid } => {
            let uid = resolve_uid(&store, &uid)?;
            let removed = store.remove(&uid)?;
            println!("Removed birthday of {}", removed.name);
        }
        Command::Show { uid } => {
            print_birthday(&fetch(&store, &uid)?, today);
        }
        Command::Next => {
            let agenda = Agenda::from_store(&store)?;
            match agenda.next_upcoming(today) {
                Some(birthday) => print_birthday(birthday, today),
                None => println!("No birthdays yet."),
            }
        }
        Command::Today => {
            let agenda = Agenda::from_store(&store)?;
            let mut any = false;
            for birthday in agenda.todays_birthdays(today) {
                any = true;
                print_birthday(birthday, today);
            }
            if !any {
                println!("No birthdays today.");
            }
        }
        Command::Month { month: m, year } => {
            let current = MonthIndex::current(today);
            let index = MonthIndex::from_number(
                m.unwrap_or_else(|| current.number()),
                year.unwrap_or(current.year),
            )
            .ok_or_else(|| Error::new(ErrorKind::InvalidDate, "Month must be within 1-12"))?;
            month(&Agenda::from_store(&store)?, index, today);
        }
        Command::Settings { key, value } => settings(&mut config, key, value)?,
    }

    Ok(())
}

fn main() -> CliResult {
    let args = Args::from_args();

    const DEFAULT_LOG_LEVEL: &str = if cfg!(debug_assertions) {
        "debug"
    } else {
        "warn"
    };

    let mut logger = Logger::try_with_env_or_str(DEFAULT_LOG_LEVEL)?;

    if let Some(log_file) = &args.log_file {
        logger = logger
            .log_to_file(FileSpec::try_from(log_file)?)
            .print_message();
    }

    let _logger = logger.start()?;

    std::panic::set_hook(Box::new(|info| {
        println!("bdt ran into a fatal error!");
        println!(
            "Consider filing an issue with a log file and the backtrace below at {}",
            env!("CARGO_PKG_REPOSITORY")
        );

        println!("{}", info);
        println!("{:?}", backtrace::Backtrace::new());
    }));

    let config = lib::config::load_suitable_config(args.configfile.as_deref())?;
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    run(args, config, today)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Lists a record that is already gone when it is fetched, as after a
    // concurrent delete.
    struct Vanishing(Vec<Birthday>);

    impl Storelike for Vanishing {
        fn all(&self) -> lib::Result<Vec<Birthday>> {
            Ok(self.0.clone())
        }
        fn get(&self, _uid: &Uid) -> lib::Result<Option<Birthday>> {
            Ok(None)
        }
        fn insert(&mut self, _new_birthday: NewBirthday) -> lib::Result<Birthday> {
            Err(Error::from(ErrorKind::NotFound))
        }
        fn update(&mut self, _birthday: Birthday) -> lib::Result<()> {
            Err(Error::from(ErrorKind::NotFound))
        }
        fn remove(&mut self, _uid: &Uid) -> lib::Result<Birthday> {
            Err(Error::from(ErrorKind::NotFound))
        }
    }

    #[test]
    fn fetch_reports_vanished_birthday() {
        let store = Vanishing(vec![
            NewBirthday::new("Bob", 6, 12).finish(Uid::from("abc-1")),
            NewBirthday::new("Alice", 3, 1).finish(Uid::from("abd-2")),
        ]);

        assert!(fetch(&store, "abc").unwrap_err().is_not_found());
        assert!(fetch(&store, "ab").unwrap_err().is_not_found());
        assert!(fetch(&store, "zzz").unwrap_err().is_not_found());
    }

    #[test]
    fn fetch_resolves_prefix() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().hyphenated().to_string());
        let mut store = TomlStore::open(&dir.join("birthdays.toml")).unwrap();
        let bob = store.insert(NewBirthday::new("Bob", 6, 12)).unwrap();

        let prefix: String = bob.uid.as_str().chars().take(8).collect();
        assert_eq!(fetch(&store, &prefix).unwrap(), bob);

        let _ = std::fs::remove_dir_all(dir);
    }
}
