use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::birthday::Birthday;
use crate::error::{Error, ErrorKind, Result};
use crate::occurrence::{self, current_age, is_today, project_to_year};
use crate::store::Storelike;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub enum SortOption {
    #[default]
    Date,
    Name,
    Category,
}

impl SortOption {
    pub const ALL: [SortOption; 3] = [SortOption::Date, SortOption::Name, SortOption::Category];
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortOption::Date => "date",
            SortOption::Name => "name",
            SortOption::Category => "category",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SortOption {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "date" => Ok(SortOption::Date),
            "name" => Ok(SortOption::Name),
            "category" => Ok(SortOption::Category),
            _ => Err(Error::new(
                ErrorKind::Config,
                &format!("Sort option '{}' not recognized", s),
            )),
        }
    }
}

/// One row of the list view.
#[derive(Clone, Debug)]
pub struct Entry<'a> {
    pub birthday: &'a Birthday,
    pub next: Option<NaiveDate>,
    pub days_until: Option<i64>,
    pub age: Option<u32>,
    pub is_today: bool,
}

impl<'a> Entry<'a> {
    fn new(birthday: &'a Birthday, today: NaiveDate) -> Self {
        let next = occurrence::next_occurrence(birthday, today).ok();
        Entry {
            birthday,
            next,
            days_until: next.map(|n| n.signed_duration_since(today).num_days()),
            age: current_age(birthday, today),
            is_today: is_today(birthday, today),
        }
    }
}

/// Snapshot of all birthdays, answering the questions the list and calendar
/// views ask.
pub struct Agenda {
    birthdays: Vec<Birthday>,
}

impl Agenda {
    pub fn new(birthdays: Vec<Birthday>) -> Self {
        Agenda { birthdays }
    }

    pub fn from_store(store: &impl Storelike) -> Result<Self> {
        Ok(Agenda::new(store.all()?))
    }

    pub fn is_empty(&self) -> bool {
        self.birthdays.is_empty()
    }

    /// Birthdays whose name contains `query`, ignoring case.
    pub fn search<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a Birthday> + 'a {
        let query = query.trim().to_lowercase();
        self.birthdays
            .iter()
            .filter(move |b| query.is_empty() || b.name.to_lowercase().contains(&query))
    }

    pub fn list(
        &self,
        query: &str,
        sort: SortOption,
        ascending: bool,
        today: NaiveDate,
    ) -> Vec<Entry<'_>> {
        let mut entries = self
            .search(query)
            .map(|b| Entry::new(b, today))
            .collect_vec();

        match sort {
            SortOption::Date => entries.sort_by(|a, b| cmp_days(a.days_until, b.days_until)),
            SortOption::Name => entries.sort_by_cached_key(|e| e.birthday.name.to_lowercase()),
            SortOption::Category => {
                entries.sort_by(|a, b| a.birthday.category.cmp(&b.birthday.category))
            }
        }

        if !ascending {
            entries.reverse();
        }

        entries
    }

    pub fn birthdays_of_month(&self, month: u32) -> Vec<&Birthday> {
        self.birthdays
            .iter()
            .filter(|b| b.month == month)
            .sorted_by_key(|b| b.day)
            .collect()
    }

    /// Birthdays falling on `date`, with leap-day birthdays showing on Feb 28
    /// of common years.
    pub fn birthdays_on(&self, date: NaiveDate) -> impl Iterator<Item = &Birthday> {
        self.birthdays.iter().filter(move |b| {
            b.month == date.month()
                && project_to_year(b.month, b.day, date.year())
                    .map(|d| d == date)
                    .unwrap_or(false)
        })
    }

    pub fn todays_birthdays(&self, today: NaiveDate) -> impl Iterator<Item = &Birthday> {
        self.birthdays.iter().filter(move |b| is_today(b, today))
    }

    pub fn next_upcoming(&self, today: NaiveDate) -> Option<&Birthday> {
        occurrence::next_upcoming(&self.birthdays, today)
    }
}

// Broken records sort behind everything else
fn cmp_days(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::birthday::{NewBirthday, Uid};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn agenda() -> Agenda {
        Agenda::new(vec![
            NewBirthday::new("Charlie", 6, 11)
                .category("Work")
                .finish(Uid::new()),
            NewBirthday::new("alice", 6, 15)
                .year(1990)
                .category("Friend")
                .finish(Uid::new()),
            NewBirthday::new("Bob", 6, 12)
                .category("Family")
                .finish(Uid::new()),
            NewBirthday::new("Leap", 2, 29).finish(Uid::new()),
        ])
    }

    fn names(entries: &[Entry]) -> Vec<String> {
        entries.iter().map(|e| e.birthday.name.clone()).collect()
    }

    #[test]
    fn sort_by_date() {
        let agenda = agenda();
        let today = date(2024, 6, 12);

        let entries = agenda.list("", SortOption::Date, true, today);
        assert_eq!(names(&entries), ["Bob", "alice", "Leap", "Charlie"]);
        assert!(entries[0].is_today);
        assert_eq!(entries[0].days_until, Some(0));
        assert_eq!(entries[1].age, Some(33));

        let entries = agenda.list("", SortOption::Date, false, today);
        assert_eq!(names(&entries), ["Charlie", "Leap", "alice", "Bob"]);
    }

    #[test]
    fn sort_by_name_and_category() {
        let agenda = agenda();
        let today = date(2024, 6, 12);

        let entries = agenda.list("", SortOption::Name, true, today);
        assert_eq!(names(&entries), ["alice", "Bob", "Charlie", "Leap"]);

        let entries = agenda.list("", SortOption::Category, true, today);
        assert_eq!(names(&entries), ["Leap", "Bob", "alice", "Charlie"]);
    }

    #[test]
    fn search_ignores_case() {
        let agenda = agenda();
        let entries = agenda.list("LI", SortOption::Name, true, date(2024, 6, 12));
        assert_eq!(names(&entries), ["alice", "Charlie"]);
        assert_eq!(agenda.search("  ").count(), 4);
    }

    #[test]
    fn month_view() {
        let agenda = agenda();
        let june = agenda.birthdays_of_month(6);
        assert_eq!(
            june.iter().map(|b| b.day).collect_vec(),
            vec![11, 12, 15]
        );
        assert!(agenda.birthdays_of_month(1).is_empty());

        assert_eq!(agenda.birthdays_on(date(2023, 2, 28)).count(), 1);
        assert_eq!(agenda.birthdays_on(date(2024, 2, 28)).count(), 0);
        assert_eq!(agenda.birthdays_on(date(2024, 2, 29)).count(), 1);
    }

    #[test]
    fn highlights() {
        let agenda = agenda();
        let today = date(2024, 6, 12);
        assert_eq!(
            agenda.todays_birthdays(today).map(|b| b.name.as_str()).collect_vec(),
            vec!["Bob"]
        );
        assert_eq!(agenda.next_upcoming(today).unwrap().name, "Bob");
        assert_eq!(agenda.next_upcoming(date(2024, 6, 13)).unwrap().name, "alice");
    }

    #[test]
    fn parse_sort_option() {
        assert_eq!("Name".parse::<SortOption>().unwrap(), SortOption::Name);
        assert!("age".parse::<SortOption>().is_err());
        for option in SortOption::ALL {
            assert_eq!(option.to_string().parse::<SortOption>().unwrap(), option);
        }
    }
}
