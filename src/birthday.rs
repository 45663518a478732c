use chrono::{Datelike, NaiveDate};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::occurrence::LEAP_YEAR;

/// Opaque, stable identity of a stored birthday.
#[derive(
    Clone, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new() -> Self {
        Uid(uuid::Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric id for facilities that only accept integers (e.g. notification ids).
    pub fn short_id(&self) -> u32 {
        match uuid::Uuid::parse_str(&self.0) {
            Ok(uuid) => {
                let bytes = uuid.as_bytes();
                u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            }
            // FNV-1a for ids that were not generated by us
            Err(_) => self.0.bytes().fold(0x811c_9dc5u32, |hash, b| {
                (hash ^ b as u32).wrapping_mul(0x0100_0193)
            }),
        }
    }
}

impl Default for Uid {
    fn default() -> Self {
        Uid::new()
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Uid(s.to_owned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Birthday {
    pub uid: Uid,
    pub name: String,
    pub month: u32,
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default)]
    pub category: String,
}

impl Birthday {
    /// Full date of birth, if the year is known and forms a valid date.
    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.year
            .and_then(|year| NaiveDate::from_ymd_opt(year, self.month, self.day))
    }

    pub fn month_day_str(&self) -> String {
        format!("{:02}-{:02}", self.month, self.day)
    }
}

/// Draft of a birthday as entered by the user, before it is given an identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBirthday {
    pub name: String,
    pub month: u32,
    pub day: u32,
    pub year: Option<i32>,
    pub category: String,
}

impl NewBirthday {
    const MIN_NAME_LEN: usize = 2;
    const MAX_NAME_LEN: usize = 100;
    const MAX_AGE_YEARS: i32 = 150;

    pub fn new(name: &str, month: u32, day: u32) -> Self {
        NewBirthday {
            name: name.to_owned(),
            month,
            day,
            year: None,
            category: String::new(),
        }
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn year_opt(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    /// Checks the draft the same way the add/edit form does and reports the
    /// first problem found.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        fn invalid(msg: &str) -> Result<()> {
            Err(Error::new(ErrorKind::Validation, msg))
        }

        let name = self.name.trim();
        if name.is_empty() {
            return invalid("Name cannot be empty");
        }
        let name_len = name.chars().count();
        if name_len < Self::MIN_NAME_LEN {
            return invalid("Name must be at least 2 characters");
        }
        if name_len > Self::MAX_NAME_LEN {
            return invalid("Name must be less than 100 characters");
        }

        if NaiveDate::from_ymd_opt(LEAP_YEAR, self.month, self.day).is_none() {
            return invalid("Birth date is not a valid calendar date");
        }

        if let Some(year) = self.year {
            let Some(date) = NaiveDate::from_ymd_opt(year, self.month, self.day) else {
                return invalid("Birth date is not a valid calendar date");
            };
            if date > today {
                return invalid("Birth date cannot be in the future");
            }
            if today.year() - year > Self::MAX_AGE_YEARS {
                return invalid("Birth date seems invalid");
            }
        }

        Ok(())
    }

    pub fn finish(self, uid: Uid) -> Birthday {
        Birthday {
            uid,
            name: self.name.trim().to_owned(),
            month: self.month,
            day: self.day,
            year: self.year,
            category: self.category.trim().to_owned(),
        }
    }
}

impl From<&Birthday> for NewBirthday {
    fn from(birthday: &Birthday) -> Self {
        NewBirthday {
            name: birthday.name.clone(),
            month: birthday.month,
            day: birthday.day,
            year: birthday.year,
            category: birthday.category.clone(),
        }
    }
}

/// Parses `MM-DD` as typed on the command line.
pub fn parse_month_day(s: &str) -> Result<(u32, u32)> {
    let err = || {
        Error::new(
            ErrorKind::Validation,
            &format!("'{}' is not of the form MM-DD", s),
        )
    };

    let (month, day) = s.trim().split_once('-').ok_or_else(err)?;
    let month = month.parse::<u32>().map_err(|_| err())?;
    let day = day.parse::<u32>().map_err(|_| err())?;

    if NaiveDate::from_ymd_opt(LEAP_YEAR, month, day).is_none() {
        return Err(Error::new(
            ErrorKind::InvalidDate,
            &format!("{:02}-{:02} is not a calendar date", month, day),
        ));
    }

    Ok((month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    fn validation_message(draft: &NewBirthday) -> Option<String> {
        draft.validate(today()).err().and_then(|e| e.message)
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(
            validation_message(&NewBirthday::new("   ", 1, 1)).as_deref(),
            Some("Name cannot be empty")
        );
        assert_eq!(
            validation_message(&NewBirthday::new("A", 1, 1)).as_deref(),
            Some("Name must be at least 2 characters")
        );
        assert_eq!(
            validation_message(&NewBirthday::new(&"A".repeat(101), 1, 1)).as_deref(),
            Some("Name must be less than 100 characters")
        );
    }

    #[test]
    fn rejects_impossible_and_future_dates() {
        assert_eq!(
            validation_message(&NewBirthday::new("John Doe", 2, 30)).as_deref(),
            Some("Birth date is not a valid calendar date")
        );
        assert_eq!(
            validation_message(&NewBirthday::new("John Doe", 2, 29).year(2023)).as_deref(),
            Some("Birth date is not a valid calendar date")
        );
        assert_eq!(
            validation_message(&NewBirthday::new("John Doe", 6, 13).year(2024)).as_deref(),
            Some("Birth date cannot be in the future")
        );
        assert_eq!(
            validation_message(&NewBirthday::new("John Doe", 6, 12).year(1873)).as_deref(),
            Some("Birth date seems invalid")
        );
    }

    #[test]
    fn accepts_valid_drafts() {
        assert!(NewBirthday::new("John Doe", 6, 12)
            .year(1999)
            .validate(today())
            .is_ok());
        assert!(NewBirthday::new("Leap Kid", 2, 29).validate(today()).is_ok());
        assert!(NewBirthday::new("Leap Kid", 2, 29)
            .year(2000)
            .validate(today())
            .is_ok());
    }

    #[test]
    fn finish_trims_fields() {
        let uid = Uid::from("fixed");
        let birthday = NewBirthday::new("  Alice ", 3, 1)
            .category(" Friend ")
            .finish(uid.clone());

        assert_eq!(birthday.uid, uid);
        assert_eq!(birthday.name, "Alice");
        assert_eq!(birthday.category, "Friend");
        assert_eq!(birthday.birth_date(), None);
    }

    #[test]
    fn parses_month_day() {
        assert_eq!(parse_month_day("02-29").unwrap(), (2, 29));
        assert_eq!(parse_month_day("6-5").unwrap(), (6, 5));
        assert!(parse_month_day("13-01").unwrap_err().is_invalid_date());
        assert!(parse_month_day("june").is_err());
    }

    #[test]
    fn short_id_is_stable() {
        let uid = Uid::new();
        assert_eq!(uid.short_id(), uid.clone().short_id());
        assert_eq!(Uid::from("x").short_id(), Uid::from("x").short_id());
    }
}
