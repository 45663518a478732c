use chrono::{Datelike, Month, NaiveDate};
use num_traits::FromPrimitive;
use std::fmt::{self, Display};

use crate::agenda::Agenda;
use crate::occurrence::days_of_month;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthIndex {
    pub index: Month,
    pub year: i32,
}

impl MonthIndex {
    pub fn new(index: Month, year: i32) -> Self {
        MonthIndex { index, year }
    }

    pub fn from_number(month: u32, year: i32) -> Option<Self> {
        Month::from_u32(month).map(|index| MonthIndex::new(index, year))
    }

    pub fn current(today: NaiveDate) -> Self {
        MonthIndex {
            index: Month::from_u32(today.month()).unwrap_or(Month::January),
            year: today.year(),
        }
    }

    pub fn number(&self) -> u32 {
        self.index.number_from_month()
    }

    pub fn next(&self) -> Self {
        let next_month = self.index.succ();

        MonthIndex {
            index: next_month,
            year: if next_month == Month::January {
                self.year + 1
            } else {
                self.year
            },
        }
    }

    pub fn prev(&self) -> Self {
        let prev_month = self.index.pred();

        MonthIndex {
            index: prev_month,
            year: if prev_month == Month::December {
                self.year - 1
            } else {
                self.year
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCell {
    pub day_num: u8,
    pub is_today: bool,
    pub birthdays: usize,
}

impl DayCell {
    const CELL_WIDTH: usize = 4;
}

impl Display for DayCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arg_today = if self.is_today { '*' } else { ' ' };
        let arg_birthday = if self.birthdays > 0 { '+' } else { ' ' };

        write!(f, "{}{}{:>2}", arg_today, arg_birthday, self.day_num)
    }
}

/// A Monday-first month sheet with birthday markers.
#[derive(Debug, Clone)]
pub struct MonthGrid {
    month: MonthIndex,
    offset: u8,
    days: Vec<DayCell>,
}

impl MonthGrid {
    const COLUMNS: usize = 7;

    const HEADER: &'static [&'static str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

    pub fn new(month: MonthIndex, agenda: &Agenda, today: NaiveDate) -> Self {
        let num_days = days_of_month(month.number(), month.year);
        let days = (1..=num_days)
            .filter_map(|day| NaiveDate::from_ymd_opt(month.year, month.number(), day))
            .map(|date| DayCell {
                day_num: date.day() as u8,
                is_today: date == today,
                birthdays: agenda.birthdays_on(date).count(),
            })
            .collect();

        let offset = NaiveDate::from_ymd_opt(month.year, month.number(), 1)
            .map(|first| first.weekday().num_days_from_monday() as u8)
            .unwrap_or(0);

        MonthGrid {
            month,
            offset,
            days,
        }
    }

    pub fn month(&self) -> MonthIndex {
        self.month
    }

    pub fn day(&self, day: u32) -> Option<&DayCell> {
        self.days.get((day as usize).checked_sub(1)?)
    }

    /// Days grouped into weeks; `None` pads the first and last week.
    pub fn weeks(&self) -> Vec<[Option<&DayCell>; 7]> {
        let mut cells: Vec<Option<&DayCell>> = vec![None; self.offset as usize];
        cells.extend(self.days.iter().map(Some));
        while cells.len() % Self::COLUMNS != 0 {
            cells.push(None);
        }

        cells
            .chunks(Self::COLUMNS)
            .map(|week| [week[0], week[1], week[2], week[3], week[4], week[5], week[6]])
            .collect()
    }
}

impl Display for MonthGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("{} {}", self.month.index.name(), self.month.year);
        writeln!(
            f,
            "{:^width$}",
            title,
            width = Self::COLUMNS * DayCell::CELL_WIDTH
        )?;

        for &head in Self::HEADER {
            write!(f, "{:>width$}", head, width = DayCell::CELL_WIDTH)?;
        }
        writeln!(f)?;

        for week in self.weeks() {
            for cell in week {
                match cell {
                    Some(cell) => write!(f, "{}", cell)?,
                    None => write!(f, "{:width$}", "", width = DayCell::CELL_WIDTH)?,
                }
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
