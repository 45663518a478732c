pub mod agenda;
pub mod birthday;
pub mod calendar;
pub mod config;
pub mod error;
pub mod occurrence;
pub mod reminder;
pub mod store;

pub use birthday::{Birthday, NewBirthday, Uid};
pub use error::{Error, ErrorKind, Result};
