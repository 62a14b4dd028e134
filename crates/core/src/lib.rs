pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use paths::Paths;
pub use types::{
    french_month, french_weekday, french_weekday_abbrev, french_weekday_number, Activity,
    DesiredReservation,
};
