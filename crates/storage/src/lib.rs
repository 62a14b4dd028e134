pub mod store;

pub use store::{BookingRecord, PlanningStore};
