pub mod flow;
pub mod matcher;
pub mod policy;
pub mod scheduler;
pub mod scrape;
pub mod selectors;

pub use scheduler::Checker;
