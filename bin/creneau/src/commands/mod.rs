pub mod init;
pub mod reserve;
pub mod run;
pub mod scrape;
