pub mod cdp;
pub mod driver;
pub mod session;

pub use cdp::CdpClient;
pub use driver::PageDriver;
pub use session::BrowserSession;
