pub mod discord;
pub mod weather;

pub use discord::{DiscordNotifier, Notifier};
pub use weather::{WeatherReport, WeatherService};
