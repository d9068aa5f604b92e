mod fixture;
mod yahoo;

pub use fixture::{FixtureProvider, FixtureSecurity};
pub use yahoo::{YahooConfig, YahooProvider};
