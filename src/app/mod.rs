mod config;
mod exclude;

pub use config::Config;
pub use exclude::ExcludeSet;
