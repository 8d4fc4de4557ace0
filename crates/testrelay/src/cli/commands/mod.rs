//! CLI commands

mod discover;
mod run;

pub use discover::DiscoverCommand;
pub use run::RunCommand;
