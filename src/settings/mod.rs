//! Settings are read from a TOML file (see `settings/`) and environment overrides.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
