pub mod cli;

pub use cli::{CaseArgs, Cli, Commands};
