pub mod cli;
pub mod ingress;
pub mod load_config;

pub use cli::{run, Cli, Commands};
