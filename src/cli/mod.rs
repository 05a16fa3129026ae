pub mod commands;

pub use commands::{build_cli, handle_subcommands, registry_from_config};
