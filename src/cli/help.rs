//! CLI command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Stable command name used in log events (e.g. "import", "delete_all").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Import { .. } => "import",
        Commands::Count { .. } => "count",
        Commands::List { .. } => "list",
        Commands::DeleteAll { .. } => "delete_all",
        Commands::Schemas => "schemas",
        Commands::Config => "config",
    }
}

/// Whether the command needs an open store
pub fn needs_store(command: &Commands) -> bool {
    !matches!(command, Commands::Schemas | Commands::Config)
}
