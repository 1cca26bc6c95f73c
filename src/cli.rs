//! CLI domain: parse, route, help, output, and presentation only.
//! No store logic; a single route table dispatches to context operations.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    format_records_json, format_records_text, format_schemas_text, format_section_heading,
};
pub use route::RunContext;
