//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = super::config_file(global);
            output::print_output(&path.display().to_string(), global.quiet);
        }
        ConfigCommand::Show => {
            let config = super::load(global)?;
            let rendered = toml::to_string_pretty(&config)?;
            output::print_output(rendered.trim_end(), global.quiet);
        }
        ConfigCommand::Env => {
            let config = super::load(global)?;
            let lines: Vec<String> = config
                .ca
                .environment()
                .into_iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
        }
    }
    Ok(())
}
