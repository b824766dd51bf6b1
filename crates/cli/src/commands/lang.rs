//! Interface language.

use amicale_storefront::services::preferences::Language;
use amicale_storefront::state::AppState;
use clap::Subcommand;

use crate::error::CliError;
use crate::output;

#[derive(Subcommand)]
pub enum LangCommand {
    /// Show the saved language
    Get,
    /// Save a language (fr, en)
    Set { language: Language },
}

pub fn run(state: &AppState, command: LangCommand) -> Result<(), CliError> {
    let preference = state.language();
    match command {
        LangCommand::Get => output::line(preference.load()),
        LangCommand::Set { language } => {
            preference.save(language)?;
            output::line(format_args!("Language set to {language}"));
        }
    }
    Ok(())
}
