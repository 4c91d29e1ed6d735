use bookracy::reader::ThemeId;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Show the current reader defaults
    Show,
    /// Change reader defaults
    Set {
        #[arg(long)]
        theme: Option<ThemeId>,
        /// Font size in pixels (12 to 36)
        #[arg(long)]
        font_size: Option<u32>,
        #[arg(long)]
        locale: Option<String>,
    },
}
