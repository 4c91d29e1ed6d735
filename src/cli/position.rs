use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum PositionCommand {
    /// List every saved position
    List,
    /// Show the saved position for a book
    Show {
        /// EPUB path or URL
        source: String,
    },
    /// Forget the saved position for a book
    Remove {
        /// EPUB path or URL
        source: String,
    },
}
