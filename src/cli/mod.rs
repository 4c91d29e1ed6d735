pub mod catalog;
pub mod output;
pub mod position;
pub mod read;
pub mod settings;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookracy", version, about = "Read EPUB books and keep your place")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Directory holding saved positions and settings
    #[arg(long, global = true, env = "BOOKRACY_STORE")]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a book and turn pages
    Read(read::ReadArgs),
    /// Show a book's table of contents
    Toc {
        /// EPUB path or URL
        source: String,
        /// Maximum depth to display
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Saved reading positions: list, show, remove
    Position {
        #[command(subcommand)]
        command: position::PositionCommand,
    },
    /// Print the fingerprint positions are stored under
    Fingerprint {
        /// EPUB path or URL
        source: String,
    },
    /// Look books up in the catalog
    Catalog {
        /// Catalog API base URL
        #[arg(long, env = "BOOKRACY_CATALOG_URL")]
        catalog_url: String,
        #[command(subcommand)]
        command: catalog::CatalogCommand,
    },
    /// Reader defaults: theme, font size, locale
    Settings {
        #[command(subcommand)]
        command: settings::SettingsCommand,
    },
}
