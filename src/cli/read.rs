use bookracy::reader::ThemeId;
use clap::Args;

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// EPUB path or URL
    pub source: String,

    /// Title to store with the position (defaults to the file name)
    #[arg(long)]
    pub title: Option<String>,

    /// Turn this many pages, print the final screen and exit.
    /// Negative values turn backwards. Without it, read interactively.
    #[arg(long, allow_hyphen_values = true)]
    pub turns: Option<i64>,

    /// Jump to the Nth table-of-contents entry (1-based, depth-first)
    #[arg(long)]
    pub chapter: Option<usize>,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Font size override in pixels
    #[arg(long)]
    pub font_size: Option<u32>,

    /// Theme override
    #[arg(long)]
    pub theme: Option<ThemeId>,

    /// Seconds to wait for the book to load
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,
}
