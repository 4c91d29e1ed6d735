use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Search books by title, author or ISBN
    Search {
        query: String,
        /// Only show EPUB files
        #[arg(long)]
        epub_only: bool,
    },
    /// Show one book by MD5
    Show { md5: String },
}
