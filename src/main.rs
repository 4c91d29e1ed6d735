mod cli;

use anyhow::{Context, Result, bail};
use bookracy::catalog::{BookRecord, CatalogClient};
use bookracy::engine::{BookSource, DefaultFetcher, Dimensions, EpubEngine, Fetch, Viewport};
use bookracy::epub::{TocEntry, reader};
use bookracy::reader::{Key, ReaderContext, ReaderSession, ThemeId};
use bookracy::settings::{SettingsProvider, StaticSettings, StoredSettings};
use bookracy::store::{Fingerprint, JsonFileStore, KeyValueStore, PositionStore, ReadingPosition};
use bookracy::util::format_size;
use clap::Parser;
use cli::output::OutputConfig;
use cli::{Cli, Command};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Session = ReaderSession<EpubEngine>;

fn init_logging(verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let output = OutputConfig::from_global(cli.json, cli.verbose, cli.quiet, cli.no_color);
    let store = cli.store;

    match cli.command {
        Command::Read(args) => handle_read(args, store.as_deref(), &output)?,
        Command::Toc { source, depth } => handle_toc(&source, depth, &output)?,
        Command::Position { command } => handle_position(command, store.as_deref(), &output)?,
        Command::Fingerprint { source } => handle_fingerprint(&source, &output)?,
        Command::Catalog {
            catalog_url,
            command,
        } => handle_catalog(command, &catalog_url, &output)?,
        Command::Settings { command } => handle_settings(command, store.as_deref(), &output)?,
    }

    Ok(())
}

fn open_store(dir: Option<&Path>) -> Result<Arc<JsonFileStore>> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_dir()
            .map(|d| d.join("bookracy"))
            .context("no data directory on this platform; pass --store")?,
    };
    let store = JsonFileStore::open(&dir)
        .with_context(|| format!("opening store in {}", dir.display()))?;
    Ok(Arc::new(store))
}

/// URLs pass through; paths become absolute so the fingerprint does not
/// depend on the working directory.
fn source_url(arg: &str) -> String {
    if arg.contains("://") {
        return arg.to_string();
    }
    std::fs::canonicalize(arg)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| arg.to_string())
}

fn default_title(url: &str) -> String {
    let name = url.rsplit(['/', '\\']).next().unwrap_or(url);
    name.strip_suffix(".epub").unwrap_or(name).to_string()
}

fn handle_read(
    args: cli::read::ReadArgs,
    store_dir: Option<&Path>,
    output: &OutputConfig,
) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = open_store(store_dir)?;
    let mut settings = StoredSettings::new(Arc::clone(&store)).settings();
    if let Some(theme) = args.theme {
        settings.theme = theme;
    }
    if let Some(font_size) = args.font_size {
        settings.font_size_px = font_size;
    }
    let context = ReaderContext {
        store,
        settings: Arc::new(StaticSettings(settings)),
        viewport: Viewport {
            width_px: args.width,
            height_px: args.height,
        },
        dimensions: Dimensions::default(),
    };

    let url = source_url(&args.source);
    let title = args.title.unwrap_or_else(|| default_title(&url));
    let mut session =
        ReaderSession::open(EpubEngine::default(), BookSource::new(url, title), &context);
    wait_for_first_page(&mut session, Duration::from_secs(args.timeout), output)?;

    if let Some(chapter) = args.chapter {
        let toc = session.toc();
        let entries = TocEntry::flatten(&toc);
        let entry = chapter
            .checked_sub(1)
            .and_then(|i| entries.get(i))
            .with_context(|| format!("chapter {chapter} not found ({} entries)", entries.len()))?;
        session.jump_to_entry(entry);
        session.pump();
    }

    match args.turns {
        Some(turns) => {
            for _ in 0..turns.unsigned_abs() {
                let key = if turns >= 0 { Key::ArrowRight } else { Key::ArrowLeft };
                session.handle_key(key);
                session.pump();
            }
            print_screen(&session, output)?;
        }
        None => read_interactively(&mut session, output)?,
    }

    session.close();
    Ok(())
}

fn wait_for_first_page(
    session: &mut Session,
    timeout: Duration,
    output: &OutputConfig,
) -> Result<()> {
    let started = Instant::now();
    let mut last_progress = 0;
    while session.state().current_location.is_none() {
        if let Some(reason) = session.failure() {
            bail!("{reason}");
        }
        if started.elapsed() >= timeout {
            bail!(
                "{} did not load within {}s",
                session.source().url,
                timeout.as_secs()
            );
        }
        for event in session.wait(Duration::from_millis(100)) {
            if let bookracy::reader::ViewEvent::Progress { loaded, .. } = event
                && session.state().load_progress != last_progress
            {
                last_progress = session.state().load_progress;
                output.detail(&format!("loading: {last_progress}% ({})", format_size(loaded)));
            }
        }
    }
    Ok(())
}

fn print_screen(session: &Session, output: &OutputConfig) -> Result<()> {
    let screen = session
        .engine()
        .and_then(EpubEngine::current_screen)
        .context("nothing is displayed")?;
    let state = session.state();

    if output.json {
        let json = serde_json::json!({
            "title": session.source().title,
            "location": screen.location.to_string(),
            "section": screen.section_path,
            "page": state.current_page,
            "totalPages": state.total_pages,
            "fontSizePx": screen.font_size_px,
            "theme": state.theme,
            "text": screen.text,
        });
        output.print_json(&json)?;
        return Ok(());
    }

    let page = match (state.current_page, state.total_pages) {
        (Some(current), Some(total)) => format!("page {current} of {total}"),
        _ => "page ?".to_string(),
    };
    output.heading(&format!(
        "{} | {} | {}",
        session.source().title,
        screen.section_path,
        page
    ));
    println!("{}", screen.text);
    Ok(())
}

fn print_toc(entries: &[TocEntry], indent: usize, max_depth: Option<usize>, numbered: &mut usize) {
    if let Some(max) = max_depth
        && indent >= max
    {
        return;
    }
    for entry in entries {
        *numbered += 1;
        let prefix = "  ".repeat(indent);
        println!("{prefix}{numbered:>3}. {}", entry.label);
        print_toc(&entry.children, indent + 1, max_depth, numbered);
    }
}

fn read_interactively(session: &mut Session, output: &OutputConfig) -> Result<()> {
    print_screen(session, output)?;
    let stdin = io::stdin();
    loop {
        print!("[n]ext [p]rev [+/-] font [t]heme [c]ontents [g N] go [q]uit > ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        match line {
            "" | "n" => {
                session.handle_key(Key::ArrowRight);
            }
            "p" => {
                session.handle_key(Key::ArrowLeft);
            }
            "+" => session.increase_font_size(),
            "-" => session.decrease_font_size(),
            "t" => {
                let next = match session.state().theme {
                    ThemeId::Light => ThemeId::Dark,
                    ThemeId::Dark => ThemeId::Light,
                };
                session.set_theme(next);
            }
            "c" => {
                print_toc(&session.toc(), 0, None, &mut 0);
                continue;
            }
            "q" => break,
            other => {
                let target = other
                    .strip_prefix("g ")
                    .and_then(|n| n.trim().parse::<usize>().ok());
                let toc = session.toc();
                let entries = TocEntry::flatten(&toc);
                match target.and_then(|n| n.checked_sub(1)).and_then(|i| entries.get(i)) {
                    Some(entry) => session.jump_to_entry(entry),
                    None => {
                        eprintln!("unknown command: {other}");
                        continue;
                    }
                }
            }
        }
        session.pump();
        print_screen(session, output)?;
    }
    Ok(())
}

fn handle_toc(source: &str, depth: Option<usize>, output: &OutputConfig) -> Result<()> {
    let url = source_url(source);
    let bytes = DefaultFetcher
        .fetch(&url, &mut |_, _| {})
        .with_context(|| format!("failed to read {url}"))?;
    let book = reader::parse_epub(bytes).with_context(|| format!("failed to parse {url}"))?;

    if output.json {
        output.print_json(&book.toc)?;
        return Ok(());
    }
    if book.toc.is_empty() {
        output.status("No table of contents");
        return Ok(());
    }
    if let Some(title) = book.title() {
        output.heading(title);
    }
    print_toc(&book.toc, 0, depth, &mut 0);
    let total: usize = book.toc.iter().map(TocEntry::count).sum();
    output.detail(&format!("{total} entries"));
    Ok(())
}

fn position_row(position: &ReadingPosition) -> Vec<String> {
    let page = if position.total_pages > 0 {
        format!("{}/{}", position.current_page, position.total_pages)
    } else {
        "-".to_string()
    };
    vec![
        position.title.clone(),
        page,
        position.location.to_string(),
        position.source_url.clone(),
    ]
}

fn handle_position(
    command: cli::position::PositionCommand,
    store_dir: Option<&Path>,
    output: &OutputConfig,
) -> Result<()> {
    use cli::position::PositionCommand;

    let positions = PositionStore::new(open_store(store_dir)?);
    match command {
        PositionCommand::List => {
            let list = positions.list()?;
            if output.json {
                output.print_json(&list)?;
            } else if list.is_empty() {
                output.status("No saved positions");
            } else {
                let rows: Vec<Vec<String>> = list.iter().map(position_row).collect();
                output.print_table(&["TITLE", "PAGE", "LOCATION", "SOURCE"], &rows);
            }
        }
        PositionCommand::Show { source } => {
            let url = source_url(&source);
            let Some(position) = positions.load(&Fingerprint::of_url(&url))? else {
                bail!("no saved position for {url}");
            };
            if output.json {
                output.print_json(&position)?;
            } else {
                output.print_table(
                    &["TITLE", "PAGE", "LOCATION", "SOURCE"],
                    &[position_row(&position)],
                );
            }
        }
        PositionCommand::Remove { source } => {
            let url = source_url(&source);
            if positions.remove(&Fingerprint::of_url(&url))? {
                output.status(&format!("Removed saved position for {url}"));
            } else {
                output.status(&format!("No saved position for {url}"));
            }
        }
    }
    Ok(())
}

fn handle_fingerprint(source: &str, output: &OutputConfig) -> Result<()> {
    let url = source_url(source);
    let fingerprint = Fingerprint::of_url(&url);
    if output.json {
        output.print_json(&serde_json::json!({ "source": url, "fingerprint": fingerprint }))?;
    } else {
        println!("{fingerprint}");
    }
    Ok(())
}

fn record_row(record: &BookRecord) -> Vec<String> {
    vec![
        record.title.clone(),
        record.authors.join(", "),
        record.extension.clone(),
        record.md5.clone(),
    ]
}

fn handle_catalog(
    command: cli::catalog::CatalogCommand,
    base_url: &str,
    output: &OutputConfig,
) -> Result<()> {
    use cli::catalog::CatalogCommand;

    let client = CatalogClient::new(base_url);
    match command {
        CatalogCommand::Search { query, epub_only } => {
            let mut records = client
                .search(&query)
                .with_context(|| format!("searching the catalog for '{query}'"))?;
            if epub_only {
                records.retain(BookRecord::is_epub);
            }
            if output.json {
                output.print_json(&records)?;
            } else if records.is_empty() {
                output.status("No results");
            } else {
                let rows: Vec<Vec<String>> = records.iter().map(record_row).collect();
                output.print_table(&["TITLE", "AUTHORS", "TYPE", "MD5"], &rows);
            }
        }
        CatalogCommand::Show { md5 } => {
            let record = client
                .book(&md5)
                .with_context(|| format!("fetching {md5} from the catalog"))?;
            if output.json {
                output.print_json(&record)?;
            } else {
                output.print_table(&["TITLE", "AUTHORS", "TYPE", "MD5"], &[record_row(&record)]);
                match record.book_source() {
                    Ok(source) => {
                        output.status(&format!("Read with: bookracy read {}", source.url))
                    }
                    Err(e) => output.status(&format!("Not readable here: {e}")),
                }
            }
        }
    }
    Ok(())
}

fn handle_settings(
    command: cli::settings::SettingsCommand,
    store_dir: Option<&Path>,
    output: &OutputConfig,
) -> Result<()> {
    use cli::settings::SettingsCommand;

    let settings = StoredSettings::new(open_store(store_dir)?);
    match command {
        SettingsCommand::Show => {
            let current = settings.settings();
            if output.json {
                output.print_json(&current)?;
            } else {
                println!("theme      {}", current.theme);
                println!("font size  {}px", current.font_size_px);
                println!("locale     {}", current.locale);
            }
        }
        SettingsCommand::Set {
            theme,
            font_size,
            locale,
        } => {
            let mut current = settings.settings();
            if let Some(theme) = theme {
                current.theme = theme;
            }
            if let Some(font_size) = font_size {
                current.font_size_px = bookracy::reader::theme::clamp_font_size(font_size);
            }
            if let Some(locale) = locale {
                current.locale = locale;
            }
            settings.save(&current).context("saving settings")?;
            output.status("Settings saved");
        }
    }
    Ok(())
}
