//! Main entry point for the rpeek CLI application.
//!
//! Lists the entries of a local or remote archive, or extracts one of them to
//! stdout or a directory.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use std::io::IsTerminal;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use rpeek::handler::{CopyHandler, SummaryHandler};
use rpeek::{
    ArchiveKind, ArchiveService, Cli, ContentHandler, ContentKind, EntryDescriptor, Error,
    FetchPolicy, HandlerRegistry, HttpRangeSource, LocalFileSource, RangeSource, RetryingSource,
    open_service,
};

/// Application entry point.
///
/// Picks the archive kind, wraps the source (HTTP or local file) and hands
/// off to [`run`]. For HTTP sources the number of bytes actually downloaded
/// is reported afterwards.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_level())).init();

    let policy = cli.fetch_policy();
    let kind = match cli.kind {
        Some(kind) => kind,
        None => ArchiveKind::from_name(&cli.source).ok_or_else(|| Error::UnsupportedArchive {
            name: cli.source.clone(),
        })?,
    };
    info!("{} as {}", cli.source, kind);

    if cli.is_http_url() {
        let source = HttpRangeSource::new(cli.source.clone(), policy.timeout)?;

        let transferred = if policy.max_retries > 0 {
            let source = Arc::new(RetryingSource::new(source, policy.max_retries));
            run(source.clone(), kind, &cli, &policy).await?;
            source.inner().transferred_bytes()
        } else {
            let source = Arc::new(source);
            run(source.clone(), kind, &cli, &policy).await?;
            source.transferred_bytes()
        };

        if !cli.is_quiet() {
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        let source = Arc::new(LocalFileSource::new(Path::new(&cli.source))?);
        run(source, kind, &cli, &policy).await?;
    }

    Ok(())
}

/// List the archive, or extract the entry named on the command line.
async fn run<R: RangeSource + 'static>(
    source: Arc<R>,
    kind: ArchiveKind,
    cli: &Cli,
    policy: &FetchPolicy,
) -> Result<()> {
    let service = open_service(kind, source, policy);
    let entries = service.list_files().await?;

    let pattern = match cli.entry.as_deref() {
        Some(pattern) if !cli.is_list() => pattern,
        _ => {
            print_entries(&entries, cli.verbose > 0);
            return Ok(());
        }
    };

    let entry = select_entry(&entries, pattern).ok_or_else(|| Error::EntryNotFound {
        filename: pattern.to_string(),
    })?;
    extract_entry(service.as_ref(), entry, cli).await
}

/// Print entries one per line, or as a table in verbose mode.
///
/// Columns that a format does not record (compressed size for TAR, dates
/// outside ZIP) are left blank.
fn print_entries(entries: &[EntryDescriptor], verbose: bool) {
    if !verbose {
        for entry in entries {
            println!("{}", entry.filename());
        }
        return;
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_size = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let length = entry.size().map_or_else(|| "?".to_string(), |s| s.to_string());
        let (size, ratio, date, time) = match entry {
            EntryDescriptor::Zip(e) => {
                let m = e.modified;
                (
                    e.compressed_size.to_string(),
                    compression_ratio(e.compressed_size, e.uncompressed_size),
                    format!("{:04}-{:02}-{:02}", m.year, m.month, m.day),
                    format!("{:02}:{:02}", m.hour, m.minute),
                )
            }
            EntryDescriptor::Gzip(e) => (
                e.compressed_size.map(|s| s.to_string()).unwrap_or_default(),
                match (e.compressed_size, e.uncompressed_size) {
                    (Some(c), Some(u)) => compression_ratio(c, u),
                    _ => String::new(),
                },
                String::new(),
                String::new(),
            ),
            EntryDescriptor::Tar(_) => Default::default(),
        };

        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  {}",
            length,
            size,
            ratio,
            date,
            time,
            entry.filename()
        );

        if !entry.is_directory() {
            total_size += entry.size().unwrap_or(0);
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!("{:>10}  {:>38}  {} files", total_size, "", file_count);
}

/// Percentage saved by compression, formatted for the table.
fn compression_ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Pick the first non-directory entry matching `pattern`.
///
/// A pattern with `*` or `?` is matched as a glob against the full path;
/// otherwise it must equal the full path or the base name.
fn select_entry<'a>(entries: &'a [EntryDescriptor], pattern: &str) -> Option<&'a EntryDescriptor> {
    let mut files = entries.iter().filter(|e| !e.is_directory());

    if has_glob_chars(pattern) {
        return files.find(|e| glob_match(pattern, e.filename()));
    }

    let files: Vec<_> = files.collect();
    files
        .iter()
        .find(|e| e.filename() == pattern)
        .or_else(|| {
            files.iter().find(|e| {
                Path::new(e.filename())
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy() == pattern)
            })
        })
        .copied()
}

/// Extract one entry through the content handler its extension resolves to.
///
/// With `-d` the bytes go to a file under that directory; otherwise to
/// stdout, where binary content is summarised instead of dumped on a terminal.
async fn extract_entry(
    service: &dyn ArchiveService,
    entry: &EntryDescriptor,
    cli: &Cli,
) -> Result<()> {
    let mut stream = service.extract_file(entry).await?;
    let extension = entry.extension();

    let registry = match &cli.extract_dir {
        Some(dir) => {
            let path = output_path(Path::new(dir), entry.filename(), cli.junk_paths);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;

            if !cli.is_quiet() {
                println!("  extracting: {}", entry.filename());
            }
            copy_everything(Arc::new(CopyHandler::new(file)))
        }
        None => stdout_handlers(),
    };

    let resolution = registry.resolve(extension.as_deref());
    info!(
        "{}: {} handler (kind {:?}, fallback {})",
        entry.filename(),
        resolution.handler.name(),
        resolution.kind,
        resolution.fallback_used
    );

    let written = resolution.handle(&mut stream, extension.as_deref())?;
    info!("{}: {} bytes", entry.filename(), written);

    Ok(())
}

/// One handler for every content kind.
fn copy_everything(handler: Arc<dyn ContentHandler>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new(handler.clone());
    for kind in ContentKind::ALL {
        registry.register(kind, handler.clone());
    }
    registry
}

fn stdout_handlers() -> HandlerRegistry {
    let text: Arc<dyn ContentHandler> = Arc::new(CopyHandler::new(std::io::stdout()));
    let mut registry = copy_everything(text);

    if std::io::stdout().is_terminal() {
        let summary: Arc<dyn ContentHandler> = Arc::new(SummaryHandler::new(std::io::stderr()));
        for kind in ContentKind::ALL.into_iter().filter(|k| !k.is_textual()) {
            registry.register(kind, summary.clone());
        }
    }
    registry
}

/// Where an entry lands under `dir`.
///
/// Only normal path components are kept, so absolute names and `..` cannot
/// escape the directory.
fn output_path(dir: &Path, filename: &str, junk_paths: bool) -> PathBuf {
    let relative: PathBuf = Path::new(filename)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();

    match relative.file_name() {
        Some(name) if junk_paths => dir.join(name),
        Some(_) => dir.join(relative),
        None => dir.join("unknown"),
    }
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Glob matching with `*` (any run, including `/`) and `?` (one character).
fn glob_match(pattern: &str, text: &str) -> bool {
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    do_match(&pattern, &text)
}

/// Format a byte count with a binary unit.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match size {
        s if s >= GB => format!("{:.2} GB", s as f64 / GB as f64),
        s if s >= MB => format!("{:.2} MB", s as f64 / MB as f64),
        s if s >= KB => format!("{:.2} KB", s as f64 / KB as f64),
        s => format!("{} bytes", s),
    }
}
