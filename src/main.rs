//! Main entry point for the rangezip CLI application.
//!
//! Lists, extracts and repacks ZIP archives from the local filesystem or
//! from HTTP URLs that honour Range requests.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rangezip::zip::sanitized_path;
use rangezip::{
    Cli, EntryTable, FileSource, HttpTransport, RandomAccessSource, RemoteSource, WriteProgress,
    ZipArchive, ZipEntry,
};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on whether the input is a local file or HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    if cli.is_http_url() {
        // Handle remote ZIP file via HTTP Range requests
        let transport = HttpTransport::with_config(cli.file.clone(), &cli.http_config())
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {}", e))?;
        let source = Arc::new(RemoteSource::new(transport));
        let archive = ZipArchive::open(source.clone())
            .await
            .with_context(|| format!("cannot open {}", cli.file))?;

        process_zip(archive, &cli).await?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {} in {} requests",
                format_size(source.transferred_bytes()),
                source.request_count()
            );
        }
    } else {
        // Handle local ZIP file
        let source = FileSource::open(Path::new(&cli.file))
            .with_context(|| format!("cannot open {}", cli.file))?;
        let archive = ZipArchive::open(source)
            .await
            .with_context(|| format!("cannot read {}", cli.file))?;
        process_zip(archive, &cli).await?;
    }

    Ok(())
}

/// Process a ZIP archive based on CLI options.
///
/// - Comment mode (`-z`): print the archive comment
/// - List mode (`-l` or `-v`): display archive contents
/// - Repack mode (`-r`): write the selected entries to a new archive
/// - Extract mode: extract files matching the specified filters
async fn process_zip<S: RandomAccessSource>(mut archive: ZipArchive<S>, cli: &Cli) -> Result<()> {
    if cli.comment {
        println!("{}", String::from_utf8_lossy(archive.comment()));
        return Ok(());
    }

    // List mode: display archive contents and exit
    if cli.list || cli.verbose {
        list_files(&archive, cli.verbose);
        return Ok(());
    }

    if let Some(ref out) = cli.repack {
        return repack(&mut archive, cli, Path::new(out)).await;
    }

    // Directories are created on demand while extracting files.
    let files_to_extract: Vec<ZipEntry> = archive
        .entries()
        .iter()
        .filter(|e| !e.is_directory() && is_selected(e, cli))
        .cloned()
        .collect();

    // Extract each matching file
    let multiple_files = cli.pipe && files_to_extract.len() > 1;
    for entry in &files_to_extract {
        extract_file(&archive, entry, cli, multiple_files).await?;
    }

    Ok(())
}

/// Whether `entry` passes the FILES selection and `-x` exclusions.
fn is_selected(entry: &ZipEntry, cli: &Cli) -> bool {
    let name = entry.name_lossy();

    // If specific files are requested via positional arguments,
    // only include entries that match
    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, &name)
            } else {
                // No wildcards: exact match on filename or full path
                let basename = Path::new(&name)
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                name == *f || basename == *f
            }
        });
        if !matches {
            return false;
        }
    }

    !cli
        .exclude
        .iter()
        .any(|x| name.contains(x.as_str()) || glob_match(x, &name))
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
fn list_files<S: RandomAccessSource>(archive: &ZipArchive<S>, verbose: bool) {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive.entries() {
        if !verbose {
            println!("{}", entry.name_lossy());
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        let compressed = entry.compressed_size as u64;
        let uncompressed = entry.uncompressed_size as u64;

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            uncompressed,
            compressed,
            ratio(compressed, uncompressed),
            year,
            month,
            day,
            hour,
            minute,
            entry.name_lossy()
        );

        // Accumulate totals (excluding directories)
        if !entry.is_directory() {
            total_uncompressed += uncompressed;
            total_compressed += compressed;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
        if !archive.comment().is_empty() {
            println!("{}", String::from_utf8_lossy(archive.comment()));
        }
    }
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Prints one line per entry while the archive is being written.
struct RepackProgress {
    quiet: bool,
}

impl WriteProgress for RepackProgress {
    fn entry_started(&mut self, entry: &ZipEntry) {
        if !self.quiet {
            println!("  adding: {}", entry.name_lossy());
        }
    }

    fn entry_finished(&mut self, entry: &ZipEntry) {
        if !self.quiet {
            println!(
                "    done: {} ({} -> {})",
                entry.name_lossy(),
                entry.uncompressed_size,
                entry.compressed_size
            );
        }
    }
}

/// Write the entries selected by FILES and `-x` into `out`.
///
/// Payloads are copied as stored, nothing is recompressed.
async fn repack<S: RandomAccessSource>(
    archive: &mut ZipArchive<S>,
    cli: &Cli,
    out: &Path,
) -> Result<()> {
    for name in repack_dropped(archive.entries(), cli) {
        archive.remove_entry(&name);
    }

    let mut progress = RepackProgress {
        quiet: cli.is_quiet(),
    };
    let bytes = archive.to_bytes_pipelined(&mut progress).await?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("cannot write {}", out.display()))?;

    if !cli.is_quiet() {
        println!(
            "wrote {} entries ({}) to {}",
            archive.len(),
            format_size(bytes.len() as u64),
            out.display()
        );
    }
    Ok(())
}

/// Names of the entries `-r` leaves out.
///
/// A directory that is not selected itself is still kept while any
/// selected entry sits below it.
fn repack_dropped(entries: &EntryTable, cli: &Cli) -> Vec<Vec<u8>> {
    let selected: Vec<&ZipEntry> = entries.iter().filter(|e| is_selected(e, cli)).collect();
    let holds_selected = |dir: &ZipEntry| {
        selected
            .iter()
            .any(|e| e.name.len() > dir.name.len() && e.name.starts_with(&dir.name))
    };

    entries
        .iter()
        .filter(|e| !is_selected(e, cli))
        .filter(|e| !(e.is_directory() && holds_selected(*e)))
        .map(|e| e.name.clone())
        .collect()
}

/// Extract a single file from the archive.
///
/// Handles various extraction options:
/// - Pipe mode (`-p`): Write to stdout instead of file
/// - Custom output directory (`-d`): Extract to specified directory
/// - Junk paths (`-j`): Ignore directory structure in archive
/// - Overwrite control (`-n`, `-o`): Handle existing files
async fn extract_file<S: RandomAccessSource>(
    archive: &ZipArchive<S>,
    entry: &ZipEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    let name = entry.name_lossy();

    // Pipe mode: write file contents directly to stdout
    if cli.pipe {
        let mut stdout = tokio::io::stdout();
        if show_filename {
            use tokio::io::AsyncWriteExt;
            stdout
                .write_all(format!("--- {} ---\n", name).as_bytes())
                .await?;
        }
        archive.extract_to_writer(entry, &mut stdout).await?;
        return Ok(());
    }

    let Some(relative) = sanitized_path(&name) else {
        log::warn!("skipping unsafe path: {}", name);
        return Ok(());
    };

    // Junk paths: use only the base filename, ignore directory structure
    let relative = if cli.junk_paths {
        relative
            .file_name()
            .map(PathBuf::from)
            .unwrap_or(relative)
    } else {
        relative
    };

    let output_path = match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(&relative),
        None => relative,
    };

    // Handle existing files based on overwrite options
    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", name);
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", name);
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", name);
    }

    archive
        .extract_to_file(entry, &output_path)
        .await
        .with_context(|| format!("cannot extract {}", name))?;

    Ok(())
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Star matches zero characters, or one and stays for more
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
