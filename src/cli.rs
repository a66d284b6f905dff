use clap::Parser;
use std::time::Duration;

use crate::io::HttpConfig;

#[derive(Parser, Debug)]
#[command(name = "rangezip")]
#[command(version)]
#[command(about = "List, extract and repack ZIP archives, local or over HTTP Range requests", long_about = None)]
#[command(after_help = "Examples:\n  \
  rangezip data1.zip -x joe        extract all files except joe from data1.zip\n  \
  rangezip -p foo.zip | more       send contents of foo.zip via pipe into more\n  \
  rangezip -l https://example.com/archive.zip   list files from remote ZIP\n  \
  rangezip big.zip -x '*.log' -r small.zip     repack without log files")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely/show version info
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Display archive comment only
    #[arg(short = 'z')]
    pub comment: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Write the selected entries into a new archive instead of extracting
    #[arg(short = 'r', value_name = "OUT")]
    pub repack: Option<String>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Attempts per HTTP request on connection errors
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub retries: u32,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.timeout),
            max_retry: self.retries,
            ..HttpConfig::default()
        }
    }

    /// Default log filter; `RUST_LOG` takes precedence.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.is_very_quiet() {
            "error"
        } else {
            "warn"
        }
    }
}
