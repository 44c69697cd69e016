use clap::Parser;

use crate::config::FetchPolicy;
use crate::service::ArchiveKind;

#[derive(Parser, Debug)]
#[command(name = "rpeek")]
#[command(version)]
#[command(about = "List and extract single entries of remote archives using HTTP Range requests", long_about = None)]
#[command(after_help = "Examples:\n  \
  rpeek -l https://example.com/archive.zip          list entries of a remote ZIP\n  \
  rpeek -v https://example.com/archive.zip          list with sizes and dates\n  \
  rpeek https://example.com/src.tar.gz '*/README*'  print the first README\n  \
  rpeek -d out -j data.zip report.csv               save report.csv into out/")]
pub struct Cli {
    /// Archive path or HTTP URL
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Entry to extract: full path, base name, or glob with `*` and `?`
    #[arg(value_name = "ENTRY")]
    pub entry: Option<String>,

    /// List entries (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// Verbose listing when no ENTRY is given; repeat for more log output (-vv info, -vvv debug)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Extract the entry into DIR instead of writing it to stdout
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Archive kind, instead of guessing from the name
    #[arg(long, value_name = "KIND", value_parser = parse_kind)]
    pub kind: Option<ArchiveKind>,

    /// Leading bytes fetched from TAR and GZIP objects
    #[arg(long, value_name = "BYTES")]
    pub prefix_bytes: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Retries for timeouts and connection errors
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub retries: u32,
}

fn parse_kind(s: &str) -> Result<ArchiveKind, String> {
    s.parse()
        .map_err(|_| format!("unknown archive kind '{s}' (expected zip, tar, tar.gz or gz)"))
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }

    pub fn is_list(&self) -> bool {
        self.list || self.entry.is_none()
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    /// Default log filter for these flags; `RUST_LOG` still wins.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (q, _) if q > 1 => "off",
            (1, _) => "error",
            (_, 0 | 1) => "warn",
            (_, 2) => "info",
            _ => "debug",
        }
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        let mut policy = FetchPolicy {
            timeout: std::time::Duration::from_secs(self.timeout),
            max_retries: self.retries,
            ..FetchPolicy::default()
        };
        if let Some(bytes) = self.prefix_bytes {
            policy.tar_prefix_bytes = bytes;
            policy.gzip_window_bytes = bytes;
        }
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rpeek").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn bare_source_lists() {
        let cli = parse(&["https://h/a.zip"]);
        assert!(cli.is_http_url());
        assert!(cli.is_list());
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn entry_means_extract() {
        let cli = parse(&["a.tar", "dir/file.txt", "-d", "out", "-j"]);
        assert!(!cli.is_http_url());
        assert!(!cli.is_list());
        assert_eq!(cli.entry.as_deref(), Some("dir/file.txt"));
        assert!(cli.junk_paths);
    }

    #[test]
    fn verbosity_with_an_entry_still_extracts() {
        let cli = parse(&["a.zip", "docs/readme.txt", "-vvv"]);
        assert!(!cli.is_list());
        assert_eq!(cli.log_level(), "debug");

        assert!(parse(&["a.zip", "-v"]).is_list());
        assert!(parse(&["a.zip", "docs/readme.txt", "-l", "-v"]).is_list());
    }

    #[test]
    fn verbosity_and_quiet_map_to_log_levels() {
        assert_eq!(parse(&["a.zip", "-vv"]).log_level(), "info");
        assert_eq!(parse(&["a.zip", "-vvv"]).log_level(), "debug");
        assert_eq!(parse(&["a.zip", "-q", "-vvv"]).log_level(), "error");
        assert_eq!(parse(&["a.zip", "-qq"]).log_level(), "off");
    }

    #[test]
    fn policy_from_flags() {
        let cli = parse(&["a.tgz", "--prefix-bytes", "4096", "--retries", "3", "--timeout", "5"]);
        let policy = cli.fetch_policy();
        assert_eq!(policy.tar_prefix_bytes, 4096);
        assert_eq!(policy.gzip_window_bytes, 4096);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.timeout.as_secs(), 5);
    }

    #[test]
    fn kind_override() {
        assert_eq!(parse(&["blob", "--kind", "tgz"]).kind, Some(ArchiveKind::TarGz));
        assert!(Cli::try_parse_from(["rpeek", "blob", "--kind", "rar"]).is_err());
    }
}
