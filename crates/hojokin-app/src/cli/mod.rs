use std::{path::PathBuf, time::Duration};

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};

/// Pause between portal requests when scraping from the command line.
pub const DEFAULT_CLI_DELAY_SECS: f64 = 1.5;

/// Top-level CLI entry point.
#[derive(Debug, Default, Parser)]
#[command(
    name = "hojokin",
    version,
    about = "Subsidy portal scraper and search front end"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Increase logging verbosity (-v, -vv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn print_help() {
        let mut cmd = Cli::command();
        let _ = cmd.print_help();
        println!();
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scrape one prefecture's listings from the subsidy portal into a JSON file.
    Scrape(ScrapeArgs),
    /// Run the search web server.
    Serve(ServeArgs),
    /// Search previously scraped data and print matches as JSON.
    Search(SearchArgs),
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Prefecture id on the portal (18 = Fukui). Defaults to `portal.pref_id`.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=47))]
    pub pref_id: Option<u32>,
    /// Stop after this many listing pages.
    #[arg(long)]
    pub max_pages: Option<usize>,
    /// Seconds to wait between requests.
    #[arg(long, default_value_t = DEFAULT_CLI_DELAY_SECS, value_parser = parse_delay_secs)]
    pub delay: f64,
    /// Output file (defaults to `subsidies_pref_<id>.json` in the data directory).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Skip fetching detail pages.
    #[arg(long)]
    pub no_details: bool,
    /// Portal base URL. Defaults to `portal.base_url`.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

impl ScrapeArgs {
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay)
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Keyword matched against titles, descriptions, tags and details.
    pub keyword: String,
    /// Restrict to a prefecture or area name.
    #[arg(long)]
    pub area: Option<String>,
    /// Include closed subsidies.
    #[arg(long)]
    pub all: bool,
    /// Data directory to search. Defaults to `storage.data_dir`.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

fn parse_delay_secs(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("delay must be a number of seconds: {raw}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("delay must be zero or positive: {raw}"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_defaults() {
        let cli = Cli::try_parse_from(["hojokin", "scrape"]).unwrap();
        let Some(Commands::Scrape(args)) = cli.command else {
            panic!("expected scrape command");
        };
        assert_eq!(args.pref_id, None);
        assert_eq!(args.delay(), Duration::from_millis(1_500));
        assert!(!args.no_details);
    }

    #[test]
    fn scrape_flags_parse() {
        let cli = Cli::try_parse_from([
            "hojokin", "-vv", "scrape", "--pref-id", "13", "--max-pages", "2", "--delay", "0",
            "--no-details", "--output", "out.json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Some(Commands::Scrape(args)) = cli.command else {
            panic!("expected scrape command");
        };
        assert_eq!(args.pref_id, Some(13));
        assert_eq!(args.max_pages, Some(2));
        assert_eq!(args.delay(), Duration::ZERO);
        assert!(args.no_details);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn rejects_negative_delay_and_unknown_prefecture() {
        assert!(Cli::try_parse_from(["hojokin", "scrape", "--delay", "-1"]).is_err());
        assert!(Cli::try_parse_from(["hojokin", "scrape", "--pref-id", "48"]).is_err());
    }

    #[test]
    fn search_takes_keyword_and_filters() {
        let cli = Cli::try_parse_from(["hojokin", "search", "創業", "--area", "福井県", "--all"])
            .unwrap();
        let Some(Commands::Search(args)) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.keyword, "創業");
        assert_eq!(args.area.as_deref(), Some("福井県"));
        assert!(args.all);
    }
}
