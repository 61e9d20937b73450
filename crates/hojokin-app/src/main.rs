use std::{process, time::Duration};

use hojokin_app::cli::{Cli, Commands, ScrapeArgs, SearchArgs};
use hojokin_app::config;
use hojokin_app::error::AppError;
use hojokin_app::portal::{PortalScraper, ScrapeOptions, ScrapeOutput, default_output_file};
use hojokin_app::server;
use hojokin_app::services::{LocalSubsidySearcher, SubsidySummary};
use tracing_subscriber::{filter::LevelFilter, fmt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(determine_log_level(&cli));

    if let Err(error) = run(cli).await {
        eprintln!("error: {error}");
        process::exit(1);
    }
}

fn init_tracing(level: LevelFilter) {
    // stdout carries command output; logs go to stderr.
    let installed = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Some(Commands::Scrape(args)) => run_scrape(args).await?,
        Some(Commands::Serve(_)) => server::serve(config::load()?).await?,
        Some(Commands::Search(args)) => run_search(args)?,
        None => Cli::print_help(),
    }

    Ok(())
}

async fn run_scrape(args: ScrapeArgs) -> Result<(), AppError> {
    let settings = config::load()?;
    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| settings.portal.base_url.clone());
    let pref_id = args.pref_id.unwrap_or(settings.portal.pref_id);

    let scraper = PortalScraper::with_timeout(&base_url, pref_id, settings.portal.request_timeout())?;
    let options = ScrapeOptions::builder()
        .delay(args.delay())
        .fetch_details(!args.no_details)
        .maybe_max_pages(args.max_pages)
        .build();

    tracing::info!(
        url = %base_url,
        pref_id,
        max_pages = ?options.max_pages,
        delay_ms = whole_millis(options.delay),
        fetch_details = options.fetch_details,
        "starting subsidy portal scrape"
    );

    let run = scraper.scrape_all(&options).await;
    if run.is_empty() {
        tracing::warn!(pref_id, "no subsidies scraped; output not written");
        return Ok(());
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_file(&settings.storage.data_dir, pref_id));
    let output = ScrapeOutput::new(scraper.source_url(), pref_id, run.records);
    output.save(&output_path)?;

    tracing::info!(
        total_count = run.total_count,
        total_pages = run.total_pages,
        pages_failed = run.pages_failed,
        details_attached = run.details_attached,
        "scrape finished"
    );
    println!(
        "{} 件の補助金情報を {} に保存しました",
        output.metadata.total_count,
        output_path.display()
    );
    Ok(())
}

fn run_search(args: SearchArgs) -> Result<(), AppError> {
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => config::load()?.storage.data_dir,
    };
    let searcher = LocalSubsidySearcher::load(data_dir)?;
    let rows: Vec<SubsidySummary> = searcher
        .search(&args.keyword, args.area.as_deref(), !args.all)
        .into_iter()
        .map(SubsidySummary::from_local)
        .collect();

    tracing::info!(keyword = %args.keyword, matches = rows.len(), "local search finished");
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

/// Maps `-v` counts onto levels; `search` starts quieter since stdout carries its JSON.
fn determine_log_level(cli: &Cli) -> LevelFilter {
    const LADDER: [LevelFilter; 5] = [
        LevelFilter::OFF,
        LevelFilter::WARN,
        LevelFilter::INFO,
        LevelFilter::DEBUG,
        LevelFilter::TRACE,
    ];
    let verbose = usize::from(cli.verbose);
    let index = match cli.command {
        Some(Commands::Search(_)) => 1 + verbose,
        Some(_) => 2 + verbose,
        None if verbose == 0 => 0,
        None => (1 + verbose).min(3),
    };
    LADDER[index.min(LADDER.len() - 1)]
}

fn whole_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_millis_saturates() {
        assert_eq!(whole_millis(Duration::from_secs_f64(1.5)), 1500);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }
}
