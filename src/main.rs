use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use folio::{
    check::Coverage,
    config::Config,
    generator::{Generator, Mode},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    site: Site,
    #[arg(long, help = "Regenerate every page (default)")]
    full: bool,
    #[arg(long, conflicts_with = "full", help = "Only create pages that do not exist yet")]
    incremental: bool,
    #[arg(long, help = "Only process the named collection")]
    only: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct Site {
    #[arg(short, long, default_value = ".", global = true, help = "The site root")]
    root: PathBuf,
    #[arg(short, long, global = true, help = "YAML configuration, relative to the root")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare the sitemap with the pages on disk.
    Check,
}

fn load_config(site: &Site) -> anyhow::Result<Config> {
    match &site.config {
        Some(path) => Config::load(&site.root.join(path)),
        None => Ok(Config::default()),
    }
}

fn generate(args: &Args, config: &Config) -> anyhow::Result<bool> {
    let mode = if args.incremental {
        Mode::Incremental
    } else {
        Mode::Full
    };

    log::info!("Generating pages under `{}` ({:?})", args.site.root.display(), mode);

    let report = Generator::new(config, &args.site.root, mode)?.run(args.only.as_deref())?;

    log::info!(
        "{} written, {} unchanged, {} skipped",
        report.generated,
        report.unchanged,
        report.skipped
    );
    log::info!(
        "Sitemap: {} added, {} updated",
        report.sitemap.added.len(),
        report.sitemap.updated.len()
    );
    for name in &report.failed {
        log::error!("Collection `{}` failed", name);
    }

    Ok(report.success())
}

fn check(root: &Path, config: &Config) -> anyhow::Result<bool> {
    let coverage = Coverage::collect(config, root)?;

    for url in coverage.extra() {
        log::warn!("Listed but not on disk: {}", url);
    }
    for url in coverage.missing() {
        log::error!("Not in sitemap: {}", url);
    }

    log::info!(
        "{} pages on disk, {} listed, {:.1}% covered",
        coverage.on_disk.len(),
        coverage.listed.len(),
        coverage.percent()
    );

    Ok(coverage.missing().is_empty())
}

fn main() {
    // Initialize Logging.
    let log_environ = env_logger::Env::new()
        .filter("FOLIO_LOG")
        .write_style("FOLIO_LOG_STYLE");
    let mut log_builder = env_logger::Builder::new();

    log_builder.filter_level(log::LevelFilter::Info);
    log_builder.parse_env(log_environ);
    log_builder.init();

    // Parse Arguments.
    let args = Args::parse();

    let result = load_config(&args.site).and_then(|config| match args.command {
        Some(Command::Check) => check(&args.site.root, &config),
        None => generate(&args, &config),
    });

    match result {
        Ok(true) => log::info!("Done."),
        Ok(false) => std::process::exit(1),
        Err(err) => {
            log::error!("{:#}", err);
            std::process::exit(1);
        }
    }
}
