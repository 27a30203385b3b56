use anyhow::Context;
use clap::{Parser, Subcommand};
use site_factory::{
    parse_stages, read_manifest, BulkOptions, BulkRunner, Config, CostTracker, DiskCache,
    ErrorLogger, QualityScorer, SeoOptimizer, SiteBuilder, SiteConfig, MANIFEST_JSON,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "site-factory",
    version,
    author,
    about = "Generate a static article site with LLM-written content",
    long_about = "Generate a static, ad-supported article site from a topic catalog.\n\n\
    Articles are written through a multi-stage LLM pipeline, scored for quality, \
    given header images and collected into a manifest that the site builder renders \
    into HTML. Without an API key every step runs in dry-run mode.\n\n\
    USAGE EXAMPLES:\n  \
      # Generate ten articles without calling any provider\n  \
      site-factory generate --dry-run --max-articles 10\n\n  \
      # Write about specific topics and build the site straight away\n  \
      site-factory generate --topic \"Power BI\" --topic \"Tidal Power\" --build\n\n  \
      # Rebuild the site from the existing manifest\n  \
      site-factory build --site site.json --out ./dist\n\n  \
      # Show what has been spent this month\n  \
      site-factory costs"
)]
struct Cli {
    /// Directory for the manifest, cost ledger, error log and cache
    #[arg(long, global = true, env = "SITE_FACTORY_DATA_DIR", value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Directory the site is built into
    #[arg(short, long, global = true, env = "SITE_FACTORY_OUTPUT_DIR", value_name = "PATH")]
    out: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate articles and write the manifest
    Generate(GenerateArgs),

    /// Build the static site from the manifest
    Build {
        /// Site configuration file (JSON)
        #[arg(long, env = "SITE_CONFIG", value_name = "FILE")]
        site: Option<PathBuf>,

        /// Manifest to read instead of `<data-dir>/articles.json`
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,
    },

    /// Score the articles in the manifest
    Score {
        /// Manifest to read instead of `<data-dir>/articles.json`
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,
    },

    /// Inspect or clear the response cache
    Cache {
        /// Remove every cached entry
        #[arg(long)]
        clear: bool,
    },

    /// Show the cost report
    Costs {
        /// Reset the current month's ledger
        #[arg(long)]
        reset: bool,
    },

    /// Show the error report
    Errors {
        /// Write the full error history to this JSON file
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,

        /// Clear the error history
        #[arg(long)]
        clear: bool,
    },
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Topic to write about (repeatable); without any, the catalog is used
    #[arg(short, long = "topic", value_name = "TOPIC")]
    topics: Vec<String>,

    /// Maximum number of articles
    #[arg(short = 'n', long)]
    max_articles: Option<usize>,

    /// Drop articles scoring below this (0-100)
    #[arg(long, value_name = "SCORE")]
    min_quality: Option<f64>,

    /// Lens perspectives per catalog topic
    #[arg(long, default_value_t = 3)]
    perspectives: usize,

    /// Use medium length for every perspective
    #[arg(long)]
    same_style: bool,

    /// Comma-separated pipeline stages
    #[arg(long, value_name = "LIST")]
    stages: Option<String>,

    /// Generate with a single prompt instead of the pipeline
    #[arg(long)]
    no_pipeline: bool,

    /// Bypass the response cache
    #[arg(long)]
    no_cache: bool,

    /// Never call remote providers
    #[arg(long)]
    dry_run: bool,

    /// Monthly budget in dollars
    #[arg(long, value_name = "USD")]
    budget: Option<f64>,

    /// Build the site after generating
    #[arg(long)]
    build: bool,

    /// Site configuration file used with --build
    #[arg(long, env = "SITE_CONFIG", value_name = "FILE")]
    site: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let mut builder = Config::builder()
        .with_env(|name| std::env::var(name).ok())
        .context("Invalid environment configuration")?;
    if let Some(dir) = cli.data_dir {
        builder = builder.data_dir(dir);
    }
    if let Some(dir) = cli.out {
        builder = builder.output_dir(dir);
    }

    match cli.command {
        Command::Generate(args) => generate(builder, args),
        Command::Build { site, manifest } => {
            let config = builder.build().context("Failed to build configuration")?;
            let manifest = manifest.unwrap_or_else(|| manifest_path(&config));
            build_site(&config, site.as_deref(), &manifest)
        }
        Command::Score { manifest } => {
            let config = builder.build().context("Failed to build configuration")?;
            let manifest = manifest.unwrap_or_else(|| manifest_path(&config));
            score(&manifest)
        }
        Command::Cache { clear } => {
            let config = builder.build().context("Failed to build configuration")?;
            let cache = DiskCache::new(&config.cache_dir).context("Failed to open cache")?;
            if clear {
                println!("Removed {} cache entries", cache.clear());
            } else {
                let stats = cache.stats();
                println!(
                    "{} entries, {:.2} MB in {}",
                    stats.count,
                    stats.size_mb(),
                    cache.dir().display()
                );
            }
            Ok(())
        }
        Command::Costs { reset } => {
            let config = builder.build().context("Failed to build configuration")?;
            let costs = CostTracker::new(&config.data_dir, config.monthly_budget);
            if reset {
                costs.reset().context("Failed to reset cost ledger")?;
                println!("Cost ledger reset");
            } else {
                costs.print_report();
            }
            Ok(())
        }
        Command::Errors { export, clear } => {
            let config = builder.build().context("Failed to build configuration")?;
            let errors = ErrorLogger::new(&config.data_dir);
            if let Some(path) = export {
                errors
                    .export(&path)
                    .with_context(|| format!("Failed to export errors to {}", path.display()))?;
                println!("Exported error history to {}", path.display());
            }
            if clear {
                errors.clear();
                println!("Error history cleared");
            } else {
                errors.print_report();
            }
            Ok(())
        }
    }
}

fn generate(mut builder: site_factory::ConfigBuilder, args: GenerateArgs) -> anyhow::Result<()> {
    if let Some(max) = args.max_articles {
        builder = builder.max_articles(max);
    }
    if let Some(score) = args.min_quality {
        builder = builder.min_quality_score(score);
    }
    if let Some(list) = &args.stages {
        builder = builder.stages(parse_stages(list).context("Invalid --stages")?);
    }
    if let Some(budget) = args.budget {
        builder = builder.monthly_budget(budget);
    }
    if args.no_pipeline {
        builder = builder.use_pipeline(false);
    }
    if args.no_cache {
        builder = builder.use_cache(false);
    }
    if args.dry_run {
        builder = builder.dry_run(true);
    }
    let config = builder.build().context("Failed to build configuration")?;

    let costs = Arc::new(CostTracker::new(&config.data_dir, config.monthly_budget));
    let errors = Arc::new(ErrorLogger::new(&config.data_dir));

    let options = BulkOptions {
        topics: args.topics,
        perspectives_per_topic: args.perspectives,
        vary_styles: !args.same_style,
        ..BulkOptions::from_config(&config)
    };

    let report = BulkRunner::from_config(&config, &costs, &errors)
        .context("Failed to set up generation")?
        .with_options(options)
        .run()
        .context("Bulk generation failed")?;

    report.stats.print_summary();
    costs.print_report();
    errors.print_report();

    if report.stats.all_failed() {
        anyhow::bail!(
            "All {} articles failed to generate; see the error report above",
            report.stats.failed
        );
    }

    if args.build {
        build_site(&config, args.site.as_deref(), &report.manifest.json)?;
    }
    Ok(())
}

fn build_site(config: &Config, site: Option<&Path>, manifest: &Path) -> anyhow::Result<()> {
    let site_config = match site.or(config.site_file.as_deref()) {
        Some(path) => SiteConfig::load(path)
            .with_context(|| format!("Failed to load site config {}", path.display()))?,
        None => SiteConfig::default(),
    };

    SiteBuilder::new(site_config, &config.output_dir)
        .context("Failed to prepare site builder")?
        .build_from_manifest(manifest)
        .with_context(|| format!("Failed to build site from {}", manifest.display()))?
        .print_summary();
    Ok(())
}

fn score(manifest: &Path) -> anyhow::Result<()> {
    let articles = read_manifest(manifest)
        .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
    let scorer = QualityScorer::new();
    let seo = SeoOptimizer::new();

    for article in &articles {
        let quality = scorer.score_article(article);
        let analysis = seo.analyze(article);
        println!(
            "{:>5.1} {:<3} seo {:>5.1} {:<3} {}",
            quality.scores.overall,
            quality.grade,
            analysis.scores.overall,
            analysis.grade,
            article.title
        );
        for issue in &analysis.issues {
            println!("        - {issue}");
        }
    }
    println!("\n{} articles scored", articles.len());
    Ok(())
}

fn manifest_path(config: &Config) -> PathBuf {
    config.manifest_dir().join(MANIFEST_JSON)
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("site_factory=info"),
        1 => EnvFilter::new("site_factory=debug"),
        _ => EnvFilter::new("site_factory=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
