use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::{ColoredString, Colorize};
use cxxcompat_compare::{CompareEngine, CompatReport};
use cxxcompat_core::{CompatConfig, ConfigManager, LoggingConfig, Tier};
use cxxcompat_parser::{DeclNode, SourceLoader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};

#[derive(Parser)]
#[command(
    name = "cxxcompat",
    version,
    about = "cxxcompat - C++ API/ABI compatibility checker",
    long_about = "Compares the public declarations of two versions of a C++ library and reports source and binary compatibility breaks."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ./.cxxcompat.toml, then ~/.cxxcompat/config.toml)
    #[arg(short, long, global = true, env = "CXXCOMPAT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two versions of a library's headers
    Compare {
        /// Headers, directories or declaration-tree JSON files of the old version
        #[arg(long, required = true, num_args = 1..)]
        old: Vec<PathBuf>,

        /// Headers, directories or declaration-tree JSON files of the new version
        #[arg(long, required = true, num_args = 1..)]
        new: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: OutputFormat,

        /// Lowest tier that makes the command fail (neutral, source_break, binary_break, unknown)
        #[arg(long)]
        fail_on: Option<Tier>,

        /// Hide changes below this tier
        #[arg(long)]
        min_tier: Option<Tier>,
    },

    /// Print the extracted surface of one version as JSON
    Dump {
        /// Headers, directories or declaration-tree JSON files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Print the JSON schema of the declaration-tree interchange format
    Schema,

    /// Write a default configuration file
    InitConfig {
        /// Target path
        #[arg(default_value = ".cxxcompat.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match execute_command(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn execute_command(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Compare {
            old,
            new,
            format,
            fail_on,
            min_tier,
        } => {
            let config = load_config(cli.config.as_deref())?;
            init_tracing(&config.logging);
            execute_compare(config, old, new, format, fail_on, min_tier).await
        }
        Commands::Dump { inputs } => {
            let config = load_config(cli.config.as_deref())?;
            init_tracing(&config.logging);
            execute_dump(config, inputs).await?;
            Ok(0)
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(DeclNode);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(0)
        }
        Commands::InitConfig { path } => {
            ConfigManager::create_default_config(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "✓ Wrote".green(), path.display());
            Ok(0)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CompatConfig> {
    let manager = match path {
        Some(path) => ConfigManager::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigManager::load().context("Failed to load configuration")?,
    };
    Ok(manager.into_config())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.format == "compact" {
        let subscriber = Registry::default().with(filter).with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        );
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = Registry::default().with(filter).with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr),
        );
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

async fn execute_compare(
    mut config: CompatConfig,
    old: Vec<PathBuf>,
    new: Vec<PathBuf>,
    format: OutputFormat,
    fail_on: Option<Tier>,
    min_tier: Option<Tier>,
) -> Result<i32> {
    if let Some(tier) = fail_on {
        config.policy.fail_on = tier;
    }
    let fail_on = config.policy.fail_on;

    let engine = Arc::new(CompareEngine::new(config));
    let mut report = engine
        .compare_files(old, new)
        .await
        .context("Comparison failed")?;
    let code = report.exit_code(fail_on);
    if let Some(min) = min_tier {
        report = report.hide_below(min);
    }

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Pretty => print_pretty(&report),
        OutputFormat::Table => print_table(&report),
    }

    info!("Exit code {}", code);
    Ok(code)
}

async fn execute_dump(config: CompatConfig, inputs: Vec<PathBuf>) -> Result<()> {
    let trees = SourceLoader::new()
        .load_all(&inputs)
        .await
        .context("Failed to load inputs")?;
    let engine = CompareEngine::new(config);
    let extraction = engine
        .extract("dump", &trees)
        .context("Failed to extract surface")?;
    for diagnostic in &extraction.diagnostics {
        eprintln!("{} {}", "warning:".yellow().bold(), diagnostic);
    }
    println!("{}", serde_json::to_string_pretty(&extraction.surface)?);
    Ok(())
}

fn tier_label(tier: Tier) -> ColoredString {
    match tier {
        Tier::Neutral => tier.as_str().dimmed(),
        Tier::SourceBreak => tier.as_str().yellow().bold(),
        Tier::BinaryBreak => tier.as_str().red().bold(),
        Tier::Unknown => tier.as_str().magenta().bold(),
    }
}

fn print_pretty(report: &CompatReport) {
    println!(
        "{} {} {} {}",
        "Comparing".cyan().bold(),
        report.old_label,
        "→".cyan(),
        report.new_label
    );

    if report.summary.total == 0 {
        println!("{}", "✓ No compatibility changes".green().bold());
    }
    for change in &report.changes {
        let entity = if change.key.is_empty() {
            "<translation unit>"
        } else {
            change.key.as_str()
        };
        print!("  [{}] {} {}", tier_label(change.tier), entity.bold(), change.kind.to_string().cyan());
        if change.ambiguous {
            print!(" {}", "(ambiguous)".magenta());
        }
        println!();
        println!("      {}", change.rationale);
        if !change.unknown_facets.is_empty() {
            println!("      {} {}", "unverified:".dimmed(), change.unknown_facets.join(", "));
        }
        if let Some(location) = &change.location {
            println!("      {} {}", "at".dimmed(), location);
        }
    }

    for diagnostic in &report.diagnostics {
        println!("{} {}", "warning:".yellow().bold(), diagnostic);
    }
    print_summary(report);
}

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Change")]
    kind: String,
    #[tabled(rename = "Rationale")]
    rationale: String,
}

fn print_table(report: &CompatReport) {
    let rows: Vec<ChangeRow> = report
        .changes
        .iter()
        .map(|c| ChangeRow {
            tier: c.tier.to_string(),
            entity: c.key.clone(),
            kind: if c.ambiguous {
                format!("{} (ambiguous)", c.kind)
            } else {
                c.kind.to_string()
            },
            rationale: c.rationale.clone(),
        })
        .collect();
    if !rows.is_empty() {
        println!("{}", Table::new(rows).with(Style::rounded()));
    }
    print_summary(report);
}

fn print_summary(report: &CompatReport) {
    let counts: Vec<String> = report
        .summary
        .counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(tier, n)| format!("{} {}", n.to_string().yellow(), tier_label(*tier)))
        .collect();
    println!(
        "\n{} {} change(s) across {} entit(ies){}{}",
        "Summary:".cyan().bold(),
        report.summary.total,
        report.summary.affected_entities,
        if counts.is_empty() { "" } else { ": " },
        counts.join(", ")
    );
}
