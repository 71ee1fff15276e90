//! Load test CLI for the PR reviewer assignment service.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "review-load-test")]
#[command(about = "Workflow load testing tool for the PR reviewer service", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override number of virtual clients
        #[arg(short, long)]
        concurrency: Option<u32>,

        /// Override workflow runs per client
        #[arg(short, long)]
        iterations: Option<u32>,

        /// Override pause between steps, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Output format: table (default), json, csv
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Run the built-in PR review workflow
    Quick {
        /// Base URL
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,

        /// Number of virtual clients
        #[arg(short, long, default_value = "5")]
        concurrency: u32,

        /// Workflow runs per client
        #[arg(short, long, default_value = "50")]
        iterations: u32,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },

    /// Validate a scenario and print its steps
    Show {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

fn init_tracing(log_level: &str, json: bool) -> anyhow::Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn execute(config: review_load_test::TestConfig, output: &str) -> anyhow::Result<()> {
    let runner = review_load_test::LoadRunner::new(config);

    // Ctrl+C stops new runs; in-flight requests finish on their own
    let shutdown = runner.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping virtual clients");
            shutdown.cancel();
        }
    });

    let results = runner.run().await?;

    match output {
        "json" => {
            println!("{}", review_load_test::ResultsReport::format_json(&results)?);
        }
        "csv" => {
            println!("{}", review_load_test::ResultsReport::csv_header());
            println!("{}", review_load_test::ResultsReport::format_csv(&results));
        }
        _ => {
            println!("{}", review_load_test::ResultsReport::format_table(&results));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Run {
            scenario,
            concurrency,
            iterations,
            delay_ms,
            output,
        } => {
            info!(path = %scenario.display(), "Loading scenario");

            // Load and validate configuration
            let mut config = review_load_test::TestConfig::from_file(&scenario)?;

            // Apply overrides
            if let Some(c) = concurrency {
                config.concurrency = c;
            }
            if let Some(i) = iterations {
                config.iterations_per_client = i;
            }
            if let Some(d) = delay_ms {
                config.inter_step_delay_ms = d;
            }

            config.validate()?;

            println!("✓ Configuration loaded successfully");
            println!("  Name: {}", config.name);
            println!("  Description: {}", config.description);
            println!("  Target: {}", config.base_url);
            println!("  Concurrency: {}", config.concurrency);
            println!("  Iterations/client: {}", config.iterations_per_client);
            println!("  Inter-step delay: {}ms", config.inter_step_delay_ms);
            println!();

            execute(config, &output).await
        }
        Commands::Quick {
            url,
            concurrency,
            iterations,
        } => {
            println!("Running quick test:");
            println!("  URL: {}", url);
            println!("  Concurrency: {}", concurrency);
            println!("  Iterations/client: {}", iterations);
            println!();

            let mut config = review_load_test::TestConfig::quick(url);
            config.concurrency = concurrency;
            config.iterations_per_client = iterations;
            config.validate()?;

            execute(config, "table").await
        }
        Commands::List { dir } => {
            println!("Available scenarios in {}:", dir.display());
            println!();

            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    eprintln!("Error reading directory: {}", e);
                    eprintln!("Make sure the directory exists and is readable");
                    return Ok(());
                }
            };

            let mut scenarios = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|s| s.to_str()) != Some("yaml") {
                    continue;
                }
                match review_load_test::TestConfig::from_file(&path) {
                    Ok(config) => {
                        let file = path
                            .file_name()
                            .map(|f| f.to_string_lossy().to_string())
                            .unwrap_or_default();
                        scenarios.push((file, config.name, config.description));
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable scenario"),
                }
            }

            scenarios.sort_by(|a, b| a.0.cmp(&b.0));

            if scenarios.is_empty() {
                println!("No scenario files found");
            } else {
                for (filename, name, desc) in scenarios {
                    println!("  {} - {}", filename, name);
                    println!("    {}", desc);
                    println!();
                }
            }
            Ok(())
        }
        Commands::Show { scenario } => {
            let config = review_load_test::TestConfig::from_file(&scenario)?;
            config.validate()?;
            let workflow = config.workflow()?;

            println!("Workflow: {} ({} steps)", workflow.name(), workflow.len());
            for seed in workflow.seeds() {
                println!("  seed {} <- {}-N", seed.key, seed.prefix);
            }
            for (i, step) in workflow.steps().iter().enumerate() {
                let requires: Vec<_> = step.required_keys().unwrap_or_default().into_iter().collect();
                let provides: Vec<_> = step.provided_keys().collect();
                println!(
                    "  {}. {} {} {}",
                    i + 1,
                    step.name,
                    step.request.method,
                    step.request.path
                );
                println!("     expect:   {:?}", step.expect);
                println!("     requires: [{}]", requires.join(", "));
                println!("     provides: [{}]", provides.join(", "));
            }
            Ok(())
        }
    }
}
