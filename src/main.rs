//! CLI for running mutant plans against the bundled demo

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use mutation_harness::{demo, Config, Driver, MutationReport, Registry, Scope};

#[derive(Parser)]
#[command(name = "mutation-harness")]
#[command(author, version, about = "Runtime mutation testing with hand-authored mutants", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mutants listed in a run plan
    Run {
        /// Path to the run plan
        #[arg(short, long, default_value = "mutants.yaml")]
        config: PathBuf,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List declared mutants
    List {
        /// Only list mutants effective in this scope
        #[arg(short, long)]
        scope: Option<String>,
    },

    /// Show example run plan
    Example,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Yaml,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    init_logging(verbose);

    let registry = match demo::catalogue() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::Run { config, format, .. } => run_plan(&registry, &config, format),

        Commands::List { scope } => {
            list_mutants(&registry, scope);
            ExitCode::SUCCESS
        }

        Commands::Example => {
            print_example();
            ExitCode::SUCCESS
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_plan(registry: &Registry, config_path: &Path, format: Format) -> ExitCode {
    println!("{}", "Loading run plan...".dimmed());
    let config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return ExitCode::from(2);
        }
    };

    println!("Found {} run(s) in plan", config.runs.len());

    if let Err(errors) = config.validate(registry) {
        eprintln!("{}", "Configuration errors found:".red().bold());
        for error in &errors {
            eprintln!("  • {}", error);
        }
        return ExitCode::from(2);
    }

    println!("{}", "Plan valid. Running mutants...".green());

    let driver = Driver::new(registry).with_settings(config.settings.run_settings());
    let mut report = MutationReport::new(Vec::new()).with_timeout(driver.settings().timeout);

    for run in &config.runs {
        println!("{} {}", "Running".dimmed(), run.description());
        match driver.run_scopes(demo::suite, &run.scope, &run.mutants) {
            Ok(verdicts) => report.extend(MutationReport::new(verdicts)),
            Err(e) => {
                eprintln!("{}: {}", "Error".red().bold(), e);
                return ExitCode::from(2);
            }
        }
    }

    match format {
        Format::Text => report.print(),
        Format::Yaml => match report.to_yaml() {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => {
                eprintln!("{}: {}", "Error".red().bold(), e);
                return ExitCode::from(2);
            }
        },
    }

    // Return appropriate exit code
    if report.into_result().is_err() {
        ExitCode::from(1) // Some mutants were not killed
    } else {
        ExitCode::SUCCESS
    }
}

fn list_mutants(registry: &Registry, scope: Option<String>) {
    let scopes: Vec<Scope> = match scope {
        Some(scope) => vec![Scope::named(scope)],
        None => registry.scopes().cloned().collect(),
    };

    for scope in scopes {
        println!("{}", scope.to_string().bold());
        for mutant in registry.resolve(scope) {
            let overrides: Vec<_> = mutant.overridden_functions().collect();
            let overrides = if overrides.is_empty() {
                String::new()
            } else {
                format!(" (overrides {})", overrides.join(", "))
            };
            println!(
                "  {} {}{}",
                mutant.name(),
                mutant.description().dimmed(),
                overrides.dimmed()
            );
        }
    }
}

fn print_example() {
    let example = r#"# Example mutants.yaml run plan
version: "1.0"

settings:
  timeout: 30  # seconds per suite run, omit for no limit
  jobs: 2      # worker threads

runs:
  # Specific mutants of one scope
  - scope: demo.rs
    mutants: [FLIP_LT, SKIP_BLOCK, DUP_LEFT, INC_OBO]

  # Every mutant of a scope (NO_MUTATION survives by design)
  - scope: demo.rs

  # A list of scopes; "**all**" selects only universal mutants
  - scope: [demo.rs]
    mutants: [NO_MUTATION]
"#;

    println!("{}", example);
}
