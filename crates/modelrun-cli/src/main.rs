use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use modelrun_core::{Config, Diagnostic, RunReport, RunStatus, Severity};
use modelrun_jinja::{CompiledModel, ModelCompiler};
use modelrun_project::{BuildPlan, Project};
use modelrun_runner::{failure_diagnostics, run_checks, CheckOutcome, Executor, RunReporter};
use modelrun_sql::SqlParser;
use modelrun_warehouse::Engine;

mod scaffold;

/// modelrun - build SQL models into DuckDB in dependency order
#[derive(Parser)]
#[command(name = "modelrun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Path to config file (default: <project-dir>/modelrun.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database to build into, overriding [target].path
    #[arg(long, global = true, env = "MODELRUN_TARGET")]
    target: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Materialize all models, or one model and its ancestors
    Build {
        model: Option<String>,
    },

    /// Render models to target/compiled without executing them
    Compile {
        model: Option<String>,
    },

    /// Show the build order
    Plan {
        model: Option<String>,

        /// Also list the models that depend on MODEL
        #[arg(long, requires = "model")]
        downstream: bool,
    },

    /// Run the [[checks]] validation queries against the target
    Check,

    /// Create a starter project
    Init {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Init { dir } = &cli.command {
        return init_command(dir);
    }

    let mut config = Config::load(&cli.project_dir, cli.config.as_deref())
        .context("Failed to load project config")?;
    if let Some(target) = &cli.target {
        config.target.path = target.clone();
    }

    if cli.verbose {
        eprintln!("{} {}", "Project:".cyan(), config.project_root.display());
    }

    let success = match cli.command {
        Commands::Build { model } => {
            build_command(config, model.as_deref(), cli.verbose, open_engine).await?
        }
        Commands::Compile { model } => compile_command(config, model.as_deref(), cli.verbose)?,
        Commands::Plan { model, downstream } => plan_command(config, model.as_deref(), downstream)?,
        Commands::Check => check_command(&config).await?,
        Commands::Init { .. } => unreachable!("handled before config loading"),
    };

    if !success {
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Static phase: discovery, resolution and cycle detection
///
/// Prints the diagnostic and returns `None` when the project is invalid.
fn load_project(config: Config) -> Option<Project> {
    match Project::load(config) {
        Ok(project) => Some(project),
        Err(e) => {
            print_diagnostics(&[e.to_diagnostic()]);
            None
        }
    }
}

fn compile(project: &Project, plan: &BuildPlan) -> Option<Vec<CompiledModel>> {
    match ModelCompiler::new(&project.config).compile_plan(project, plan) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            print_diagnostics(&[e.to_diagnostic()]);
            None
        }
    }
}

/// Build command - compile then materialize in plan order
///
/// The engine is opened only after static validation and compilation
/// succeeded, so an invalid project never touches the target.
async fn build_command<F>(config: Config, model: Option<&str>, verbose: bool, open: F) -> Result<bool>
where
    F: FnOnce(&Config) -> Result<Box<dyn Engine>>,
{
    let Some(project) = load_project(config) else {
        return Ok(false);
    };

    let plan = match project.build_plan(model) {
        Ok(plan) => plan,
        Err(e) => {
            print_diagnostics(&[e.to_diagnostic()]);
            return Ok(false);
        }
    };

    let Some(compiled) = compile(&project, &plan) else {
        return Ok(false);
    };

    if verbose {
        eprintln!("{} {} models", "Building".cyan(), plan.len());
    }

    let engine = open(&project.config)?;
    let report = Executor::new(engine.as_ref()).run(&compiled).await?;

    let path = RunReporter::write(&report, &project.config.target_dir())?;
    print_run_summary(&report);

    let failures = failure_diagnostics(&report, &compiled);
    if !failures.is_empty() {
        print_diagnostics(&failures);
    }

    if verbose {
        eprintln!("{} {}", "Run results saved to:".green(), path.display());
    }

    Ok(report.is_success())
}

/// Compile command - write rendered SQL and report parse warnings
fn compile_command(config: Config, model: Option<&str>, verbose: bool) -> Result<bool> {
    let Some(project) = load_project(config) else {
        return Ok(false);
    };

    let plan = match project.build_plan(model) {
        Ok(plan) => plan,
        Err(e) => {
            print_diagnostics(&[e.to_diagnostic()]);
            return Ok(false);
        }
    };

    let Some(compiled) = compile(&project, &plan) else {
        return Ok(false);
    };

    let out_dir = project.config.target_dir().join("compiled");
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let parser = SqlParser::new();
    let mut diagnostics = Vec::new();

    for model in &compiled {
        let path = out_dir.join(format!("{}.sql", model.name));
        std::fs::write(&path, format!("{}\n", model.sql))
            .with_context(|| format!("Failed to write {}", path.display()))?;

        diagnostics.extend(parser.check_model_body(&model.name, &model.sql, Some(model.path.as_path())));

        if verbose {
            eprintln!("  {} {} -> {}", "Compiled".cyan(), model.name, path.display());
        }
    }

    println!("{} {} models to {}", "Compiled".green().bold(), compiled.len(), out_dir.display());
    if !diagnostics.is_empty() {
        print_diagnostics(&diagnostics);
    }

    // Parse problems are warnings; DuckDB has the final word
    Ok(!diagnostics.iter().any(|d| d.is_error()))
}

/// Plan command - print the build order
fn plan_command(config: Config, model: Option<&str>, downstream: bool) -> Result<bool> {
    let Some(project) = load_project(config) else {
        return Ok(false);
    };

    let plan = match project.build_plan(model) {
        Ok(plan) => plan,
        Err(e) => {
            print_diagnostics(&[e.to_diagnostic()]);
            return Ok(false);
        }
    };

    println!("{}", "Build plan:".bold());
    for (i, name) in plan.iter().enumerate() {
        let model = project.model(name)?;
        let relation = project.relation_of(name)?;
        println!(
            "  {}. {} ({}) -> {}",
            i + 1,
            name.green(),
            model.config.materialized,
            relation
        );
    }

    if let (true, Some(model)) = (downstream, model) {
        let affected = project.graph.downstream(model);
        println!();
        if affected.is_empty() {
            println!("{}", "✓ No downstream models".green());
        } else {
            println!("{} {}", "Downstream of".bold(), model.yellow());
            // Downstream models in global build order
            let full = project.build_plan(None)?;
            for name in full.iter().filter(|n| affected.contains(*n)) {
                println!("  - {}", name.yellow());
            }
        }
    }

    Ok(true)
}

/// Check command - run validation queries
async fn check_command(config: &Config) -> Result<bool> {
    if config.checks.is_empty() {
        println!("{}", "No [[checks]] configured".yellow());
        return Ok(true);
    }

    let engine = open_engine(config)?;
    let outcomes = run_checks(engine.as_ref(), &config.checks).await;
    print_check_summary(&outcomes);

    Ok(outcomes.iter().all(CheckOutcome::passed))
}

/// Init command - scaffold a starter project
fn init_command(dir: &Path) -> Result<()> {
    let created = scaffold::init_project(dir)?;

    println!("{} {}", "Initialized project in".green().bold(), dir.display());
    for path in created {
        println!("  + {}", path.display());
    }
    println!();
    println!("Next: {} then {}", "modelrun build".cyan(), "modelrun check".cyan());

    Ok(())
}

/// Target string with relative file paths anchored at the project root
fn target_location(config: &Config) -> String {
    let target = config.target.path.as_str();
    if target == ":memory:" || target.starts_with("md:") || Path::new(target).is_absolute() {
        return target.to_string();
    }
    config.project_root.join(target).display().to_string()
}

#[cfg(feature = "duckdb")]
fn open_engine(config: &Config) -> Result<Box<dyn Engine>> {
    let location = target_location(config);
    let engine = modelrun_warehouse::DuckDbEngine::open(&location)
        .with_context(|| format!("Failed to open target database '{}'", config.target.path))?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "duckdb"))]
fn open_engine(config: &Config) -> Result<Box<dyn Engine>> {
    anyhow::bail!(
        "modelrun was built without DuckDB support; cannot open '{}'",
        target_location(config)
    )
}

fn print_run_summary(report: &RunReport) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Run Results".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    for result in &report.results {
        match result.status {
            RunStatus::Success => println!(
                "  {} {} ({}) -> {} [{}ms]",
                "✓".green(),
                result.model,
                result.materialization,
                result.relation,
                (result.duration_secs * 1000.0).round()
            ),
            RunStatus::Error => {
                println!("  {} {} ({})", "✗".red(), result.model.red(), result.materialization);
                if let Some(error) = &result.error {
                    println!("    {}", error);
                }
            }
            RunStatus::Skipped => println!("  {} {} (skipped)", "-".dimmed(), result.model.dimmed()),
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  Success: {}", report.summary.success.to_string().green());
    if report.summary.error > 0 {
        println!("  Error:   {}", report.summary.error.to_string().red().bold());
    } else {
        println!("  Error:   {}", report.summary.error.to_string().green());
    }
    if report.summary.skipped > 0 {
        println!("  Skipped: {}", report.summary.skipped.to_string().yellow());
    } else {
        println!("  Skipped: {}", report.summary.skipped);
    }
    println!("  Elapsed: {:.2}s", report.elapsed_secs);

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

fn print_check_summary(outcomes: &[CheckOutcome]) {
    println!("{}", "Checks:".bold());
    for outcome in outcomes {
        if outcome.passed() {
            println!("  {} {}", "✓".green(), outcome.name);
        } else {
            println!("  {} {}", "✗".red(), outcome.name.red());
        }
    }

    let failures: Vec<Diagnostic> = outcomes.iter().filter_map(CheckOutcome::to_diagnostic).collect();
    if failures.is_empty() {
        println!("\n{}", "✓ All checks passed!".green().bold());
    } else {
        println!();
        print_diagnostics(&failures);
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        tracing::debug!(diagnostic = %diag, "reporting diagnostic");

        let severity_str = match diag.severity {
            Severity::Error => "ERROR".red().bold(),
            Severity::Warn => "WARN".yellow().bold(),
            Severity::Info => "INFO".cyan(),
        };

        eprintln!("  [{}] {}: {}", severity_str, diag.code, diag.message);

        if let Some(loc) = &diag.location {
            eprintln!("    at {}", loc);
        }

        if let Some(exp) = &diag.expected {
            eprintln!("    Expected: {}", exp);
        }
        if let Some(act) = &diag.actual {
            eprintln!("    Actual:   {}", act);
        }

        if !diag.impact.is_empty() {
            eprintln!("    Models: {}", diag.impact.join(", "));
        }
    }
}
