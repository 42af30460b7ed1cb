//! Stepsheet CLI - replayable dataframe steps with generated pandas code

mod config;
mod errors;
mod files;

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stepsheet::{
    Analysis, Frame, MergePolicy, Params, ParamsExt, Pipeline, PipelineError, Registry, State,
    detect_format, sanitize_df_name,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stepsheet")]
#[command(about = "Replayable dataframe steps with generated pandas code", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file (default: ~/.config/stepsheet/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available steps
    List,

    /// Apply a saved analysis to input data
    Run {
        /// Analysis file (YAML, TOML, or JSON)
        analysis: PathBuf,
        /// Input CSV as NAME=PATH (or just PATH to name it after the file)
        #[arg(short, long = "data", value_name = "NAME=PATH")]
        data: Vec<String>,
        /// Write resulting dataframes and the generated script here
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Keep one code chunk per step
        #[arg(long)]
        no_merge: bool,
    },

    /// Print the pandas script for a saved analysis
    Code {
        /// Analysis file (YAML, TOML, or JSON)
        analysis: PathBuf,
        /// Input CSV as NAME=PATH (or just PATH to name it after the file)
        #[arg(short, long = "data", value_name = "NAME=PATH")]
        data: Vec<String>,
        /// Keep one code chunk per step
        #[arg(long)]
        no_merge: bool,
    },

    /// Run pandas-style code as an AI transformation step
    Exec {
        /// Code to run, or @FILE to read it from a file
        code: String,
        /// Input CSV as NAME=PATH (or just PATH to name it after the file)
        #[arg(short, long = "data", value_name = "NAME=PATH")]
        data: Vec<String>,
        /// Description recorded with the step
        #[arg(long, default_value = "exec")]
        prompt: String,
        /// Save the step as an analysis file
        #[arg(long)]
        save: Option<PathBuf>,
        /// Write resulting dataframes here
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// List a directory as JSON
    Files {
        /// Directory to list
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate man page
    Manpage,
}

/// Output verbosity level.
#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    /// Log level used when `RUST_LOG` is not set.
    fn log_level(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "debug",
        }
    }

    fn info(self, msg: &str) {
        if !matches!(self, Verbosity::Quiet) {
            println!("{msg}");
        }
    }
}

fn init_tracing(v: Verbosity) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(v.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config file
    let config = match cli.config {
        Some(ref path) => Config::load_from_path(Some(path.clone())),
        None => Config::load(),
    };

    // Apply config defaults, CLI flags override
    let verbose = cli.verbose || config.defaults.verbose;
    let quiet = cli.quiet || config.defaults.quiet;
    let verbosity = Verbosity::from_flags(verbose, quiet);
    init_tracing(verbosity);

    let registry = Arc::new(stepsheet_steps::default_registry()?);

    match cli.command {
        Commands::List => cmd_list(&registry, verbosity),
        Commands::Run {
            analysis,
            data,
            out_dir,
            no_merge,
        } => cmd_run(
            registry,
            &analysis,
            &data,
            out_dir.as_deref(),
            config.merge_policy(no_merge),
            verbosity,
        ),
        Commands::Code {
            analysis,
            data,
            no_merge,
        } => cmd_code(registry, &analysis, &data, config.merge_policy(no_merge)),
        Commands::Exec {
            code,
            data,
            prompt,
            save,
            out_dir,
        } => cmd_exec(
            registry,
            &config,
            &code,
            &data,
            &prompt,
            save.as_deref(),
            out_dir.as_deref(),
            verbosity,
        ),
        Commands::Files { path } => cmd_files(&path),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "stepsheet", &mut std::io::stdout());
            Ok(())
        }
        Commands::Manpage => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            man.render(&mut std::io::stdout())?;
            Ok(())
        }
    }
}

fn cmd_list(registry: &Registry, v: Verbosity) -> Result<()> {
    v.info("Available steps:\n");
    for performer in registry.performers() {
        v.info(&format!(
            "  {} (v{})",
            performer.step_type(),
            performer.step_version()
        ));
    }
    v.info(&format!("\nTotal: {} steps", registry.len()));
    Ok(())
}

fn cmd_run(
    registry: Arc<Registry>,
    analysis_path: &Path,
    data: &[String],
    out_dir: Option<&Path>,
    merge_policy: MergePolicy,
    v: Verbosity,
) -> Result<()> {
    let analysis = load_analysis(analysis_path)?;
    let pipeline = build_pipeline(registry, &analysis, load_inputs(data)?, merge_policy)?;

    v.info(&format!(
        "Applied {} steps from '{}' ({} code chunks)",
        pipeline.len(),
        analysis.name,
        pipeline.chunks().len()
    ));
    print_state(pipeline.state(), v);

    if let Some(out_dir) = out_dir {
        write_frames(pipeline.state(), out_dir)?;
        let stem = analysis_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("analysis");
        let script_path = out_dir.join(format!("{stem}.py"));
        std::fs::write(&script_path, pipeline.script())
            .with_context(|| format!("Failed to write '{}'", script_path.display()))?;
        v.info(&format!("Wrote results to {}", out_dir.display()));
    }
    Ok(())
}

fn cmd_code(
    registry: Arc<Registry>,
    analysis_path: &Path,
    data: &[String],
    merge_policy: MergePolicy,
) -> Result<()> {
    let analysis = load_analysis(analysis_path)?;
    let pipeline = build_pipeline(registry, &analysis, load_inputs(data)?, merge_policy)?;
    print!("{}", pipeline.script());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_exec(
    registry: Arc<Registry>,
    config: &Config,
    code: &str,
    data: &[String],
    prompt: &str,
    save: Option<&Path>,
    out_dir: Option<&Path>,
    v: Verbosity,
) -> Result<()> {
    let code = match code.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read code file '{path}'"))?,
        None => code.to_string(),
    };

    let inputs = load_inputs(data)?;
    let mut pipeline =
        Pipeline::new(Arc::clone(&registry), inputs.state).with_input_sources(inputs.sources);
    let params = Params::new()
        .with("user_input", prompt)
        .with("edited_completion", code);
    let execution_data = pipeline
        .apply("ai_transformation", params)
        .map_err(|err| pipeline_error(err, &registry))?
        .execution_data
        .clone();

    let report = serde_json::json!({
        "execution_data": execution_data,
        "code": pipeline.script(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(save) = save {
        let format = detect_format(save)
            .map(str::to_string)
            .or_else(|| config.defaults.analysis_format.clone())
            .unwrap_or_else(|| "yaml".to_string());
        let name = save
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("analysis");
        let bytes = pipeline.to_analysis(name).to_bytes(&format)?;
        std::fs::write(save, bytes)
            .with_context(|| format!("Failed to write '{}'", save.display()))?;
        tracing::info!(path = %save.display(), format = %format, "saved analysis");
    }

    if let Some(out_dir) = out_dir {
        write_frames(pipeline.state(), out_dir)?;
        v.info(&format!("Wrote dataframes to {}", out_dir.display()));
    }
    Ok(())
}

fn cmd_files(path: &Path) -> Result<()> {
    let contents = files::path_contents(path);
    println!("{}", serde_json::to_string_pretty(&contents)?);
    Ok(())
}

/// Dataframes loaded from `--data`, with the file each was read from.
struct Inputs {
    state: State,
    sources: Vec<(String, String)>,
}

/// Build the initial state from `NAME=PATH` (or `PATH`) arguments.
fn load_inputs(data: &[String]) -> Result<Inputs> {
    let mut state = State::new();
    let mut sources = Vec::new();
    for arg in data {
        let (name, path) = match arg.split_once('=') {
            Some((name, path)) => (sanitize_df_name(name), path),
            None => {
                let stem = Path::new(arg)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(arg);
                (sanitize_df_name(stem), arg.as_str())
            }
        };
        if !Path::new(path).exists() {
            bail!(errors::file_not_found_error(path));
        }
        let frame =
            Frame::read_csv(path).with_context(|| format!("Failed to read CSV '{path}'"))?;
        let name = state.unique_name(&name);
        tracing::debug!(name = %name, path, rows = frame.num_rows(), "loaded dataframe");
        sources.push((name.clone(), path.to_string()));
        state.insert_frame(name, frame);
    }
    Ok(Inputs { state, sources })
}

fn load_analysis(path: &Path) -> Result<Analysis> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read analysis file '{}'", path.display()))?;
    Analysis::from_bytes(&data, Some(path))
        .with_context(|| format!("Failed to parse analysis '{}'", path.display()))
}

fn build_pipeline(
    registry: Arc<Registry>,
    analysis: &Analysis,
    inputs: Inputs,
    merge_policy: MergePolicy,
) -> Result<Pipeline> {
    Pipeline::from_analysis(Arc::clone(&registry), analysis, inputs.state, merge_policy)
        .map(|pipeline| pipeline.with_input_sources(inputs.sources))
        .map_err(|err| pipeline_error(err, &registry))
}

/// Attach a suggestion to unknown step types.
fn pipeline_error(err: PipelineError, registry: &Registry) -> anyhow::Error {
    match err {
        PipelineError::UnknownStepType(step_type) => {
            anyhow!(errors::unknown_step_error(&step_type, registry))
        }
        other => anyhow::Error::new(other),
    }
}

fn print_state(state: &State, v: Verbosity) {
    for (name, frame) in state.frames() {
        v.info(&format!(
            "  {}: {} rows x {} columns",
            name,
            frame.num_rows(),
            frame.num_columns()
        ));
    }
}

fn write_frames(state: &State, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create '{}'", out_dir.display()))?;
    for (name, frame) in state.frames() {
        let path = out_dir.join(format!("{name}.csv"));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        frame
            .write_csv(file)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
    }
    Ok(())
}
