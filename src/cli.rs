use crate::builder::ScoringSpecBuilder;
use crate::config::types::{memory_limit_from_mb, ScoreboxError, ValidatorConfig};
use crate::contract::{ProcessValidator, ScoringCodeValidator};
use crate::runtime::runtime_for;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Probe limits shared by every command that validates code.
#[derive(Args, Clone, Debug)]
struct ProbeArgs {
    /// Probe runtime language
    #[arg(long, default_value = "python")]
    language: String,
    /// Python interpreter used for the probe
    #[arg(long)]
    python: Option<PathBuf>,
    /// Wall clock limit in milliseconds
    #[arg(long)]
    wall_time_ms: Option<u64>,
    /// Address space limit in MB (0 disables the limit)
    #[arg(long)]
    memory_mb: Option<u64>,
    /// Start the worker from the caller's environment instead of an empty one
    #[arg(long)]
    inherit_env: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a scoring function against the contract
    CheckCode {
        /// File holding the code, or '-' for stdin
        file: PathBuf,
        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        probe: ProbeArgs,
    },
    /// Print the dimension tree of a scoring spec
    Tree {
        /// Scoring spec JSON file
        spec: PathBuf,
        #[command(flatten)]
        probe: ProbeArgs,
    },
    /// Hydrate a scoring spec and print its canonical wire form
    Build {
        /// Scoring spec JSON file
        spec: PathBuf,
        #[command(flatten)]
        probe: ProbeArgs,
    },
    /// Check that the probe runtime is installed and working
    CheckDeps {
        /// Verbose output showing the resolved interpreter and limits
        #[arg(long)]
        verbose: bool,
        #[command(flatten)]
        probe: ProbeArgs,
    },
}

const KNOWN_GOOD_SCORER: &str = "def score(response_text, input_text, **kwargs):\n    return {'score': 1.0, 'explanation': 'ok'}\n";

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::CheckCode { file, json, probe } => check_code(&file, json, &probe),
        Commands::Tree { spec, probe } => {
            let builder = load_spec(&spec, &probe)?;
            builder.print_tree_stdout()?;
            Ok(())
        }
        Commands::Build { spec, probe } => {
            let builder = load_spec(&spec, &probe)?;
            println!("{}", builder.build().to_json_pretty()?);
            Ok(())
        }
        Commands::CheckDeps { verbose, probe } => check_dependencies(verbose, &probe),
    }
}

fn validator_from_args(probe: &ProbeArgs) -> Result<ProcessValidator> {
    let mut config = ValidatorConfig::from_env()?;
    if let Some(python) = &probe.python {
        config.python_executable = python.clone();
    }
    if let Some(ms) = probe.wall_time_ms {
        config.wall_time_limit = Duration::from_millis(ms);
    }
    if let Some(mb) = probe.memory_mb {
        config.memory_limit = memory_limit_from_mb(mb, "--memory-mb")?;
    }
    if probe.inherit_env {
        config.env_policy.inherit_host = true;
    }
    Ok(ProcessValidator::with_runtime(
        config,
        runtime_for(&probe.language)?,
    )?)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut code = String::new();
        std::io::stdin()
            .read_to_string(&mut code)
            .context("reading code from stdin")?;
        return Ok(code);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_spec(path: &Path, probe: &ProbeArgs) -> Result<ScoringSpecBuilder> {
    let validator = validator_from_args(probe)?;
    let text = read_input(path)?;
    ScoringSpecBuilder::from_json(&text, &validator)
        .with_context(|| format!("loading scoring spec {}", path.display()))
}

fn check_code(file: &Path, json: bool, probe: &ProbeArgs) -> Result<()> {
    let validator = validator_from_args(probe)?;
    let code = read_input(file)?;

    let violation = match validator.validate(&code) {
        Ok(()) => None,
        Err(ScoreboxError::Contract(violation)) => Some(violation),
        Err(e) => return Err(anyhow::anyhow!("validation could not run: {}", e)),
    };

    if json {
        let report = match &violation {
            None => serde_json::json!({"accepted": true}),
            Some(v) => serde_json::json!({
                "accepted": false,
                "kind": v.kind(),
                "message": v.to_string(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &violation {
            None => println!("✅ {} satisfies the scoring contract", file.display()),
            Some(v) => println!("❌ {}: {}", file.display(), v),
        }
    }

    if violation.is_some() {
        std::process::exit(1);
    }
    Ok(())
}

fn check_dependencies(verbose: bool, probe: &ProbeArgs) -> Result<()> {
    println!("🔍 Checking probe runtime...");

    let validator = match validator_from_args(probe) {
        Ok(validator) => validator,
        Err(e) => {
            println!("❌ Python - MISSING ({})", e);
            std::process::exit(1);
        }
    };

    if verbose {
        let config = validator.config();
        println!("  interpreter -> {}", validator.executable().display());
        println!("  wall time   -> {:?}", config.wall_time_limit);
        match config.memory_limit {
            Some(bytes) => println!("  memory      -> {} MB", bytes / (1024 * 1024)),
            None => println!("  memory      -> unlimited"),
        }
    }

    match validator.validate(KNOWN_GOOD_SCORER) {
        Ok(()) => {
            println!("✅ Python - OK");
            Ok(())
        }
        Err(e) => {
            println!("❌ Python - probe failed: {}", e);
            std::process::exit(1);
        }
    }
}
