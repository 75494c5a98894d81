use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use pgmodel::{DbModel, ParseMode, ParseOptions, document, validator};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pgmodel")]
#[command(author, version, about = "Convert between PostgreSQL DDL and relational model documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log parser decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct Input {
    /// SQL script, or a .pgjson model document
    input: PathBuf,

    /// Reject statements and table items outside the supported grammar
    #[arg(long)]
    strict: bool,

    /// Do not treat columns named `id` as primary keys
    #[arg(long)]
    no_implicit_id: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print canonical SQL for a script or model document
    Generate {
        #[command(flatten)]
        input: Input,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse a SQL script into a model document
    Parse {
        #[command(flatten)]
        input: Input,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List model issues; exits non-zero when any is an error
    Check {
        #[command(flatten)]
        input: Input,
    },
}

impl Input {
    fn options(&self) -> ParseOptions {
        ParseOptions {
            mode: if self.strict {
                ParseMode::Strict
            } else {
                ParseMode::Lenient
            },
            infer_id_primary_key: !self.no_implicit_id,
        }
    }

    fn is_document(&self) -> bool {
        matches!(
            self.input.extension().and_then(|e| e.to_str()),
            Some(document::EXTENSION) | Some("json")
        )
    }

    fn load(&self) -> Result<DbModel> {
        if self.is_document() {
            return document::load(&self.input)
                .with_context(|| format!("Failed to load {}", self.input.display()));
        }
        let sql = fs::read_to_string(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let model = pgmodel::parse_with(&sql, &self.options())
            .with_context(|| format!("Failed to parse {}", self.input.display()))?;
        debug!(tables = model.tables.len(), types = model.types.len(), "parsed");
        Ok(model)
    }
}

fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn check(input: &Input) -> Result<()> {
    let issues = if input.is_document() {
        let text = fs::read_to_string(&input.input)
            .with_context(|| format!("Failed to read {}", input.input.display()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", input.input.display()))?;
        validator::validate_document(&value)
    } else {
        pgmodel::validate(&input.load()?)
    };

    for issue in &issues {
        println!("{}", issue);
    }
    let errors = issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        bail!("{} error(s), {} warning(s)", errors, issues.len() - errors);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate { input, output } => {
            let model = input.load()?;
            emit(&pgmodel::generate(&model), output.as_deref())?;
        }
        Commands::Parse { input, output } => {
            let model = input.load()?;
            emit(&document::to_json(&model)?, output.as_deref())?;
        }
        Commands::Check { input } => check(&input)?,
    }

    Ok(())
}
