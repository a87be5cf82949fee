use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use propsense_contracts::events::InvocationLog;
use propsense_contracts::models::ModelSelector;
use propsense_contracts::objects::ObjectRegistry;
use propsense_contracts::result::PipelineResult;
use propsense_engine::providers::build_oracle;
use propsense_engine::{parse_object_registry, OracleConfig, Pipeline};

#[derive(Debug, Parser)]
#[command(name = "propsense", version, about = "Prop-aware perception and grounding pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect tabletop objects in an image and print the validated registry.
    Perceive(PerceiveArgs),
    /// Ground a request against a saved registry and print the decision.
    Ground(GroundArgs),
    /// Full pipeline: image plus request in, action or clarification out.
    Run(RunArgs),
    /// List the known oracle models.
    Models,
}

#[derive(Debug, Parser)]
struct OracleArgs {
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct PerceiveArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: Option<PathBuf>,
    #[command(flatten)]
    oracle: OracleArgs,
}

#[derive(Debug, Parser)]
struct GroundArgs {
    /// Registry JSON as written by `perceive --out`.
    #[arg(long)]
    registry: PathBuf,
    #[arg(long)]
    query: String,
    #[command(flatten)]
    oracle: OracleArgs,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    query: String,
    /// On a clarification outcome, ask once on stdin and re-ground with the
    /// refined query against the same registry.
    #[arg(long)]
    follow_up: bool,
    #[command(flatten)]
    oracle: OracleArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("propsense error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Perceive(args) => run_perceive(args),
        Command::Ground(args) => run_ground(args),
        Command::Run(args) => run_run(args),
        Command::Models => run_models(),
    }
}

fn build_pipeline(args: &OracleArgs, capability: &str) -> Result<Pipeline> {
    let selection = ModelSelector::new(None)
        .select(Some(&args.model), capability)
        .map_err(anyhow::Error::msg)?;
    if let Some(reason) = &selection.fallback_reason {
        eprintln!("{reason}");
    }
    let config = OracleConfig::new(&selection.model.name)
        .with_timeout(Duration::from_secs(args.timeout_secs));
    let oracle = build_oracle(&selection.model.provider, config)?;
    let mut pipeline = Pipeline::new(oracle);
    if let Some(events) = &args.events {
        pipeline = pipeline.with_log(InvocationLog::new(events));
    }
    Ok(pipeline)
}

fn run_perceive(args: PerceiveArgs) -> Result<i32> {
    let image_bytes = fs::read(&args.image)
        .with_context(|| format!("failed reading image {}", args.image.display()))?;
    let pipeline = build_pipeline(&args.oracle, "vision")?;

    let registry = match pipeline.perceive(&image_bytes) {
        Ok(registry) => registry,
        Err(failure) => return print_result(&failure.into()),
    };
    for reason in registry.drop_reasons() {
        eprintln!("dropped: {reason}");
    }
    let rendered = serde_json::to_string_pretty(&registry)?;
    println!("{rendered}");
    if let Some(out) = &args.out {
        fs::write(out, rendered.as_bytes())
            .with_context(|| format!("failed writing registry to {}", out.display()))?;
    }
    Ok(0)
}

fn run_ground(args: GroundArgs) -> Result<i32> {
    let registry = match load_registry(&args.registry)? {
        Ok(registry) => registry,
        Err(result) => return print_result(&result),
    };
    let pipeline = build_pipeline(&args.oracle, "text")?;
    print_result(&pipeline.ground(&registry, &args.query))
}

fn run_run(args: RunArgs) -> Result<i32> {
    let image_bytes = fs::read(&args.image)
        .with_context(|| format!("failed reading image {}", args.image.display()))?;
    let pipeline = build_pipeline(&args.oracle, "vision")?;

    let registry = match pipeline.perceive(&image_bytes) {
        Ok(registry) => registry,
        Err(failure) => return print_result(&failure.into()),
    };
    let mut result = pipeline.ground(&registry, &args.query);

    // One bounded follow-up round; perception is not re-run.
    if args.follow_up {
        if let PipelineResult::Clarification { message } = &result {
            println!("{message}");
            print!("> ");
            io::stdout().flush()?;
            let mut answer = String::new();
            io::stdin().read_line(&mut answer)?;
            let answer = answer.trim();
            if !answer.is_empty() {
                let refined = format!("{}. {}", args.query.trim(), answer);
                result = pipeline.ground(&registry, &refined);
            }
        }
    }

    if let Some(spoken) = result.spoken_text() {
        eprintln!("robot says: {spoken}");
    }
    print_result(&result)
}

fn run_models() -> Result<i32> {
    let selector = ModelSelector::new(None);
    for model in selector.registry.list() {
        println!(
            "{}  provider={}  capabilities={}",
            model.name,
            model.provider,
            model.capabilities.join(",")
        );
    }
    Ok(0)
}

/// Re-validates a saved registry through the same parsing path perception
/// uses, so a hand-edited file cannot smuggle invalid objects in.
fn load_registry(path: &PathBuf) -> Result<Result<ObjectRegistry, PipelineResult>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed reading registry {}", path.display()))?;
    match parse_object_registry(&text) {
        Ok(registry) => {
            for reason in registry.drop_reasons() {
                eprintln!("dropped: {reason}");
            }
            Ok(Ok(registry))
        }
        Err(failure) => Ok(Err(failure.into())),
    }
}

fn print_result(result: &PipelineResult) -> Result<i32> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(if result.is_failure() { 1 } else { 0 })
}
