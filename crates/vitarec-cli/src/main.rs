mod display;
mod input;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};
use vitarec_ai::{LoadOptions, Recommender};
use vitarec_core::{FeatureEncoder, FeatureSchema, vitamin};

use crate::input::InputArgs;

#[derive(Parser)]
#[command(name = "vitarec", version, about = "Vitamin recommendations from a pre-trained model")]
struct Cli {
    /// Model artifact directory (manifest.json, model file, optional schema.json).
    #[arg(long, env = "VITAREC_MODEL_DIR", default_value = "model", global = true)]
    model_dir: PathBuf,

    /// Attempts at loading the model before running without it.
    #[arg(long, env = "VITAREC_LOAD_ATTEMPTS", default_value_t = 3, global = true)]
    load_attempts: u32,

    /// Delay between load attempts, in milliseconds.
    #[arg(long, env = "VITAREC_RETRY_DELAY_MS", default_value_t = 500, global = true)]
    retry_delay_ms: u64,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show input fields and the encoded feature columns.
    Schema {
        /// Schema JSON file; the built-in vitamin schema when omitted.
        #[arg(long, env = "VITAREC_SCHEMA")]
        schema: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Encode requests into feature records without running a model.
    Encode {
        #[arg(long, env = "VITAREC_SCHEMA")]
        schema: Option<PathBuf>,
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        json: bool,
    },
    /// Recommend a vitamin for each request.
    Predict {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        json: bool,
    },
    /// Report whether the model artifact loads.
    Health {
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            attempts: self.load_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    info!("vitarec v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Schema { schema, json } => cmd_schema(schema.as_deref(), *json),
        Command::Encode {
            schema,
            input,
            json,
        } => cmd_encode(schema.as_deref(), input, *json).await,
        Command::Predict { input, json } => {
            let recommender = Recommender::start(&cli.model_dir, cli.load_options()).await;
            exit_code(cmd_predict(&recommender, input, *json).await?)
        }
        Command::Health { json } => {
            let recommender = Recommender::start(&cli.model_dir, cli.load_options()).await;
            exit_code(cmd_health(&recommender, *json)?)
        }
    }
}

fn exit_code(ok: bool) -> anyhow::Result<ExitCode> {
    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_schema(path: Option<&Path>) -> anyhow::Result<FeatureSchema> {
    match path {
        Some(path) => {
            FeatureSchema::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(vitamin::schema()),
    }
}

fn cmd_schema(path: Option<&Path>, as_json: bool) -> anyhow::Result<ExitCode> {
    let schema = load_schema(path)?;
    if as_json {
        let out = json!({
            "fields": schema.fields(),
            "feature_names": schema.feature_names(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        display::print_schema(&schema);
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_encode(
    path: Option<&Path>,
    input: &InputArgs,
    as_json: bool,
) -> anyhow::Result<ExitCode> {
    let schema = load_schema(path)?;
    let encoder = FeatureEncoder::one_hot(Arc::new(schema))
        .context("ordinal fields need the category encoders of a model artifact")?;

    let mut records = Vec::new();
    for request in input.requests().await? {
        let record = encoder.encode(&request)?;
        if as_json {
            records.push(json!({
                "feature_names": record.feature_names(),
                "values": record.values(),
            }));
        } else {
            display::print_record(&record);
            println!();
        }
    }
    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    }
    Ok(ExitCode::SUCCESS)
}

/// Returns false when any request failed.
async fn cmd_predict(
    recommender: &Recommender,
    input: &InputArgs,
    as_json: bool,
) -> anyhow::Result<bool> {
    let mut failed = 0usize;
    let mut outputs = Vec::new();

    for request in input.requests().await? {
        match recommender.recommend(&request) {
            Ok(result) => {
                if as_json {
                    outputs.push(serde_json::to_value(&result)?);
                } else {
                    display::print_prediction(&result);
                }
            }
            Err(e) => {
                failed += 1;
                error!(kind = ?e.kind(), error = %e, "prediction failed");
                if as_json {
                    outputs.push(json!({
                        "error": { "kind": e.kind(), "message": e.user_message() },
                        "input": request,
                    }));
                } else {
                    eprintln!("error: {}", e.user_message());
                }
            }
        }
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }
    Ok(failed == 0)
}

/// Returns false when the model is not loaded.
fn cmd_health(recommender: &Recommender, as_json: bool) -> anyhow::Result<bool> {
    let health = recommender.health();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&health)?);
    } else {
        display::print_health(&health);
    }
    Ok(health.is_ready())
}
