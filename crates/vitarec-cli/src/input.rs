//! Request input from the command line: `--field name=value` pairs and JSON files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use vitarec_core::RawInput;

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Field value; repeat a name to build a multi-select.
    #[arg(long = "field", short = 'f', value_name = "NAME=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,

    /// JSON file holding one request object or an array of them.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputFile {
    One(RawInput),
    Many(Vec<RawInput>),
}

/// Parse a `name=value` pair. The value may be empty or contain `=`.
pub fn parse_field(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in {s:?}"));
    }
    Ok((name.to_string(), value.to_string()))
}

impl InputArgs {
    /// The requests to run. `--field` values override the same fields in
    /// every request read from `--input`.
    pub async fn requests(&self) -> anyhow::Result<Vec<RawInput>> {
        let overrides = RawInput::from_pairs(self.fields.iter().cloned());
        let Some(path) = &self.input else {
            return Ok(vec![overrides]);
        };

        let mut requests = read_requests(path).await?;
        for request in &mut requests {
            for (name, value) in overrides.iter() {
                request.insert(name, value.clone());
            }
        }
        Ok(requests)
    }
}

async fn read_requests(path: &Path) -> anyhow::Result<Vec<RawInput>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file: InputFile = serde_json::from_str(&json)
        .with_context(|| format!("{} is not a JSON object or array of objects", path.display()))?;
    Ok(match file {
        InputFile::One(request) => vec![request],
        InputFile::Many(requests) => requests,
    })
}
