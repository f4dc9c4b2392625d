//! Bulk import of JSON-lines uploads through the private channel

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde_json::{json, Value};

use crate::commands::project::resolve;
use crate::output::{to_json, OutputFormat};
use crate::{AppContext, Cli};
use fieldbook_ingest::{IngestConfig, IngestPipeline, UploadCode, UploadContext};

#[derive(Args)]
pub struct ImportArgs {
    /// Target project name or id
    pub project: String,

    /// Input file, one upload payload per line (bare or under `data`)
    pub file: PathBuf,

    /// Do not pause between uploads
    #[arg(long)]
    pub no_throttle: bool,
}

#[derive(Debug, Default)]
struct Tally {
    created: usize,
    updated: usize,
    rejected: Vec<(usize, String, String)>,
}

/// Accept both the HTTP envelope and bare payloads
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

pub async fn run(args: &ImportArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::info!("Importing from {:?}", args.file);

    let project = resolve(ctx, &args.project).await?;
    let content = std::fs::read_to_string(&args.file).with_context(|| format!("reading {}", args.file.display()))?;

    let config = if args.no_throttle {
        IngestConfig::without_throttle()
    } else {
        ctx.config.ingest()
    };
    let pipeline = IngestPipeline::new(ctx.storage.clone(), config);
    let upload_ctx = UploadContext::private_import();

    let mut tally = Tally::default();
    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let payload = match serde_json::from_str::<Value>(line) {
            Ok(value) => unwrap_envelope(value),
            Err(e) => {
                tracing::debug!("line {}: {}", line_no, e);
                tally.rejected.push((line_no, "upload".into(), "payload_invalid".into()));
                continue;
            }
        };

        match pipeline.ingest(&project.id, payload, &upload_ctx).await {
            Ok(outcome) => match outcome.code {
                UploadCode::EntryCreated => tally.created += 1,
                UploadCode::EntryUpdated => tally.updated += 1,
            },
            Err(rejection) => {
                let error = rejection.0;
                tally.rejected.push((line_no, error.source, error.code.to_string()));
            }
        }
    }

    tracing::info!(
        "Imported into {}: {} created, {} updated, {} rejected",
        project.name,
        tally.created,
        tally.updated,
        tally.rejected.len()
    );

    if cli.output() == OutputFormat::Json {
        let rejected: Vec<Value> = tally
            .rejected
            .iter()
            .map(|(line, source, code)| json!({"line": line, "source": source, "code": code}))
            .collect();
        println!(
            "{}",
            to_json(&json!({
                "created": tally.created,
                "updated": tally.updated,
                "rejected": rejected,
            }))
        );
    } else if !cli.quiet {
        println!(
            "Imported into '{}': {} created, {} updated, {} rejected",
            project.name,
            tally.created,
            tally.updated,
            tally.rejected.len()
        );
        for (line, source, code) in &tally.rejected {
            println!("  line {}: {}: {}", line, source, code);
        }
    }

    Ok(())
}
