//! assess - one-shot threat assessment of a model output payload
//!
//! Reads the external vision model's detection payload (JSON) from a file or
//! stdin and prints the assessment record to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

use harbor_sentinel::transport::parse_model_payload;
use harbor_sentinel::{ClassificationTable, ThreatAssessor, DEFAULT_CONFIDENCE_THRESHOLD};

#[derive(Parser, Debug)]
#[command(author, version, about = "Assess vision-model detections for threats")]
struct Args {
    /// Path to the model output payload JSON. Reads stdin when omitted.
    #[arg(long, env = "SENTINEL_PAYLOAD")]
    input: Option<PathBuf>,

    /// Minimum detection confidence (0.0-1.0). A threshold carried in the
    /// payload itself applies to that call only and takes precedence.
    #[arg(long, env = "SENTINEL_CONFIDENCE_THRESHOLD", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence_threshold: f64,

    /// Pretty-print the assessment JSON.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let payload = match &args.input {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("reading payload from {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading payload from stdin")?;
            buf
        }
    };

    let batch = parse_model_payload(&payload)?;
    let assessor = ThreatAssessor::with_confidence_threshold(
        ClassificationTable::maritime_default(),
        args.confidence_threshold,
    )?;
    let assessment = assessor.assess(
        &batch.detections,
        batch.image_width,
        batch.image_height,
        batch.confidence_threshold,
    );

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&assessment)?
    } else {
        serde_json::to_string(&assessment)?
    };
    println!("{}", rendered);
    Ok(())
}
