//! demo - end-to-end synthetic run for the Harbor Threat Sentinel

use anyhow::Result;
use clap::Parser;

use harbor_sentinel::transport::parse_model_payload;
use harbor_sentinel::{ClassificationTable, ThreatAssessor};

const SYNTHETIC_PAYLOAD: &str = r#"{
    "image_width": 1920,
    "image_height": 1080,
    "detections": [
        {"class": "mayin", "confidence": 0.95, "bbox": [820.0, 540.0, 1010.0, 760.0]},
        {"class": "submarine", "confidence": 0.72, "bbox": [120.0, 200.0, 900.0, 560.0]},
        {"class": "divers", "confidence": 0.31, "bbox": [1500.0, 800.0, 1620.0, 1000.0]},
        {"class": "jellyfish", "confidence": 0.60, "bbox": [40.0, 40.0, 120.0, 140.0]},
        {"class": "auv-rov", "confidence": 0.05, "bbox": [300.0, 300.0, 420.0, 380.0]}
    ]
}"#;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Minimum detection confidence for the synthetic run.
    #[arg(long, default_value_t = 0.2)]
    confidence_threshold: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    stage("parse synthetic model payload");
    let batch = parse_model_payload(SYNTHETIC_PAYLOAD.as_bytes())?;

    stage("assess detections");
    let assessor = ThreatAssessor::with_confidence_threshold(
        ClassificationTable::maritime_default(),
        args.confidence_threshold,
    )?;
    let assessment = assessor.assess(
        &batch.detections,
        batch.image_width,
        batch.image_height,
        None,
    );

    println!("demo summary:");
    println!("  detections submitted: {}", batch.detections.len());
    println!("  threats reported: {}", assessment.threat_count);
    println!("  overall threat level: {}", assessment.overall_threat_level);
    println!(
        "  overall threat score: {:.2}",
        assessment.overall_threat_score
    );
    for threat in &assessment.threats {
        println!(
            "    {} [{}] conf={:.1}% size={:.1}%",
            threat.class_name,
            threat.threat_level,
            threat.confidence_percentage,
            threat.relative_size
        );
    }
    println!("next steps:");
    println!("  cargo run --bin sentineld");
    println!("  cargo run --bin assess -- --input payload.json --pretty");

    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
