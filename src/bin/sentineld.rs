//! sentineld - Harbor Threat Sentinel daemon
//!
//! This daemon:
//! 1. Loads configuration (JSON file + environment overrides)
//! 2. Builds the classification table and the threat assessor
//! 3. Serves the local assessment API (health, threshold, assess)
//! 4. Runs until interrupted, then shuts the API down cleanly

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use harbor_sentinel::api::{ApiConfig, ApiServer};
use harbor_sentinel::config::SentineldConfig;
use harbor_sentinel::ThreatAssessor;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = SentineldConfig::load()?;
    let table = cfg.classification_table()?;

    log::info!("sentineld starting");
    log::info!("  api addr: {}", cfg.api_addr);
    log::info!("  confidence threshold: {}", cfg.confidence_threshold);
    log::info!("  recognized classes: {}", table.len());

    let assessor = Arc::new(ThreatAssessor::with_confidence_threshold(
        table,
        cfg.confidence_threshold,
    )?);

    let api_config = ApiConfig {
        addr: cfg.api_addr.clone(),
    };
    let api_handle = ApiServer::new(api_config, assessor).spawn()?;
    log::info!("assessment api listening on {}", api_handle.addr);

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    log::info!("shutting down");
    api_handle.stop()?;
    Ok(())
}
