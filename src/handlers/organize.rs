//! `organize` — the default command: build the pipeline from configuration and run it.

use crate::{
    config::AppConfig,
    services::{
        classifier::Classifier,
        ledger::Ledger,
        organizer::{Organizer, RunReport, Upload},
        validator::Validator,
    },
};
use anyhow::{Context, Result};
use tracing::{info, warn};

pub async fn organize(cfg: &AppConfig) -> Result<()> {
    let organizer = build_organizer(cfg).await?;
    let report = organizer.run().await?;
    log_failures(&report);
    Ok(())
}

/// Assemble an [`Organizer`] from configuration: naming convention, texture
/// policy, optional upload target and optional ledger.
pub async fn build_organizer(cfg: &AppConfig) -> Result<Organizer> {
    let mut organizer = Organizer::new(
        &cfg.source_dir,
        &cfg.output_dir,
        Classifier::new(cfg.naming.convention()),
        Validator::new(cfg.required_textures),
    );

    match cfg.upload_bucket() {
        Some(bucket) => {
            let sink = cfg.endpoint.clone().into_sink(bucket);
            info!("uploads enabled: {}", sink.location(&cfg.remote_prefix));
            organizer = organizer.with_upload(Upload {
                sink,
                prefix: cfg.remote_prefix.clone(),
            });
        }
        None => info!("no bucket configured, packaging only"),
    }

    if let Some(url) = &cfg.ledger_url {
        let ledger = Ledger::connect(url)
            .await
            .with_context(|| format!("opening ledger {}", url))?;
        organizer = organizer.with_ledger(ledger);
    }

    Ok(organizer)
}

fn log_failures(report: &RunReport) {
    let failed: Vec<&str> = report
        .outcomes
        .iter()
        .filter(|o| !o.packaged() || o.error.is_some())
        .map(|o| o.id.as_str())
        .collect();
    if !failed.is_empty() {
        warn!("products needing attention: {}", failed.join(", "));
    }

    for outcome in &report.outcomes {
        if let Some(upload) = &outcome.upload {
            for failure in &upload.failed {
                warn!("not uploaded: {} ({})", failure.key, failure.error);
            }
        }
    }

    if let Some(run_id) = report.ledger_run {
        info!("run recorded in ledger as {}", run_id);
    }
}
