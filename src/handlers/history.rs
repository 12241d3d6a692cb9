//! `history` — print recent runs from the ledger.

use crate::{config::AppConfig, services::ledger::Ledger};
use anyhow::{Context, Result};
use tracing::info;

pub async fn history(cfg: &AppConfig, limit: usize) -> Result<()> {
    let Some(url) = &cfg.ledger_url else {
        anyhow::bail!("no ledger configured (set --ledger-url or ASSET_ORGANIZER_LEDGER_URL)");
    };
    let ledger = Ledger::connect(url)
        .await
        .with_context(|| format!("opening ledger {}", url))?;

    let runs = ledger.recent_runs(limit).await?;
    if runs.is_empty() {
        info!("no runs recorded");
        return Ok(());
    }

    for run in runs {
        let finished = run
            .finished_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unfinished".into());
        info!(
            "run {} started {} finished {}: {} product(s), {} ok, {} failed, {} warned, {} uploaded",
            run.id,
            run.started_at.to_rfc3339(),
            finished,
            run.total,
            run.succeeded,
            run.failed,
            run.warned,
            run.uploaded
        );
        for outcome in ledger.outcomes(run.id).await? {
            let state = if outcome.folder.is_some() {
                "packaged"
            } else if outcome.passed {
                "failed"
            } else {
                "rejected"
            };
            info!(
                "  {:<20} {:<8} uploads {} ok / {} failed{}",
                outcome.product_id,
                state,
                outcome.uploaded_files,
                outcome.failed_uploads,
                outcome
                    .error
                    .as_deref()
                    .map(|e| format!(" ({})", e))
                    .unwrap_or_default()
            );
            if outcome.issues != "[]" {
                info!("  {:<20} issues {}", "", outcome.issues);
            }
        }
        for key in ledger.uploaded_keys(run.id).await? {
            info!("  uploaded {}", key);
        }
    }
    Ok(())
}
