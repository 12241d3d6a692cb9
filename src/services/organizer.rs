//! src/services/organizer.rs
//!
//! Organizer — runs the whole batch: scan the source directory, classify into
//! product groups, validate each group, package the passing ones and hand
//! their folders to the storage sink. A failure in one product is logged and
//! counted; the batch always moves on to the next product.

use crate::{
    models::{file_entry::ProductId, group::ProductGroup, verdict::ValidationVerdict},
    services::{
        classifier::{Classifier, scan_source_dir},
        ledger::{Ledger, OutcomeEntry},
        packager::{ARCHIVE_TEXTURE_LIMIT, Packager},
        storage_sink::{StorageSink, UploadReport, upload_folder},
        validator::Validator,
    },
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const RULE: &str = "======================================================================";

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Product groups discovered.
    pub total: usize,
    /// Groups packaged into an output folder.
    pub succeeded: usize,
    /// Groups rejected by validation or that failed to package.
    pub failed: usize,
    /// Packaged groups that carried validation warnings.
    pub warned: usize,
    /// Groups whose every file reached the storage sink.
    pub uploaded: usize,
}

/// What happened to one product group.
#[derive(Debug)]
pub struct ProductOutcome {
    pub id: ProductId,
    pub verdict: ValidationVerdict,
    /// Output folder, when packaging succeeded.
    pub folder: Option<PathBuf>,
    pub upload: Option<UploadReport>,
    /// Packaging or upload error that stopped this product.
    pub error: Option<String>,
}

impl ProductOutcome {
    fn new(id: ProductId, verdict: ValidationVerdict) -> Self {
        Self {
            id,
            verdict,
            folder: None,
            upload: None,
            error: None,
        }
    }

    pub fn packaged(&self) -> bool {
        self.folder.is_some()
    }

    pub fn fully_uploaded(&self) -> bool {
        self.upload
            .as_ref()
            .is_some_and(|report| report.is_complete() && !report.uploaded.is_empty())
    }
}

/// Result of [`Organizer::run`]: one outcome per discovered product, in group order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub stats: RunStats,
    pub outcomes: Vec<ProductOutcome>,
    pub ledger_run: Option<Uuid>,
}

/// Remote destination for packaged products.
pub struct Upload {
    pub sink: Box<dyn StorageSink>,
    pub prefix: String,
}

pub struct Organizer {
    source_dir: PathBuf,
    output_dir: PathBuf,
    classifier: Classifier,
    validator: Validator,
    packager: Packager,
    upload: Option<Upload>,
    ledger: Option<Ledger>,
}

impl Organizer {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        classifier: Classifier,
        validator: Validator,
    ) -> Self {
        let output_dir = output_dir.into();
        Self {
            source_dir: source_dir.into(),
            packager: Packager::new(output_dir.clone(), ARCHIVE_TEXTURE_LIMIT),
            output_dir,
            classifier,
            validator,
            upload: None,
            ledger: None,
        }
    }

    pub fn with_upload(mut self, upload: Upload) -> Self {
        self.upload = Some(upload);
        self
    }

    pub fn with_ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Process every product found in the source directory.
    ///
    /// Errors only when the run cannot start (missing source directory,
    /// unwritable output directory). Per-product problems end up in the report.
    pub async fn run(&self) -> Result<RunReport> {
        info!("{}", RULE);
        info!("PRODUCT ASSET ORGANIZER");
        info!("{}", RULE);

        let source_is_dir = fs::metadata(&self.source_dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !source_is_dir {
            anyhow::bail!("source directory not found: {}", self.source_dir.display());
        }
        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("creating output directory {}", self.output_dir.display()))?;

        info!("scanning directory: {}", self.source_dir.display());
        let listing = scan_source_dir(&self.source_dir)
            .await
            .with_context(|| format!("listing {}", self.source_dir.display()))?;
        let groups = self.classifier.group_files(listing);
        info!("found {} product(s)", groups.len());

        let mut report = RunReport::default();
        report.stats.total = groups.len();
        if groups.is_empty() {
            warn!("no products found");
        }

        if let Some(ledger) = &self.ledger {
            match ledger.begin_run(&self.source_dir, &self.output_dir).await {
                Ok(run_id) => report.ledger_run = Some(run_id),
                Err(err) => warn!("ledger unavailable for this run: {}", err),
            }
        }

        for group in &groups {
            let outcome = self.process_group(group).await;

            if outcome.packaged() {
                report.stats.succeeded += 1;
                if outcome.verdict.has_warnings() {
                    report.stats.warned += 1;
                }
            } else {
                report.stats.failed += 1;
            }
            if outcome.fully_uploaded() {
                report.stats.uploaded += 1;
            }

            self.record(report.ledger_run, &outcome).await;
            report.outcomes.push(outcome);
        }

        if let (Some(ledger), Some(run_id)) = (&self.ledger, report.ledger_run) {
            if let Err(err) = ledger.finish_run(run_id, &report.stats).await {
                warn!("could not close ledger run {}: {}", run_id, err);
            }
        }

        self.log_summary(&report.stats).await;
        Ok(report)
    }

    /// Validate, package and upload a single product.
    async fn process_group(&self, group: &ProductGroup) -> ProductOutcome {
        info!("");
        info!("processing: {} ({} file(s))", group.id, group.len());
        for (role, file) in group.entries() {
            debug!("  {:<12} {}", role.as_str(), file.filename);
        }
        let verdict = self.validator.validate(group);
        let mut outcome = ProductOutcome::new(group.id.clone(), verdict);

        if !outcome.verdict.issues.is_empty() {
            warn!("  validation issues:");
            for message in outcome.verdict.messages() {
                warn!("    - {}", message);
            }
        }
        if !outcome.verdict.passed() {
            error!("  skipping {}: missing required files", group.id);
            return outcome;
        }

        let packaged = match self.packager.package(group).await {
            Ok(packaged) => packaged,
            Err(err) => {
                error!("  packaging {} failed: {}", group.id, err);
                outcome.error = Some(err.to_string());
                return outcome;
            }
        };
        debug!(
            "  included files: {}",
            packaged.record.included_files.join(", ")
        );
        outcome.folder = Some(packaged.folder.clone());
        info!("completed: {}", group.id);

        if let Some(upload) = &self.upload {
            match upload_folder(upload.sink.as_ref(), &upload.prefix, &group.id, &packaged.folder)
                .await
            {
                Ok(report) => outcome.upload = Some(report),
                Err(err) => {
                    error!("  upload of {} failed: {}", group.id, err);
                    outcome.error = Some(err.to_string());
                }
            }
        }

        outcome
    }

    async fn record(&self, run_id: Option<Uuid>, outcome: &ProductOutcome) {
        let (Some(ledger), Some(run_id)) = (&self.ledger, run_id) else {
            return;
        };
        let (uploaded, failed_uploads) = match &outcome.upload {
            Some(report) => (report.uploaded.as_slice(), report.failed.len()),
            None => (&[][..], 0),
        };
        let entry = OutcomeEntry {
            id: &outcome.id,
            verdict: &outcome.verdict,
            folder: outcome.folder.as_deref(),
            uploaded,
            failed_uploads,
            error: outcome.error.as_deref(),
        };
        if let Err(err) = ledger.record_outcome(run_id, entry).await {
            warn!("could not record {} in ledger: {}", outcome.id, err);
        }
    }

    async fn log_summary(&self, stats: &RunStats) {
        info!("");
        info!("{}", RULE);
        info!("SUMMARY");
        info!("{}", RULE);
        info!("Total products:         {}", stats.total);
        info!("Successfully processed: {}", stats.succeeded);
        info!("Failed:                 {}", stats.failed);
        info!("With warnings:          {}", stats.warned);
        if let Some(upload) = &self.upload {
            info!("Uploaded:               {}", stats.uploaded);
            info!("Remote location: {}", upload.sink.location(&upload.prefix));
        }
        let local = fs::canonicalize(&self.output_dir)
            .await
            .unwrap_or_else(|_| self.output_dir.clone());
        info!("Local output: {}", local.display());
        info!("{}", RULE);
    }
}
