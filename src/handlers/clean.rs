//! `clean` — remove the output directory so the next run starts fresh.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::{io::ErrorKind, path::Path};
use tokio::{
    fs,
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::info;

pub async fn clean(cfg: &AppConfig, yes: bool) -> Result<()> {
    if !yes && !confirm(&cfg.output_dir).await? {
        info!("cancelled");
        return Ok(());
    }

    if remove_output_dir(&cfg.output_dir)
        .await
        .with_context(|| format!("removing {}", cfg.output_dir.display()))?
    {
        info!("removed {}", cfg.output_dir.display());
    } else {
        info!("{} not found (already clean)", cfg.output_dir.display());
    }
    Ok(())
}

/// Delete `dir` recursively. Returns false when it did not exist.
pub async fn remove_output_dir(dir: &Path) -> std::io::Result<bool> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

async fn confirm(dir: &Path) -> Result<bool> {
    let mut stdout = io::stdout();
    stdout
        .write_all(format!("Delete {}? (y/n): ", dir.display()).as_bytes())
        .await?;
    stdout.flush().await?;

    let mut answer = String::new();
    BufReader::new(io::stdin()).read_line(&mut answer).await?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
