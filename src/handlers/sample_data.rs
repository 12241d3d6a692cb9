//! `sample-data` — write a small raw-asset set for trying the organizer out.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use tokio::fs;
use tracing::info;

/// 1x1 black PNG.
const TINY_PNG: [u8; 67] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53,
    0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0x60, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

const TEXTURE_CHANNELS: [&str; 3] = ["baseColor", "normal", "occlusionRoughnessMetallic"];

pub async fn sample_data(cfg: &AppConfig, products: &[String]) -> Result<()> {
    fs::create_dir_all(&cfg.source_dir)
        .await
        .with_context(|| format!("creating {}", cfg.source_dir.display()))?;

    for id in products {
        write_sample_product(&cfg.source_dir, id)
            .await
            .with_context(|| format!("writing sample files for {}", id))?;
        info!("created sample files for {}", id);
    }

    info!("sample data written to {}", cfg.source_dir.display());
    Ok(())
}

/// Write one complete product: model, buffer, binary glTF, three textures,
/// a thumbnail and supplier metadata.
pub async fn write_sample_product(dir: &Path, id: &str) -> Result<()> {
    let gltf = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }]
    });
    fs::write(
        dir.join(format!("{id}_model.gltf")),
        serde_json::to_vec_pretty(&gltf)?,
    )
    .await?;
    fs::write(dir.join(format!("{id}_model.bin")), vec![0u8; 1024]).await?;

    let mut glb = b"glTF".to_vec();
    glb.resize(1024, 0);
    fs::write(dir.join(format!("{id}_model.glb")), glb).await?;

    for channel in TEXTURE_CHANNELS {
        fs::write(
            dir.join(format!("{id}_DefaultMaterial_{channel}_1001.png")),
            TINY_PNG,
        )
        .await?;
    }
    fs::write(dir.join(format!("{id}_thumbnail.png")), TINY_PNG).await?;

    let metadata = json!({
        "product_id": id,
        "name": format!("Test Product {id}"),
        "description": "Sample product for the asset organizer",
        "category": "3D Models"
    });
    fs::write(
        dir.join(format!("{id}_metadata.json")),
        serde_json::to_vec_pretty(&metadata)?,
    )
    .await?;
    Ok(())
}
