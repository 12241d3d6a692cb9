//! src/services/packager.rs
//!
//! Packager — lays out one validated product under `output_dir/{id}/`:
//! a zip of the model, binary buffer and textures, the standalone `.glb`,
//! an optional thumbnail and a generated metadata record. The folder is built
//! under a hidden staging name and swapped in only once it is complete.

use crate::models::{
    file_entry::{FileEntry, ProductId},
    group::ProductGroup,
    metadata::{ArchiveContents, MetadataRecord, PackagedFiles},
    role::Role,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::{
    fs::File,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("product `{id}` has no {role} file")]
    MissingRole { id: ProductId, role: Role },
    #[error("product id `{0}` cannot be used as a folder name")]
    UnsafeProductId(ProductId),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("archive task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type PackageResult<T> = Result<T, PackageError>;

/// A product folder produced by [`Packager::package`].
#[derive(Debug, Clone)]
pub struct PackagedProduct {
    pub folder: PathBuf,
    pub record: MetadataRecord,
}

#[derive(Clone, Debug)]
pub struct Packager {
    output_dir: PathBuf,
    texture_limit: usize,
}

impl Packager {
    /// `texture_limit` caps how many textures go into the archive.
    pub fn new(output_dir: impl Into<PathBuf>, texture_limit: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            texture_limit,
        }
    }

    pub fn product_folder(&self, id: &ProductId) -> PathBuf {
        self.output_dir.join(id.as_str())
    }

    /// Build the product folder for a group that passed validation.
    ///
    /// Any previous folder is replaced only after the new one is complete; a
    /// failure leaves the previous output untouched.
    pub async fn package(&self, group: &ProductGroup) -> PackageResult<PackagedProduct> {
        let id = &group.id;
        if matches!(id.as_str(), "" | "." | "..") {
            return Err(PackageError::UnsafeProductId(id.clone()));
        }
        for role in [Role::Model, Role::Binary, Role::BinaryModel] {
            require(group, role)?;
        }

        let staging = self
            .output_dir
            .join(format!(".{}.tmp-{}", id, Uuid::new_v4()));
        fs::create_dir_all(&staging).await?;
        let record = match self.fill(group, &staging).await {
            Ok(record) => record,
            Err(err) => {
                let _ = fs::remove_dir_all(&staging).await;
                return Err(err);
            }
        };

        let folder = self.product_folder(id);
        swap_into_place(&staging, &folder).await?;
        info!("  created folder {}/", id);

        Ok(PackagedProduct { folder, record })
    }

    /// Write the archive, glb, thumbnail and metadata of `group` into `folder`.
    async fn fill(&self, group: &ProductGroup, folder: &Path) -> PackageResult<MetadataRecord> {
        let id = &group.id;
        let model = require(group, Role::Model)?;
        let binary = require(group, Role::Binary)?;
        let binary_model = require(group, Role::BinaryModel)?;

        let members = archive_members(group, self.texture_limit);
        let archive_name = format!("{}.zip", id);
        let archive_path = folder.join(&archive_name);
        let member_paths: Vec<PathBuf> = members.iter().map(|f| f.path.clone()).collect();
        tokio::task::spawn_blocking(move || write_archive(&archive_path, &member_paths)).await??;
        for member in &members {
            debug!("    added to archive: {}", member.filename);
        }
        info!("  created {}", archive_name);

        let glb_name = format!("{}.glb", id);
        fs::copy(&binary_model.path, folder.join(&glb_name)).await?;
        info!("  copied {}", glb_name);

        let thumbnail_name = match thumbnail_source(group) {
            Some(source) => {
                let ext = if source.extension.is_empty() {
                    "png"
                } else {
                    source.extension.as_str()
                };
                let name = format!("{}_thumbnail.{}", id, ext);
                fs::copy(&source.path, folder.join(&name)).await?;
                info!("  copied {}", name);
                Some(name)
            }
            None => {
                debug!("  no thumbnail for {}", id);
                None
            }
        };

        let metadata_name = format!("{}_metadata.json", id);
        let record = MetadataRecord::new(
            id.clone(),
            Utc::now(),
            PackagedFiles {
                archive: archive_name,
                binary_model: glb_name,
                thumbnail: thumbnail_name,
            },
            ArchiveContents {
                model: Some(model.filename.clone()),
                binary: Some(binary.filename.clone()),
                textures: group
                    .files(Role::Texture)
                    .iter()
                    .take(self.texture_limit)
                    .map(|f| f.filename.clone())
                    .collect(),
            },
            &metadata_name,
        );

        let supplier = match group.first(Role::Metadata) {
            Some(entry) => read_supplier_metadata(entry).await,
            None => None,
        };
        let json = record.clone().into_json(supplier)?;
        fs::write(folder.join(&metadata_name), serde_json::to_vec_pretty(&json)?).await?;
        info!("  created {}", metadata_name);

        Ok(record)
    }
}

fn require(group: &ProductGroup, role: Role) -> PackageResult<&FileEntry> {
    group.first(role).ok_or_else(|| PackageError::MissingRole {
        id: group.id.clone(),
        role,
    })
}

/// Textures stored in each product archive; extra textures stay out.
pub const ARCHIVE_TEXTURE_LIMIT: usize = 3;

/// Files that go into the archive: first model, first binary, then up to
/// `texture_limit` textures in listing order.
pub fn archive_members(group: &ProductGroup, texture_limit: usize) -> Vec<&FileEntry> {
    group
        .first(Role::Model)
        .into_iter()
        .chain(group.first(Role::Binary))
        .chain(group.files(Role::Texture).iter().take(texture_limit))
        .collect()
}

/// The group's thumbnail, or its first unclassified `.jpg` when it has none.
pub fn thumbnail_source(group: &ProductGroup) -> Option<&FileEntry> {
    group.first(Role::Thumbnail).or_else(|| {
        group
            .files(Role::Unrecognized)
            .iter()
            .find(|f| f.extension == "jpg")
    })
}

/// Write a deflated zip of `members` at `dest`, storing each under its file name.
///
/// Entry timestamps are pinned so identical inputs produce identical archives.
pub fn write_archive(dest: &Path, members: &[PathBuf]) -> PackageResult<()> {
    let parent = dest.parent().ok_or_else(|| {
        io::Error::new(ErrorKind::Other, "archive path missing parent directory")
    })?;
    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

    if let Err(err) = write_zip(&tmp_path, members) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err);
    }
    if let Err(err) = std::fs::rename(&tmp_path, dest) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(PackageError::Io(err));
    }
    Ok(())
}

fn write_zip(path: &Path, members: &[PathBuf]) -> PackageResult<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for member in members {
        let name = member
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "archive member has no name"))?;
        zip.start_file(name, options)?;
        let mut source = File::open(member)?;
        io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?.sync_all()?;
    Ok(())
}

/// Parse a supplier metadata file, keeping it only when it is a JSON object.
async fn read_supplier_metadata(entry: &FileEntry) -> Option<Map<String, Value>> {
    let bytes = match fs::read(&entry.path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("  could not read supplier metadata {}: {}", entry.filename, err);
            return None;
        }
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!("  supplier metadata {} is not a JSON object", entry.filename);
            None
        }
        Err(err) => {
            warn!("  could not parse supplier metadata {}: {}", entry.filename, err);
            None
        }
    }
}

/// Replace `dest` with the finished `staging` folder.
async fn swap_into_place(staging: &Path, dest: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dest).await {
        Ok(()) => debug!("cleared previous output {}", dest.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            let _ = fs::remove_dir_all(staging).await;
            return Err(err);
        }
    }
    if let Err(err) = fs::rename(staging, dest).await {
        let _ = fs::remove_dir_all(staging).await;
        return Err(err);
    }
    Ok(())
}
