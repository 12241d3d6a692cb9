//! Metadata record written next to each packaged product.

use super::file_entry::ProductId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output file names inside a product folder.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PackagedFiles {
    /// Zip archive of the model, binary buffer and textures.
    pub archive: String,

    /// Standalone binary glTF.
    pub binary_model: String,

    /// Preview image, when the group had one.
    pub thumbnail: Option<String>,
}

/// Original names of the files placed inside the archive.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ArchiveContents {
    pub model: Option<String>,
    pub binary: Option<String>,
    pub textures: Vec<String>,
}

/// Processing record for a packaged product.
///
/// Serialized as `<id>_metadata.json`. Supplier metadata may add or override
/// top-level keys; see [`MetadataRecord::into_json`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MetadataRecord {
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
    pub files: PackagedFiles,
    pub archive_contents: ArchiveContents,
    /// Every file name that ends up in the product folder.
    pub included_files: Vec<String>,
    pub status: String,
}

impl MetadataRecord {
    pub fn new(
        product_id: ProductId,
        created_at: DateTime<Utc>,
        files: PackagedFiles,
        archive_contents: ArchiveContents,
        metadata_name: &str,
    ) -> Self {
        let mut included_files = vec![files.archive.clone(), files.binary_model.clone()];
        included_files.extend(files.thumbnail.clone());
        included_files.push(metadata_name.to_string());

        Self {
            product_id,
            created_at,
            files,
            archive_contents,
            included_files,
            status: "processed".into(),
        }
    }

    /// Render the record as a JSON object, layering `supplier` keys on top.
    ///
    /// Supplier values win on key collisions.
    pub fn into_json(self, supplier: Option<Map<String, Value>>) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let (Value::Object(record), Some(supplier)) = (&mut value, supplier) {
            for (key, val) in supplier {
                record.insert(key, val);
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record() -> MetadataRecord {
        MetadataRecord::new(
            ProductId::new("OBC-005"),
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            PackagedFiles {
                archive: "OBC-005.zip".into(),
                binary_model: "OBC-005.glb".into(),
                thumbnail: None,
            },
            ArchiveContents {
                model: Some("OBC-005_model.gltf".into()),
                binary: Some("OBC-005_model.bin".into()),
                textures: vec![],
            },
            "OBC-005_metadata.json",
        )
    }

    #[test]
    fn included_files_skip_missing_thumbnail() {
        assert_eq!(
            record().included_files,
            vec!["OBC-005.zip", "OBC-005.glb", "OBC-005_metadata.json"]
        );
    }

    #[test]
    fn supplier_keys_override_record_keys() {
        let supplier = json!({ "name": "Chair", "status": "draft" });
        let Value::Object(supplier) = supplier else {
            unreachable!()
        };
        let value = record().into_json(Some(supplier)).unwrap();

        assert_eq!(value["product_id"], "OBC-005");
        assert_eq!(value["name"], "Chair");
        assert_eq!(value["status"], "draft");
        assert_eq!(value["created_at"], "2025-03-01T12:00:00Z");
        assert_eq!(value["files"]["thumbnail"], Value::Null);
    }
}
