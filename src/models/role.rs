//! Semantic role of a file within a product group.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a file is used for inside its product.
///
/// Ordering follows packaging priority and is what the group's role map is
/// sorted by.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// `.gltf` scene description.
    Model,
    /// `.bin` buffer referenced by the model.
    Binary,
    /// `.png`/`.jpg` material texture matched by keyword.
    Texture,
    /// `.glb` self-contained binary glTF.
    BinaryModel,
    /// `.png`/`.jpg` preview image.
    Thumbnail,
    /// Supplier `.json` metadata.
    Metadata,
    /// Anything else. Kept in the group, never packaged.
    Unrecognized,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Model => "model",
            Role::Binary => "binary",
            Role::Texture => "texture",
            Role::BinaryModel => "binary_model",
            Role::Thumbnail => "thumbnail",
            Role::Metadata => "metadata",
            Role::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
