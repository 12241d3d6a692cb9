//! src/services/classifier.rs
//!
//! Classifier — turns a flat listing of loose asset files into product groups.
//! Three pure steps: derive a product identifier from each filename, assign
//! each file a role, bucket files by identifier in first-seen order. Only
//! `scan_source_dir` touches the filesystem.

use crate::models::{
    file_entry::{FileEntry, ProductId, file_stem},
    group::ProductGroup,
    role::Role,
};
use clap::ValueEnum;
use std::{collections::HashMap, io, path::Path};
use tokio::fs;
use tracing::debug;

/// Keywords that mark an image as a material texture.
pub const TEXTURE_KEYWORDS: [&str; 6] = [
    "basecolor",
    "normal",
    "occlusion",
    "roughness",
    "metallic",
    "orm",
];

const THUMBNAIL_KEYWORD: &str = "thumbnail";
const IMAGE_EXTENSIONS: [&str; 2] = ["png", "jpg"];

/// Strategy for deriving a product identifier from a filename.
///
/// Supplier naming schemes differ; swapping the convention leaves grouping
/// and validation untouched. Implementations must be pure and total.
pub trait NamingConvention: Send + Sync {
    fn product_id(&self, filename: &str) -> ProductId;
}

/// Longest `PREFIX_123[_45A...]` run, else the first `_` segment, else the stem.
#[derive(Clone, Copy, Debug, Default)]
pub struct SegmentPattern;

impl NamingConvention for SegmentPattern {
    fn product_id(&self, filename: &str) -> ProductId {
        extract_product_id(filename)
    }
}

/// Everything before the first `_`, or the stem when there is none.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstSegment;

impl NamingConvention for FirstSegment {
    fn product_id(&self, filename: &str) -> ProductId {
        let stem = file_stem(filename);
        match stem.split_once('_') {
            Some((head, _)) if !head.is_empty() => ProductId::new(head),
            _ => ProductId::new(stem),
        }
    }
}

/// Naming conventions selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Naming {
    /// Letter prefix plus numeric blocks (`PROD_123`), falling back to the first segment.
    #[default]
    Default,
    /// First `_`-separated segment only (`OBC-005_model.gltf` -> `OBC-005`).
    FirstSegment,
}

impl Naming {
    pub fn convention(self) -> Box<dyn NamingConvention> {
        match self {
            Naming::Default => Box::new(SegmentPattern),
            Naming::FirstSegment => Box::new(FirstSegment),
        }
    }
}

/// Product identifier under the default naming convention.
///
/// Pure and total: a filename without any usable segment is its own product.
pub fn extract_product_id(filename: &str) -> ProductId {
    let stem = file_stem(filename);
    let segments: Vec<&str> = stem.split('_').collect();
    let head = segments[0];
    if segments.len() < 2 || head.is_empty() {
        return ProductId::new(stem);
    }

    if is_prefix_segment(head) {
        let run = segments[1..]
            .iter()
            .take_while(|segment| is_suffix_block(segment))
            .count();
        if run > 0 {
            return ProductId::new(segments[..=run].join("_"));
        }
    }

    ProductId::new(head)
}

/// Letter-only head segment (hyphens allowed after the first letter).
fn is_prefix_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphabetic() || c == '-')
}

/// Digit-led alphanumeric block such as `123`, `7A` or `005-B`.
fn is_suffix_block(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_digit())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// One row of the role dispatch table.
///
/// `matches` receives the lowercased stem and the lowercased extension.
#[derive(Clone, Copy)]
pub struct RoleRule {
    pub role: Role,
    pub matches: fn(&str, &str) -> bool,
}

/// Role rules in priority order. The first matching rule wins, which is what
/// puts thumbnails ahead of textures.
pub const ROLE_RULES: [RoleRule; 6] = [
    RoleRule {
        role: Role::Model,
        matches: is_model,
    },
    RoleRule {
        role: Role::Binary,
        matches: is_binary,
    },
    RoleRule {
        role: Role::BinaryModel,
        matches: is_binary_model,
    },
    RoleRule {
        role: Role::Metadata,
        matches: is_metadata,
    },
    RoleRule {
        role: Role::Thumbnail,
        matches: is_thumbnail,
    },
    RoleRule {
        role: Role::Texture,
        matches: is_texture,
    },
];

fn is_model(_name: &str, ext: &str) -> bool {
    ext == "gltf"
}

fn is_binary(_name: &str, ext: &str) -> bool {
    ext == "bin"
}

fn is_binary_model(_name: &str, ext: &str) -> bool {
    ext == "glb"
}

fn is_metadata(_name: &str, ext: &str) -> bool {
    ext == "json"
}

fn is_image(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}

fn is_thumbnail(name: &str, ext: &str) -> bool {
    is_image(ext) && name.contains(THUMBNAIL_KEYWORD)
}

fn is_texture(name: &str, ext: &str) -> bool {
    is_image(ext) && TEXTURE_KEYWORDS.iter().any(|kw| name.contains(kw))
}

/// Role of a file, decided from its name and extension alone.
///
/// Total: anything no rule claims is [`Role::Unrecognized`]. The extension may
/// be given with or without its leading dot, in any case.
pub fn assign_role(filename: &str, extension: &str) -> Role {
    let name = file_stem(filename).to_lowercase();
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    ROLE_RULES
        .iter()
        .find(|rule| (rule.matches)(&name, &ext))
        .map(|rule| rule.role)
        .unwrap_or(Role::Unrecognized)
}

/// Groups files into products using a pluggable naming convention.
pub struct Classifier {
    naming: Box<dyn NamingConvention>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Box::new(SegmentPattern))
    }
}

impl Classifier {
    pub fn new(naming: Box<dyn NamingConvention>) -> Self {
        Self { naming }
    }

    pub fn product_id(&self, filename: &str) -> ProductId {
        self.naming.product_id(filename)
    }

    /// Bucket `listing` into product groups.
    ///
    /// Groups come back in the order their identifier was first seen; files
    /// within a role keep listing order.
    pub fn group_files<I>(&self, listing: I) -> Vec<ProductGroup>
    where
        I: IntoIterator<Item = FileEntry>,
    {
        let mut groups: Vec<ProductGroup> = Vec::new();
        let mut index: HashMap<ProductId, usize> = HashMap::new();

        for entry in listing {
            let id = self.product_id(&entry.filename);
            let role = assign_role(&entry.filename, &entry.extension);
            debug!("classified {} as {} of {}", entry.filename, role, id);

            let slot = *index.entry(id.clone()).or_insert_with(|| {
                groups.push(ProductGroup::new(id));
                groups.len() - 1
            });
            groups[slot].insert(role, entry);
        }

        groups
    }
}

/// List the regular files directly inside `dir`, sorted by filename.
///
/// Symlinks are followed, so a link to a regular file is listed under its own
/// name. Dangling links are skipped. Sorting makes group order independent of
/// the filesystem's listing order.
pub async fn scan_source_dir(dir: &Path) -> io::Result<Vec<FileEntry>> {
    let root = fs::canonicalize(dir).await?;
    let mut entries = Vec::new();
    let mut reader = fs::read_dir(&root).await?;
    while let Some(item) = reader.next_entry().await? {
        let path = root.join(item.file_name());
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => entries.push(FileEntry::from_path(path)),
            Ok(_) => {}
            Err(e) => debug!("skipping {}: {}", path.display(), e),
        }
    }
    entries.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::validator::Validator;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn listing(names: &[&str]) -> Vec<FileEntry> {
        names
            .iter()
            .map(|name| FileEntry::from_path(format!("/raw/{name}")))
            .collect()
    }

    fn names(files: &[FileEntry]) -> Vec<&str> {
        files.iter().map(|f| f.filename.as_str()).collect()
    }

    #[test]
    fn product_id_follows_naming_convention() {
        assert_eq!(extract_product_id("X_model.gltf").as_str(), "X");
        assert_eq!(extract_product_id("OBC-005_model.gltf").as_str(), "OBC-005");
        assert_eq!(extract_product_id("PROD_123_texture.png").as_str(), "PROD_123");
        assert_eq!(extract_product_id("SKU_12_7A_model.glb").as_str(), "SKU_12_7A");
        assert_eq!(
            extract_product_id("PROD001_DefaultMaterial_baseColor_1001.png").as_str(),
            "PROD001"
        );
        assert_eq!(extract_product_id("random.png").as_str(), "random");
        assert_eq!(extract_product_id("_orphan.png").as_str(), "_orphan");
        assert_eq!(extract_product_id(".png").as_str(), ".png");
    }

    #[test]
    fn product_id_is_deterministic() {
        for name in ["A_1_b.png", "OBC-005_model.gltf", "weird name.bin", "a__b"] {
            assert_eq!(extract_product_id(name), extract_product_id(name));
        }
    }

    #[test]
    fn first_segment_convention_ignores_numeric_blocks() {
        assert_eq!(FirstSegment.product_id("PROD_123_texture.png").as_str(), "PROD");
        assert_eq!(FirstSegment.product_id("random.png").as_str(), "random");
        assert_eq!(FirstSegment.product_id("_x.png").as_str(), "_x");
    }

    #[test]
    fn roles_by_extension_and_keyword() {
        assert_eq!(assign_role("X_model.gltf", "gltf"), Role::Model);
        assert_eq!(assign_role("X_model.bin", "bin"), Role::Binary);
        assert_eq!(assign_role("X_model.glb", "glb"), Role::BinaryModel);
        assert_eq!(assign_role("X_info.json", "json"), Role::Metadata);
        assert_eq!(assign_role("X_tex_baseColor.png", "png"), Role::Texture);
        assert_eq!(assign_role("X_ORM.jpg", "jpg"), Role::Texture);
        assert_eq!(assign_role("X_thumbnail.png", "png"), Role::Thumbnail);
        assert_eq!(assign_role("X_preview.png", "png"), Role::Unrecognized);
        assert_eq!(assign_role("X_normal.tga", "tga"), Role::Unrecognized);
        assert_eq!(assign_role("README", ""), Role::Unrecognized);
    }

    #[test]
    fn thumbnail_wins_over_texture_keywords() {
        assert_eq!(assign_role("X_normal_thumbnail.png", "png"), Role::Thumbnail);

        let thumb = ROLE_RULES.iter().position(|r| r.role == Role::Thumbnail);
        let texture = ROLE_RULES.iter().position(|r| r.role == Role::Texture);
        assert!(thumb < texture);
    }

    #[test]
    fn extension_case_does_not_change_role() {
        for (name, ext) in [
            ("X_model", "gltf"),
            ("X_model", "bin"),
            ("X_model", "glb"),
            ("X_meta", "json"),
            ("X_normal", "png"),
            ("X_thumbnail", "jpg"),
            ("X_other", "txt"),
        ] {
            let lower = assign_role(&format!("{name}.{ext}"), ext);
            let upper_ext = ext.to_ascii_uppercase();
            let upper = assign_role(&format!("{name}.{upper_ext}"), &upper_ext);
            let dotted = assign_role(&format!("{name}.{ext}"), &format!(".{upper_ext}"));
            assert_eq!(lower, upper, "{name}.{ext}");
            assert_eq!(lower, dotted, "{name}.{ext}");
        }
    }

    #[test]
    fn complete_product_forms_one_group() {
        let groups = Classifier::default().group_files(listing(&[
            "X_model.gltf",
            "X_model.bin",
            "X_model.glb",
            "X_tex_baseColor.png",
            "X_tex_normal.png",
            "X_tex_occlusionRoughnessMetallic.png",
            "X_thumbnail.png",
        ]));

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.id.as_str(), "X");
        assert_eq!(
            names(group.files(Role::Texture)),
            vec![
                "X_tex_baseColor.png",
                "X_tex_normal.png",
                "X_tex_occlusionRoughnessMetallic.png"
            ]
        );
        assert_eq!(names(group.files(Role::Thumbnail)), vec!["X_thumbnail.png"]);
        assert!(group.files(Role::Unrecognized).is_empty());
    }

    #[test]
    fn lone_file_without_separator_is_its_own_group() {
        let groups = Classifier::default().group_files(listing(&["Y_model.gltf", "random.png"]));

        assert_eq!(groups.len(), 2);
        let random = &groups[1];
        assert_eq!(random.id.as_str(), "random");
        assert_eq!(names(random.files(Role::Unrecognized)), vec!["random.png"]);
        assert!(!Validator::default().validate(random).passed());
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let groups = Classifier::default().group_files(listing(&[
            "B_model.gltf",
            "A_model.gltf",
            "B_model.bin",
            "C_model.glb",
            "A_model.bin",
        ]));
        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
    }

    #[test]
    fn every_file_lands_in_exactly_one_group() {
        let input = listing(&[
            "A_model.gltf",
            "A_model.bin",
            "A_normal.png",
            "A_notes.txt",
            "PROD_12_model.glb",
            "PROD_12_thumbnail.jpg",
            "loose.bin",
            "B_meta.json",
        ]);
        let classifier = Classifier::default();
        let groups = classifier.group_files(input.clone());

        let total: usize = groups.iter().map(ProductGroup::len).sum();
        assert_eq!(total, input.len());

        for group in &groups {
            let grouped: BTreeSet<&str> = group
                .entries()
                .map(|(_, f)| f.filename.as_str())
                .collect();
            let expected: BTreeSet<&str> = input
                .iter()
                .filter(|f| classifier.product_id(&f.filename) == group.id)
                .map(|f| f.filename.as_str())
                .collect();
            assert_eq!(grouped, expected);
        }

        let ids: BTreeSet<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids.len(), groups.len());
    }

    #[tokio::test]
    async fn scan_lists_files_sorted_and_skips_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b_model.bin"), b"b").unwrap();
        std::fs::write(dir.path().join("A_model.GLTF"), b"{}").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/C_model.glb"), b"c").unwrap();

        let entries = scan_source_dir(dir.path()).await.unwrap();
        assert_eq!(names(&entries), vec!["A_model.GLTF", "b_model.bin"]);
        assert_eq!(entries[0].extension, "gltf");
        assert!(entries[0].path.is_absolute());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scan_follows_symlinked_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("X_model.gltf"), b"{}").unwrap();
        std::fs::write(store.path().join("shared.glb"), b"glb").unwrap();
        std::os::unix::fs::symlink(store.path().join("shared.glb"), dir.path().join("X_model.glb"))
            .unwrap();
        std::os::unix::fs::symlink(store.path().join("gone.bin"), dir.path().join("X_model.bin"))
            .unwrap();

        let entries = scan_source_dir(dir.path()).await.unwrap();
        assert_eq!(names(&entries), vec!["X_model.glb", "X_model.gltf"]);
        assert_eq!(entries[0].extension, "glb");
        assert_eq!(std::fs::read(&entries[0].path).unwrap(), b"glb");
    }
}
