//! Completeness policy for product groups.
//!
//! Pure decision over a group's role map: no I/O and no logging. Callers
//! surface the issues.

use crate::models::{
    group::ProductGroup,
    role::Role,
    verdict::{Issue, ValidationVerdict},
};

/// Number of textures a complete product ships with.
pub const DEFAULT_REQUIRED_TEXTURES: usize = 3;

/// Required roles and the issue reported when each is missing, in check order.
const REQUIRED_ROLES: [(Role, &str); 3] = [
    (Role::Model, "missing model file"),
    (Role::Binary, "missing binary data file"),
    (Role::BinaryModel, "missing binary glTF file"),
];

#[derive(Clone, Copy, Debug)]
pub struct Validator {
    required_textures: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_TEXTURES)
    }
}

impl Validator {
    pub fn new(required_textures: usize) -> Self {
        Self { required_textures }
    }

    /// Check `group` against the policy, collecting every issue.
    ///
    /// Missing model, binary or binary glTF is a hard failure. A texture
    /// shortfall is only a warning. Thumbnail and metadata are optional.
    pub fn validate(&self, group: &ProductGroup) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::default();

        for (role, message) in REQUIRED_ROLES {
            if group.files(role).is_empty() {
                verdict.push(Issue::error(message));
            }
        }

        let textures = group.count(Role::Texture);
        if textures < self.required_textures {
            verdict.push(Issue::warning(format!(
                "only {} texture(s) found (need {})",
                textures, self.required_textures
            )));
        }

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::file_entry::FileEntry, services::classifier::Classifier};
    use pretty_assertions::assert_eq;

    fn group_of(names: &[&str]) -> ProductGroup {
        let mut groups = Classifier::default().group_files(
            names
                .iter()
                .map(|name| FileEntry::from_path(format!("/raw/{name}"))),
        );
        assert_eq!(groups.len(), 1, "expected a single product");
        groups.remove(0)
    }

    #[test]
    fn complete_group_passes_cleanly() {
        let group = group_of(&[
            "X_model.gltf",
            "X_model.bin",
            "X_model.glb",
            "X_tex_baseColor.png",
            "X_tex_normal.png",
            "X_tex_occlusionRoughnessMetallic.png",
            "X_thumbnail.png",
        ]);
        let verdict = Validator::default().validate(&group);
        assert!(verdict.passed());
        assert!(verdict.issues.is_empty());
    }

    #[test]
    fn missing_glb_fails() {
        let verdict = Validator::default().validate(&group_of(&["Y_model.gltf", "Y_model.bin"]));
        assert!(!verdict.passed());
        assert_eq!(
            verdict.messages(),
            vec!["missing binary glTF file", "only 0 texture(s) found (need 3)"]
        );
    }

    #[test]
    fn texture_shortfall_is_a_warning() {
        let verdict = Validator::default().validate(&group_of(&[
            "Z_model.gltf",
            "Z_model.bin",
            "Z_model.glb",
            "Z_tex_normal.png",
        ]));
        assert!(verdict.passed());
        assert!(verdict.has_warnings());
        assert_eq!(verdict.messages(), vec!["only 1 texture(s) found (need 3)"]);
    }

    #[test]
    fn reports_every_missing_role_in_order() {
        let verdict = Validator::default().validate(&group_of(&["random.png"]));
        assert_eq!(
            verdict.messages(),
            vec![
                "missing model file",
                "missing binary data file",
                "missing binary glTF file",
                "only 0 texture(s) found (need 3)",
            ]
        );
    }

    #[test]
    fn adding_textures_never_flips_the_verdict() {
        let bases: [&[&str]; 2] = [
            &["M_model.gltf", "M_model.bin", "M_model.glb"],
            &["M_model.gltf", "M_model.bin"],
        ];
        let validator = Validator::default();
        for base in bases {
            let mut names: Vec<String> = base.iter().map(|s| s.to_string()).collect();
            let before = validator.validate(&group_of(&as_refs(&names))).passed();
            for texture in ["M_baseColor.png", "M_normal.png", "M_orm.png", "M_metallic.jpg"] {
                names.push(texture.to_string());
                let after = validator.validate(&group_of(&as_refs(&names))).passed();
                assert_eq!(before, after, "after adding {texture}");
            }
        }
    }

    #[test]
    fn optional_roles_are_silent() {
        let verdict = Validator::new(0).validate(&group_of(&[
            "Q_model.gltf",
            "Q_model.bin",
            "Q_model.glb",
        ]));
        assert!(verdict.issues.is_empty());
    }

    fn as_refs(names: &[String]) -> Vec<&str> {
        names.iter().map(String::as_str).collect()
    }
}
