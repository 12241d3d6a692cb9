//! Files sharing one product identifier, organised by role.

use super::{
    file_entry::{FileEntry, ProductId},
    role::Role,
};
use std::collections::BTreeMap;

/// A product and every input file that carries its identifier.
///
/// Built incrementally during the classification scan; treated as read-only
/// once the scan has finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductGroup {
    /// Grouping key, also used as output folder name and remote path segment.
    pub id: ProductId,

    /// Files per role, in the order they were encountered.
    roles: BTreeMap<Role, Vec<FileEntry>>,
}

impl ProductGroup {
    pub fn new(id: ProductId) -> Self {
        Self {
            id,
            roles: BTreeMap::new(),
        }
    }

    /// Record `entry` under `role`.
    pub(crate) fn insert(&mut self, role: Role, entry: FileEntry) {
        self.roles.entry(role).or_default().push(entry);
    }

    /// Files assigned to `role`; empty when none matched.
    pub fn files(&self, role: Role) -> &[FileEntry] {
        self.roles.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First file assigned to `role`, if any.
    pub fn first(&self, role: Role) -> Option<&FileEntry> {
        self.files(role).first()
    }

    pub fn count(&self, role: Role) -> usize {
        self.files(role).len()
    }

    /// Total number of files in the group, across all roles.
    pub fn len(&self) -> usize {
        self.roles.values().map(Vec::len).sum()
    }

    /// Every (role, file) pair, grouped by role.
    pub fn entries(&self) -> impl Iterator<Item = (Role, &FileEntry)> {
        self.roles
            .iter()
            .flat_map(|(role, files)| files.iter().map(move |file| (*role, file)))
    }
}
