//! Read-only collaborator interfaces consumed by the sync layer.
//!
//! Implementations return only what exists: a missing sheet group is `None` (or absent
//! from the map), never an error. Errors are reserved for the collaborator itself
//! failing (I/O, corrupt rows, ...).

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};

use contractdesk_model::{ContractSheetId, SheetGroup, SheetGroupId, UomNormalizationRule};

use crate::error::BoxError;

pub trait SheetGroupLookup {
    type Error: Into<BoxError>;

    fn sheet_group_by_id(&self, id: SheetGroupId) -> Result<Option<SheetGroup>, Self::Error>;

    /// Resolve many ids with one read. Ids without a group are simply absent.
    fn sheet_groups_by_ids(
        &self,
        ids: &BTreeSet<SheetGroupId>,
    ) -> Result<BTreeMap<SheetGroupId, SheetGroup>, Self::Error>;
}

pub trait ContractSheetLookup {
    type Error: Into<BoxError>;

    /// The stored `sheetgroup_id` of an existing contract sheet.
    ///
    /// Outer `None` means the record does not exist; `Some(None)` means it is ungrouped.
    fn current_sheetgroup_id(
        &self,
        id: ContractSheetId,
    ) -> Result<Option<Option<SheetGroupId>>, Self::Error>;
}

pub trait NormalizationRuleSource {
    type Error: Into<BoxError>;

    /// Rules in tie-break order: on duplicate keys the later rule wins.
    fn normalization_rules(
        &self,
        language: Option<&str>,
    ) -> Result<Vec<UomNormalizationRule>, Self::Error>;
}

impl<T: SheetGroupLookup + ?Sized> SheetGroupLookup for &T {
    type Error = T::Error;

    fn sheet_group_by_id(&self, id: SheetGroupId) -> Result<Option<SheetGroup>, Self::Error> {
        (**self).sheet_group_by_id(id)
    }

    fn sheet_groups_by_ids(
        &self,
        ids: &BTreeSet<SheetGroupId>,
    ) -> Result<BTreeMap<SheetGroupId, SheetGroup>, Self::Error> {
        (**self).sheet_groups_by_ids(ids)
    }
}

impl<T: ContractSheetLookup + ?Sized> ContractSheetLookup for &T {
    type Error = T::Error;

    fn current_sheetgroup_id(
        &self,
        id: ContractSheetId,
    ) -> Result<Option<Option<SheetGroupId>>, Self::Error> {
        (**self).current_sheetgroup_id(id)
    }
}

impl<T: NormalizationRuleSource + ?Sized> NormalizationRuleSource for &T {
    type Error = T::Error;

    fn normalization_rules(
        &self,
        language: Option<&str>,
    ) -> Result<Vec<UomNormalizationRule>, Self::Error> {
        (**self).normalization_rules(language)
    }
}

/// A plain rule list. `language = None` returns every rule; otherwise only rules of
/// that language, in list order. `Some("")` selects the rules without a language.
impl NormalizationRuleSource for [UomNormalizationRule] {
    type Error = Infallible;

    fn normalization_rules(
        &self,
        language: Option<&str>,
    ) -> Result<Vec<UomNormalizationRule>, Self::Error> {
        Ok(self
            .iter()
            .filter(|rule| match language {
                None => true,
                Some(language) => rule.language.as_deref().unwrap_or("") == language,
            })
            .cloned()
            .collect())
    }
}

impl NormalizationRuleSource for Vec<UomNormalizationRule> {
    type Error = Infallible;

    fn normalization_rules(
        &self,
        language: Option<&str>,
    ) -> Result<Vec<UomNormalizationRule>, Self::Error> {
        self.as_slice().normalization_rules(language)
    }
}

/// Sheet groups held in memory, with a counter of lookup calls.
#[derive(Debug, Default)]
pub struct InMemorySheetGroups {
    groups: BTreeMap<SheetGroupId, SheetGroup>,
    lookups: AtomicUsize,
}

impl InMemorySheetGroups {
    pub fn new(groups: impl IntoIterator<Item = SheetGroup>) -> Self {
        Self {
            groups: groups.into_iter().map(|group| (group.id, group)).collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of lookup calls served so far (single and batched alike).
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl SheetGroupLookup for InMemorySheetGroups {
    type Error = Infallible;

    fn sheet_group_by_id(&self, id: SheetGroupId) -> Result<Option<SheetGroup>, Self::Error> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.groups.get(&id).cloned())
    }

    fn sheet_groups_by_ids(
        &self,
        ids: &BTreeSet<SheetGroupId>,
    ) -> Result<BTreeMap<SheetGroupId, SheetGroup>, Self::Error> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(ids
            .iter()
            .filter_map(|id| self.groups.get(id).map(|group| (*id, group.clone())))
            .collect())
    }
}
