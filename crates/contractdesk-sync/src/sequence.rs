use std::collections::{BTreeMap, BTreeSet};

use contractdesk_model::{
    fields, ContractSheetId, ContractSheetPayload, SheetGroup, SheetGroupId,
};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::lookup::{ContractSheetLookup, SheetGroupLookup};

/// Keeps `sheetgroup_seqno` on contract-sheet payloads equal to the referenced sheet
/// group's seqno.
///
/// Storage writes do not recompute derived fields, so every write path (create, bulk
/// create, update) runs its payloads through this engine first. A `sheetgroup_id` that
/// does not resolve leaves the payload untouched.
#[derive(Debug)]
pub struct SequenceSyncEngine<L> {
    groups: L,
    config: SyncConfig,
}

impl<L: SheetGroupLookup> SequenceSyncEngine<L> {
    pub fn new(groups: L) -> Self {
        Self::with_config(groups, SyncConfig::default())
    }

    pub fn with_config(groups: L, config: SyncConfig) -> Self {
        Self { groups, config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Stamp a single create payload.
    pub fn prepare_single(&self, payload: ContractSheetPayload) -> Result<ContractSheetPayload> {
        let Some(id) = payload.sheetgroup_id()? else {
            return Ok(payload);
        };
        let group = self
            .groups
            .sheet_group_by_id(id)
            .map_err(|err| SyncError::lookup("sheet group", err))?;
        Ok(self.stamp(payload, id, group.as_ref(), None))
    }

    /// Stamp a batch of create payloads, preserving order.
    ///
    /// All referenced groups are resolved with one lookup, so the whole batch sees the
    /// same snapshot of sheet-group data.
    pub fn prepare_batch(
        &self,
        payloads: Vec<ContractSheetPayload>,
    ) -> Result<Vec<ContractSheetPayload>> {
        let ids = payloads
            .iter()
            .map(ContractSheetPayload::sheetgroup_id)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let wanted: BTreeSet<SheetGroupId> = ids.iter().flatten().copied().collect();
        let groups = if wanted.is_empty() {
            BTreeMap::new()
        } else {
            self.groups
                .sheet_groups_by_ids(&wanted)
                .map_err(|err| SyncError::lookup("sheet group", err))?
        };

        for missing in wanted.iter().filter(|id| !groups.contains_key(*id)) {
            self.report_unresolved(*missing, None);
        }

        Ok(payloads
            .into_iter()
            .zip(ids)
            .map(|(mut payload, id)| {
                if let Some(group) = id.and_then(|id| groups.get(&id)) {
                    payload.set_sheetgroup_seqno(group.sheetgroup_seqno);
                }
                payload
            })
            .collect())
    }

    /// Stamp an update payload for an existing contract sheet.
    ///
    /// The payload's own `sheetgroup_id` takes precedence over `current_sheetgroup_id`;
    /// an explicit `null` (or blank) clears the group and nothing is stamped.
    /// The seqno is injected even when the update does not touch `sheetgroup_id`, so the
    /// stored copy is re-confirmed against the unchanged group.
    pub fn prepare_update(
        &self,
        existing_id: ContractSheetId,
        payload: ContractSheetPayload,
        current_sheetgroup_id: Option<SheetGroupId>,
    ) -> Result<ContractSheetPayload> {
        let effective = if payload.contains(fields::SHEETGROUP_ID) {
            payload.sheetgroup_id()?
        } else {
            current_sheetgroup_id
        };
        let Some(id) = effective else {
            return Ok(payload);
        };
        let group = self
            .groups
            .sheet_group_by_id(id)
            .map_err(|err| SyncError::lookup("sheet group", err))?;
        Ok(self.stamp(payload, id, group.as_ref(), Some(existing_id)))
    }

    fn stamp(
        &self,
        mut payload: ContractSheetPayload,
        id: SheetGroupId,
        group: Option<&SheetGroup>,
        sheet: Option<ContractSheetId>,
    ) -> ContractSheetPayload {
        match group {
            Some(group) => payload.set_sheetgroup_seqno(group.sheetgroup_seqno),
            None => self.report_unresolved(id, sheet),
        }
        payload
    }

    fn report_unresolved(&self, id: SheetGroupId, sheet: Option<ContractSheetId>) {
        let target = sheet
            .map(|sheet| format!(" (contract sheet {sheet})"))
            .unwrap_or_default();
        if self.config.warn_on_unresolved {
            log::warn!("sheet group {id} not found{target}; leaving sheetgroup_seqno untouched");
        } else {
            log::debug!("sheet group {id} not found{target}; leaving sheetgroup_seqno untouched");
        }
    }
}

impl<L: SheetGroupLookup + ContractSheetLookup> SequenceSyncEngine<L> {
    /// [`SequenceSyncEngine::prepare_update`] with the current group read from storage.
    ///
    /// A record that no longer exists is treated as ungrouped; the write itself reports
    /// the missing row.
    pub fn prepare_update_stored(
        &self,
        existing_id: ContractSheetId,
        payload: ContractSheetPayload,
    ) -> Result<ContractSheetPayload> {
        let current = self
            .groups
            .current_sheetgroup_id(existing_id)
            .map_err(|err| SyncError::lookup("contract sheet", err))?
            .flatten();
        self.prepare_update(existing_id, payload, current)
    }
}
