use contractdesk_model::{ContractSheetId, ContractSheetPayload, NewSheetGroup, SheetGroupId};
use contractdesk_storage::{Storage, StorageError};
use contractdesk_sync::{SequenceSyncEngine, SyncError};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Barrier;
use std::thread;

fn payload(value: serde_json::Value) -> ContractSheetPayload {
    ContractSheetPayload::try_from(value).expect("object payload")
}

#[test]
fn create_stamps_seqno_from_group() {
    let storage = Storage::open_in_memory().expect("open storage");
    let group = storage
        .create_sheet_group(NewSheetGroup::new("CIV", "Civil works", 5))
        .expect("create group");

    let sheet = storage
        .create_contract_sheet(payload(json!({
            "contract_id": 10,
            "sheetgroup_id": group.id,
            "sheet_code": "C-001",
        })))
        .expect("create sheet");

    assert_eq!(sheet.sheetgroup_id, Some(group.id));
    assert_eq!(sheet.sheetgroup_seqno, Some(5));
    assert_eq!(
        storage.get_contract_sheet(sheet.id).expect("reload").sheetgroup_seqno,
        Some(5)
    );
}

#[test]
fn create_with_dangling_group_keeps_supplied_fields() {
    let storage = Storage::open_in_memory().expect("open storage");

    let sheet = storage
        .create_contract_sheet(payload(json!({
            "sheetgroup_id": 404,
            "sheetgroup_seqno": 2,
            "uom_code": "PCS",
        })))
        .expect("create sheet");

    assert_eq!(sheet.sheetgroup_id, Some(SheetGroupId(404)));
    assert_eq!(sheet.sheetgroup_seqno, Some(2));
    assert_eq!(sheet.uom_code.as_deref(), Some("PCS"));
}

#[test]
fn bulk_create_stamps_every_row_in_order() {
    let storage = Storage::open_in_memory().expect("open storage");
    let first = storage
        .create_sheet_group(NewSheetGroup::new("A", "First", 1))
        .expect("create group");
    let shared = storage
        .create_sheet_group(NewSheetGroup::new("B", "Shared", 9))
        .expect("create group");

    let sheets = storage
        .bulk_create_contract_sheets(vec![
            payload(json!({ "contract_id": 1, "sheetgroup_id": shared.id, "sheet_code": "x" })),
            payload(json!({ "contract_id": 1, "sheet_code": "ungrouped" })),
            payload(json!({ "contract_id": 1, "sheetgroup_id": shared.id, "sheet_code": "y" })),
            payload(json!({ "contract_id": 1, "sheetgroup_id": first.id.get().to_string(), "sheet_code": "z" })),
        ])
        .expect("bulk create");

    let summary: Vec<_> = sheets
        .iter()
        .map(|s| (s.sheet_code.clone().unwrap(), s.sheetgroup_seqno))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("x".to_string(), Some(9)),
            ("ungrouped".to_string(), None),
            ("y".to_string(), Some(9)),
            ("z".to_string(), Some(1)),
        ]
    );
    assert!(sheets.windows(2).all(|w| w[0].id < w[1].id));
}

#[test]
fn bulk_create_with_malformed_row_writes_nothing() {
    let storage = Storage::open_in_memory().expect("open storage");

    let err = storage
        .bulk_create_contract_sheets(vec![
            payload(json!({ "contract_id": 3, "sheet_code": "ok" })),
            payload(json!({ "contract_id": 3, "sheetgroup_id": "not-an-id" })),
        ])
        .unwrap_err();

    assert!(matches!(err, StorageError::Sync(SyncError::MalformedInput(_))));
    assert!(storage.list_contract_sheets(3).expect("list").is_empty());
}

#[test]
fn update_reassigning_group_follows_new_seqno() {
    let storage = Storage::open_in_memory().expect("open storage");
    let old = storage
        .create_sheet_group(NewSheetGroup::new("OLD", "Old", 1))
        .expect("create group");
    let new = storage
        .create_sheet_group(NewSheetGroup::new("NEW", "New", 9))
        .expect("create group");
    let sheet = storage
        .create_contract_sheet(payload(json!({ "sheetgroup_id": old.id, "sheet_code": "s" })))
        .expect("create sheet");
    assert_eq!(sheet.sheetgroup_seqno, Some(1));

    let updated = storage
        .update_contract_sheet(sheet.id, payload(json!({ "sheetgroup_id": new.id })))
        .expect("update");

    assert_eq!(updated.sheetgroup_id, Some(new.id));
    assert_eq!(updated.sheetgroup_seqno, Some(9));
    assert_eq!(updated.sheet_code.as_deref(), Some("s"));
}

#[test]
fn update_without_group_field_repairs_drifted_seqno() {
    let storage = Storage::open_in_memory().expect("open storage");
    let group = storage
        .create_sheet_group(NewSheetGroup::new("G", "Group", 4))
        .expect("create group");
    let sheet = storage
        .create_contract_sheet(payload(json!({ "sheetgroup_id": group.id })))
        .expect("create sheet");

    // A caller-supplied seqno is never authoritative.
    let updated = storage
        .update_contract_sheet(
            sheet.id,
            payload(json!({ "sheetgroup_seqno": 77, "uom_code": "KG" })),
        )
        .expect("update");

    assert_eq!(updated.sheetgroup_seqno, Some(4));
    assert_eq!(updated.uom_code.as_deref(), Some("KG"));
}

#[test]
fn update_clearing_group_keeps_last_seqno() {
    let storage = Storage::open_in_memory().expect("open storage");
    let group = storage
        .create_sheet_group(NewSheetGroup::new("G", "Group", 4))
        .expect("create group");
    let sheet = storage
        .create_contract_sheet(payload(json!({ "sheetgroup_id": group.id })))
        .expect("create sheet");

    let updated = storage
        .update_contract_sheet(sheet.id, payload(json!({ "sheetgroup_id": null })))
        .expect("update");

    assert_eq!(updated.sheetgroup_id, None);
    assert_eq!(updated.sheetgroup_seqno, Some(4));
}

#[test]
fn update_of_missing_sheet_is_not_found() {
    let storage = Storage::open_in_memory().expect("open storage");

    let err = storage
        .update_contract_sheet(ContractSheetId(12), payload(json!({ "sheet_code": "x" })))
        .unwrap_err();

    assert!(matches!(err, StorageError::ContractSheetNotFound(ContractSheetId(12))));
}

#[test]
fn changing_group_seqno_restamps_referencing_sheets() {
    let storage = Storage::open_in_memory().expect("open storage");
    let group = storage
        .create_sheet_group(NewSheetGroup::new("G", "Group", 2))
        .expect("create group");
    let other = storage
        .create_sheet_group(NewSheetGroup::new("H", "Other", 3))
        .expect("create group");
    storage
        .bulk_create_contract_sheets(vec![
            payload(json!({ "contract_id": 5, "sheetgroup_id": group.id })),
            payload(json!({ "contract_id": 5, "sheetgroup_id": group.id })),
            payload(json!({ "contract_id": 5, "sheetgroup_id": other.id })),
        ])
        .expect("bulk create");

    let moved = storage
        .set_sheet_group_seqno(group.id, 20)
        .expect("set seqno");
    assert_eq!(moved.sheetgroup_seqno, 20);

    let seqnos: Vec<_> = storage
        .list_contract_sheets(5)
        .expect("list")
        .into_iter()
        .map(|s| (s.sheetgroup_id, s.sheetgroup_seqno))
        .collect();
    assert_eq!(
        seqnos,
        vec![
            (Some(other.id), Some(3)),
            (Some(group.id), Some(20)),
            (Some(group.id), Some(20)),
        ]
    );

    let names: Vec<_> = storage
        .list_sheet_groups()
        .expect("list groups")
        .into_iter()
        .map(|g| g.code)
        .collect();
    assert_eq!(names, vec!["H".to_string(), "G".to_string()]);
}

#[test]
fn resync_repairs_only_drifted_rows() {
    let uri = "file:resync_repairs_only_drifted_rows?mode=memory&cache=shared";
    let storage = Storage::open_uri(uri).expect("open storage");
    let group = storage
        .create_sheet_group(NewSheetGroup::new("G", "Group", 6))
        .expect("create group");
    let sheets = storage
        .bulk_create_contract_sheets(vec![
            payload(json!({ "contract_id": 8, "sheetgroup_id": group.id })),
            payload(json!({ "contract_id": 8, "sheetgroup_id": group.id })),
        ])
        .expect("bulk create");

    // Simulate a write that bypassed the sync (e.g. a manual SQL fix).
    let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
        | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
        | rusqlite::OpenFlags::SQLITE_OPEN_URI;
    let conn = rusqlite::Connection::open_with_flags(uri, flags).expect("open raw connection");
    conn.execute(
        "UPDATE contract_sheets SET sheetgroup_seqno = 0 WHERE id = ?1",
        rusqlite::params![sheets[0].id.get()],
    )
    .expect("corrupt seqno");

    assert_eq!(storage.resync_contract_sheets(group.id).expect("resync"), 1);
    assert_eq!(
        storage.get_contract_sheet(sheets[0].id).expect("reload").sheetgroup_seqno,
        Some(6)
    );
    assert!(matches!(
        storage.resync_contract_sheets(SheetGroupId(999)),
        Err(StorageError::SheetGroupNotFound(SheetGroupId(999)))
    ));
}

#[test]
fn get_sheet_group_reads_back_and_reports_missing() {
    let storage = Storage::open_in_memory().expect("open storage");
    let created = storage
        .create_sheet_group(NewSheetGroup {
            sheetgroup_type: "section".to_string(),
            ..NewSheetGroup::new("ELEC", "Electrical", 3)
        })
        .expect("create group");

    assert_eq!(storage.get_sheet_group(created.id).expect("get group"), created);
    assert!(matches!(
        storage.get_sheet_group(SheetGroupId(404)),
        Err(StorageError::SheetGroupNotFound(SheetGroupId(404)))
    ));
}

#[test]
fn storage_backs_the_sync_engine_directly() {
    let storage = Storage::open_in_memory().expect("open storage");
    let group = storage
        .create_sheet_group(NewSheetGroup::new("G", "Group", 11))
        .expect("create group");
    let sheet = storage
        .create_contract_sheet(payload(json!({ "sheetgroup_id": group.id })))
        .expect("create sheet");

    let engine = SequenceSyncEngine::new(&storage);
    let prepared = engine
        .prepare_update_stored(sheet.id, payload(json!({ "sheet_code": "s" })))
        .expect("prepare update");

    assert_eq!(prepared.sheetgroup_seqno().expect("seqno"), Some(11));
    assert_eq!(
        engine
            .prepare_batch(vec![payload(json!({ "sheetgroup_id": group.id }))])
            .expect("prepare batch")[0]
            .sheetgroup_seqno()
            .expect("seqno"),
        Some(11)
    );
}

#[test]
fn writes_racing_a_seqno_change_end_up_with_the_new_seqno() {
    let storage = Storage::open_in_memory().expect("open storage");
    let group = storage
        .create_sheet_group(NewSheetGroup::new("G", "Group", 0))
        .expect("create group");
    let existing = storage
        .create_contract_sheet(payload(json!({ "contract_id": 1, "sheetgroup_id": group.id })))
        .expect("create sheet");

    for round in 1..=200_i64 {
        let barrier = Barrier::new(3);
        let (created, updated, moved) = thread::scope(|s| {
            let create = s.spawn(|| {
                barrier.wait();
                storage.create_contract_sheet(payload(json!({
                    "contract_id": 1,
                    "sheetgroup_id": group.id,
                })))
            });
            let update = s.spawn(|| {
                barrier.wait();
                storage.update_contract_sheet(
                    existing.id,
                    payload(json!({ "sheet_code": format!("r{round}") })),
                )
            });
            let set = s.spawn(|| {
                barrier.wait();
                storage.set_sheet_group_seqno(group.id, round)
            });
            (
                create.join().expect("create thread"),
                update.join().expect("update thread"),
                set.join().expect("seqno thread"),
            )
        });
        let created = created.expect("create sheet");
        updated.expect("update sheet");
        assert_eq!(moved.expect("set seqno").sheetgroup_seqno, round);

        for id in [created.id, existing.id] {
            assert_eq!(
                storage.get_contract_sheet(id).expect("reload").sheetgroup_seqno,
                Some(round),
                "round {round}, sheet {id}"
            );
        }
    }
}
