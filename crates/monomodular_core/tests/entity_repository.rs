mod common;

use common::{stored_count, widget_context, Widget};
use monomodular_core::{
    EntityRepository, EntityState, EnvironmentRecord, SqliteEntityRepository, StorageContext,
    StoreError,
};
use serde_json::json;
use std::collections::BTreeSet;

fn open() -> StorageContext {
    StorageContext::open_in_memory().unwrap()
}

#[test]
fn add_commit_and_get_by_id_roundtrip() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let record = EnvironmentRecord::new(1, "a");
    repo.add(&record).unwrap();
    ctx.save_changes().unwrap();

    let loaded = repo.get_by_id(&1).unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.key, "a");
}

#[test]
fn get_by_id_returns_none_for_missing_key() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    assert!(repo.get_by_id(&404).unwrap().is_none());
}

#[test]
fn remove_by_id_on_empty_store_is_silent_noop() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    repo.remove_by_id(&1).unwrap();

    assert_eq!(ctx.pending_changes(), 0);
    assert_eq!(ctx.save_changes().unwrap(), 0);
    assert_eq!(stored_count(&ctx, "environments"), 0);
}

#[test]
fn remove_by_id_stages_delete_for_existing_row() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);
    repo.add(&EnvironmentRecord::new(5, "doomed")).unwrap();
    ctx.save_changes().unwrap();

    repo.remove_by_id(&5).unwrap();
    assert_eq!(
        ctx.entity_state::<EnvironmentRecord>(&5),
        Some(EntityState::Deleted)
    );
    assert!(repo.get_by_id(&5).unwrap().is_none());

    ctx.save_changes().unwrap();
    assert_eq!(stored_count(&ctx, "environments"), 0);
}

#[test]
fn add_range_persists_exactly_the_supplied_set() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    repo.add_range(&[EnvironmentRecord::new(3, "c"), EnvironmentRecord::new(2, "b")])
        .unwrap();
    assert_eq!(ctx.save_changes().unwrap(), 2);

    let ids: Vec<i64> = repo
        .as_queryable()
        .to_list()
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids.into_iter().collect::<BTreeSet<_>>(), BTreeSet::from([2, 3]));
}

#[test]
fn add_range_with_duplicate_key_stages_nothing() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let err = repo
        .add_range(&[
            EnvironmentRecord::new(1, "a"),
            EnvironmentRecord::new(2, "b"),
            EnvironmentRecord::new(1, "again"),
        ])
        .unwrap_err();

    assert!(matches!(err, StoreError::AlreadyTracked { table: "environments", .. }));
    assert_eq!(ctx.pending_changes(), 0);
}

#[test]
fn adding_an_already_staged_key_is_rejected() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    repo.add(&EnvironmentRecord::new(1, "a")).unwrap();
    let err = repo.add(&EnvironmentRecord::new(1, "b")).unwrap_err();

    assert!(matches!(err, StoreError::AlreadyTracked { .. }));
    assert_eq!(ctx.pending_changes(), 1);
}

#[test]
fn update_persists_current_field_values() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let mut record = EnvironmentRecord::new(1, "feature.flag").with_value(json!(false));
    repo.add(&record).unwrap();
    ctx.save_changes().unwrap();

    record.value = Some(json!(true));
    record.metadata.description = Some("rolled out".to_string());
    repo.update(&record).unwrap();
    ctx.save_changes().unwrap();

    let loaded = repo.get_by_id(&1).unwrap().unwrap();
    assert_eq!(loaded.value, Some(json!(true)));
    assert_eq!(loaded.metadata.description.as_deref(), Some("rolled out"));
}

#[test]
fn update_of_staged_insert_keeps_it_an_insert() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let mut record = EnvironmentRecord::new(9, "draft");
    repo.add(&record).unwrap();
    record.key = "final".to_string();
    repo.update(&record).unwrap();

    assert_eq!(
        ctx.entity_state::<EnvironmentRecord>(&9),
        Some(EntityState::Added)
    );
    ctx.save_changes().unwrap();
    assert_eq!(repo.get_by_id(&9).unwrap().unwrap().key, "final");
}

#[test]
fn update_range_and_remove_range_stage_every_entity() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);
    let mut records = vec![
        EnvironmentRecord::new(1, "a"),
        EnvironmentRecord::new(2, "b"),
        EnvironmentRecord::new(3, "c"),
    ];
    repo.add_range(&records).unwrap();
    ctx.save_changes().unwrap();

    for record in &mut records {
        record.value = Some(json!(record.id * 10));
    }
    repo.update_range(&records[..2]).unwrap();
    repo.remove_range(&records[2..]).unwrap();
    assert_eq!(ctx.pending_changes(), 3);
    ctx.save_changes().unwrap();

    assert_eq!(repo.get_by_id(&1).unwrap().unwrap().value, Some(json!(10)));
    assert_eq!(repo.get_by_id(&2).unwrap().unwrap().value, Some(json!(20)));
    assert!(repo.get_by_id(&3).unwrap().is_none());
}

#[test]
fn staged_insert_is_visible_to_get_by_id_but_not_to_queries() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    repo.add(&EnvironmentRecord::new(1, "pending")).unwrap();

    assert_eq!(repo.get_by_id(&1).unwrap().unwrap().key, "pending");
    assert_eq!(repo.as_queryable().count().unwrap(), 0);
}

#[test]
fn removing_a_staged_insert_unstages_it() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let record = EnvironmentRecord::new(1, "temp");
    repo.add(&record).unwrap();
    repo.remove(&record).unwrap();

    assert_eq!(ctx.pending_changes(), 0);
    assert!(ctx.entity_state::<EnvironmentRecord>(&1).is_none());
    assert_eq!(ctx.save_changes().unwrap(), 0);
}

#[test]
fn update_of_unknown_row_fails_at_commit_and_keeps_changes() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    repo.update(&EnvironmentRecord::new(77, "ghost")).unwrap();
    let err = ctx.save_changes().unwrap_err();

    assert!(matches!(
        err,
        StoreError::ConcurrencyConflict { table: "environments", .. }
    ));
    assert_eq!(ctx.pending_changes(), 1);
}

#[test]
fn constraint_violation_rolls_back_whole_commit() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);
    repo.add(&EnvironmentRecord::new(1, "shared")).unwrap();
    ctx.save_changes().unwrap();

    repo.add(&EnvironmentRecord::new(2, "unique")).unwrap();
    repo.add(&EnvironmentRecord::new(3, "shared")).unwrap();
    let err = ctx.save_changes().unwrap_err();

    assert!(matches!(err, StoreError::Db(_)));
    assert_eq!(stored_count(&ctx, "environments"), 1);
    assert_eq!(ctx.pending_changes(), 2);
}

#[test]
fn blank_key_is_rejected_before_staging() {
    let ctx = open();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let err = repo.add(&EnvironmentRecord::new(1, "   ")).unwrap_err();

    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(ctx.pending_changes(), 0);
}

#[test]
fn repository_is_generic_over_uuid_keys() {
    let ctx = widget_context();
    let repo = SqliteEntityRepository::<Widget>::new(&ctx);

    let mut bolt = Widget::new("bolt", 3);
    let nut = Widget::new("nut", 1);
    repo.add_range(&[bolt.clone(), nut.clone()]).unwrap();
    ctx.save_changes().unwrap();

    bolt.weight = 4;
    repo.update(&bolt).unwrap();
    repo.remove_by_id(&nut.id).unwrap();
    ctx.save_changes().unwrap();

    assert_eq!(repo.get_by_id(&bolt.id).unwrap().unwrap().weight, 4);
    assert!(repo.get_by_id(&nut.id).unwrap().is_none());
    assert_eq!(stored_count(&ctx, "widgets"), 1);
}

#[test]
fn repositories_sharing_a_context_commit_together() {
    let ctx = widget_context();
    let environments = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);
    let widgets = SqliteEntityRepository::<Widget>::new(&ctx);

    environments.add(&EnvironmentRecord::new(1, "a")).unwrap();
    widgets.add(&Widget::new("gear", 2)).unwrap();
    assert_eq!(ctx.pending_changes(), 2);

    assert_eq!(ctx.save_changes().unwrap(), 2);
    assert_eq!(stored_count(&ctx, "environments"), 1);
    assert_eq!(stored_count(&ctx, "widgets"), 1);
}

#[test]
fn committed_rows_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite3");

    {
        let ctx = StorageContext::open(&path).unwrap();
        let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);
        repo.add(&EnvironmentRecord::new(1, "durable").with_value(json!({"n": 1})))
            .unwrap();
        ctx.save_changes().unwrap();
        ctx.dispose().unwrap();
    }

    let ctx = StorageContext::open(&path).unwrap();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);
    let loaded = repo.get_by_id(&1).unwrap().unwrap();
    assert_eq!(loaded.value, Some(json!({"n": 1})));
}
