use monomodular_core::{
    CancellationToken, EntityRepository, EnvironmentRecord, SqliteEntityRepository,
    StorageContext, StoreError,
};

#[tokio::test]
async fn get_by_id_async_returns_committed_entity() {
    let ctx = StorageContext::open_in_memory().unwrap();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);
    repo.add(&EnvironmentRecord::new(1, "a")).unwrap();
    ctx.save_changes().unwrap();

    let token = CancellationToken::new();
    let loaded = repo.get_by_id_async(&1, &token).await.unwrap();

    assert_eq!(loaded.map(|record| record.key), Some("a".to_string()));
}

#[tokio::test]
async fn get_by_id_async_returns_none_for_missing_key() {
    let ctx = StorageContext::open_in_memory().unwrap();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let token = CancellationToken::new();
    assert!(repo.get_by_id_async(&2, &token).await.unwrap().is_none());
}

#[tokio::test]
async fn get_by_id_async_with_cancelled_token_reports_cancellation() {
    let ctx = StorageContext::open_in_memory().unwrap();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);
    repo.add(&EnvironmentRecord::new(1, "a")).unwrap();
    ctx.save_changes().unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let result = repo.get_by_id_async(&1, &token).await;

    assert!(matches!(result, Err(StoreError::Cancelled)));
}

#[tokio::test]
async fn cancellation_through_child_token_is_observed() {
    let ctx = StorageContext::open_in_memory().unwrap();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let parent = CancellationToken::new();
    let child = parent.child_token();
    parent.cancel();

    let result = repo.get_by_id_async(&1, &child).await;
    assert!(matches!(result, Err(StoreError::Cancelled)));
}

#[tokio::test]
async fn add_async_stages_entity() {
    let ctx = StorageContext::open_in_memory().unwrap();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let token = CancellationToken::new();
    repo.add_async(&EnvironmentRecord::new(4, "d"), &token)
        .await
        .unwrap();
    ctx.save_changes().unwrap();

    assert_eq!(repo.as_queryable().count().unwrap(), 1);
}

#[tokio::test]
async fn cancelled_add_async_stages_nothing() {
    let ctx = StorageContext::open_in_memory().unwrap();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let token = CancellationToken::new();
    token.cancel();
    let result = repo.add_async(&EnvironmentRecord::new(4, "d"), &token).await;

    assert!(matches!(result, Err(StoreError::Cancelled)));
    assert_eq!(ctx.pending_changes(), 0);
}

#[tokio::test]
async fn add_range_async_stages_all_entities() {
    let ctx = StorageContext::open_in_memory().unwrap();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let token = CancellationToken::new();
    repo.add_range_async(
        &[EnvironmentRecord::new(1, "a"), EnvironmentRecord::new(2, "b")],
        &token,
    )
    .await
    .unwrap();

    assert_eq!(ctx.pending_changes(), 2);
    assert_eq!(ctx.save_changes().unwrap(), 2);
}

#[tokio::test]
async fn cancelled_add_range_async_stages_nothing() {
    let ctx = StorageContext::open_in_memory().unwrap();
    let repo = SqliteEntityRepository::<EnvironmentRecord>::new(&ctx);

    let token = CancellationToken::new();
    token.cancel();
    let result = repo
        .add_range_async(&[EnvironmentRecord::new(1, "a")], &token)
        .await;

    assert!(matches!(result, Err(StoreError::Cancelled)));
    assert_eq!(ctx.pending_changes(), 0);
}
