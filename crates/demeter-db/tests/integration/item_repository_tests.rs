use serde_json::json;

use demeter_core::item::{BasicRecord, ItemPhase};
use demeter_core::traits::ItemStore;
use demeter_db::ItemRepository;

use crate::common::setup_test_db;

fn records(ids: &[&str]) -> Vec<BasicRecord> {
    ids.iter()
        .map(|id| BasicRecord::new(*id, json!({"id": id, "author": id.split('/').next()})))
        .collect()
}

#[tokio::test]
async fn bulk_upsert_inserts_basic_rows() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    repo.bulk_upsert_basic("models", &records(&["acme/a", "acme/b"]))
        .await
        .unwrap();

    let stats = repo.stats("models").await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.basic, 2);
    assert_eq!(stats.extended, 0);
    assert_eq!(
        repo.phase("models", "acme/a").await.unwrap(),
        Some(ItemPhase::Basic)
    );
    assert_eq!(repo.phase("models", "missing/x").await.unwrap(), None);
}

#[tokio::test]
async fn extended_upsert_promotes_phase() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    repo.bulk_upsert_basic("models", &records(&["acme/a"]))
        .await
        .unwrap();
    repo.upsert_extended("models", "acme/a", &json!({"likers": ["bob"]}))
        .await
        .unwrap();

    assert_eq!(
        repo.phase("models", "acme/a").await.unwrap(),
        Some(ItemPhase::Extended)
    );
    let stats = repo.stats("models").await.unwrap();
    assert_eq!(stats.extended, 1);
}

#[tokio::test]
async fn extended_upsert_for_unknown_id_is_a_noop() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    repo.upsert_extended("models", "never/seen", &json!({"likers": []}))
        .await
        .unwrap();

    assert_eq!(repo.phase("models", "never/seen").await.unwrap(), None);
    assert_eq!(repo.stats("models").await.unwrap().total, 0);
}

#[tokio::test]
async fn rescrape_overwrites_and_resets_phase() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    repo.bulk_upsert_basic("models", &records(&["acme/a"]))
        .await
        .unwrap();
    repo.upsert_extended("models", "acme/a", &json!({"likers": []}))
        .await
        .unwrap();

    repo.bulk_upsert_basic(
        "models",
        &[BasicRecord::new("acme/a", json!({"id": "acme/a", "likes": 5}))],
    )
    .await
    .unwrap();

    assert_eq!(
        repo.phase("models", "acme/a").await.unwrap(),
        Some(ItemPhase::Basic)
    );
    let stats = repo.stats("models").await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.basic, 1);
}

#[tokio::test]
async fn list_authors_is_distinct_across_types() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    repo.bulk_upsert_basic("models", &records(&["acme/a", "acme/b", "zeta/c"]))
        .await
        .unwrap();
    repo.bulk_upsert_basic("datasets", &records(&["acme/d"]))
        .await
        .unwrap();
    // No author field at all
    repo.bulk_upsert_basic("models", &[BasicRecord::new("solo", json!({"id": "solo"}))])
        .await
        .unwrap();

    let authors = repo.list_authors(&["models", "datasets"]).await.unwrap();
    assert_eq!(authors, vec!["acme".to_string(), "zeta".to_string()]);

    let model_authors = repo.list_authors(&["models"]).await.unwrap();
    assert_eq!(model_authors, vec!["acme".to_string(), "zeta".to_string()]);
}

#[tokio::test]
async fn list_item_ids_is_scoped_by_type() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    repo.bulk_upsert_basic("models", &records(&["acme/a"]))
        .await
        .unwrap();
    repo.bulk_upsert_basic("datasets", &records(&["acme/d", "acme/e"]))
        .await
        .unwrap();

    assert_eq!(
        repo.list_item_ids("datasets").await.unwrap(),
        vec!["acme/d".to_string(), "acme/e".to_string()]
    );
    assert_eq!(
        repo.list_item_ids("models").await.unwrap(),
        vec!["acme/a".to_string()]
    );
}

#[tokio::test]
async fn empty_bulk_upsert_is_accepted() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    repo.bulk_upsert_basic("models", &[]).await.unwrap();
    assert_eq!(repo.stats("models").await.unwrap().total, 0);
}
