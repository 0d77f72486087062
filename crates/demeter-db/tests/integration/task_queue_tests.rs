use demeter_core::task::Task;
use demeter_core::traits::TaskQueue;
use demeter_db::PgTaskQueue;

use crate::common::setup_test_db;

#[tokio::test]
async fn pop_returns_none_on_empty_channel() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool);

    assert!(queue.pop("models").await.unwrap().is_none());
}

#[tokio::test]
async fn push_pop_preserves_fifo_order() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool);

    for id in ["acme/a", "acme/b", "acme/c"] {
        queue.push(&Task::new(id, "models")).await.unwrap();
    }

    let mut popped = Vec::new();
    while let Some(task) = queue.pop("models").await.unwrap() {
        popped.push(task.item_id);
    }
    assert_eq!(popped, vec!["acme/a", "acme/b", "acme/c"]);
}

#[tokio::test]
async fn channels_are_isolated_by_item_type() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool);

    queue.push(&Task::new("acme/m", "models")).await.unwrap();
    queue.push(&Task::new("acme/d", "datasets")).await.unwrap();

    assert!(queue.pop("organizations").await.unwrap().is_none());
    let dataset_task = queue.pop("datasets").await.unwrap().unwrap();
    assert_eq!(dataset_task.item_id, "acme/d");
    assert!(queue.pop("datasets").await.unwrap().is_none());
    assert!(queue.pop("models").await.unwrap().is_some());
}

#[tokio::test]
async fn task_fields_survive_the_roundtrip() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool);

    let original = Task::new("acme/a", "models").retry().retry();
    queue.push(&original).await.unwrap();

    let popped = queue.pop("models").await.unwrap().unwrap();
    assert_eq!(popped, original);
    assert_eq!(popped.retry_count, 2);
    assert_eq!(popped.task_id, "models:acme/a");
}

#[tokio::test]
async fn concurrent_pops_never_deliver_twice() {
    let (pool, _container) = setup_test_db().await;
    let queue = PgTaskQueue::new(pool);

    for i in 0..20 {
        queue
            .push(&Task::new(format!("acme/m{i}"), "models"))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(task) = queue.pop("models").await.unwrap() {
                seen.push(task.item_id);
            }
            seen
        }));
    }

    let mut all: Vec<String> = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 20);
}
