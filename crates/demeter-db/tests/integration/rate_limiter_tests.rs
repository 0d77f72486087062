use demeter_core::traits::RateLimiter;
use demeter_db::PgRateLimiter;

use crate::common::setup_test_db;

#[tokio::test]
async fn admits_up_to_limit_then_denies() {
    let (pool, _container) = setup_test_db().await;
    let limiter = PgRateLimiter::new(pool);

    for _ in 0..3 {
        assert!(limiter.admit("likers", 3).await.unwrap());
    }
    assert!(!limiter.admit("likers", 3).await.unwrap());
}

#[tokio::test]
async fn keys_have_independent_windows() {
    let (pool, _container) = setup_test_db().await;
    let limiter = PgRateLimiter::new(pool);

    assert!(limiter.admit("likers", 1).await.unwrap());
    assert!(!limiter.admit("likers", 1).await.unwrap());
    assert!(limiter.admit("followers", 1).await.unwrap());
}

#[tokio::test]
async fn concurrent_admissions_respect_the_limit() {
    let (pool, _container) = setup_test_db().await;
    let limiter = PgRateLimiter::new(pool);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(
            async move { limiter.admit("upvoters", 5).await },
        ));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 5);
}

#[tokio::test]
async fn stale_admissions_age_out_of_the_window() {
    let (pool, _container) = setup_test_db().await;
    let limiter = PgRateLimiter::new(pool.clone());

    // A two-minute-old admission no longer counts against the limit.
    sqlx::query(
        "INSERT INTO rate_limit_admissions (key, admitted_at)
         VALUES ($1, NOW() - INTERVAL '2 minutes')",
    )
    .bind("rate_limit:likers")
    .execute(&pool)
    .await
    .unwrap();

    assert!(limiter.admit("likers", 1).await.unwrap());
    assert!(!limiter.admit("likers", 1).await.unwrap());

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM rate_limit_admissions WHERE key = $1")
            .bind("rate_limit:likers")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn denied_admission_leaves_no_trace() {
    let (pool, _container) = setup_test_db().await;
    let limiter = PgRateLimiter::new(pool.clone());

    assert!(limiter.admit("search_datasets", 1).await.unwrap());
    for _ in 0..5 {
        assert!(!limiter.admit("search_datasets", 1).await.unwrap());
    }

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM rate_limit_admissions WHERE key = $1")
            .bind("rate_limit:search_datasets")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}
