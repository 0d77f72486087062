//! PostgreSQL persistence: item store, durable task queue, and the
//! cross-process rate limiter, all sharing one pool.

pub mod config;
pub mod database;
pub mod item_repository;
pub mod rate_limiter;
pub mod task_queue;

pub use config::DatabaseConfig;
pub use database::Database;
pub use item_repository::ItemRepository;
pub use rate_limiter::PgRateLimiter;
pub use task_queue::PgTaskQueue;
