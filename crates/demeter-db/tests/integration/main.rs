mod common;
mod item_repository_tests;
mod rate_limiter_tests;
mod task_queue_tests;
