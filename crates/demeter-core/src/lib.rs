pub mod error;
pub mod item;
pub mod pipeline;
pub mod progress;
pub mod task;
pub mod testutil;
pub mod traits;
pub mod util;

pub use error::AppError;
pub use item::{BasicRecord, ItemPhase, ItemStats, StatusFlags};
pub use pipeline::{Pipeline, PipelineConfig};
pub use progress::{PipelineReporter, SilentReporter, TracingReporter};
pub use task::Task;
pub use traits::{ItemStore, RateLimiter, Scraper, TaskQueue};
