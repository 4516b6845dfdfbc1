pub mod item_ctx;
pub mod item_executor;
pub mod sampler;
pub mod task_strategy;

pub use item_ctx::ItemCtx;
pub use item_executor::{ItemExecutor, ItemStrategy};
pub use sampler::Sampler;
pub use task_strategy::TaskStrategy;
