// 駆動される側アダプター（リポジトリ、キュー、ロガーの実装）

mod dead_letter_queue;
mod in_memory_queue;
mod in_memory_repository;
mod product_repository;
mod tracing_logger;
mod user_repository;

pub use dead_letter_queue::{InMemoryDeadLetterQueue, DEFAULT_DEAD_LETTER_MAX_SIZE};
pub use in_memory_queue::{
    DeliveryLedger, InMemoryOrderPublisher, InMemoryOrderQueue, DEFAULT_QUEUE_CAPACITY,
};
pub use in_memory_repository::{InMemoryProductRepository, InMemoryUserRepository};
pub use product_repository::MySqlProductRepository;
pub use tracing_logger::{init_tracing, TracingLogger};
pub use user_repository::MySqlUserRepository;
