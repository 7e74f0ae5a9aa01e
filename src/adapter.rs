pub mod consumer_config;
pub mod database_config;
pub mod database_error;
pub mod database_migration;
pub mod driven;
pub mod driver;

pub use consumer_config::{ConsumerConfig, ServerConfig};
pub use database_config::{ConfigError, DatabaseConfig};
pub use database_migration::DatabaseMigration;
