// アプリケーション層
// ユースケース（商品・ユーザーのCRUD）と注文キューのコンシューマーを提供する

pub mod consumer;
pub mod error;
pub mod service;

pub use error::ApplicationError;
