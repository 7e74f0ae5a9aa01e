// ドメインモデル（エンティティと値オブジェクト）

mod product;
mod user;
mod value_objects;

pub use value_objects::{ProductId, UserId};

pub use product::Product;
pub use user::User;
