use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ユーザー作成用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// 省略時は新しいIDを割り当てる
    pub id: Option<Uuid>,
    pub name: String,
    pub age: u32,
}

/// ユーザー更新用のリクエストDTO（指定したフィールドだけ更新する）
#[derive(Serialize, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub age: Option<u32>,
}

/// 商品作成用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CreateProductRequest {
    /// 省略時は新しいIDを割り当てる
    pub id: Option<Uuid>,
    pub name: String,
    pub quantity: u32,
}

/// 商品更新用のリクエストDTO（指定したフィールドだけ更新する）
#[derive(Serialize, Deserialize, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub quantity: Option<u32>,
}

/// 注文投入用のリクエストDTO
/// キューに流れる注文メッセージと同じ形
#[derive(Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(rename = "productID")]
    pub product_id: String,
    pub quantity: i64,
    #[serde(rename = "userID")]
    pub user_id: String,
}
