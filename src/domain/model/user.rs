use crate::domain::model::UserId;

/// ユーザー集約
/// 注文処理パイプラインからは存在確認のためだけに参照される
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: UserId,
    name: String,
    age: u32,
}

impl User {
    /// 新しいユーザーを作成
    pub fn new(id: UserId, name: String, age: u32) -> Self {
        Self { id, name, age }
    }

    /// ユーザーIDを取得
    pub fn id(&self) -> UserId {
        self.id
    }

    /// 名前を取得
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 年齢を取得
    pub fn age(&self) -> u32 {
        self.age
    }

    /// 名前を変更
    pub fn rename(&mut self, name: String) {
        self.name = name;
    }

    /// 年齢を変更
    pub fn set_age(&mut self, age: u32) {
        self.age = age;
    }
}
