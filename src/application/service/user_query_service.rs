use crate::application::ApplicationError;
use crate::domain::model::{User, UserId};
use crate::domain::port::UserRepository;
use crate::domain::service::with_store_timeout;
use std::sync::Arc;
use std::time::Duration;

/// ユーザークエリサービス
/// 読み取り専用のユーザー操作を提供する
pub struct UserQueryService {
    user_repository: Arc<dyn UserRepository>,
    store_timeout: Duration,
}

impl UserQueryService {
    /// 新しいユーザークエリサービスを作成
    pub fn new(user_repository: Arc<dyn UserRepository>, store_timeout: Duration) -> Self {
        Self {
            user_repository,
            store_timeout,
        }
    }

    /// ユーザーIDでユーザーを取得
    pub async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<User>, ApplicationError> {
        with_store_timeout(
            self.store_timeout,
            "user lookup",
            self.user_repository.find_by_id(user_id),
        )
        .await
        .map_err(ApplicationError::from)
    }

    /// すべてのユーザーを取得
    pub async fn get_all_users(&self) -> Result<Vec<User>, ApplicationError> {
        with_store_timeout(
            self.store_timeout,
            "user listing",
            self.user_repository.find_all(),
        )
        .await
        .map_err(ApplicationError::from)
    }
}
