use crate::domain::model::UserId;
use crate::domain::port::UserRepository;
use crate::domain::service::with_store_timeout;
use std::sync::Arc;
use std::time::Duration;

/// ユーザー検証の結果
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// ユーザーが存在する
    Valid,
    /// ユーザーIDをストアのキーとして解析できない
    InvalidIdentifier,
    /// ユーザーが存在しない
    UnknownUser,
    /// 読み取りに失敗した（タイムアウトを含む）
    StoreError(String),
}

impl ValidationOutcome {
    /// 検証を通過したか
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    /// ログ出力用のラベル
    pub fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::Valid => "valid",
            ValidationOutcome::InvalidIdentifier => "invalid_identifier",
            ValidationOutcome::UnknownUser => "unknown_user",
            ValidationOutcome::StoreError(_) => "store_error",
        }
    }
}

/// 注文バリデーター
/// 注文メッセージが参照するユーザーの存在を確認する。副作用は持たない
pub struct OrderValidator {
    user_repository: Arc<dyn UserRepository>,
    store_timeout: Duration,
}

impl OrderValidator {
    /// 新しい注文バリデーターを作成
    ///
    /// # Arguments
    /// * `user_repository` - ユーザーリポジトリ
    /// * `store_timeout` - 1回の読み取りに許す時間
    pub fn new(user_repository: Arc<dyn UserRepository>, store_timeout: Duration) -> Self {
        Self {
            user_repository,
            store_timeout,
        }
    }

    /// ユーザーIDを検証し、失敗理由を含む結果を返す
    pub async fn check(&self, user_id: &str) -> ValidationOutcome {
        let user_id = match UserId::from_string(user_id) {
            Ok(id) => id,
            Err(_) => return ValidationOutcome::InvalidIdentifier,
        };

        let found = with_store_timeout(
            self.store_timeout,
            "user lookup",
            self.user_repository.find_by_id(user_id),
        )
        .await;

        match found {
            Ok(Some(_)) => ValidationOutcome::Valid,
            Ok(None) => ValidationOutcome::UnknownUser,
            Err(e) => ValidationOutcome::StoreError(e.to_string()),
        }
    }

    /// ユーザーIDを検証する
    ///
    /// # Returns
    /// * `true` - ユーザーが存在する
    /// * `false` - IDが不正、ユーザーが存在しない、または読み取りに失敗した
    pub async fn validate(&self, user_id: &str) -> bool {
        self.check(user_id).await.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::driven::InMemoryUserRepository;
    use crate::domain::model::User;
    use crate::domain::port::RepositoryError;
    use async_trait::async_trait;

    // 常に失敗するユーザーリポジトリ
    struct FailingUserRepository;

    #[async_trait]
    impl UserRepository for FailingUserRepository {
        async fn save(&self, _user: &User) -> Result<(), RepositoryError> {
            Err(RepositoryError::ConnectionFailed("down".to_string()))
        }

        async fn find_by_id(&self, _user_id: UserId) -> Result<Option<User>, RepositoryError> {
            Err(RepositoryError::ConnectionFailed("down".to_string()))
        }

        async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
            Err(RepositoryError::ConnectionFailed("down".to_string()))
        }

        async fn update(&self, _user: &User) -> Result<bool, RepositoryError> {
            Err(RepositoryError::ConnectionFailed("down".to_string()))
        }

        async fn delete(&self, _user_id: UserId) -> Result<bool, RepositoryError> {
            Err(RepositoryError::ConnectionFailed("down".to_string()))
        }
    }

    // 応答が返ってこないユーザーリポジトリ
    struct HangingUserRepository;

    #[async_trait]
    impl UserRepository for HangingUserRepository {
        async fn save(&self, _user: &User) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn find_by_id(&self, _user_id: UserId) -> Result<Option<User>, RepositoryError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }

        async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn update(&self, _user: &User) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn delete(&self, _user_id: UserId) -> Result<bool, RepositoryError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_existing_user_is_valid() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = User::new(UserId::new(), "Alice".to_string(), 30);
        repo.save(&user).await.unwrap();

        let validator = OrderValidator::new(repo, Duration::from_secs(1));
        assert!(validator.validate(&user.id().to_string()).await);
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let validator = OrderValidator::new(
            Arc::new(InMemoryUserRepository::new()),
            Duration::from_secs(1),
        );
        let outcome = validator.check(&UserId::new().to_string()).await;
        assert_eq!(outcome, ValidationOutcome::UnknownUser);
        assert!(!outcome.is_valid());
    }

    #[tokio::test]
    async fn test_malformed_identifier_fails_closed() {
        let validator = OrderValidator::new(
            Arc::new(InMemoryUserRepository::new()),
            Duration::from_secs(1),
        );
        assert_eq!(
            validator.check("65f0c0ffee").await,
            ValidationOutcome::InvalidIdentifier
        );
        assert!(!validator.validate("").await);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let validator = OrderValidator::new(Arc::new(FailingUserRepository), Duration::from_secs(1));
        let outcome = validator.check(&UserId::new().to_string()).await;
        assert!(matches!(outcome, ValidationOutcome::StoreError(_)));
        assert_eq!(outcome.label(), "store_error");
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let validator =
            OrderValidator::new(Arc::new(HangingUserRepository), Duration::from_millis(20));
        let outcome = validator.check(&UserId::new().to_string()).await;
        match outcome {
            ValidationOutcome::StoreError(msg) => assert!(msg.contains("Timed out")),
            other => panic!("Expected StoreError, got {:?}", other),
        }
    }
}
