use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{User, UserId};
use crate::domain::port::{RepositoryError, UserRepository};
use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, Row};

/// MySQLユーザーリポジトリ
#[derive(Clone)]
pub struct MySqlUserRepository {
    pool: Pool<MySql>,
}

impl MySqlUserRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &MySqlRow) -> Result<User, RepositoryError> {
    let id: String = row.get("id");
    let user_id = UserId::from_string(&id).map_err(|e| {
        RepositoryError::FetchFailed(format!("ユーザーIDの解析に失敗しました: {}", e))
    })?;
    Ok(User::new(
        user_id,
        row.get::<String, _>("name"),
        row.get::<u32, _>("age"),
    ))
}

#[async_trait]
impl UserRepository for MySqlUserRepository {
    async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, age)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE
                name = VALUES(name),
                age = VALUES(age)
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.name())
        .bind(user.age())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("ユーザーの保存に失敗しました", e))
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, age FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ユーザーの取得に失敗しました", e))
            .map_err(RepositoryError::from)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, age FROM users ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ユーザー一覧の取得に失敗しました", e))
            .map_err(RepositoryError::from)?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update(&self, user: &User) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE users SET name = ?, age = ? WHERE id = ?")
            .bind(user.name())
            .bind(user.age())
            .bind(user.id().to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ユーザーの更新に失敗しました", e))
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ユーザーの削除に失敗しました", e))
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() > 0)
    }
}
