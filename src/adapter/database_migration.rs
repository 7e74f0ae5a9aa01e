use crate::adapter::database_error::DatabaseError;
use crate::domain::port::Logger;
use sqlx::{MySql, Pool};
use std::collections::HashMap;
use std::sync::Arc;

const COMPONENT: &str = "DatabaseMigration";

/// 起動時に適用するマイグレーション（名前, SQL）
const MIGRATIONS: [(&str, &str); 2] = [
    (
        "001_create_products_table",
        include_str!("../../migrations/001_create_products_table.sql"),
    ),
    (
        "002_create_users_table",
        include_str!("../../migrations/002_create_users_table.sql"),
    ),
];

/// データベースマイグレーションを管理する構造体
pub struct DatabaseMigration {
    pool: Pool<MySql>,
    logger: Arc<dyn Logger>,
}

impl DatabaseMigration {
    /// 新しいDatabaseMigrationインスタンスを作成
    pub fn new(pool: Pool<MySql>, logger: Arc<dyn Logger>) -> Self {
        Self { pool, logger }
    }

    /// マイグレーションを順番に実行する
    /// 各SQLは `CREATE TABLE IF NOT EXISTS` なので繰り返し実行してよい
    pub async fn run(&self) -> Result<(), DatabaseError> {
        for (name, sql) in MIGRATIONS {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationError(format!("{} failed: {}", name, e)))?;
            self.logger.debug(
                COMPONENT,
                "Migration applied",
                None,
                Some(HashMap::from([("migration".to_string(), name.to_string())])),
            );
        }

        self.logger.info(
            COMPONENT,
            &format!("{} migrations applied", MIGRATIONS.len()),
            None,
            None,
        );
        Ok(())
    }
}
