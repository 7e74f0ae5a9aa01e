use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{Product, ProductId};
use crate::domain::port::{ProductPatch, ProductRepository, RepositoryError, StockDecrement};
use async_trait::async_trait;

// MySQL関連のインポート
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Pool, Row};

/// MySQL商品リポジトリ
/// MySQLデータベースを使用して商品を永続化する
#[derive(Clone)]
pub struct MySqlProductRepository {
    pool: Pool<MySql>,
}

impl MySqlProductRepository {
    /// 新しいMySQL商品リポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// 在庫数だけを読み取る
    async fn fetch_quantity(&self, product_id: ProductId) -> Result<Option<u32>, RepositoryError> {
        let row = sqlx::query("SELECT quantity FROM products WHERE id = ?")
            .bind(product_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("在庫数の取得に失敗しました", e))
            .map_err(RepositoryError::from)?;

        Ok(row.map(|row| row.get::<u32, _>("quantity")))
    }
}

fn product_from_row(row: &MySqlRow) -> Result<Product, RepositoryError> {
    let id: String = row.get("id");
    let product_id = ProductId::from_string(&id).map_err(|e| {
        RepositoryError::FetchFailed(format!("商品IDの解析に失敗しました: {}", e))
    })?;
    Ok(Product::new(
        product_id,
        row.get::<String, _>("name"),
        row.get::<u32, _>("quantity"),
    ))
}

#[async_trait]
impl ProductRepository for MySqlProductRepository {
    async fn save(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, quantity)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE
                name = VALUES(name),
                quantity = VALUES(quantity)
            "#,
        )
        .bind(product.id().to_string())
        .bind(product.name())
        .bind(product.quantity())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("商品の保存に失敗しました", e))
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_by_id(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, quantity FROM products WHERE id = ?")
            .bind(product_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("商品の取得に失敗しました", e))
            .map_err(RepositoryError::from)?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, quantity FROM products ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("商品一覧の取得に失敗しました", e))
            .map_err(RepositoryError::from)?;

        rows.iter().map(product_from_row).collect()
    }

    async fn update(&self, product: &Product) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE products SET name = ?, quantity = ? WHERE id = ?")
            .bind(product.name())
            .bind(product.quantity())
            .bind(product.id().to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("商品の更新に失敗しました", e))
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn patch(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        if !patch.is_empty() {
            // 指定されなかった列は現在値のまま残る
            sqlx::query(
                r#"
                UPDATE products
                SET name = COALESCE(?, name),
                    quantity = COALESCE(?, quantity)
                WHERE id = ?
                "#,
            )
            .bind(patch.name)
            .bind(patch.quantity)
            .bind(product_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("商品の部分更新に失敗しました", e))
            .map_err(RepositoryError::from)?;
        }

        // 値が変わらない更新は rows_affected が0になるため、存在確認は読み直しで行う
        self.find_by_id(product_id).await
    }

    async fn delete(&self, product_id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(product_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("商品の削除に失敗しました", e))
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn decrement_stock_if_available(
        &self,
        product_id: ProductId,
        requested: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        // 条件と減算を1文で行う。行ロックの下で評価されるため同時実行でも負にならない
        let result = sqlx::query(
            "UPDATE products SET quantity = quantity - ? WHERE id = ? AND quantity >= ?",
        )
        .bind(requested)
        .bind(product_id.to_string())
        .bind(requested)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("在庫の減算に失敗しました", e))
        .map_err(RepositoryError::from)?;

        if result.rows_affected() > 0 {
            return Ok(StockDecrement::Applied);
        }

        // 条件不成立の理由を区別する
        Ok(match self.fetch_quantity(product_id).await? {
            Some(available) => StockDecrement::InsufficientStock { available },
            None => StockDecrement::NotFound,
        })
    }
}
