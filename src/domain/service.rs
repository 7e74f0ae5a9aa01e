// ドメインサービス
// 注文メッセージの検証と在庫予約を担当する

mod order_validator;
mod stock_reservation;

pub use order_validator::{OrderValidator, ValidationOutcome};
pub use stock_reservation::{ReservationMode, ReservationOutcome, StockReservationEngine};

use crate::domain::port::RepositoryError;
use std::future::Future;
use std::time::Duration;

/// ストア操作のデフォルト制限時間
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// ストア操作を制限時間付きで実行する
/// 制限時間を超えた場合は `RepositoryError::TimedOut` として扱う
pub async fn with_store_timeout<T, F>(
    timeout: Duration,
    operation: &str,
    future: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::TimedOut(format!(
            "{} did not complete within {:?}",
            operation, timeout
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_store_timeout_passes_result_through() {
        let result = with_store_timeout(Duration::from_secs(1), "noop", async {
            Ok::<_, RepositoryError>(42)
        })
        .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_with_store_timeout_maps_elapsed_to_timed_out() {
        let result = with_store_timeout(Duration::from_millis(20), "slow read", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, RepositoryError>(())
        })
        .await;
        assert!(matches!(result, Err(RepositoryError::TimedOut(_))));
    }
}
