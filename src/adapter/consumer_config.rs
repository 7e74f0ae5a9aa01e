use crate::adapter::database_config::{env_or, parse_env_or, ConfigError};
use crate::adapter::driven::DEFAULT_DEAD_LETTER_MAX_SIZE;
use crate::application::consumer::{AckMode, ConsumerSettings};
use crate::domain::service::{ReservationMode, DEFAULT_STORE_TIMEOUT};
use std::time::Duration;

/// 注文コンシューマーの設定
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub pacing: Duration,
    pub max_in_flight: usize,
    pub ack_mode: AckMode,
    pub reservation_mode: ReservationMode,
    pub store_timeout: Duration,
    pub dead_letter_max_size: usize,
}

impl ConsumerConfig {
    /// 環境変数から設定を読み取る
    ///
    /// * `ORDER_PACING_MS` - 1件ごとの待機時間（ミリ秒、デフォルト1000）
    /// * `ORDER_MAX_IN_FLIGHT` - 同時予約タスク数の上限（デフォルト32）
    /// * `ORDER_ACK_MODE` - `after_outcome` または `on_receipt`
    /// * `RESERVATION_MODE` - `atomic` または `read_then_write`
    /// * `STORE_TIMEOUT_SECS` - ストア操作の制限時間（秒、デフォルト10）
    /// * `DEAD_LETTER_MAX_SIZE` - デッドレターの保持上限（1以上、デフォルト1000）
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ConsumerSettings::default();

        let pacing_ms = parse_env_or(
            "ORDER_PACING_MS",
            u64::try_from(defaults.pacing.as_millis()).unwrap_or(u64::MAX),
        )?;

        let max_in_flight = parse_env_or("ORDER_MAX_IN_FLIGHT", defaults.max_in_flight)?;
        if max_in_flight == 0 {
            return Err(ConfigError::InvalidValue(
                "Invalid ORDER_MAX_IN_FLIGHT: must be at least 1".to_string(),
            ));
        }

        let ack_mode = AckMode::from_string(&env_or("ORDER_ACK_MODE", "after_outcome"))
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid ORDER_ACK_MODE: {}", e)))?;

        let reservation_mode =
            ReservationMode::from_string(&env_or("RESERVATION_MODE", "atomic")).map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid RESERVATION_MODE: {}", e))
            })?;

        let store_timeout_secs =
            parse_env_or("STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT.as_secs())?;
        if store_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "Invalid STORE_TIMEOUT_SECS: must be at least 1".to_string(),
            ));
        }

        let dead_letter_max_size =
            parse_env_or("DEAD_LETTER_MAX_SIZE", DEFAULT_DEAD_LETTER_MAX_SIZE)?;
        if dead_letter_max_size == 0 {
            return Err(ConfigError::InvalidValue(
                "Invalid DEAD_LETTER_MAX_SIZE: must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            pacing: Duration::from_millis(pacing_ms),
            max_in_flight,
            ack_mode,
            reservation_mode,
            store_timeout: Duration::from_secs(store_timeout_secs),
            dead_letter_max_size,
        })
    }

    /// コンシューマーに渡す設定
    pub fn settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            pacing: self.pacing,
            max_in_flight: self.max_in_flight,
            ack_mode: self.ack_mode,
        }
    }
}

/// HTTPサーバーの設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl ServerConfig {
    /// 環境変数 `HTTP_PORT` から設定を読み取る（デフォルト9000）
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse_env_or("HTTP_PORT", 9000u16)?,
        })
    }

    /// バインドするアドレス
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const KEYS: [&str; 7] = [
        "ORDER_PACING_MS",
        "ORDER_MAX_IN_FLIGHT",
        "ORDER_ACK_MODE",
        "RESERVATION_MODE",
        "STORE_TIMEOUT_SECS",
        "DEAD_LETTER_MAX_SIZE",
        "HTTP_PORT",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = ConsumerConfig::from_env().unwrap();
        assert_eq!(config.pacing, Duration::from_secs(1));
        assert_eq!(config.max_in_flight, 32);
        assert_eq!(config.ack_mode, AckMode::AfterOutcome);
        assert_eq!(config.reservation_mode, ReservationMode::Atomic);
        assert_eq!(config.store_timeout, Duration::from_secs(10));
        assert_eq!(config.dead_letter_max_size, 1000);

        let server = ServerConfig::from_env().unwrap();
        assert_eq!(server.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("ORDER_PACING_MS", "0");
        env::set_var("ORDER_MAX_IN_FLIGHT", "4");
        env::set_var("ORDER_ACK_MODE", "on_receipt");
        env::set_var("RESERVATION_MODE", "read_then_write");
        env::set_var("STORE_TIMEOUT_SECS", "3");
        env::set_var("DEAD_LETTER_MAX_SIZE", "5");
        env::set_var("HTTP_PORT", "8080");

        let config = ConsumerConfig::from_env().unwrap();
        let settings = config.settings();
        assert_eq!(settings.pacing, Duration::ZERO);
        assert_eq!(settings.max_in_flight, 4);
        assert_eq!(settings.ack_mode, AckMode::OnReceipt);
        assert_eq!(config.reservation_mode, ReservationMode::ReadThenWrite);
        assert_eq!(config.store_timeout, Duration::from_secs(3));
        assert_eq!(config.dead_letter_max_size, 5);
        assert_eq!(ServerConfig::from_env().unwrap().port, 8080);

        clear_env();
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        for (key, value) in [
            ("ORDER_PACING_MS", "soon"),
            ("ORDER_MAX_IN_FLIGHT", "0"),
            ("ORDER_ACK_MODE", "auto"),
            ("RESERVATION_MODE", "optimistic"),
            ("STORE_TIMEOUT_SECS", "0"),
            ("DEAD_LETTER_MAX_SIZE", "0"),
            ("DEAD_LETTER_MAX_SIZE", "-5"),
        ] {
            env::set_var(key, value);
            assert!(ConsumerConfig::from_env().is_err(), "{}={}", key, value);
            env::remove_var(key);
        }

        env::set_var("HTTP_PORT", "70000");
        assert!(ServerConfig::from_env().is_err());

        clear_env();
    }
}
