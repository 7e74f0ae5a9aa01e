use std::env;
use std::str::FromStr;

/// 設定エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// 環境変数を読み取る。未設定ならデフォルト値を使う
pub(crate) fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// 環境変数を読み取って解析する。未設定ならデフォルト値を使い、解析できなければエラー
pub(crate) fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// データベース接続設定
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
    /// 指定されていれば個別の接続パラメータより優先する接続URL
    pub url: Option<String>,
}

impl DatabaseConfig {
    /// 環境変数から設定を読み取る
    /// 環境変数が設定されていない場合はデフォルト値を使用
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_connections = parse_env_or("DATABASE_MAX_CONNECTIONS", 10u32)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "Invalid DATABASE_MAX_CONNECTIONS: must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host: env_or("DATABASE_HOST", "localhost"),
            port: parse_env_or("DATABASE_PORT", 3306u16)?,
            database: env_or("DATABASE_NAME", "shop_db"),
            username: env_or("DATABASE_USER", "shop_user"),
            password: env_or("DATABASE_PASSWORD", "shop_password"),
            max_connections,
            url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        })
    }

    /// MySQL接続文字列を生成
    pub fn connection_string(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.database
            ),
        }
    }

    /// ログ出力用の接続先（認証情報を含まない）
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}
