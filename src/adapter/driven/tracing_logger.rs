use crate::domain::port::{LogLevel, Logger};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// `tracing` サブスクライバーを初期化する
///
/// ログレベルは `RUST_LOG` で指定する（未指定なら `info`）
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// 追加コンテキストを `key=value` 形式の1行にまとめる
fn format_context(context: Option<HashMap<String, String>>) -> String {
    let Some(context) = context else {
        return String::new();
    };
    let mut pairs: Vec<String> = context
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    pairs.sort();
    pairs.join(" ")
}

/// tracingロガー
/// ロガーポートの呼び出しを `tracing` のイベントとして出力する
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }

    fn emit(
        &self,
        level: LogLevel,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        let correlation_id = correlation_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let context = format_context(context);

        match level {
            LogLevel::Debug => {
                tracing::debug!(component, correlation_id = %correlation_id, context = %context, "{}", message)
            }
            LogLevel::Info => {
                tracing::info!(component, correlation_id = %correlation_id, context = %context, "{}", message)
            }
            LogLevel::Warning => {
                tracing::warn!(component, correlation_id = %correlation_id, context = %context, "{}", message)
            }
            LogLevel::Error => {
                tracing::error!(component, correlation_id = %correlation_id, context = %context, "{}", message)
            }
        }
    }
}

impl Logger for TracingLogger {
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Debug, component, message, correlation_id, context);
    }

    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Info, component, message, correlation_id, context);
    }

    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Warning, component, message, correlation_id, context);
    }

    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Error, component, message, correlation_id, context);
    }
}
