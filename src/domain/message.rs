use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 注文メッセージのデコードエラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MessageError {
    #[error("JSON deserialization failed: {message}. Input: {input_preview}")]
    JsonDeserializationFailed {
        message: String,
        input_preview: String,
    },

    #[error("JSON serialization failed: {0}")]
    JsonSerializationFailed(String),
}

impl MessageError {
    /// 入力データのプレビューを生成（デバッグ用、最大100文字）
    fn create_input_preview(input: &[u8]) -> String {
        let text = String::from_utf8_lossy(input);
        if text.chars().count() <= 100 {
            text.into_owned()
        } else {
            let head: String = text.chars().take(97).collect();
            format!("{}...", head)
        }
    }
}

/// キューから受信する注文メッセージ
/// 受信時に生成され、処理後に破棄される（永続化しない）
///
/// 数量は呼び出し側が指定した値をそのまま保持し、ここでは正の値かどうかを検証しない
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMessage {
    #[serde(rename = "productID")]
    pub product_id: String,
    pub quantity: i64,
    #[serde(rename = "userID")]
    pub user_id: String,
}

impl OrderMessage {
    /// 新しい注文メッセージを作成
    pub fn new(product_id: impl Into<String>, quantity: i64, user_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            user_id: user_id.into(),
        }
    }

    /// バイナリペイロード（JSONオブジェクト）からデコード
    pub fn from_slice(body: &[u8]) -> Result<Self, MessageError> {
        serde_json::from_slice(body).map_err(|e| MessageError::JsonDeserializationFailed {
            message: e.to_string(),
            input_preview: MessageError::create_input_preview(body),
        })
    }

    /// キューに送信するバイナリペイロードへエンコード
    pub fn to_vec(&self) -> Result<Vec<u8>, MessageError> {
        serde_json::to_vec(self).map_err(|e| MessageError::JsonSerializationFailed(e.to_string()))
    }
}
