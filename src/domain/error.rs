/// ドメイン層のエラー型
/// ビジネスルール違反を表現する
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 無効な識別子（UUIDとして解析できない）
    InvalidIdentifier(String),
    /// 無効な数量（例: 0以下の予約数量）
    InvalidQuantity(i64),
    /// 在庫不足
    InsufficientStock { requested: u32, available: u32 },
    /// 無効な値（例: 空の商品名）
    InvalidValue(String),
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::InvalidIdentifier(id) => write!(f, "Invalid identifier: {}", id),
            DomainError::InvalidQuantity(quantity) => write!(f, "Invalid quantity: {}", quantity),
            DomainError::InsufficientStock {
                requested,
                available,
            } => write!(
                f,
                "Insufficient stock: requested {}, available {}",
                requested, available
            ),
            DomainError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}
