// ドメイン層
// 商品・ユーザーの集約、注文メッセージ、ポート、注文処理パイプラインのドメインサービス

pub mod error;
pub mod message;
pub mod model;
pub mod port;
pub mod service;
