use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ソーシャルログインプロバイダとユーザーの紐付け
///
/// (provider, provider_id) は一意
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserSocialAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_id: String,
    /// プロバイダから取得したプロフィール（アクセストークンは含めない）
    #[serde(skip)]
    pub extra_data: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
