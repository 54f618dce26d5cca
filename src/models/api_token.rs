use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// API トークン（ユーザーごとに1つ）
#[derive(Debug, Clone, FromRow)]
pub struct ApiToken {
    pub key: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
}
