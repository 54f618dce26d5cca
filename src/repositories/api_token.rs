use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ApiToken, User};

#[derive(Clone)]
pub struct ApiTokenRepository {
    pool: PgPool,
}

impl ApiTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ユーザーのトークンを取得、なければ `key` で作成
    ///
    /// # Note
    /// user_id は一意。同時作成時は先に作成されたトークンを返す。
    /// 別ステートメントで読み直すのは、INSERT と同一スナップショットでは
    /// 並行トランザクションがコミットした行が見えないため。
    pub async fn get_or_create(&self, user_id: Uuid, key: &str) -> Result<ApiToken, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO api_tokens (key, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        sqlx::query_as::<_, ApiToken>(
            r#"
            SELECT key, user_id, created_at
            FROM api_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    /// トークンから有効なユーザーを検索
    ///
    /// 無効化されたユーザーは返さない
    pub async fn find_active_user_by_key(&self, key: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar_url,
                   u.is_active, u.created_at, u.updated_at
            FROM api_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.key = $1 AND u.is_active
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
    }
}
