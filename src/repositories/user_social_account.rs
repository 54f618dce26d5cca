use sqlx::PgPool;
use uuid::Uuid;

use crate::models::UserSocialAccount;

pub(crate) const SOCIAL_ACCOUNT_COLUMNS: &str =
    "id, user_id, provider, provider_id, extra_data, created_at, updated_at";

#[derive(Clone)]
pub struct UserSocialAccountRepository {
    pool: PgPool,
}

impl UserSocialAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// プロバイダとプロバイダIDでソーシャルアカウントを検索
    ///
    /// # Note
    /// ソーシャルログイン時に既存ユーザーを特定するために使用
    pub async fn find_by_provider_and_id(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<UserSocialAccount>, sqlx::Error> {
        sqlx::query_as::<_, UserSocialAccount>(&format!(
            r#"
            SELECT {SOCIAL_ACCOUNT_COLUMNS}
            FROM user_social_accounts
            WHERE provider = $1 AND provider_id = $2
            "#
        ))
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// ユーザーIDに紐付くソーシャルアカウント一覧を取得
    pub async fn find_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserSocialAccount>, sqlx::Error> {
        sqlx::query_as::<_, UserSocialAccount>(&format!(
            r#"
            SELECT {SOCIAL_ACCOUNT_COLUMNS}
            FROM user_social_accounts
            WHERE user_id = $1
            ORDER BY created_at
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// 新しいソーシャルアカウント紐付けを作成
    ///
    /// # Note
    /// 同一プロバイダ・プロバイダIDの紐付けが同時に作成された場合は、
    /// 先に作成された紐付けを返す
    pub async fn create(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_id: &str,
        extra_data: &serde_json::Value,
    ) -> Result<UserSocialAccount, sqlx::Error> {
        let inserted = sqlx::query_as::<_, UserSocialAccount>(&format!(
            r#"
            INSERT INTO user_social_accounts (user_id, provider, provider_id, extra_data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (provider, provider_id) DO NOTHING
            RETURNING {SOCIAL_ACCOUNT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(provider)
        .bind(provider_id)
        .bind(extra_data)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(account) => Ok(account),
            None => self
                .find_by_provider_and_id(provider, provider_id)
                .await?
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    /// プロバイダから取得したプロフィールを保存
    pub async fn update_extra_data(
        &self,
        id: Uuid,
        extra_data: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_social_accounts
            SET extra_data = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(extra_data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
