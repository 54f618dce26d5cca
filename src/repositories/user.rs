use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewUser, ProfileDetails, User, UserSocialAccount};
use crate::repositories::user_social_account::SOCIAL_ACCOUNT_COLUMNS;

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, avatar_url, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// メールアドレスでユーザーを検索（大文字小文字を区別しない）
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// ユーザーIDでユーザーを検索
    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// ソーシャルログイン用ユーザーと紐付けを同一トランザクションで作成
    ///
    /// # Note
    /// email・username は小文字に正規化して保存する。
    /// メールアドレスまたは (provider, provider_id) が既に使われている場合
    /// （同時作成を含む）は何も作成せず `None` を返す。
    /// ユーザーと紐付けは同時にコミットされるため、競合した側が再検索すれば
    /// 必ず紐付けまで見える。
    pub async fn create_social_user_with_account(
        &self,
        new_user: &NewUser,
        provider: &str,
        provider_id: &str,
        extra_data: &serde_json::Value,
    ) -> Result<Option<(User, UserSocialAccount)>, sqlx::Error> {
        let mut transaction = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, first_name, last_name, avatar_url)
            VALUES (lower($1), lower($1), $2, $3, $4)
            ON CONFLICT DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.email)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.avatar_url)
        .fetch_optional(&mut *transaction)
        .await?;

        let Some(user) = user else {
            transaction.rollback().await?;
            return Ok(None);
        };

        let account = sqlx::query_as::<_, UserSocialAccount>(&format!(
            r#"
            INSERT INTO user_social_accounts (user_id, provider, provider_id, extra_data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (provider, provider_id) DO NOTHING
            RETURNING {SOCIAL_ACCOUNT_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(provider)
        .bind(provider_id)
        .bind(extra_data)
        .fetch_optional(&mut *transaction)
        .await?;

        let Some(account) = account else {
            transaction.rollback().await?;
            return Ok(None);
        };

        transaction.commit().await?;
        Ok(Some((user, account)))
    }

    /// プロバイダから取得したプロフィールで更新
    ///
    /// `None` の項目は既存値を保持する
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        details: &ProfileDetails,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                avatar_url = COALESCE($4, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&details.first_name)
        .bind(&details.last_name)
        .bind(&details.avatar_url)
        .fetch_one(&self.pool)
        .await
    }
}
