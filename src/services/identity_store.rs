use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewUser, ProfileDetails, User, UserSocialAccount};
use crate::repositories::{UserRepository, UserSocialAccountRepository};

/// ユーザーとソーシャルアカウント紐付けの永続化
///
/// 一意キー（users.email の小文字表記と (provider, provider_id)）の重複は
/// ストア側で防ぐこと。同時ログインでもユーザーが二重に作られてはならない。
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// ユーザーと紐付けを不可分に作成する
    ///
    /// email（大文字小文字を区別しない）または (provider, provider_id) が
    /// 既に使われていれば何も作成せず `None`
    async fn create_user_with_account(
        &self,
        new_user: &NewUser,
        provider: &str,
        provider_id: &str,
        extra_data: &serde_json::Value,
    ) -> Result<Option<(User, UserSocialAccount)>, AppError>;

    async fn update_profile(
        &self,
        user_id: Uuid,
        details: &ProfileDetails,
    ) -> Result<User, AppError>;

    async fn find_social_account(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<UserSocialAccount>, AppError>;

    /// (provider, provider_id) が一意キー。既存の紐付けがあればそれを返す。
    async fn link_social_account(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_id: &str,
        extra_data: &serde_json::Value,
    ) -> Result<UserSocialAccount, AppError>;

    async fn update_extra_data(
        &self,
        account_id: Uuid,
        extra_data: &serde_json::Value,
    ) -> Result<(), AppError>;

    async fn social_accounts_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserSocialAccount>, AppError>;
}

/// PostgreSQL 実装
#[derive(Clone)]
pub struct PgIdentityStore {
    user_repo: UserRepository,
    social_account_repo: UserSocialAccountRepository,
}

impl PgIdentityStore {
    pub fn new(user_repo: UserRepository, social_account_repo: UserSocialAccountRepository) -> Self {
        Self {
            user_repo,
            social_account_repo,
        }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.user_repo.find_by_id(user_id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.user_repo.find_by_email(email).await?)
    }

    async fn create_user_with_account(
        &self,
        new_user: &NewUser,
        provider: &str,
        provider_id: &str,
        extra_data: &serde_json::Value,
    ) -> Result<Option<(User, UserSocialAccount)>, AppError> {
        Ok(self
            .user_repo
            .create_social_user_with_account(new_user, provider, provider_id, extra_data)
            .await?)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        details: &ProfileDetails,
    ) -> Result<User, AppError> {
        Ok(self.user_repo.update_profile(user_id, details).await?)
    }

    async fn find_social_account(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<UserSocialAccount>, AppError> {
        Ok(self
            .social_account_repo
            .find_by_provider_and_id(provider, provider_id)
            .await?)
    }

    async fn link_social_account(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_id: &str,
        extra_data: &serde_json::Value,
    ) -> Result<UserSocialAccount, AppError> {
        Ok(self
            .social_account_repo
            .create(user_id, provider, provider_id, extra_data)
            .await?)
    }

    async fn update_extra_data(
        &self,
        account_id: Uuid,
        extra_data: &serde_json::Value,
    ) -> Result<(), AppError> {
        Ok(self
            .social_account_repo
            .update_extra_data(account_id, extra_data)
            .await?)
    }

    async fn social_accounts_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserSocialAccount>, AppError> {
        Ok(self.social_account_repo.find_by_user_id(user_id).await?)
    }
}
