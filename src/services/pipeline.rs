//! ソーシャルログインのユーザー解決パイプライン
//!
//! プロバイダのアクセストークンを検証し、ローカルユーザーに紐付ける。
//!
//! # 処理フロー
//! 1. social_details: userinfo API でトークン検証とプロフィール取得
//! 2. auth_allowed: 許可ドメインのチェック
//! 3. social_user: (provider, provider_id) で既存の紐付けを検索
//! 4. associate_by_email: 検証済みメールアドレスで既存ユーザーを検索
//! 5. create_user: 見つからなければユーザーと紐付けを同時に作成
//! 6. associate_user: 既存ユーザーへの紐付け作成
//! 7. load_extra_data: プロフィールを紐付けに保存
//! 8. user_details: ユーザーのプロフィール項目を更新

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{NewUser, ProfileDetails, User, UserSocialAccount};
use crate::services::identity_store::IdentityStore;
use crate::services::provider::{ProviderRegistry, SocialProfile};

/// プロバイダトークンからローカルユーザーを解決する
#[async_trait]
pub trait IdentityPipeline: Send + Sync {
    /// トークンが無効・プロバイダ不明・通信失敗の場合は `Ok(None)`
    ///
    /// `Err` はストアの障害など、呼び出し側で 500 とすべきものに限る
    async fn validate_and_resolve(
        &self,
        provider: &str,
        access_token: &str,
    ) -> Result<Option<User>, AppError>;
}

pub struct SocialAuthPipeline {
    providers: ProviderRegistry,
    store: Arc<dyn IdentityStore>,
    associate_by_email: bool,
    whitelisted_domains: Vec<String>,
}

impl SocialAuthPipeline {
    pub fn new(providers: ProviderRegistry, store: Arc<dyn IdentityStore>, config: &Config) -> Self {
        Self {
            providers,
            store,
            associate_by_email: config.associate_by_email,
            whitelisted_domains: config
                .whitelisted_domains
                .iter()
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// 許可ドメインが設定されていればメールアドレスのドメインを照合
    fn auth_allowed(&self, email: &str) -> bool {
        if self.whitelisted_domains.is_empty() {
            return true;
        }

        email
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_lowercase())
            .is_some_and(|domain| self.whitelisted_domains.contains(&domain))
    }

    /// 紐付け済みでないプロフィールを既存ユーザーに紐付ける、またはユーザーごと作成する
    ///
    /// 戻り値は (紐付け, 今回作成した紐付けか)。紐付け不可の場合は `None`
    async fn associate_or_create(
        &self,
        provider: &str,
        profile: &SocialProfile,
    ) -> Result<Option<(UserSocialAccount, bool)>, AppError> {
        if let Some(existing) = self.store.find_user_by_email(&profile.email).await? {
            return self.associate_existing(provider, profile, existing).await;
        }

        let new_user = NewUser {
            email: profile.email.clone(),
            first_name: profile.first_name.clone().unwrap_or_default(),
            last_name: profile.last_name.clone().unwrap_or_default(),
            avatar_url: profile.avatar_url.clone(),
        };

        let created = self
            .store
            .create_user_with_account(&new_user, provider, &profile.provider_id, &profile.raw)
            .await?;
        if let Some((user, account)) = created {
            tracing::info!(provider = %provider, user_id = %user.id, "新規ソーシャルユーザーを作成");
            return Ok(Some((account, true)));
        }

        // 同時ログインで先に作成された。ユーザーと紐付けは同時にコミットされるので、
        // 同じ (provider, provider_id) なら紐付けが見える
        tracing::debug!(provider = %provider, "ユーザー作成が競合 - 再検索");
        if let Some(account) = self
            .store
            .find_social_account(provider, &profile.provider_id)
            .await?
        {
            return Ok(Some((account, false)));
        }
        match self.store.find_user_by_email(&profile.email).await? {
            Some(existing) => self.associate_existing(provider, profile, existing).await,
            None => Ok(None),
        }
    }

    /// メールアドレスが一致した既存ユーザーへの紐付け
    async fn associate_existing(
        &self,
        provider: &str,
        profile: &SocialProfile,
        existing: User,
    ) -> Result<Option<(UserSocialAccount, bool)>, AppError> {
        match self.associate_by_email_allowed(provider, profile, existing) {
            Some(user) => self.associate_user(provider, profile, &user).await.map(Some),
            None => Ok(None),
        }
    }

    fn associate_by_email_allowed(
        &self,
        provider: &str,
        profile: &SocialProfile,
        existing: User,
    ) -> Option<User> {
        if self.associate_by_email && profile.email_verified {
            tracing::info!(
                provider = %provider,
                user_id = %existing.id,
                "既存ユーザーにソーシャルアカウントを紐付け"
            );
            Some(existing)
        } else {
            tracing::warn!(
                provider = %provider,
                email_verified = profile.email_verified,
                "メールアドレスが既存ユーザーと重複（紐付け不可）"
            );
            None
        }
    }

    /// 紐付けを作成し、実際に紐付いたアカウントを返す
    ///
    /// 同時ログインで先に紐付けが作成されていれば、そちらが優先される
    async fn associate_user(
        &self,
        provider: &str,
        profile: &SocialProfile,
        user: &User,
    ) -> Result<(UserSocialAccount, bool), AppError> {
        let account = self
            .store
            .link_social_account(user.id, provider, &profile.provider_id, &profile.raw)
            .await?;

        let is_new_link = account.user_id == user.id;
        if is_new_link {
            tracing::debug!(provider = %provider, "ソーシャルアカウント紐付け完了");
        } else {
            tracing::debug!(provider = %provider, user_id = %account.user_id, "既存の紐付けを使用");
        }

        Ok((account, is_new_link))
    }
}

#[async_trait]
impl IdentityPipeline for SocialAuthPipeline {
    async fn validate_and_resolve(
        &self,
        provider: &str,
        access_token: &str,
    ) -> Result<Option<User>, AppError> {
        // 1. social_details
        let Some(client) = self.providers.get(provider) else {
            tracing::warn!(provider = %provider, "未設定のプロバイダ");
            return Ok(None);
        };
        let provider = client.kind().name();

        // Note: access_token はログに出力しない
        let profile = match client.fetch_profile(access_token).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "プロバイダでのトークン検証に失敗");
                return Ok(None);
            }
        };
        tracing::info!(provider = %provider, "OAuth ユーザー情報取得成功");

        // 2. auth_allowed
        if !self.auth_allowed(&profile.email) {
            tracing::warn!(provider = %provider, "許可されていないメールドメイン");
            return Ok(None);
        }

        // 3. social_user
        let existing = self
            .store
            .find_social_account(provider, &profile.provider_id)
            .await?;

        let (account, is_new_link) = match existing {
            Some(account) => {
                tracing::info!(
                    provider = %provider,
                    user_id = %account.user_id,
                    "既存ソーシャルアカウントでログイン"
                );
                (account, false)
            }
            None => {
                // 4-6. associate_by_email / create_user / associate_user
                let Some(resolved) = self.associate_or_create(provider, &profile).await? else {
                    return Ok(None);
                };
                resolved
            }
        };

        // 7. load_extra_data（新規紐付けは作成時に保存済み）
        if !is_new_link {
            self.store
                .update_extra_data(account.id, &profile.raw)
                .await?;
        }

        // 8. user_details
        let details = ProfileDetails {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            avatar_url: profile.avatar_url.clone(),
        };
        let user = self.store.update_profile(account.user_id, &details).await?;

        Ok(Some(user))
    }
}
