use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{ApiTokenRepository, UserRepository, UserSocialAccountRepository};
use crate::services::{
    ApiTokenService, CredentialStore, IdentityPipeline, IdentityStore, PgIdentityStore,
    ProviderRegistry, SocialAuthPipeline,
};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// プロバイダトークン → ローカルユーザーの解決
    pub pipeline: Arc<dyn IdentityPipeline>,
    /// API トークンの発行・照合
    pub credentials: Arc<dyn CredentialStore>,
    /// ユーザー・ソーシャルアカウントの参照
    pub identities: Arc<dyn IdentityStore>,
}

impl AppState {
    /// PostgreSQL と設定済みプロバイダから AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Result<Self, AppError> {
        let identities: Arc<dyn IdentityStore> = Arc::new(PgIdentityStore::new(
            UserRepository::new(db_pool.clone()),
            UserSocialAccountRepository::new(db_pool.clone()),
        ));
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(ApiTokenService::new(ApiTokenRepository::new(db_pool)));

        let providers = ProviderRegistry::from_config(&config)?;
        let pipeline: Arc<dyn IdentityPipeline> = Arc::new(SocialAuthPipeline::new(
            providers,
            identities.clone(),
            &config,
        ));

        Ok(Self::from_parts(config, pipeline, credentials, identities))
    }

    /// 個別に構築した依存から AppState を作成
    pub fn from_parts(
        config: Config,
        pipeline: Arc<dyn IdentityPipeline>,
        credentials: Arc<dyn CredentialStore>,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            credentials,
            identities,
        }
    }
}
