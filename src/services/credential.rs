use async_trait::async_trait;
use data_encoding::HEXLOWER;
use rand::RngCore;

use crate::error::AppError;
use crate::models::User;
use crate::repositories::ApiTokenRepository;

/// API トークンのバイト長（16進表記で40文字）
const API_TOKEN_BYTES: usize = 20;

/// API 認証情報の発行と照合
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// ユーザーの API トークンを取得、なければ発行
    async fn get_or_create_credential(&self, user: &User) -> Result<String, AppError>;

    /// トークンを持つ有効なユーザーを返す
    async fn authenticate(&self, token: &str) -> Result<Option<User>, AppError>;
}

/// ランダムな API トークンを生成
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; API_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    HEXLOWER.encode(&bytes)
}

/// PostgreSQL に保存する API トークンサービス
///
/// # Security
/// トークンはログに出力しない
#[derive(Clone)]
pub struct ApiTokenService {
    token_repo: ApiTokenRepository,
}

impl ApiTokenService {
    pub fn new(token_repo: ApiTokenRepository) -> Self {
        Self { token_repo }
    }
}

#[async_trait]
impl CredentialStore for ApiTokenService {
    async fn get_or_create_credential(&self, user: &User) -> Result<String, AppError> {
        let token = self
            .token_repo
            .get_or_create(user.id, &generate_api_token())
            .await?;

        tracing::debug!(user_id = %user.id, "API トークン取得完了");
        Ok(token.key)
    }

    async fn authenticate(&self, token: &str) -> Result<Option<User>, AppError> {
        Ok(self.token_repo.find_active_user_by_key(token).await?)
    }
}
