//! ソーシャルプロバイダ userinfo クライアント
//!
//! フロントエンドが取得済みのアクセストークンでプロバイダの userinfo API を呼び出し、
//! トークンの有効性確認とプロフィール取得を同時に行う。
//!
//! # Security
//! - access_token はログに出力しない
//! - プロバイダのエラーレスポンス本文はログ・レスポンスに含めない

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::Config;
use crate::error::AppError;

/// プロバイダ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Google,
    Facebook,
    GitHub,
}

impl ProviderKind {
    /// バックエンド名から種別を解決
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "google-oauth2" => Some(Self::Google),
            "facebook" => Some(Self::Facebook),
            "github" => Some(Self::GitHub),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Google => "google-oauth2",
            Self::Facebook => "facebook",
            Self::GitHub => "github",
        }
    }

    fn userinfo_url(&self, config: &Config) -> String {
        match self {
            Self::Google => config.google_userinfo_url.clone(),
            Self::Facebook => config.facebook_userinfo_url.clone(),
            Self::GitHub => config.github_userinfo_url.clone(),
        }
    }
}

/// プロバイダから取得したプロフィール
#[derive(Debug, Clone)]
pub struct SocialProfile {
    /// プロバイダ内で一意なユーザーID
    pub provider_id: String,
    /// ユーザー照合に使うメールアドレス
    ///
    /// プロバイダが検証済みと保証しない、または返さない場合は
    /// `{provider_id}@{provider}.local`
    pub email: String,
    /// `email` がプロバイダの検証済みアドレスか
    pub email_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    /// userinfo レスポンス全体
    pub raw: serde_json::Value,
}

/// userinfo 呼び出しの失敗
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// URL はクエリにトークンを含み得るため取り除いてから保持する
    #[error("プロバイダとの通信に失敗: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("プロバイダがトークンを拒否: {0}")]
    Rejected(StatusCode),

    #[error("userinfo レスポンスが不正: {0}")]
    Malformed(String),
}

/// Google userinfo (v2) レスポンス
#[derive(Debug, Deserialize)]
struct GoogleUserInfoResponse {
    id: String,
    email: Option<String>,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

/// Facebook Graph API `/me` レスポンス
#[derive(Debug, Deserialize)]
struct FacebookUserInfoResponse {
    id: String,
    email: Option<String>,
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

/// GitHub userinfo エンドポイントからのレスポンス
#[derive(Debug, Deserialize)]
struct GitHubUserInfoResponse {
    id: i64,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

const FACEBOOK_FIELDS: &str = "id,name,email,first_name,last_name,picture";

/// 単一プロバイダの userinfo クライアント
#[derive(Clone)]
pub struct ProviderClient {
    kind: ProviderKind,
    userinfo_url: String,
    http_client: reqwest::Client,
}

impl ProviderClient {
    pub fn new(kind: ProviderKind, userinfo_url: String, http_client: reqwest::Client) -> Self {
        Self {
            kind,
            userinfo_url,
            http_client,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// アクセストークンを使用してプロフィールを取得
    ///
    /// # Arguments
    /// * `access_token` - プロバイダ発行のアクセストークン
    pub async fn fetch_profile(&self, access_token: &str) -> Result<SocialProfile, ProviderError> {
        let request = match self.kind {
            // Facebook はクエリパラメータでトークンを受け取る
            ProviderKind::Facebook => {
                let url = reqwest::Url::parse_with_params(
                    &self.userinfo_url,
                    &[("fields", FACEBOOK_FIELDS), ("access_token", access_token)],
                )
                .map_err(|e| ProviderError::Malformed(format!("invalid userinfo url: {e}")))?;
                self.http_client.get(url)
            }
            ProviderKind::Google => self.http_client.get(&self.userinfo_url).bearer_auth(access_token),
            ProviderKind::GitHub => self
                .http_client
                .get(&self.userinfo_url)
                .header("User-Agent", "socialgate")
                .header("Accept", "application/json")
                .bearer_auth(access_token),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Rejected(status));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.without_url().to_string()))?;

        self.parse_profile(raw)
    }

    fn parse_profile(&self, raw: serde_json::Value) -> Result<SocialProfile, ProviderError> {
        let malformed = |e: serde_json::Error| ProviderError::Malformed(e.to_string());

        let profile = match self.kind {
            ProviderKind::Google => {
                let info: GoogleUserInfoResponse =
                    serde_json::from_value(raw.clone()).map_err(malformed)?;
                let (first_name, last_name) =
                    names_or_split(info.given_name, info.family_name, info.name.as_deref());
                let (email, email_verified) =
                    email_or_fallback(info.email, info.verified_email, &info.id, self.kind);
                SocialProfile {
                    provider_id: info.id,
                    email,
                    email_verified,
                    first_name,
                    last_name,
                    avatar_url: info.picture,
                    raw,
                }
            }
            ProviderKind::Facebook => {
                let info: FacebookUserInfoResponse =
                    serde_json::from_value(raw.clone()).map_err(malformed)?;
                let (first_name, last_name) =
                    names_or_split(info.first_name, info.last_name, info.name.as_deref());
                // Facebook は検証済みのメールアドレスのみ返す
                let (email, email_verified) =
                    email_or_fallback(info.email, true, &info.id, self.kind);
                SocialProfile {
                    provider_id: info.id,
                    email,
                    email_verified,
                    first_name,
                    last_name,
                    avatar_url: info.picture.and_then(|p| p.data.url),
                    raw,
                }
            }
            ProviderKind::GitHub => {
                let info: GitHubUserInfoResponse =
                    serde_json::from_value(raw.clone()).map_err(malformed)?;
                let (first_name, last_name) = names_or_split(None, None, info.name.as_deref());
                // GitHub の公開メールは検証済みとは限らない
                let provider_id = info.id.to_string();
                let (email, email_verified) =
                    email_or_fallback(info.email, false, &provider_id, self.kind);
                SocialProfile {
                    provider_id,
                    email,
                    email_verified,
                    first_name,
                    last_name,
                    avatar_url: info.avatar_url,
                    raw,
                }
            }
        };

        if profile.provider_id.trim().is_empty() {
            return Err(ProviderError::Malformed("empty provider id".to_string()));
        }

        Ok(profile)
    }
}

/// 姓名が個別に取れなければ表示名を最初の空白で分割する
fn names_or_split(
    first_name: Option<String>,
    last_name: Option<String>,
    full_name: Option<&str>,
) -> (Option<String>, Option<String>) {
    if first_name.is_some() || last_name.is_some() {
        return (first_name, last_name.or_else(|| Some(String::new())));
    }

    match full_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => match name.split_once(' ') {
            Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
            None => (Some(name.to_string()), Some(String::new())),
        },
        None => (None, None),
    }
}

/// 照合用のメールアドレスを決める
///
/// # Security
/// 未検証のアドレスを照合キーにすると、後から検証済みアドレスでログインした
/// 本人のアカウントを先取りできてしまう。未検証・未取得の場合は
/// プロバイダ内 ID から代替アドレスを作る。
fn email_or_fallback(
    email: Option<String>,
    verified: bool,
    provider_id: &str,
    kind: ProviderKind,
) -> (String, bool) {
    match email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()) {
        Some(email) if verified => (email, true),
        _ => (format!("{}@{}.local", provider_id, kind.name()), false),
    }
}

/// 有効なプロバイダの一覧
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, ProviderClient>,
}

impl ProviderRegistry {
    /// 設定から有効なプロバイダを初期化
    ///
    /// 全プロバイダで1つの HTTP クライアント（タイムアウト付き）を共有する
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "HTTP クライアントの初期化エラー");
                AppError::Internal(anyhow::anyhow!("failed to build http client"))
            })?;

        let mut providers = HashMap::new();
        for name in &config.social_auth_providers {
            let kind = ProviderKind::from_name(name.trim()).ok_or_else(|| {
                tracing::error!(provider = %name, "未対応のプロバイダ");
                AppError::Internal(anyhow::anyhow!("unsupported provider: {}", name))
            })?;

            tracing::info!(provider = kind.name(), "プロバイダを有効化");
            providers.insert(
                kind.name(),
                ProviderClient::new(kind, kind.userinfo_url(config), http_client.clone()),
            );
        }

        Ok(Self { providers })
    }

    /// バックエンド名でプロバイダを取得（無効・未知なら `None`）
    pub fn get(&self, name: &str) -> Option<&ProviderClient> {
        self.providers.get(name)
    }
}
