//! ソーシャルトークン交換ハンドラー
//!
//! フロントエンドがプロバイダから取得したアクセストークンを、
//! このサービスの API トークンに交換する。
//!
//! # Security
//! - access_token・発行した API トークンはログに出力しない
//! - トークン無効・プロバイダ不明・通信失敗は同じエラーで返す（アカウント列挙対策）

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// トークン交換リクエスト
#[derive(Debug, Deserialize, Validate)]
pub struct ExchangeRequest {
    /// プロバイダ名（`google-oauth2`, `facebook`, `github`）
    #[serde(default)]
    #[garde(custom(present))]
    pub provider: Option<String>,
    /// プロバイダ発行のアクセストークン
    #[serde(default)]
    #[garde(custom(present))]
    pub access_token: Option<String>,
}

/// トークン交換レスポンス
#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    /// このサービスの API トークン
    pub token: String,
}

fn present(value: &Option<String>, _ctx: &()) -> garde::Result {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(garde::Error::new("必須項目です")),
    }
}

/// トークン交換ハンドラー
///
/// POST /api/social
pub async fn exchange_token(
    State(state): State<AppState>,
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangeResponse>, AppError> {
    let request = parse_body(payload)?;
    exchange(&state, &request).await
}

/// プロバイダをパスで指定するトークン交換ハンドラー
///
/// POST /api/social/{provider}
///
/// ボディの provider は省略可。指定する場合はパスと一致すること。
pub async fn exchange_token_for_provider(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangeResponse>, AppError> {
    let mut request = parse_body(payload)?;

    let conflicting = request
        .provider
        .as_deref()
        .map(str::trim)
        .is_some_and(|p| !p.is_empty() && p != provider);
    if conflicting {
        return Err(AppError::validation(
            "provider",
            "パスのプロバイダと一致しません",
        ));
    }
    request.provider = Some(provider);

    exchange(&state, &request).await
}

fn parse_body(
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<ExchangeRequest, AppError> {
    payload.map(|Json(request)| request).map_err(|e| {
        tracing::debug!(error = %e, "リクエストボディのパースに失敗");
        AppError::validation("body", "JSON 形式のリクエストボディが必要です")
    })
}

/// リクエストのバリデーション
///
/// 不正なフィールドをすべて列挙して返す
fn validate_exchange_request(request: &ExchangeRequest) -> Result<(&str, &str), AppError> {
    if let Err(report) = request.validate() {
        let fields = report
            .iter()
            .map(|(path, error)| (path.to_string(), error.to_string()))
            .collect();
        return Err(AppError::Validation(fields));
    }

    match (request.provider.as_deref(), request.access_token.as_deref()) {
        (Some(provider), Some(access_token)) => Ok((provider.trim(), access_token.trim())),
        _ => Err(AppError::Internal(anyhow::anyhow!(
            "validated request is missing fields"
        ))),
    }
}

/// トークン交換の共通処理
///
/// # 処理フロー
/// 1. リクエストバリデーション（失敗時はプロバイダを呼ばない）
/// 2. パイプラインでトークン検証・ユーザー解決
/// 3. 解決できなければ InvalidToken
/// 4. 無効化ユーザーなら InactiveAccount
/// 5. API トークンを取得または発行
async fn exchange(
    state: &AppState,
    request: &ExchangeRequest,
) -> Result<Json<ExchangeResponse>, AppError> {
    // 1. リクエストバリデーション
    let (provider, access_token) = validate_exchange_request(request)?;

    // 2. トークン検証・ユーザー解決
    let user = state
        .pipeline
        .validate_and_resolve(provider, access_token)
        .await?;

    // 3. 解決失敗
    let Some(user) = user else {
        tracing::warn!(provider = %provider, "ソーシャルトークンの交換に失敗");
        return Err(AppError::InvalidToken);
    };

    // 4. 無効化ユーザー
    if !user.is_active {
        tracing::warn!(provider = %provider, user_id = %user.id, "無効化されたユーザー");
        return Err(AppError::InactiveAccount);
    }

    // 5. API トークン
    let token = state.credentials.get_or_create_credential(&user).await?;

    tracing::info!(provider = %provider, user_id = %user.id, "ソーシャルトークン交換成功");

    Ok(Json(ExchangeResponse { token }))
}
