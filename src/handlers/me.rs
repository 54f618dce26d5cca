use axum::{Json, extract::State};
use serde::Serialize;

use crate::error::AppError;
use crate::extractors::AuthenticatedUser;
use crate::models::{User, UserSocialAccount};
use crate::state::AppState;

/// ログイン中ユーザーのプロフィール
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub full_name: String,
    pub social_accounts: Vec<UserSocialAccount>,
}

/// ログイン中ユーザー取得ハンドラー
///
/// GET /api/me
///
/// `Authorization: Token <key>` で発行済みトークンを提示する。
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<MeResponse>, AppError> {
    let social_accounts = state.identities.social_accounts_for_user(user.id).await?;

    Ok(Json(MeResponse {
        full_name: user.full_name(),
        user,
        social_accounts,
    }))
}
