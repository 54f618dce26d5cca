//! リクエストエクストラクター

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// `Authorization: Token <key>` で認証済みのユーザー
///
/// `Bearer <key>` も受け付ける。無効化されたユーザーは認証失敗。
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Authorization ヘッダーからトークンを取り出す
fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() || token.contains(' ') {
        return None;
    }

    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token)
    } else {
        None
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_authorization)
            .ok_or(AppError::Unauthenticated)?;

        // Note: トークンはログに出力しない
        match state.credentials.authenticate(token).await? {
            Some(user) => Ok(Self(user)),
            None => {
                tracing::warn!("無効な API トークン");
                Err(AppError::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_authorization() {
        assert_eq!(parse_authorization("Token abc"), Some("abc"));
        assert_eq!(parse_authorization("token abc"), Some("abc"));
        assert_eq!(parse_authorization("Bearer abc"), Some("abc"));
        assert_eq!(parse_authorization("Basic abc"), None);
        assert_eq!(parse_authorization("Token"), None);
        assert_eq!(parse_authorization("Token a b"), None);
    }
}
