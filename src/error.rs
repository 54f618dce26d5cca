use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// フィールド名 → メッセージ
    #[error("バリデーションエラー: {0:?}")]
    Validation(BTreeMap<String, String>),

    #[error("無効なトークン")]
    InvalidToken,

    #[error("アカウントが無効化されています")]
    InactiveAccount,

    #[error("認証されていません")]
    Unauthenticated,

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// 単一フィールドのバリデーションエラーを作成
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(BTreeMap::from([(field.into(), message.into())]))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    errors: BTreeMap<String, String>,
}

fn single(key: &str, message: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(key.to_string(), message.to_string())])
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, errors) = match self {
            Self::Validation(fields) => (StatusCode::BAD_REQUEST, fields),
            // プロバイダ側の詳細は返さない（アカウント列挙対策）
            Self::InvalidToken => (
                StatusCode::BAD_REQUEST,
                single("token", "無効なトークンです"),
            ),
            Self::InactiveAccount => (
                StatusCode::BAD_REQUEST,
                single("non_field_errors", "このアカウントは無効化されています"),
            ),
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                single("detail", "認証情報が無効です"),
            ),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    single("detail", "内部エラーが発生しました"),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    single("detail", "内部エラーが発生しました"),
                )
            }
        };

        (status, Json(ErrorResponse { errors })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_token_response() {
        let response = AppError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["errors"]["token"].is_string());
    }

    #[tokio::test]
    async fn test_inactive_account_response() {
        let response = AppError::InactiveAccount.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["errors"]["non_field_errors"].is_string());
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response =
            AppError::Internal(anyhow::anyhow!("connection refused: 10.0.0.1")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(!body.to_string().contains("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_validation_lists_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("provider".to_string(), "必須項目です".to_string());
        fields.insert("access_token".to_string(), "必須項目です".to_string());

        let response = AppError::Validation(fields).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["errors"]["provider"].is_string());
        assert!(body["errors"]["access_token"].is_string());
    }
}
