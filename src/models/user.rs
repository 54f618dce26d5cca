use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ローカルユーザー
///
/// email がソーシャルアカウント紐付けのキーになる。
/// username は常にメールアドレス全体。
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// 姓名を結合した表示名
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// ユーザー作成時の入力
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
}

/// ログインごとにプロバイダから更新するプロフィール項目
///
/// `None` の項目は既存値を保持する
#[derive(Debug, Clone, Default)]
pub struct ProfileDetails {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "foo@bar.com".to_string(),
            username: "foo@bar.com".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            avatar_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_full_name() {
        assert_eq!(user("Foo", "Bar").full_name(), "Foo Bar");
        assert_eq!(user("Foo Bar", "").full_name(), "Foo Bar");
        assert_eq!(user("", "").full_name(), "");
    }
}
