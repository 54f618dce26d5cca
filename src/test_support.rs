//! テスト用のインメモリ実装

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{NewUser, ProfileDetails, User, UserSocialAccount};
use crate::services::credential::generate_api_token;
use crate::services::{CredentialStore, IdentityStore};

/// `DATABASE_URL` に加えて任意の環境変数を与えた設定
pub fn test_config(extra: &[(&str, String)]) -> Config {
    let mut pairs = vec![(
        "DATABASE_URL".to_string(),
        "postgres://localhost/socialgate_test".to_string(),
    )];
    pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.clone())));
    Config::from_pairs(pairs).unwrap()
}

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    accounts: Vec<UserSocialAccount>,
}

/// 一意制約をロックで再現するインメモリストア
///
/// 各操作の前に他タスクへ実行を譲り、同時ログインの操作が交互に進むようにする
#[derive(Default)]
pub struct MemoryIdentityStore {
    state: Mutex<MemoryState>,
    lose_next_create: AtomicBool,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 既存ユーザーを直接登録
    pub fn insert_user(&self, email: &str, first_name: &str, is_active: bool) -> User {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: email.to_string(),
            first_name: first_name.to_string(),
            last_name: String::new(),
            avatar_url: None,
            is_active,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().users.push(user.clone());
        user
    }

    /// 次の作成を他のリクエストが先に完了した扱いにする
    ///
    /// ユーザーと紐付けは作成されるが、呼び出し側には `None` を返す
    pub fn lose_next_create(&self) {
        self.lose_next_create.store(true, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().unwrap().accounts.len()
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub fn account(&self, provider: &str, provider_id: &str) -> Option<UserSocialAccount> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_id == provider_id)
            .cloned()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        tokio::task::yield_now().await;
        Ok(self.user_by_email(email))
    }

    async fn create_user_with_account(
        &self,
        new_user: &NewUser,
        provider: &str,
        provider_id: &str,
        extra_data: &serde_json::Value,
    ) -> Result<Option<(User, UserSocialAccount)>, AppError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        let email_taken = state
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email));
        let link_taken = state
            .accounts
            .iter()
            .any(|a| a.provider == provider && a.provider_id == provider_id);
        if email_taken || link_taken {
            return Ok(None);
        }

        let now = OffsetDateTime::now_utc();
        let email = new_user.email.to_lowercase();
        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            username: email,
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            avatar_url: new_user.avatar_url.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let account = UserSocialAccount {
            id: Uuid::new_v4(),
            user_id: user.id,
            provider: provider.to_string(),
            provider_id: provider_id.to_string(),
            extra_data: extra_data.clone(),
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        state.accounts.push(account.clone());

        if self.lose_next_create.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some((user, account)))
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        details: &ProfileDetails,
    ) -> Result<User, AppError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(AppError::Database(sqlx::Error::RowNotFound))?;

        if let Some(first_name) = &details.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &details.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(avatar_url) = &details.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn find_social_account(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<UserSocialAccount>, AppError> {
        tokio::task::yield_now().await;
        Ok(self.account(provider, provider_id))
    }

    async fn link_social_account(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_id: &str,
        extra_data: &serde_json::Value,
    ) -> Result<UserSocialAccount, AppError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_id == provider_id)
        {
            return Ok(existing.clone());
        }

        let now = OffsetDateTime::now_utc();
        let account = UserSocialAccount {
            id: Uuid::new_v4(),
            user_id,
            provider: provider.to_string(),
            provider_id: provider_id.to_string(),
            extra_data: extra_data.clone(),
            created_at: now,
            updated_at: now,
        };
        state.accounts.push(account.clone());
        Ok(account)
    }

    async fn update_extra_data(
        &self,
        account_id: Uuid,
        extra_data: &serde_json::Value,
    ) -> Result<(), AppError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if let Some(account) = state.accounts.iter_mut().find(|a| a.id == account_id) {
            account.extra_data = extra_data.clone();
            account.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn social_accounts_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserSocialAccount>, AppError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// ユーザーごとに1つのトークンを保持するインメモリ実装
#[derive(Default)]
pub struct MemoryCredentialStore {
    tokens: Mutex<HashMap<String, User>>,
    issued: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新規発行された回数
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    /// トークンを直接登録
    pub fn insert(&self, token: &str, user: User) {
        self.tokens.lock().unwrap().insert(token.to_string(), user);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_or_create_credential(&self, user: &User) -> Result<String, AppError> {
        let mut tokens = self.tokens.lock().unwrap();
        if let Some((key, _)) = tokens.iter().find(|(_, u)| u.id == user.id) {
            return Ok(key.clone());
        }

        let key = generate_api_token();
        tokens.insert(key.clone(), user.clone());
        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(key)
    }

    async fn authenticate(&self, token: &str) -> Result<Option<User>, AppError> {
        let tokens = self.tokens.lock().unwrap();
        Ok(tokens.get(token).filter(|u| u.is_active).cloned())
    }
}
