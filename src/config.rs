use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    /// 起動時に migrations/ を適用するか
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,

    // ソーシャルログイン設定
    /// 有効なプロバイダ名（カンマ区切り、例: `google-oauth2,facebook`）
    #[serde(default = "default_social_auth_providers")]
    pub social_auth_providers: Vec<String>,
    /// プロバイダ userinfo API のタイムアウト（秒）
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    // userinfo エンドポイント（テスト時に差し替え可能）
    #[serde(default = "default_google_userinfo_url")]
    pub google_userinfo_url: String,
    #[serde(default = "default_facebook_userinfo_url")]
    pub facebook_userinfo_url: String,
    #[serde(default = "default_github_userinfo_url")]
    pub github_userinfo_url: String,

    /// 検証済みメールアドレスで既存ユーザーに紐付けるか
    ///
    /// # Security
    /// メールアドレスを検証しないプロバイダでは乗っ取りの経路になるため、
    /// 検証済みフラグが立っている場合のみ紐付ける
    #[serde(default = "default_associate_by_email")]
    pub associate_by_email: bool,
    /// 許可するメールドメイン（空なら制限なし）
    #[serde(default)]
    pub whitelisted_domains: Vec<String>,

    /// CORS 許可オリジン（空なら CORS レイヤーを追加しない）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const FACEBOOK_USERINFO_URL: &str = "https://graph.facebook.com/me";
pub const GITHUB_USERINFO_URL: &str = "https://api.github.com/user";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_run_migrations() -> bool {
    true
}

fn default_social_auth_providers() -> Vec<String> {
    vec!["google-oauth2".to_string(), "facebook".to_string()]
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

fn default_google_userinfo_url() -> String {
    GOOGLE_USERINFO_URL.to_string()
}

fn default_facebook_userinfo_url() -> String {
    FACEBOOK_USERINFO_URL.to_string()
}

fn default_github_userinfo_url() -> String {
    GITHUB_USERINFO_URL.to_string()
}

fn default_associate_by_email() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// 任意のキー・値の組から設定を読み込む（キーは環境変数と同じ大文字表記）
    pub fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_pairs(pairs(&[("DATABASE_URL", "postgres://localhost/db")]))
            .unwrap();

        assert_eq!(config.database_url.expose_secret(), "postgres://localhost/db");
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.run_migrations);
        assert_eq!(config.social_auth_providers, vec!["google-oauth2", "facebook"]);
        assert_eq!(config.provider_timeout_secs, 10);
        assert_eq!(config.google_userinfo_url, GOOGLE_USERINFO_URL);
        assert!(config.associate_by_email);
        assert!(config.whitelisted_domains.is_empty());
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn test_comma_separated_lists() {
        let config = Config::from_pairs(pairs(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("SOCIAL_AUTH_PROVIDERS", "github,facebook"),
            ("WHITELISTED_DOMAINS", "example.com,example.org"),
            ("ASSOCIATE_BY_EMAIL", "false"),
        ]))
        .unwrap();

        assert_eq!(config.social_auth_providers, vec!["github", "facebook"]);
        assert_eq!(config.whitelisted_domains, vec!["example.com", "example.org"]);
        assert!(!config.associate_by_email);
    }

    #[test]
    fn test_missing_database_url() {
        let result = Config::from_pairs(pairs(&[("PORT", "8080")]));
        assert!(result.is_err());
    }
}
