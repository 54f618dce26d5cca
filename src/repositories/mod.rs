pub mod api_token;
pub mod user;
pub mod user_social_account;

pub use api_token::ApiTokenRepository;
pub use user::UserRepository;
pub use user_social_account::UserSocialAccountRepository;
