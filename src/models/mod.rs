pub mod api_token;
pub mod user;
pub mod user_social_account;

pub use api_token::ApiToken;
pub use user::{NewUser, ProfileDetails, User};
pub use user_social_account::UserSocialAccount;
