use chrono::{DateTime, Utc};

use crate::domain::profile::{LinkedAccount, Profile};

pub mod check_username;
pub mod get_profile;
pub mod upsert_profile;

/// Public projection of a profile; the storage identity is not part of it.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileView {
    pub username: String,
    pub bio: String,
    pub profile_picture: Option<String>,
    pub portfolio_link: Option<String>,
    pub resume_link: Option<String>,
    pub resume_file: Option<String>,
    pub accounts: Vec<LinkedAccount>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        Self {
            username: profile.username,
            bio: profile.bio,
            profile_picture: profile.profile_picture,
            portfolio_link: profile.portfolio_link,
            resume_link: profile.resume_link,
            resume_file: profile.resume_file,
            accounts: profile.accounts,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}
