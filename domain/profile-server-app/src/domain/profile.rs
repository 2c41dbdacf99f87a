use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};

use crate::domain::{Patch, ProfileId, RepoRetrieveError, RepoSaveError, validation};

#[async_trait::async_trait]
pub trait ProfileRepository {
    async fn find_by_username(&self, username: &str) -> Result<Profile, RepoRetrieveError>;
    /// Inserts when `profile.id` is unset, replaces the stored record otherwise.
    /// Uniqueness of `username` is enforced here and reported as `Conflict`.
    async fn save(&self, profile: Profile) -> Result<Profile, RepoSaveError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkedAccount {
    pub domain: String,
    pub url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetSlot {
    ProfilePicture,
    ResumeFile,
}

impl std::fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetSlot::ProfilePicture => write!(f, "profilePicture"),
            AssetSlot::ResumeFile => write!(f, "resumeFile"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub id: Option<ProfileId>,
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

impl Profile {
    pub fn from_patch(patch: ProfilePatch) -> Self {
        Self {
            id: None,
            username: patch.username.into_option().unwrap_or_default(),
            bio: patch.bio.into_option().unwrap_or_default(),
            profile_picture: None,
            portfolio_link: patch.portfolio_link.into_option(),
            resume_link: patch.resume_link.into_option(),
            resume_file: None,
            accounts: patch.accounts.into_option().unwrap_or_default(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Shallow merge: only fields present in the patch change, `accounts` is replaced
    /// as a whole.
    pub fn apply_patch(&mut self, patch: ProfilePatch) {
        patch.username.apply_to_required(&mut self.username);
        patch.bio.apply_to_required(&mut self.bio);
        patch.portfolio_link.apply_to(&mut self.portfolio_link);
        patch.resume_link.apply_to(&mut self.resume_link);
        patch.accounts.apply_to_required(&mut self.accounts);
    }

    pub fn asset(&self, slot: AssetSlot) -> Option<&str> {
        match slot {
            AssetSlot::ProfilePicture => self.profile_picture.as_deref(),
            AssetSlot::ResumeFile => self.resume_file.as_deref(),
        }
        .filter(|location| !location.is_empty())
    }

    pub fn set_asset(&mut self, slot: AssetSlot, location: String) {
        match slot {
            AssetSlot::ProfilePicture => self.profile_picture = Some(location),
            AssetSlot::ResumeFile => self.resume_file = Some(location),
        }
    }
}

/// Scalar part of an upsert request. Asset slots are only changed through uploads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfilePatch {
    pub username: Patch<String>,
    pub bio: Patch<String>,
    pub portfolio_link: Patch<String>,
    pub resume_link: Patch<String>,
    pub accounts: Patch<Vec<LinkedAccount>>,
}

#[derive(Clone, Default)]
pub struct MockProfileRepository {
    profiles: Arc<Mutex<Vec<Profile>>>,
    next_id: Arc<AtomicU64>,
    fail_storage: Arc<AtomicBool>,
}

impl MockProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_profiles(&self) -> Vec<Profile> {
        self.profiles.lock().unwrap().clone()
    }

    pub fn get_profile(&self, username: &str) -> Option<Profile> {
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.username == username)
            .cloned()
    }

    /// Makes every following call fail with a storage error.
    pub fn set_fail_storage(&self, fail: bool) {
        self.fail_storage.store(fail, Ordering::SeqCst);
    }

    fn check_storage(&self) -> Result<(), String> {
        if self.fail_storage.load(Ordering::SeqCst) {
            return Err("mock storage unavailable".to_string());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileRepository for MockProfileRepository {
    async fn find_by_username(&self, username: &str) -> Result<Profile, RepoRetrieveError> {
        self.check_storage()
            .map_err(RepoRetrieveError::StorageError)?;
        self.get_profile(username).ok_or(RepoRetrieveError::NotFound)
    }

    async fn save(&self, mut profile: Profile) -> Result<Profile, RepoSaveError> {
        self.check_storage().map_err(RepoSaveError::StorageError)?;
        validation::validate_profile(&profile).map_err(|e| RepoSaveError::Invalid(e.0))?;

        let mut profiles = self.profiles.lock().unwrap();
        let taken = profiles
            .iter()
            .any(|p| p.username == profile.username && p.id != profile.id);
        if taken {
            return Err(RepoSaveError::Conflict);
        }

        let now = Utc::now();
        profile.updated_at = Some(now);
        match &profile.id {
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                profile.id = Some(ProfileId(id.to_string()));
                profile.created_at = Some(now);
                profiles.push(profile.clone());
            }
            Some(id) => {
                let Some(stored) = profiles.iter_mut().find(|p| p.id.as_ref() == Some(id)) else {
                    return Err(RepoSaveError::StorageError(format!(
                        "profile {} does not exist",
                        id
                    )));
                };
                profile.created_at = stored.created_at.or(Some(now));
                *stored = profile.clone();
            }
        }
        Ok(profile)
    }
}
