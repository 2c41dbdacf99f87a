use std::sync::Arc;

use crate::{
    domain::{
        RepoRetrieveError, RepoSaveError,
        profile::{AssetSlot, Profile, ProfilePatch, ProfileRepository},
        validation,
    },
    ports::asset_store::{AssetStore, AssetUpload, StoredAsset},
    workflow::profile::ProfileView,
};

const UPLOAD_FAILED_MESSAGE: &str = "Failed to upload image. Please try again later.";
const DELETE_FAILED_MESSAGE: &str = "Failed to delete previous asset. Please try again later.";

/// New binaries supplied with an upsert, one optional upload per asset slot.
#[derive(Clone, Debug, Default)]
pub struct ProfileAssets {
    pub profile_picture: Option<AssetUpload>,
    pub resume_file: Option<AssetUpload>,
}

impl ProfileAssets {
    fn into_slots(self) -> [(AssetSlot, Option<AssetUpload>); 2] {
        [
            (AssetSlot::ProfilePicture, self.profile_picture),
            (AssetSlot::ResumeFile, self.resume_file),
        ]
    }
}

#[async_trait::async_trait]
pub trait UpsertProfileUseCase {
    async fn upsert_profile(
        &self,
        patch: ProfilePatch,
        assets: ProfileAssets,
    ) -> Result<ProfileView, UpsertProfileError>;
}

#[derive(Debug)]
pub enum UpsertProfileError {
    Validation(String),
    DuplicateUsername,
    Upload(String),
    RepositoryError(String),
}

impl std::fmt::Display for UpsertProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertProfileError::Validation(msg) => write!(f, "{}", msg),
            UpsertProfileError::DuplicateUsername => write!(f, "Username already exists"),
            UpsertProfileError::Upload(msg) => write!(f, "{}", msg),
            UpsertProfileError::RepositoryError(msg) => write!(f, "{}", msg),
        }
    }
}

/// Validate, locate or create, merge, replace uploaded assets, persist.
///
/// Asset slots are synchronized one after the other. Within a slot the previous object
/// is deleted *before* the replacement is uploaded, so a failed upload leaves the stored
/// profile pointing at an object that no longer exists. A failed save after a successful
/// swap leaves the new object orphaned. Neither case is repaired here; both are logged.
pub struct UpsertProfileUseCaseImpl<PR: ProfileRepository, AS: AssetStore> {
    profile_repository: Arc<PR>,
    asset_store: Arc<AS>,
}

impl<PR: ProfileRepository, AS: AssetStore> UpsertProfileUseCaseImpl<PR, AS> {
    pub fn new(profile_repository: Arc<PR>, asset_store: Arc<AS>) -> Self {
        Self {
            profile_repository,
            asset_store,
        }
    }
}

impl<PR, AS> UpsertProfileUseCaseImpl<PR, AS>
where
    PR: ProfileRepository + Send + Sync + 'static,
    AS: AssetStore + Send + Sync + 'static,
{
    async fn locate(&self, patch: &ProfilePatch) -> Result<Option<Profile>, UpsertProfileError> {
        let Some(username) = patch.username.as_set() else {
            return Ok(None);
        };
        match self.profile_repository.find_by_username(username).await {
            Ok(profile) => Ok(Some(profile)),
            Err(RepoRetrieveError::NotFound) => Ok(None),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to look up profile {}: {}", username, e);
                Err(UpsertProfileError::RepositoryError(e))
            }
        }
    }

    async fn replace_asset(
        &self,
        profile: &mut Profile,
        slot: AssetSlot,
        upload: AssetUpload,
    ) -> Result<StoredAsset, UpsertProfileError> {
        let previous_key = profile
            .asset(slot)
            .and_then(|location| self.asset_store.key_for_location(location));

        let deleted_previous = previous_key.is_some();
        if let Some(key) = previous_key {
            if let Err(e) = self.asset_store.delete(&key).await {
                log::error!(
                    "Failed to delete {} object for {}: {}",
                    slot,
                    profile.username,
                    e
                );
                return Err(UpsertProfileError::Upload(DELETE_FAILED_MESSAGE.to_string()));
            }
            log::info!(
                "Deleted previous {} object {} of {}",
                slot,
                key,
                profile.username
            );
        }

        let stored = match self.asset_store.put(upload).await {
            Ok(stored) => stored,
            Err(e) => {
                if deleted_previous {
                    log::warn!(
                        "Upload of {} for {} failed after its previous object was deleted; stored reference {} is dangling",
                        slot,
                        profile.username,
                        profile.asset(slot).unwrap_or_default()
                    );
                }
                log::error!(
                    "Failed to upload {} object for {}: {}",
                    slot,
                    profile.username,
                    e
                );
                return Err(UpsertProfileError::Upload(UPLOAD_FAILED_MESSAGE.to_string()));
            }
        };
        log::info!(
            "Uploaded {} object {} for {}",
            slot,
            stored.key,
            profile.username
        );
        profile.set_asset(slot, stored.location.clone());
        Ok(stored)
    }
}

#[async_trait::async_trait]
impl<PR, AS> UpsertProfileUseCase for UpsertProfileUseCaseImpl<PR, AS>
where
    PR: ProfileRepository + Send + Sync + 'static,
    AS: AssetStore + Send + Sync + 'static,
{
    async fn upsert_profile(
        &self,
        patch: ProfilePatch,
        assets: ProfileAssets,
    ) -> Result<ProfileView, UpsertProfileError> {
        validation::validate_patch(&patch)
            .map_err(|e| UpsertProfileError::Validation(e.to_string()))?;

        let mut profile = match self.locate(&patch).await? {
            Some(mut existing) => {
                existing.apply_patch(patch);
                existing
            }
            None => Profile::from_patch(patch),
        };

        validation::validate_merged_profile(&profile, assets.resume_file.is_some())
            .map_err(|e| UpsertProfileError::Validation(e.to_string()))?;

        let mut uploaded = Vec::new();
        for (slot, upload) in assets.into_slots() {
            let Some(upload) = upload else {
                continue;
            };
            let stored = self.replace_asset(&mut profile, slot, upload).await?;
            uploaded.push((slot, stored));
        }

        let username = profile.username.clone();
        let result = self.profile_repository.save(profile).await;
        if result.is_err() {
            for (slot, stored) in &uploaded {
                log::warn!(
                    "Saving profile {} failed; uploaded {} object {} is orphaned",
                    username,
                    slot,
                    stored.key
                );
            }
        }

        match result {
            Ok(saved) => Ok(saved.into()),
            Err(RepoSaveError::Conflict) => {
                log::info!("Username {} was claimed concurrently", username);
                Err(UpsertProfileError::DuplicateUsername)
            }
            Err(RepoSaveError::Invalid(msg)) => Err(UpsertProfileError::Validation(msg)),
            Err(RepoSaveError::StorageError(e)) => {
                log::error!("Failed to save profile {}: {}", username, e);
                Err(UpsertProfileError::RepositoryError(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::sync::Barrier;

    use crate::{
        domain::{
            Patch,
            profile::{LinkedAccount, MockProfileRepository},
            validation::RESUME_REQUIRED,
        },
        ports::asset_store::MockAssetStore,
        workflow::profile::check_username::{
            CheckUsernameUseCase, CheckUsernameUseCaseImpl, UsernameAvailability,
        },
    };

    use super::*;

    fn text(value: &str) -> Patch<String> {
        Patch::Set(value.to_string())
    }

    fn upload(content: &'static [u8], content_type: &str) -> AssetUpload {
        AssetUpload {
            data: Bytes::from_static(content),
            content_type: content_type.to_string(),
        }
    }

    fn setup() -> (
        Arc<MockProfileRepository>,
        Arc<MockAssetStore>,
        UpsertProfileUseCaseImpl<MockProfileRepository, MockAssetStore>,
    ) {
        let repo = Arc::new(MockProfileRepository::new());
        let store = Arc::new(MockAssetStore::default());
        let use_case = UpsertProfileUseCaseImpl::new(repo.clone(), store.clone());
        (repo, store, use_case)
    }

    fn create_patch() -> ProfilePatch {
        ProfilePatch {
            username: text("john_doe-99"),
            bio: text("hi"),
            resume_link: text("https://x.com/r"),
            ..Default::default()
        }
    }

    async fn seed_with_picture(
        use_case: &UpsertProfileUseCaseImpl<MockProfileRepository, MockAssetStore>,
    ) -> ProfileView {
        use_case
            .upsert_profile(
                create_patch(),
                ProfileAssets {
                    profile_picture: Some(upload(b"old", "image/png")),
                    resume_file: None,
                },
            )
            .await
            .expect("seed profile")
    }

    #[tokio::test]
    async fn test_create_profile() {
        let (repo, store, use_case) = setup();
        let check = CheckUsernameUseCaseImpl::new(repo.clone());

        let view = use_case
            .upsert_profile(create_patch(), ProfileAssets::default())
            .await
            .unwrap();

        assert_eq!(view.username, "john_doe-99");
        assert_eq!(view.bio, "hi");
        assert_eq!(view.resume_link.as_deref(), Some("https://x.com/r"));
        assert_eq!(view.resume_file, None);
        assert!(view.created_at.is_some());
        assert!(store.get_keys().is_empty());
        assert_eq!(
            check.check_username("john_doe-99").await.unwrap(),
            UsernameAvailability::Taken
        );
    }

    #[tokio::test]
    async fn test_patch_only_changes_present_fields() {
        let (repo, _store, use_case) = setup();
        use_case
            .upsert_profile(create_patch(), ProfileAssets::default())
            .await
            .unwrap();

        let view = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("john_doe-99"),
                    bio: text("updated"),
                    ..Default::default()
                },
                ProfileAssets::default(),
            )
            .await
            .unwrap();

        assert_eq!(view.bio, "updated");
        assert_eq!(view.resume_link.as_deref(), Some("https://x.com/r"));
        assert_eq!(repo.get_profiles().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_resume_is_rejected_before_any_side_effect() {
        let (repo, store, use_case) = setup();
        let result = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("john_doe-99"),
                    bio: text("hi"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: Some(upload(b"pic", "image/png")),
                    resume_file: None,
                },
            )
            .await;

        assert!(matches!(result, Err(UpsertProfileError::Validation(msg)) if msg == RESUME_REQUIRED));
        assert!(repo.get_profiles().is_empty());
        assert!(store.get_keys().is_empty());
    }

    #[tokio::test]
    async fn test_clearing_last_resume_reference_is_rejected() {
        let (repo, _store, use_case) = setup();
        use_case
            .upsert_profile(create_patch(), ProfileAssets::default())
            .await
            .unwrap();

        let result = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("john_doe-99"),
                    resume_link: Patch::Clear,
                    ..Default::default()
                },
                ProfileAssets::default(),
            )
            .await;

        assert!(matches!(result, Err(UpsertProfileError::Validation(msg)) if msg == RESUME_REQUIRED));
        let stored = repo.get_profile("john_doe-99").unwrap();
        assert_eq!(stored.resume_link.as_deref(), Some("https://x.com/r"));
    }

    #[tokio::test]
    async fn test_invalid_patch_does_not_touch_repository() {
        let (repo, _store, use_case) = setup();
        repo.set_fail_storage(true);
        let result = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("-john"),
                    ..Default::default()
                },
                ProfileAssets::default(),
            )
            .await;
        assert!(matches!(result, Err(UpsertProfileError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_username_is_a_validation_failure() {
        let (repo, _store, use_case) = setup();
        let result = use_case
            .upsert_profile(
                ProfilePatch {
                    bio: text("hi"),
                    resume_link: text("https://x.com/r"),
                    ..Default::default()
                },
                ProfileAssets::default(),
            )
            .await;
        assert!(
            matches!(result, Err(UpsertProfileError::Validation(msg)) if msg == validation::USERNAME_REQUIRED)
        );
        assert!(repo.get_profiles().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_resume_file_only() {
        let (repo, store, use_case) = setup();
        let view = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("jane"),
                    bio: text("hello"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: None,
                    resume_file: Some(upload(b"%PDF", "application/pdf")),
                },
            )
            .await
            .unwrap();

        let keys = store.get_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(view.resume_file, Some(store.location_for(&keys[0])));
        assert_eq!(view.resume_link, None);
        assert_eq!(
            store.get_object(&keys[0]).unwrap().content_type,
            "application/pdf"
        );
        assert_eq!(repo.get_profile("jane").unwrap().resume_file, view.resume_file);
    }

    #[tokio::test]
    async fn test_merge_patch_is_idempotent() {
        let (repo, _store, use_case) = setup();
        use_case
            .upsert_profile(create_patch(), ProfileAssets::default())
            .await
            .unwrap();

        let patch = ProfilePatch {
            username: text("john_doe-99"),
            accounts: Patch::Set(vec![
                LinkedAccount {
                    domain: "LeetCode".to_string(),
                    url: "https://leetcode.com/john".to_string(),
                },
                LinkedAccount {
                    domain: "GitHub".to_string(),
                    url: "https://github.com/john".to_string(),
                },
            ]),
            portfolio_link: text("https://myportfolio.com"),
            ..Default::default()
        };

        let first = use_case
            .upsert_profile(patch.clone(), ProfileAssets::default())
            .await
            .unwrap();
        let second = use_case
            .upsert_profile(patch, ProfileAssets::default())
            .await
            .unwrap();

        assert_eq!(second.accounts.len(), 2);
        assert_eq!(
            ProfileView {
                updated_at: None,
                ..first
            },
            ProfileView {
                updated_at: None,
                ..second
            }
        );
        assert_eq!(repo.get_profiles().len(), 1);
    }

    #[tokio::test]
    async fn test_replacing_profile_picture_keeps_one_live_object() {
        let (repo, store, use_case) = setup();
        let seeded = seed_with_picture(&use_case).await;
        let old_keys = store.get_keys();
        assert_eq!(old_keys.len(), 1);
        assert_eq!(seeded.profile_picture, Some(store.location_for(&old_keys[0])));

        let view = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("john_doe-99"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: Some(upload(b"new", "image/jpeg")),
                    resume_file: None,
                },
            )
            .await
            .unwrap();

        let keys = store.get_keys();
        assert_eq!(keys.len(), 1);
        assert_ne!(keys[0], old_keys[0]);
        assert_eq!(view.profile_picture, Some(store.location_for(&keys[0])));
        assert_eq!(
            repo.get_profile("john_doe-99").unwrap().profile_picture,
            view.profile_picture
        );
        assert_eq!(store.get_object(&keys[0]).unwrap().data, Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn test_replacing_resume_file_keeps_one_live_object() {
        let (repo, store, use_case) = setup();
        let seeded = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("jane"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: None,
                    resume_file: Some(upload(b"%PDF-1", "application/pdf")),
                },
            )
            .await
            .unwrap();
        let old_keys = store.get_keys();
        assert_eq!(old_keys.len(), 1);
        assert_eq!(seeded.resume_file, Some(store.location_for(&old_keys[0])));

        let view = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("jane"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: None,
                    resume_file: Some(upload(b"%PDF-2", "application/pdf")),
                },
            )
            .await
            .unwrap();

        let keys = store.get_keys();
        assert_eq!(keys.len(), 1);
        assert_ne!(keys[0], old_keys[0]);
        assert_eq!(view.resume_file, Some(store.location_for(&keys[0])));
        assert_eq!(view.profile_picture, None);
        assert_eq!(repo.get_profile("jane").unwrap().resume_file, view.resume_file);
        assert_eq!(
            store.get_object(&keys[0]).unwrap().data,
            Bytes::from_static(b"%PDF-2")
        );
    }

    #[tokio::test]
    async fn test_both_slots_are_synchronized_independently() {
        let (_repo, store, use_case) = setup();
        seed_with_picture(&use_case).await;
        let picture_key = store.get_keys()[0].clone();

        let view = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("john_doe-99"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: None,
                    resume_file: Some(upload(b"%PDF", "application/pdf")),
                },
            )
            .await
            .unwrap();

        let keys = store.get_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&picture_key));
        assert_eq!(view.profile_picture, Some(store.location_for(&picture_key)));
        assert!(view.resume_file.is_some());
    }

    #[tokio::test]
    async fn test_upload_failure_during_replace_leaves_dangling_reference() {
        let (repo, store, use_case) = setup();
        let seeded = seed_with_picture(&use_case).await;

        store.set_fail_put(true);
        let result = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("john_doe-99"),
                    bio: text("changed"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: Some(upload(b"new", "image/png")),
                    resume_file: None,
                },
            )
            .await;

        assert!(matches!(result, Err(UpsertProfileError::Upload(_))));
        // The old object is gone and the new one never existed.
        assert!(store.get_keys().is_empty());
        // Nothing was persisted: the record still references the deleted object.
        let stored = repo.get_profile("john_doe-99").unwrap();
        assert_eq!(stored.bio, "hi");
        assert_eq!(stored.profile_picture, seeded.profile_picture);
    }

    #[tokio::test]
    async fn test_delete_failure_aborts_before_upload() {
        let (repo, store, use_case) = setup();
        let seeded = seed_with_picture(&use_case).await;
        let old_keys = store.get_keys();

        store.set_fail_delete(true);
        let result = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("john_doe-99"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: Some(upload(b"new", "image/png")),
                    resume_file: None,
                },
            )
            .await;

        assert!(matches!(result, Err(UpsertProfileError::Upload(_))));
        assert_eq!(store.get_keys(), old_keys);
        assert_eq!(
            repo.get_profile("john_doe-99").unwrap().profile_picture,
            seeded.profile_picture
        );
    }

    struct FailingSaveRepository(MockProfileRepository);

    #[async_trait::async_trait]
    impl ProfileRepository for FailingSaveRepository {
        async fn find_by_username(&self, username: &str) -> Result<Profile, RepoRetrieveError> {
            self.0.find_by_username(username).await
        }

        async fn save(&self, _profile: Profile) -> Result<Profile, RepoSaveError> {
            Err(RepoSaveError::StorageError("write rejected".to_string()))
        }
    }

    #[tokio::test]
    async fn test_save_failure_after_swap_orphans_new_object() {
        let (repo, store, use_case) = setup();
        let seeded = seed_with_picture(&use_case).await;
        let old_keys = store.get_keys();

        let failing = UpsertProfileUseCaseImpl::new(
            Arc::new(FailingSaveRepository(repo.as_ref().clone())),
            store.clone(),
        );
        let result = failing
            .upsert_profile(
                ProfilePatch {
                    username: text("john_doe-99"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: Some(upload(b"new", "image/png")),
                    resume_file: None,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(UpsertProfileError::RepositoryError(ref msg)) if msg == "write rejected"
        ));
        let keys = store.get_keys();
        assert_eq!(keys.len(), 1);
        assert_ne!(keys, old_keys);
        // The record still points at the deleted object; the new one is unreferenced.
        assert_eq!(
            repo.get_profile("john_doe-99").unwrap().profile_picture,
            seeded.profile_picture
        );
    }

    #[tokio::test]
    async fn test_external_picture_reference_is_not_deleted() {
        let (repo, store, use_case) = setup();
        use_case
            .upsert_profile(create_patch(), ProfileAssets::default())
            .await
            .unwrap();
        let mut stored = repo.get_profile("john_doe-99").unwrap();
        stored.profile_picture = Some("https://lh3.googleusercontent.com/a/profile-image".into());
        repo.save(stored).await.unwrap();

        store.set_fail_delete(true);
        let view = use_case
            .upsert_profile(
                ProfilePatch {
                    username: text("john_doe-99"),
                    ..Default::default()
                },
                ProfileAssets {
                    profile_picture: Some(upload(b"pic", "image/png")),
                    resume_file: None,
                },
            )
            .await
            .unwrap();

        let keys = store.get_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(view.profile_picture, Some(store.location_for(&keys[0])));
    }

    /// Lets two upserts both observe "not found" before either of them saves.
    struct RacingProfileRepository {
        inner: MockProfileRepository,
        barrier: Barrier,
    }

    #[async_trait::async_trait]
    impl ProfileRepository for RacingProfileRepository {
        async fn find_by_username(&self, username: &str) -> Result<Profile, RepoRetrieveError> {
            let result = self.inner.find_by_username(username).await;
            self.barrier.wait().await;
            result
        }

        async fn save(&self, profile: Profile) -> Result<Profile, RepoSaveError> {
            self.inner.save(profile).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_create_reports_duplicate() {
        let inner = MockProfileRepository::new();
        let check = CheckUsernameUseCaseImpl::new(Arc::new(inner.clone()));
        assert_eq!(
            check.check_username("john_doe-99").await.unwrap(),
            UsernameAvailability::Available
        );

        let repo = Arc::new(RacingProfileRepository {
            inner: inner.clone(),
            barrier: Barrier::new(2),
        });
        let use_case = UpsertProfileUseCaseImpl::new(repo, Arc::new(MockAssetStore::default()));

        let other = ProfilePatch {
            bio: text("other"),
            ..create_patch()
        };
        let (a, b) = tokio::join!(
            use_case.upsert_profile(create_patch(), ProfileAssets::default()),
            use_case.upsert_profile(other, ProfileAssets::default()),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(UpsertProfileError::DuplicateUsername)))
                .count(),
            1
        );
        assert_eq!(inner.get_profiles().len(), 1);
    }
}
