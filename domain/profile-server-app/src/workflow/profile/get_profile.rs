use std::sync::Arc;

use crate::{
    domain::{RepoRetrieveError, profile::ProfileRepository},
    workflow::profile::ProfileView,
};

#[async_trait::async_trait]
pub trait GetProfileUseCase {
    async fn get_profile(&self, username: &str) -> Result<ProfileView, GetProfileError>;
}

#[derive(Debug)]
pub enum GetProfileError {
    NotFound,
    RepositoryError,
}

pub struct GetProfileUseCaseImpl<PR: ProfileRepository> {
    profile_repository: Arc<PR>,
}

impl<PR: ProfileRepository> GetProfileUseCaseImpl<PR> {
    pub fn new(profile_repository: Arc<PR>) -> Self {
        Self { profile_repository }
    }
}

#[async_trait::async_trait]
impl<PR: ProfileRepository + Send + Sync + 'static> GetProfileUseCase
    for GetProfileUseCaseImpl<PR>
{
    async fn get_profile(&self, username: &str) -> Result<ProfileView, GetProfileError> {
        match self.profile_repository.find_by_username(username).await {
            Ok(profile) => Ok(profile.into()),
            Err(RepoRetrieveError::NotFound) => Err(GetProfileError::NotFound),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to retrieve profile for {}: {}", username, e);
                Err(GetProfileError::RepositoryError)
            }
        }
    }
}
