use std::sync::Arc;

use crate::domain::{RepoRetrieveError, profile::ProfileRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameAvailability {
    Available,
    Taken,
}

/// Advisory only: a concurrent upsert may still claim an available name before the
/// caller does. The repository's uniqueness constraint is what decides.
#[async_trait::async_trait]
pub trait CheckUsernameUseCase {
    async fn check_username(
        &self,
        username: &str,
    ) -> Result<UsernameAvailability, CheckUsernameError>;
}

#[derive(Debug)]
pub enum CheckUsernameError {
    RepositoryError,
}

pub struct CheckUsernameUseCaseImpl<PR: ProfileRepository> {
    profile_repository: Arc<PR>,
}

impl<PR: ProfileRepository> CheckUsernameUseCaseImpl<PR> {
    pub fn new(profile_repository: Arc<PR>) -> Self {
        Self { profile_repository }
    }
}

#[async_trait::async_trait]
impl<PR: ProfileRepository + Send + Sync + 'static> CheckUsernameUseCase
    for CheckUsernameUseCaseImpl<PR>
{
    async fn check_username(
        &self,
        username: &str,
    ) -> Result<UsernameAvailability, CheckUsernameError> {
        match self.profile_repository.find_by_username(username).await {
            Ok(_) => Ok(UsernameAvailability::Taken),
            Err(RepoRetrieveError::NotFound) => Ok(UsernameAvailability::Available),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to look up username {}: {}", username, e);
                Err(CheckUsernameError::RepositoryError)
            }
        }
    }
}
