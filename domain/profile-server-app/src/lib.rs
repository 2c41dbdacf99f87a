use std::sync::Arc;

use crate::{
    domain::profile::ProfileRepository,
    ports::asset_store::AssetStore,
    workflow::profile::{
        check_username::{CheckUsernameUseCase, CheckUsernameUseCaseImpl},
        get_profile::{GetProfileUseCase, GetProfileUseCaseImpl},
        upsert_profile::{UpsertProfileUseCase, UpsertProfileUseCaseImpl},
    },
};

pub mod domain;
pub mod ports;
pub mod workflow;

pub struct Application {
    pub check_username_use_case: Box<dyn CheckUsernameUseCase + Send + Sync + 'static>,
    pub get_profile_use_case: Box<dyn GetProfileUseCase + Send + Sync + 'static>,
    pub upsert_profile_use_case: Box<dyn UpsertProfileUseCase + Send + Sync + 'static>,
}

pub fn build_application<
    PR: ProfileRepository + Send + Sync + 'static,
    AS: AssetStore + Send + Sync + 'static,
>(
    profile_repository: Arc<PR>,
    asset_store: Arc<AS>,
) -> Application {
    Application {
        check_username_use_case: Box::new(CheckUsernameUseCaseImpl::new(
            profile_repository.clone(),
        )),
        get_profile_use_case: Box::new(GetProfileUseCaseImpl::new(profile_repository.clone())),
        upsert_profile_use_case: Box::new(UpsertProfileUseCaseImpl::new(
            profile_repository.clone(),
            asset_store.clone(),
        )),
    }
}
