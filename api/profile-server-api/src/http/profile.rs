use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use profile_server_app::{
    domain::{
        Patch,
        profile::{AssetSlot, LinkedAccount, ProfilePatch},
        validation,
    },
    ports::asset_store::AssetUpload,
    workflow::profile::{
        ProfileView,
        check_username::{CheckUsernameError, UsernameAvailability},
        get_profile::GetProfileError,
        upsert_profile::{ProfileAssets, UpsertProfileError},
    },
};

use crate::{
    app::{ResponseBody, ServiceError},
    http::AppState,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(serde::Deserialize)]
pub struct JsonCheckUsernameRequest {
    #[serde(default)]
    username: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct JsonLinkedAccount {
    #[serde(default)]
    domain: String,
    #[serde(default)]
    url: String,
}

#[derive(serde::Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JsonProfile {
    username: String,
    bio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    portfolio_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resume_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resume_file: Option<String>,
    accounts: Vec<JsonLinkedAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl From<ProfileView> for JsonProfile {
    fn from(view: ProfileView) -> Self {
        Self {
            username: view.username,
            bio: view.bio,
            profile_picture: view.profile_picture,
            portfolio_link: view.portfolio_link,
            resume_link: view.resume_link,
            resume_file: view.resume_file,
            accounts: view
                .accounts
                .into_iter()
                .map(|a| JsonLinkedAccount {
                    domain: a.domain,
                    url: a.url,
                })
                .collect(),
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

pub async fn check_username(
    State(app_state): State<AppState>,
    request: Result<Json<JsonCheckUsernameRequest>, JsonRejection>,
) -> Result<Json<ResponseBody<()>>, ServiceError> {
    let Json(request) = request.map_err(|e| ServiceError::BadRequest(e.body_text()))?;
    let username = request.username.unwrap_or_default();
    validation::validate_username(&username)
        .map_err(|e| ServiceError::BadRequest(e.to_string()))?;

    match app_state
        .app
        .check_username_use_case
        .check_username(&username)
        .await
    {
        Ok(UsernameAvailability::Available) => Ok(ResponseBody::message("Username is available")),
        Ok(UsernameAvailability::Taken) => Err(ServiceError::Conflict(
            "Username already exists".to_string(),
        )),
        Err(CheckUsernameError::RepositoryError) => Err(ServiceError::Internal(
            "Failed to check username availability".to_string(),
        )),
    }
}

pub async fn get_profile(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
) -> Result<Json<ResponseBody<JsonProfile>>, ServiceError> {
    match app_state.app.get_profile_use_case.get_profile(&username).await {
        Ok(view) => Ok(ResponseBody::with_data("User data fetched", view.into())),
        Err(GetProfileError::NotFound) => {
            Err(ServiceError::NotFound("User profile not found".to_string()))
        }
        Err(GetProfileError::RepositoryError) => Err(ServiceError::Internal(
            "Failed to fetch user profile".to_string(),
        )),
    }
}

pub async fn upsert_profile(
    State(app_state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ResponseBody<JsonProfile>>, ServiceError> {
    let multipart = multipart.map_err(|e| ServiceError::BadRequest(e.body_text()))?;
    let (patch, assets) = ProfileForm::read(multipart).await?;

    match app_state
        .app
        .upsert_profile_use_case
        .upsert_profile(patch, assets)
        .await
    {
        Ok(view) => Ok(ResponseBody::with_data("User Profile updated", view.into())),
        Err(UpsertProfileError::Validation(msg)) => Err(ServiceError::BadRequest(msg)),
        Err(UpsertProfileError::DuplicateUsername) => Err(ServiceError::Conflict(
            "Username already exists".to_string(),
        )),
        Err(UpsertProfileError::Upload(msg)) => Err(ServiceError::Unavailable(msg)),
        Err(UpsertProfileError::RepositoryError(msg)) => Err(ServiceError::Internal(msg)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AccountPart {
    Domain,
    Url,
}

/// `accounts[<index>][domain|url]`
fn parse_account_field(name: &str) -> Option<(usize, AccountPart)> {
    let rest = name.strip_prefix("accounts[")?.strip_suffix(']')?;
    let (index, part) = rest.split_once("][")?;
    let index = index.parse().ok()?;
    match part {
        "domain" => Some((index, AccountPart::Domain)),
        "url" => Some((index, AccountPart::Url)),
        _ => None,
    }
}

fn multipart_error(error: MultipartError) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(error.body_text())
    } else {
        ServiceError::BadRequest(error.body_text())
    }
}

/// Collects the parts of a multipart profile update.
#[derive(Default)]
struct ProfileForm {
    patch: ProfilePatch,
    assets: ProfileAssets,
    indexed_accounts: BTreeMap<usize, JsonLinkedAccount>,
}

impl ProfileForm {
    async fn read(mut multipart: Multipart) -> Result<(ProfilePatch, ProfileAssets), ServiceError> {
        let mut form = ProfileForm::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                "profilePicture" => form.read_asset(AssetSlot::ProfilePicture, field).await?,
                "resumeFile" => form.read_asset(AssetSlot::ResumeFile, field).await?,
                _ => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.read_text(&name, value.trim())?;
                }
            }
        }
        Ok(form.finish())
    }

    async fn read_asset(&mut self, slot: AssetSlot, field: Field<'_>) -> Result<(), ServiceError> {
        if field.file_name().is_none() {
            return Ok(());
        }
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        if data.is_empty() {
            return Ok(());
        }

        let target = match slot {
            AssetSlot::ProfilePicture => &mut self.assets.profile_picture,
            AssetSlot::ResumeFile => &mut self.assets.resume_file,
        };
        if target.is_some() {
            return Err(ServiceError::BadRequest(format!(
                "Only one {} file may be uploaded",
                slot
            )));
        }
        *target = Some(AssetUpload { data, content_type });
        Ok(())
    }

    fn read_text(&mut self, name: &str, value: &str) -> Result<(), ServiceError> {
        let text = Some(value.to_string());
        match name {
            "username" => self.patch.username = Patch::from_text(text),
            "bio" => self.patch.bio = Patch::from_text(text),
            "portfolioLink" => self.patch.portfolio_link = Patch::from_text(text),
            "resumeLink" => self.patch.resume_link = Patch::from_text(text),
            "accounts" => self.patch.accounts = parse_accounts(value)?,
            _ => {
                let Some((index, part)) = parse_account_field(name) else {
                    return Ok(());
                };
                let account = self.indexed_accounts.entry(index).or_insert(JsonLinkedAccount {
                    domain: String::new(),
                    url: String::new(),
                });
                match part {
                    AccountPart::Domain => account.domain = value.to_string(),
                    AccountPart::Url => account.url = value.to_string(),
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> (ProfilePatch, ProfileAssets) {
        if self.patch.accounts.is_absent() && !self.indexed_accounts.is_empty() {
            self.patch.accounts = Patch::Set(
                self.indexed_accounts
                    .into_values()
                    .map(|a| LinkedAccount {
                        domain: a.domain,
                        url: a.url,
                    })
                    .collect(),
            );
        }
        (self.patch, self.assets)
    }
}

fn parse_accounts(value: &str) -> Result<Patch<Vec<LinkedAccount>>, ServiceError> {
    if value.is_empty() {
        return Ok(Patch::Clear);
    }
    let accounts: Vec<JsonLinkedAccount> = serde_json::from_str(value)
        .map_err(|_| ServiceError::BadRequest("Accounts must be a list".to_string()))?;
    Ok(Patch::Set(
        accounts
            .into_iter()
            .map(|a| LinkedAccount {
                domain: a.domain.trim().to_string(),
                url: a.url.trim().to_string(),
            })
            .collect(),
    ))
}
