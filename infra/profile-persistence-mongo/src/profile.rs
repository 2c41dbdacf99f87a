use bson::{DateTime, doc, oid::ObjectId};
use chrono::Utc;
use mongodb::{
    Collection, Database, IndexModel,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use profile_server_app::domain::{
    ProfileId, RepoRetrieveError, RepoSaveError,
    profile::{LinkedAccount, Profile, ProfileRepository},
    validation,
};
use serde::{Deserialize, Serialize};

pub const PROFILE_COLLECTION: &str = "userProfiles";

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
struct ProfileDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    username: String,
    #[serde(default)]
    bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    portfolio_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resume_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resume_file: Option<String>,
    #[serde(default)]
    accounts: Vec<AccountDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
struct AccountDocument {
    domain: String,
    url: String,
}

impl From<ProfileDocument> for Profile {
    fn from(document: ProfileDocument) -> Self {
        Profile {
            id: document.id.map(|id| ProfileId(id.to_hex())),
            username: document.username,
            bio: document.bio,
            profile_picture: document.profile_picture,
            portfolio_link: document.portfolio_link,
            resume_link: document.resume_link,
            resume_file: document.resume_file,
            accounts: document
                .accounts
                .into_iter()
                .map(|a| LinkedAccount {
                    domain: a.domain,
                    url: a.url,
                })
                .collect(),
            created_at: document.created_at.map(DateTime::to_chrono),
            updated_at: document.updated_at.map(DateTime::to_chrono),
        }
    }
}

impl TryFrom<Profile> for ProfileDocument {
    type Error = RepoSaveError;

    fn try_from(profile: Profile) -> Result<Self, Self::Error> {
        let id = profile
            .id
            .map(|id| {
                ObjectId::parse_str(&id.0).map_err(|e| {
                    RepoSaveError::StorageError(format!("invalid profile id {}: {}", id, e))
                })
            })
            .transpose()?;
        Ok(ProfileDocument {
            id,
            username: profile.username,
            bio: profile.bio,
            profile_picture: profile.profile_picture,
            portfolio_link: profile.portfolio_link,
            resume_link: profile.resume_link,
            resume_file: profile.resume_file,
            accounts: profile
                .accounts
                .into_iter()
                .map(|a| AccountDocument {
                    domain: a.domain,
                    url: a.url,
                })
                .collect(),
            created_at: profile.created_at.map(DateTime::from_chrono),
            updated_at: profile.updated_at.map(DateTime::from_chrono),
        })
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn map_write_error(error: mongodb::error::Error) -> RepoSaveError {
    if is_duplicate_key(&error) {
        RepoSaveError::Conflict
    } else {
        RepoSaveError::StorageError(error.to_string())
    }
}

pub struct ProfileRepositoryImpl {
    collection: Collection<ProfileDocument>,
}

impl ProfileRepositoryImpl {
    /// Binds the repository to `database` and ensures the unique username index.
    pub async fn new(database: &Database) -> Self {
        let repository = Self::from_database(database);

        let username_index = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("username_unique".to_string())
                    .build(),
            ))
            .build();
        repository
            .collection
            .create_index(username_index)
            .await
            .expect("Failed to create profile indexes");

        repository
    }

    pub fn from_database(database: &Database) -> Self {
        Self {
            collection: database.collection::<ProfileDocument>(PROFILE_COLLECTION),
        }
    }
}

#[async_trait::async_trait]
impl ProfileRepository for ProfileRepositoryImpl {
    async fn find_by_username(&self, username: &str) -> Result<Profile, RepoRetrieveError> {
        self.collection
            .find_one(doc! { "username": username })
            .await
            .map_err(|e| RepoRetrieveError::StorageError(e.to_string()))?
            .map(Profile::from)
            .ok_or(RepoRetrieveError::NotFound)
    }

    async fn save(&self, profile: Profile) -> Result<Profile, RepoSaveError> {
        validation::validate_profile(&profile).map_err(|e| RepoSaveError::Invalid(e.0))?;

        let now = DateTime::from_chrono(Utc::now());
        let mut document = ProfileDocument::try_from(profile)?;
        document.updated_at = Some(now);
        if document.created_at.is_none() {
            document.created_at = Some(now);
        }

        match document.id {
            None => {
                let result = self
                    .collection
                    .insert_one(&document)
                    .await
                    .map_err(map_write_error)?;
                document.id = result.inserted_id.as_object_id();
                log::debug!("Inserted profile {}", document.username);
            }
            Some(id) => {
                let result = self
                    .collection
                    .replace_one(doc! { "_id": id }, &document)
                    .await
                    .map_err(map_write_error)?;
                if result.matched_count == 0 {
                    return Err(RepoSaveError::StorageError(format!(
                        "profile {} does not exist",
                        id
                    )));
                }
                log::debug!("Replaced profile {}", document.username);
            }
        }

        Ok(document.into())
    }
}
