//! Stateless checks on profile payloads and merged records.
//!
//! Every check is fail-fast: the first violated rule is reported and nothing after it is
//! looked at. Fields are checked in a fixed order so the reported rule is deterministic.

use std::sync::LazyLock;

use regex::Regex;
use validator::{Validate, ValidationErrors};

use crate::domain::{
    Patch,
    profile::{LinkedAccount, Profile, ProfilePatch},
};

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9_-]*[a-zA-Z0-9])?$").unwrap());

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(http|https)://[a-zA-Z0-9\-_.]+(\.[a-zA-Z]{2,})?(:[0-9]{1,5})?(/[a-zA-Z0-9\-_.~!*'();:@&=+$,/?#\[\]%]*)?$",
    )
    .unwrap()
});

pub const USERNAME_REQUIRED: &str = "Username is a required field";
pub const BIO_REQUIRED: &str = "Bio is a mandatory field";
pub const RESUME_REQUIRED: &str = "Either Resume Link or Resume File is required";
const PORTFOLIO_LINK_INVALID: &str = "Portfolio link must be a valid URL";
const RESUME_LINK_INVALID: &str = "Resume link must be a valid URL";
const ACCOUNT_DOMAIN_REQUIRED: &str = "Account domain is required";
const ACCOUNT_URL_REQUIRED: &str = "Account URL is required";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationFailure(pub String);

impl ValidationFailure {
    fn new(msg: impl Into<String>) -> Self {
        ValidationFailure(msg.into())
    }
}

#[derive(Validate)]
struct UsernameValidator {
    #[validate(
        length(
            min = 3,
            max = 20,
            message = "Username must be between 3 and 20 characters long"
        ),
        regex(
            path = *USERNAME_REGEX,
            message = "Username can only contain letters, numbers, hyphens (-), and underscores (_), and must not start or end with a hyphen or underscore"
        )
    )]
    username: String,
}

#[derive(Validate)]
struct BioValidator {
    #[validate(length(max = 200, message = "Bio must not exceed 200 characters"))]
    bio: String,
}

#[derive(Validate)]
struct LinkValidator {
    #[validate(regex(path = *URL_REGEX))]
    link: String,
}

#[derive(Validate)]
struct AccountValidator {
    #[validate(length(max = 50, message = "Domain name cannot exceed 50 characters"))]
    domain: String,
    #[validate(regex(path = *URL_REGEX, message = "Account URL must be a valid URL"))]
    url: String,
}

/// Picks the first message, honouring the given field order.
fn first_message(errors: &ValidationErrors, fields: &[&str]) -> ValidationFailure {
    let field_errors = errors.field_errors();
    fields
        .iter()
        .filter_map(|field| field_errors.get(*field))
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .map(ValidationFailure)
        .unwrap_or_else(|| ValidationFailure(errors.to_string()))
}

pub fn validate_username(username: &str) -> Result<(), ValidationFailure> {
    if username.is_empty() {
        return Err(ValidationFailure::new(USERNAME_REQUIRED));
    }
    UsernameValidator {
        username: username.to_string(),
    }
    .validate()
    .map_err(|e| first_message(&e, &["username"]))
}

fn validate_bio(bio: &str) -> Result<(), ValidationFailure> {
    if bio.is_empty() {
        return Err(ValidationFailure::new(BIO_REQUIRED));
    }
    BioValidator {
        bio: bio.to_string(),
    }
    .validate()
    .map_err(|e| first_message(&e, &["bio"]))
}

fn validate_link(link: &str, message: &str) -> Result<(), ValidationFailure> {
    LinkValidator {
        link: link.to_string(),
    }
    .validate()
    .map_err(|_| ValidationFailure::new(message))
}

fn validate_account(account: &LinkedAccount) -> Result<(), ValidationFailure> {
    if account.domain.is_empty() {
        return Err(ValidationFailure::new(ACCOUNT_DOMAIN_REQUIRED));
    }
    if account.url.is_empty() {
        return Err(ValidationFailure::new(ACCOUNT_URL_REQUIRED));
    }
    AccountValidator {
        domain: account.domain.clone(),
        url: account.url.clone(),
    }
    .validate()
    .map_err(|e| first_message(&e, &["domain", "url"]))
}

fn validate_accounts(accounts: &[LinkedAccount]) -> Result<(), ValidationFailure> {
    accounts.iter().try_for_each(validate_account)
}

/// Checks only what the payload carries; absent fields are not looked at.
pub fn validate_patch(patch: &ProfilePatch) -> Result<(), ValidationFailure> {
    match &patch.username {
        Patch::Absent => {}
        Patch::Clear => return Err(ValidationFailure::new(USERNAME_REQUIRED)),
        Patch::Set(username) => validate_username(username)?,
    }
    match &patch.bio {
        Patch::Absent => {}
        Patch::Clear => return Err(ValidationFailure::new(BIO_REQUIRED)),
        Patch::Set(bio) => validate_bio(bio)?,
    }
    if let Some(link) = patch.portfolio_link.as_set() {
        validate_link(link, PORTFOLIO_LINK_INVALID)?;
    }
    if let Some(link) = patch.resume_link.as_set() {
        validate_link(link, RESUME_LINK_INVALID)?;
    }
    if let Some(accounts) = patch.accounts.as_set() {
        validate_accounts(accounts)?;
    }
    Ok(())
}

/// Record-level constraints that must hold whenever a profile is persisted.
pub fn validate_profile(profile: &Profile) -> Result<(), ValidationFailure> {
    validate_merged_profile(profile, false)
}

/// Like [`validate_profile`], for a merged record whose resume upload is still pending.
pub fn validate_merged_profile(
    profile: &Profile,
    resume_file_pending: bool,
) -> Result<(), ValidationFailure> {
    validate_username(&profile.username)?;
    validate_bio(&profile.bio)?;
    if let Some(link) = non_empty(&profile.portfolio_link) {
        validate_link(link, PORTFOLIO_LINK_INVALID)?;
    }
    if let Some(link) = non_empty(&profile.resume_link) {
        validate_link(link, RESUME_LINK_INVALID)?;
    }
    validate_accounts(&profile.accounts)?;

    let has_resume = non_empty(&profile.resume_link).is_some()
        || non_empty(&profile.resume_file).is_some()
        || resume_file_pending;
    if !has_resume {
        return Err(ValidationFailure::new(RESUME_REQUIRED));
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
