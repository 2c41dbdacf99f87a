pub mod profile;
pub mod validation;

/// Opaque identity assigned by the document store on first save.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProfileId(pub String);

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presence of a single field in a merge-patch payload.
///
/// `Absent` leaves the stored value untouched, `Clear` was sent explicitly empty and
/// `Set` carries a new value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Absent,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Absent | Patch::Clear => None,
        }
    }

    pub fn apply_to(self, target: &mut Option<T>) {
        match self {
            Patch::Absent => {}
            Patch::Clear => *target = None,
            Patch::Set(value) => *target = Some(value),
        }
    }
}

impl<T: Default> Patch<T> {
    /// For fields that always hold a value: clearing resets to the empty value.
    pub fn apply_to_required(self, target: &mut T) {
        match self {
            Patch::Absent => {}
            Patch::Clear => *target = T::default(),
            Patch::Set(value) => *target = value,
        }
    }
}

impl Patch<String> {
    /// Maps a raw text field: missing is `Absent`, empty is `Clear`.
    pub fn from_text(value: Option<String>) -> Self {
        match value {
            None => Patch::Absent,
            Some(value) if value.is_empty() => Patch::Clear,
            Some(value) => Patch::Set(value),
        }
    }
}

#[derive(Debug)]
pub enum RepoRetrieveError {
    NotFound,
    StorageError(String),
}

impl std::fmt::Display for RepoRetrieveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoRetrieveError::NotFound => write!(f, "Resource not found"),
            RepoRetrieveError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

#[derive(Debug)]
pub enum RepoSaveError {
    Conflict,
    Invalid(String),
    StorageError(String),
}

impl std::fmt::Display for RepoSaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoSaveError::Conflict => write!(f, "Resource conflict"),
            RepoSaveError::Invalid(e) => write!(f, "Invalid resource: {}", e),
            RepoSaveError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}
