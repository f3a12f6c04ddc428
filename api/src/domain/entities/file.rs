//! File domain entities
//!
//! Uploaded files keep a version history and a per-user permission list.
//! Bytes live in a `FileStorage` backend; these types only hold metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::ProjectId;
use super::task::TaskId;
use super::user::UserId;

/// MIME types accepted for upload
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    // Images
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    // Documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "text/csv",
    "text/markdown",
    "application/json",
    "application/xml",
    "text/xml",
    // Archives
    "application/zip",
    "application/x-tar",
    "application/gzip",
    "application/x-7z-compressed",
];

const MAX_FILENAME_LENGTH: usize = 255;

/// Unique identifier for a stored file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FileId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a file version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileVersionId(pub Uuid);

impl FileVersionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileVersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FileVersionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FileVersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata of an uploaded file
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub id: FileId,
    /// Name on disk (`<uuid><ext>`)
    pub file_name: String,
    /// Sanitized client-provided name
    pub original_name: String,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: Option<String>,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub uploaded_by: UserId,
    pub is_public: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStoredFile {
    pub file_name: String,
    pub original_name: String,
    pub storage_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: Option<String>,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub uploaded_by: UserId,
    pub is_public: bool,
}

/// Metadata edits
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    pub original_name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

/// Limits a listing to files one user may read without an admin role:
/// their uploads, public files and files granted to them
#[derive(Debug, Clone)]
pub struct FileReader {
    pub user_id: UserId,
    /// Files with an unexpired grant
    pub granted: Vec<FileId>,
}

impl FileReader {
    pub fn can_read(&self, file: &StoredFile) -> bool {
        file.uploaded_by == self.user_id || file.is_public || self.granted.contains(&file.id)
    }
}

/// Filters for listing files
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub mime_type: Option<String>,
    /// `None` lists every file
    pub readable_by: Option<FileReader>,
}

impl FileFilter {
    pub fn matches(&self, file: &StoredFile) -> bool {
        if file.is_deleted {
            return false;
        }
        if let Some(reader) = &self.readable_by {
            if !reader.can_read(file) {
                return false;
            }
        }
        if self.project_id.is_some() && self.project_id != file.project_id {
            return false;
        }
        if self.task_id.is_some() && self.task_id != file.task_id {
            return false;
        }
        if let Some(mime) = &self.mime_type {
            if !file.mime_type.starts_with(mime.as_str()) {
                return false;
            }
        }
        true
    }
}

/// `major.minor` version label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
}

impl VersionNumber {
    pub const INITIAL: VersionNumber = VersionNumber { major: 1, minor: 0 };

    pub fn next_minor(&self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl std::str::FromStr for VersionNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("Invalid version number: {}", s))?;
        Ok(Self {
            major: major
                .parse()
                .map_err(|_| format!("Invalid version number: {}", s))?,
            minor: minor
                .parse()
                .map_err(|_| format!("Invalid version number: {}", s))?,
        })
    }
}

/// Compute the version that follows the numerically highest existing one
pub fn next_version<'a>(existing: impl IntoIterator<Item = &'a str>) -> VersionNumber {
    existing
        .into_iter()
        .filter_map(|v| v.parse::<VersionNumber>().ok())
        .max()
        .map(|v| v.next_minor())
        .unwrap_or(VersionNumber::INITIAL)
}

/// A stored revision of a file's content
#[derive(Debug, Clone, Serialize)]
pub struct FileVersion {
    pub id: FileVersionId,
    pub file_id: FileId,
    pub version_number: String,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub change_description: Option<String>,
    pub created_by: UserId,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFileVersion {
    pub file_id: FileId,
    pub version_number: String,
    pub storage_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub change_description: Option<String>,
    pub created_by: UserId,
}

/// Access level on a file; higher levels include lower ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Read = 1,
    Write = 2,
    Admin = 3,
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionLevel::Read => write!(f, "read"),
            PermissionLevel::Write => write!(f, "write"),
            PermissionLevel::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(PermissionLevel::Read),
            "write" => Ok(PermissionLevel::Write),
            "admin" => Ok(PermissionLevel::Admin),
            _ => Err(format!("Unknown permission level: {}", s)),
        }
    }
}

/// A grant of access to a file for one user
#[derive(Debug, Clone, Serialize)]
pub struct FilePermission {
    pub file_id: FileId,
    pub user_id: UserId,
    pub level: PermissionLevel,
    pub granted_by: UserId,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl FilePermission {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > now)
    }
}

#[derive(Debug, Clone)]
pub struct NewFilePermission {
    pub file_id: FileId,
    pub user_id: UserId,
    pub level: PermissionLevel,
    pub granted_by: UserId,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Who is asking for access, as far as file checks are concerned
#[derive(Debug, Clone, Copy)]
pub struct FileAccessor {
    pub user_id: UserId,
    /// Admin-role users may read every file
    pub is_admin_role: bool,
}

/// Decide whether `accessor` holds at least `required` on `file`
pub fn has_file_access(
    file: &StoredFile,
    accessor: FileAccessor,
    grants: &[FilePermission],
    required: PermissionLevel,
    now: DateTime<Utc>,
) -> bool {
    if file.is_deleted {
        return false;
    }
    if file.uploaded_by == accessor.user_id {
        return true;
    }
    if required == PermissionLevel::Read && (file.is_public || accessor.is_admin_role) {
        return true;
    }
    grants.iter().any(|g| {
        g.file_id == file.id
            && g.user_id == accessor.user_id
            && g.is_valid_at(now)
            && g.level >= required
    })
}

/// Replace characters unsafe for file systems and cap the length,
/// keeping the extension when truncating
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\\' | '/') || c.is_control()
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    let cleaned = if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "unnamed".to_string()
    } else {
        cleaned
    };

    if cleaned.chars().count() <= MAX_FILENAME_LENGTH {
        return cleaned;
    }

    let ext = file_extension(&cleaned).unwrap_or_default();
    let keep = MAX_FILENAME_LENGTH.saturating_sub(ext.chars().count());
    let stem: String = cleaned.chars().take(keep).collect();
    format!("{}{}", stem, ext)
}

/// Extension including the dot, lower-cased (`.pdf`)
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 10 {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}

pub fn is_allowed_mime_type(mime: &str) -> bool {
    let base = mime.split(';').next().unwrap_or(mime).trim();
    ALLOWED_MIME_TYPES.contains(&base)
}
