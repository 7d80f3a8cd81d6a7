use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ordering::Position;
use crate::plans::ResolutionChoice;

/// User is the account that owns folders, images, and shares.
/// Authentication is mocked (seeded demo account), but the record is real.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub plan_id: String,
    /// Set while a downgrade grace period is active: the plan whose limits
    /// notionally still apply until `grace_expires_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Folders are a single flat level per user. System folders ("All Photos",
/// "Favorites") are views over the image set, not containers: they hold no
/// images directly and are never renamed, deleted, or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderKind {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub kind: FolderKind,
    pub order_key: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn is_system(&self) -> bool {
        self.kind == FolderKind::System
    }
}

/// Folder plus its image count, as listed in the sidebar.
#[derive(Debug, Clone, Serialize)]
pub struct FolderListing {
    #[serde(flatten)]
    pub folder: Folder,
    pub image_count: i64,
}

/// Image stores the uploaded binary plus gallery metadata. `order_key` is a
/// relative sort value only; see the ordering module for its maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub user_id: String,
    pub folder_id: String,
    pub filename: String,
    pub caption: String,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(skip_serializing)]
    pub data: Vec<u8>,
    pub is_favorite: bool,
    pub order_key: f64,
    pub created_at: DateTime<Utc>,
}

/// Share publishes a set of images under an unguessable token, optionally
/// locked behind a bcrypt-hashed password (Standard plan feature).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    pub id: String,
    pub user_id: String,
    pub image_ids: Vec<String>,
    pub token: String,
    pub protected: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Fire-and-forget toast record; the UI polls these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

// ==================== Request/Response types ====================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Profile edits: avatar (preset or custom URL) and display name. Absent
/// fields keep their current value.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

/// Drag gesture: drop `moved_id` before/after `reference_id`.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub moved_id: String,
    pub reference_id: String,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderSortKey {
    Name,
    ImageCount,
}

#[derive(Debug, Deserialize)]
pub struct SortFoldersRequest {
    pub by: FolderSortKey,
}

/// Which slice of the gallery a list or reorder operates on. Absent folder
/// and favorites=false means the "All Photos" view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageFilter {
    pub folder_id: Option<String>,
    #[serde(default)]
    pub favorites: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReorderImagesRequest {
    #[serde(default)]
    pub filter: ImageFilter,
    pub moved_id: String,
    pub reference_id: String,
    pub position: Position,
}

/// One uploaded file: the front end submits FileReader data URLs
/// ("data:image/jpeg;base64,....").
#[derive(Debug, Deserialize)]
pub struct UploadFile {
    pub filename: String,
    pub data_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadImagesRequest {
    pub files: Vec<UploadFile>,
    pub folder_id: Option<String>,
    /// Create this folder and upload into it instead of `folder_id`.
    pub new_folder_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveImagesRequest {
    pub image_ids: Vec<String>,
    pub folder_id: Option<String>,
    pub new_folder_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordDelivery {
    Email,
    Sms,
    Manual,
}

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub image_ids: Vec<String>,
    #[serde(default)]
    pub protected: bool,
    /// Generated when absent and `protected` is set.
    pub password: Option<String>,
    pub delivery: Option<PasswordDelivery>,
    /// Where the password is delivered to (email address / phone number).
    pub recipient: Option<String>,
}

/// The generated password is returned exactly once, at creation.
#[derive(Debug, Serialize)]
pub struct ShareCreatedResponse {
    pub share: Share,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnlockShareRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EvaluatePlanRequest {
    pub target_plan_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub plan_id: String,
    #[serde(default)]
    pub resolution: ResolutionChoice,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
