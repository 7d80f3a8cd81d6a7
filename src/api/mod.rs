use actix_web::{web, HttpResponse, Responder};
use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{AuthService, AuthUser};
use crate::models::*;
use crate::notify::Notifier;
use crate::ordering;
use crate::plans::{self, PlanError};
use crate::store::{Store, StoreError};

/// Names of the per-user system folders seeded at account creation.
pub const SYSTEM_ALL_PHOTOS: &str = "All Photos";
pub const SYSTEM_FAVORITES: &str = "Favorites";

/// Order keys for the system folders; below the first stride slot so they
/// always sort ahead of user folders.
pub const SYSTEM_ALL_PHOTOS_KEY: f64 = 1.0;
pub const SYSTEM_FAVORITES_KEY: f64 = 2.0;

pub struct AppState {
    pub store: Arc<Store>,
    pub auth_service: Arc<AuthService>,
    pub notifier: Arc<Notifier>,
    /// Account returned by the mocked OAuth endpoint.
    pub demo_email: String,
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== Auth Endpoints ====================

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> impl Responder {
    let user = match state.store.get_user_by_email(&body.email) {
        Ok(u) => u,
        Err(StoreError::NotFound(_)) => {
            return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Invalid credentials"));
        }
        Err(_) => {
            return HttpResponse::InternalServerError().json(ApiResponse::<()>::error("Database error"));
        }
    };

    let valid = state
        .auth_service
        .verify_password(&body.password, &user.password_hash)
        .unwrap_or(false);

    if !valid {
        return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Invalid credentials"));
    }

    let token = match state.auth_service.generate_token(&user.id) {
        Ok(t) => t,
        Err(_) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error("Failed to generate token")),
    };

    HttpResponse::Ok().json(ApiResponse::success(LoginResponse { token, user }))
}

/// Mocked OAuth sign-in: no provider round trip, just the demo account.
pub async fn login_google(state: web::Data<AppState>) -> impl Responder {
    let user = match state.store.get_user_by_email(&state.demo_email) {
        Ok(u) => u,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Demo account is not seeded"));
        }
    };

    let token = match state.auth_service.generate_token(&user.id) {
        Ok(t) => t,
        Err(_) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error("Failed to generate token")),
    };

    HttpResponse::Ok().json(ApiResponse::success(LoginResponse { token, user }))
}

pub async fn get_current_user(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
) -> impl Responder {
    match state.store.get_user(&auth_user.user_id) {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Err(_) => HttpResponse::NotFound().json(ApiResponse::<()>::error("User not found")),
    }
}

pub async fn update_current_user(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    if let Some(name) = &body.display_name {
        if name.trim().is_empty() {
            return HttpResponse::BadRequest()
                .json(ApiResponse::<()>::error("Display name cannot be empty"));
        }
    }

    let update = state.store.update_user_profile(
        &auth_user.user_id,
        body.display_name.as_deref().map(str::trim),
        body.avatar_url.as_deref(),
    );
    match update {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => {
            return HttpResponse::NotFound().json(ApiResponse::<()>::error("User not found"));
        }
        Err(e) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error(format!("Failed to update profile: {}", e)));
        }
    }

    state.notifier.success(&auth_user.user_id, "Profile updated");

    match state.store.get_user(&auth_user.user_id) {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to get user: {}", e))),
    }
}

/// Tokens are stateless; logout is a client-side token drop.
pub async fn logout() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success("Signed out"))
}

// ==================== Folder Endpoints ====================

pub async fn list_folders(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
) -> impl Responder {
    match folder_listings(&state.store, &auth_user.user_id) {
        Ok(listings) => HttpResponse::Ok().json(ApiResponse::success(listings)),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to list folders: {}", e))),
    }
}

fn folder_listings(store: &Store, user_id: &str) -> Result<Vec<FolderListing>, StoreError> {
    let folders = store.list_folders(user_id)?;
    let all_filter = ImageFilter::default();
    let favorites_filter = ImageFilter {
        folder_id: None,
        favorites: true,
    };

    folders
        .into_iter()
        .map(|folder| {
            let image_count = if folder.is_system() {
                // System folders are views over the whole image set.
                if folder.name == SYSTEM_FAVORITES {
                    store.list_images(user_id, &favorites_filter)?.len() as i64
                } else {
                    store.list_images(user_id, &all_filter)?.len() as i64
                }
            } else {
                store.count_images_in_folder(&folder.id)?
            };
            Ok(FolderListing {
                folder,
                image_count,
            })
        })
        .collect()
}

pub async fn create_folder(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<CreateFolderRequest>,
) -> impl Responder {
    let name = body.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("Folder name is required"));
    }

    let folders = match state.store.list_folders(&auth_user.user_id) {
        Ok(f) => f,
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to list folders: {}", e))),
    };

    let mut folder = Folder {
        id: String::new(),
        user_id: auth_user.user_id.clone(),
        name: name.to_string(),
        kind: FolderKind::User,
        order_key: ordering::append_key(&folders),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    match state.store.create_folder(&mut folder) {
        Ok(_) => {
            state
                .notifier
                .success(&auth_user.user_id, format!("Created folder \"{}\"", folder.name));
            HttpResponse::Created().json(ApiResponse::success(folder))
        }
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to create folder: {}", e))),
    }
}

pub async fn rename_folder(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    path: web::Path<String>,
    body: web::Json<RenameFolderRequest>,
) -> impl Responder {
    let id = path.into_inner();
    let folder = match owned_folder(&state.store, &auth_user, &id) {
        Ok(f) => f,
        Err(response) => return response,
    };

    if folder.is_system() {
        return HttpResponse::Forbidden().json(ApiResponse::<()>::error("System folders cannot be renamed"));
    }

    let name = body.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("Folder name is required"));
    }

    match state.store.rename_folder(&id, name) {
        Ok(_) => {
            state.notifier.success(&auth_user.user_id, "Folder renamed");
            HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({ "id": id, "name": name })))
        }
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to rename folder: {}", e))),
    }
}

pub async fn delete_folder(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    let folder = match owned_folder(&state.store, &auth_user, &id) {
        Ok(f) => f,
        Err(response) => return response,
    };

    if folder.is_system() {
        return HttpResponse::Forbidden().json(ApiResponse::<()>::error("System folders cannot be deleted"));
    }

    match state.store.count_images_in_folder(&id) {
        Ok(0) => {}
        Ok(count) => {
            return HttpResponse::Conflict().json(ApiResponse::<()>::error(format!(
                "Folder still contains {} images",
                count
            )));
        }
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to check folder: {}", e))),
    }

    match state.store.delete_folder(&id) {
        Ok(_) => {
            state
                .notifier
                .success(&auth_user.user_id, format!("Deleted folder \"{}\"", folder.name));
            HttpResponse::NoContent().finish()
        }
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to delete folder: {}", e))),
    }
}

/// Apply a sidebar drag: system folders keep their fixed slots, user folders
/// are renumbered to stride keys. Invalid gestures leave the order untouched.
pub async fn reorder_folders(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<ReorderRequest>,
) -> impl Responder {
    let folders = match state.store.list_folders(&auth_user.user_id) {
        Ok(f) => f,
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to list folders: {}", e))),
    };

    let reordered = ordering::reorder(&folders, &body.moved_id, &body.reference_id, body.position);

    if let Err(e) = state.store.apply_folder_order(&reordered) {
        return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to apply folder order: {}", e)));
    }
    HttpResponse::Ok().json(ApiResponse::success(reordered))
}

pub async fn sort_folders(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<SortFoldersRequest>,
) -> impl Responder {
    let folders = match state.store.list_folders(&auth_user.user_id) {
        Ok(f) => f,
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to list folders: {}", e))),
    };

    let (system, mut user_folders): (Vec<Folder>, Vec<Folder>) =
        folders.into_iter().partition(|f| f.is_system());

    match body.by {
        FolderSortKey::Name => {
            user_folders.sort_by(|a, b| a.name.cmp(&b.name));
        }
        FolderSortKey::ImageCount => {
            let mut counted: Vec<(i64, Folder)> = Vec::with_capacity(user_folders.len());
            for folder in user_folders {
                match state.store.count_images_in_folder(&folder.id) {
                    Ok(count) => counted.push((count, folder)),
                    Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to count images: {}", e))),
                }
            }
            counted.sort_by(|a, b| b.0.cmp(&a.0));
            user_folders = counted.into_iter().map(|(_, f)| f).collect();
        }
    }

    ordering::renumber(&mut user_folders);

    let mut result = system;
    result.extend(user_folders);

    if let Err(e) = state.store.apply_folder_order(&result) {
        return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to apply folder order: {}", e)));
    }
    HttpResponse::Ok().json(ApiResponse::success(result))
}

fn owned_folder(
    store: &Store,
    auth_user: &AuthUser,
    id: &str,
) -> Result<Folder, HttpResponse> {
    match store.get_folder(id) {
        Ok(folder) if folder.user_id == auth_user.user_id => Ok(folder),
        Ok(_) | Err(StoreError::NotFound(_)) => {
            Err(HttpResponse::NotFound().json(ApiResponse::<()>::error("Folder not found")))
        }
        Err(e) => Err(HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to get folder: {}", e)))),
    }
}

// ==================== Image Endpoints ====================

pub async fn list_images(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    query: web::Query<ImageFilter>,
) -> impl Responder {
    match state.store.list_images(&auth_user.user_id, &query) {
        Ok(images) => HttpResponse::Ok().json(ApiResponse::success(images)),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to list images: {}", e))),
    }
}

pub async fn get_image_file(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    match state.store.get_image(&id) {
        Ok(image) if image.user_id == auth_user.user_id => HttpResponse::Ok()
            .content_type(image.content_type)
            .body(image.data),
        Ok(_) | Err(StoreError::NotFound(_)) => HttpResponse::NotFound().finish(),
        Err(_) => HttpResponse::InternalServerError().finish(),
    }
}

/// Upload a batch of data-URL files. New images take fractional order keys
/// so they sort ahead of everything without a full renumber; the next drag
/// folds them into clean stride values.
pub async fn upload_images(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<UploadImagesRequest>,
) -> impl Responder {
    if body.files.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("No files to upload"));
    }

    let folder = match resolve_target_folder(
        &state,
        &auth_user,
        body.folder_id.as_deref(),
        body.new_folder_name.as_deref(),
    ) {
        Ok(f) => f,
        Err(response) => return response,
    };

    let mut images = Vec::with_capacity(body.files.len());
    for (offset, file) in body.files.iter().enumerate() {
        let (content_type, data) = match decode_data_url(&file.data_url) {
            Ok(decoded) => decoded,
            Err(msg) => {
                return HttpResponse::BadRequest().json(ApiResponse::<()>::error(format!(
                    "{}: {}",
                    file.filename, msg
                )));
            }
        };
        images.push(Image {
            id: String::new(),
            user_id: auth_user.user_id.clone(),
            folder_id: folder.id.clone(),
            filename: file.filename.clone(),
            caption: file.filename.clone(),
            content_type,
            size_bytes: data.len() as i64,
            data,
            is_favorite: false,
            order_key: ordering::insertion_key(offset),
            created_at: Utc::now(),
        });
    }

    match state.store.create_images(&mut images) {
        Ok(_) => {
            state.notifier.success(
                &auth_user.user_id,
                format!("Uploaded {} images to \"{}\"", images.len(), folder.name),
            );
            HttpResponse::Created().json(ApiResponse::success(images))
        }
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to store images: {}", e))),
    }
}

/// Apply a gallery drag within one view. Only the filtered view is
/// renumbered; images in other folders keep their keys.
pub async fn reorder_images(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<ReorderImagesRequest>,
) -> impl Responder {
    let images = match state.store.list_images(&auth_user.user_id, &body.filter) {
        Ok(i) => i,
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to list images: {}", e))),
    };

    let reordered = ordering::reorder(&images, &body.moved_id, &body.reference_id, body.position);

    if let Err(e) = state.store.apply_image_order(&reordered) {
        return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to apply image order: {}", e)));
    }
    HttpResponse::Ok().json(ApiResponse::success(reordered))
}

pub async fn move_images(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<MoveImagesRequest>,
) -> impl Responder {
    if body.image_ids.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("No images to move"));
    }

    let folder = match resolve_target_folder(
        &state,
        &auth_user,
        body.folder_id.as_deref(),
        body.new_folder_name.as_deref(),
    ) {
        Ok(f) => f,
        Err(response) => return response,
    };

    match state
        .store
        .move_images(&auth_user.user_id, &body.image_ids, &folder.id)
    {
        Ok(moved) => {
            state.notifier.success(
                &auth_user.user_id,
                format!("Moved {} images to \"{}\"", moved, folder.name),
            );
            HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({ "moved": moved })))
        }
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to move images: {}", e))),
    }
}

pub async fn toggle_favorite(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    match state.store.get_image(&id) {
        Ok(image) if image.user_id == auth_user.user_id => {}
        Ok(_) | Err(StoreError::NotFound(_)) => {
            return HttpResponse::NotFound().json(ApiResponse::<()>::error("Image not found"));
        }
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to get image: {}", e))),
    }

    match state.store.toggle_favorite(&id) {
        Ok(is_favorite) => HttpResponse::Ok().json(ApiResponse::success(
            serde_json::json!({ "id": id, "is_favorite": is_favorite }),
        )),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to toggle favorite: {}", e))),
    }
}

pub async fn delete_image(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    match state.store.get_image(&id) {
        Ok(image) if image.user_id == auth_user.user_id => {}
        Ok(_) | Err(StoreError::NotFound(_)) => {
            return HttpResponse::NotFound().json(ApiResponse::<()>::error("Image not found"));
        }
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to get image: {}", e))),
    }

    match state.store.delete_image(&id) {
        Ok(_) => HttpResponse::NoContent().finish(),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to delete image: {}", e))),
    }
}

/// Uploads and moves land in a user folder: either an existing one owned by
/// the caller, or a folder created on the fly from `new_folder_name`.
fn resolve_target_folder(
    state: &web::Data<AppState>,
    auth_user: &AuthUser,
    folder_id: Option<&str>,
    new_folder_name: Option<&str>,
) -> Result<Folder, HttpResponse> {
    if let Some(name) = new_folder_name {
        let name = name.trim();
        if name.is_empty() {
            return Err(HttpResponse::BadRequest()
                .json(ApiResponse::<()>::error("Folder name is required")));
        }
        let folders = state
            .store
            .list_folders(&auth_user.user_id)
            .map_err(|e| {
                HttpResponse::InternalServerError()
                    .json(ApiResponse::<()>::error(format!("Failed to list folders: {}", e)))
            })?;
        let mut folder = Folder {
            id: String::new(),
            user_id: auth_user.user_id.clone(),
            name: name.to_string(),
            kind: FolderKind::User,
            order_key: ordering::append_key(&folders),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.store.create_folder(&mut folder).map_err(|e| {
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error(format!("Failed to create folder: {}", e)))
        })?;
        state
            .notifier
            .success(&auth_user.user_id, format!("Created folder \"{}\"", folder.name));
        return Ok(folder);
    }

    let Some(folder_id) = folder_id else {
        return Err(HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("A target folder is required")));
    };
    let folder = owned_folder(&state.store, auth_user, folder_id)?;
    if folder.is_system() {
        return Err(HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("Images cannot be placed in system folders")));
    }
    Ok(folder)
}

/// Split a FileReader data URL ("data:image/jpeg;base64,...") into its
/// content type and decoded bytes.
fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>), String> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URL".to_string())?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "malformed data URL".to_string())?;
    let content_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| "only base64 data URLs are supported".to_string())?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| format!("invalid base64 payload: {}", e))?;
    let content_type = if content_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        content_type.to_string()
    };
    Ok((content_type, data))
}

// ==================== Share Endpoints ====================

pub async fn create_share(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<CreateShareRequest>,
) -> impl Responder {
    if body.image_ids.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("No images to share"));
    }

    for image_id in &body.image_ids {
        match state.store.get_image(image_id) {
            Ok(image) if image.user_id == auth_user.user_id => {}
            Ok(_) | Err(StoreError::NotFound(_)) => {
                return HttpResponse::BadRequest()
                    .json(ApiResponse::<()>::error(format!("Unknown image: {}", image_id)));
            }
            Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to get image: {}", e))),
        }
    }

    let mut generated_password = None;
    let password_hash = if body.protected {
        let user = match state.store.get_user(&auth_user.user_id) {
            Ok(u) => u,
            Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to get user: {}", e))),
        };
        let plan = match plans::find_plan(&user.plan_id) {
            Ok(p) => p,
            Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(e.to_string())),
        };
        if !plan.password_protection {
            return HttpResponse::Forbidden().json(ApiResponse::<()>::error(
                "Password protection is not included in your plan",
            ));
        }

        let password = match &body.password {
            Some(p) if !p.is_empty() => p.clone(),
            _ => {
                let p = AuthService::generate_share_password();
                generated_password = Some(p.clone());
                p
            }
        };
        match state.auth_service.hash_password(&password) {
            Ok(hash) => Some(hash),
            Err(_) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error("Failed to hash password")),
        }
    } else {
        None
    };

    let mut share = Share {
        id: String::new(),
        user_id: auth_user.user_id.clone(),
        image_ids: body.image_ids.clone(),
        token: AuthService::generate_share_token(),
        protected: body.protected,
        password_hash,
        disabled: false,
        created_at: Utc::now(),
    };

    if let Err(e) = state.store.create_share(&mut share) {
        return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to create share: {}", e)));
    }

    if share.protected {
        if let Some(delivery) = body.delivery {
            state
                .notifier
                .deliver_share_password(&share, delivery, body.recipient.as_deref());
        }
    }
    state.notifier.success(
        &auth_user.user_id,
        format!("Sharing {} images", share.image_ids.len()),
    );

    HttpResponse::Created().json(ApiResponse::success(ShareCreatedResponse {
        share,
        password: generated_password,
    }))
}

pub async fn list_shares(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
) -> impl Responder {
    match state.store.list_shares(&auth_user.user_id) {
        Ok(shares) => HttpResponse::Ok().json(ApiResponse::success(shares)),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to list shares: {}", e))),
    }
}

pub async fn delete_share(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    match state.store.delete_share(&id, &auth_user.user_id) {
        Ok(_) => HttpResponse::NoContent().finish(),
        Err(StoreError::NotFound(_)) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Share not found"))
        }
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to delete share: {}", e))),
    }
}

#[derive(Serialize)]
struct SharedView {
    share: Share,
    images: Vec<Image>,
}

/// Public share link. Protected shares answer 401 with `protected: true`
/// until unlocked with the password.
pub async fn view_shared(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let token = path.into_inner();
    let share = match active_share(&state.store, &token) {
        Ok(s) => s,
        Err(response) => return response,
    };

    if share.protected {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "success": false,
            "protected": true,
            "error": "This share is password protected"
        }));
    }

    match share_images(&state.store, &share) {
        Ok(images) => HttpResponse::Ok().json(ApiResponse::success(SharedView { share, images })),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to load share: {}", e))),
    }
}

pub async fn unlock_shared(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UnlockShareRequest>,
) -> impl Responder {
    let token = path.into_inner();
    let share = match active_share(&state.store, &token) {
        Ok(s) => s,
        Err(response) => return response,
    };

    if !share.protected {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("Share is not protected"));
    }

    let valid = share
        .password_hash
        .as_deref()
        .map(|hash| {
            state
                .auth_service
                .verify_password(&body.password, hash)
                .unwrap_or(false)
        })
        .unwrap_or(false);

    if !valid {
        return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Incorrect password"));
    }

    match share_images(&state.store, &share) {
        Ok(images) => HttpResponse::Ok().json(ApiResponse::success(SharedView { share, images })),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to load share: {}", e))),
    }
}

fn active_share(store: &Store, token: &str) -> Result<Share, HttpResponse> {
    match store.get_share_by_token(token) {
        Ok(share) if !share.disabled => Ok(share),
        Ok(_) | Err(StoreError::NotFound(_)) => Err(HttpResponse::NotFound()
            .json(ApiResponse::<()>::error("This share is no longer available"))),
        Err(e) => Err(HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to get share: {}", e)))),
    }
}

fn share_images(store: &Store, share: &Share) -> Result<Vec<Image>, StoreError> {
    let mut images = Vec::with_capacity(share.image_ids.len());
    for image_id in &share.image_ids {
        match store.get_image(image_id) {
            Ok(image) => images.push(image),
            // Shared images may have been deleted since; skip them.
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(images)
}

// ==================== Plan Endpoints ====================

pub async fn list_plans() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(plans::catalog()))
}

pub async fn plan_usage(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
) -> impl Responder {
    match state.store.usage_snapshot(&auth_user.user_id) {
        Ok(usage) => HttpResponse::Ok().json(ApiResponse::success(usage)),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to read usage: {}", e))),
    }
}

/// Dry-run constraint check for a prospective plan change. Violations are
/// computed fresh from a live usage snapshot and never persisted.
pub async fn evaluate_plan(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<EvaluatePlanRequest>,
) -> impl Responder {
    let (current, target, usage) =
        match plan_change_context(&state, &auth_user, &body.target_plan_id) {
            Ok(ctx) => ctx,
            Err(response) => return response,
        };

    match plans::evaluate(&current, &target, &usage) {
        Ok(violations) => HttpResponse::Ok().json(ApiResponse::success(violations)),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(e.to_string())),
    }
}

#[derive(Serialize)]
struct PlanChangeResponse {
    user: User,
    outcome: crate::store::PlanChangeOutcome,
}

/// Commit a plan change. Downgrades are re-evaluated against a fresh usage
/// snapshot; unresolved blocking violations reject the change with 409.
pub async fn change_plan(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
    body: web::Json<ChangePlanRequest>,
) -> impl Responder {
    let (current, target, usage) = match plan_change_context(&state, &auth_user, &body.plan_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    if target.id == current.id {
        return HttpResponse::BadRequest().json(ApiResponse::<()>::error("Already on this plan"));
    }

    let violations = match plans::evaluate(&current, &target, &usage) {
        Ok(v) => v,
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(e.to_string())),
    };

    if !plans::can_commit(&violations, &body.resolution) {
        return HttpResponse::Conflict()
            .json(ApiResponse::<()>::error(PlanError::PlanChangeRejected.to_string()));
    }

    let storage_limit_bytes = match plans::parse_storage_limit(&target.storage_limit) {
        Ok(bytes) => bytes,
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(e.to_string())),
    };

    let outcome = match state.store.commit_plan_change(
        &auth_user.user_id,
        &target,
        storage_limit_bytes,
        &body.resolution,
    ) {
        Ok(outcome) => outcome,
        Err(e) => return HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to change plan: {}", e))),
    };

    state
        .notifier
        .success(&auth_user.user_id, format!("Plan changed to {}", target.name));
    if outcome.deleted_images > 0 {
        state.notifier.info(
            &auth_user.user_id,
            format!("Deleted {} excess images (oldest first)", outcome.deleted_images),
        );
    }
    if outcome.disabled_shares > 0 {
        state.notifier.info(
            &auth_user.user_id,
            format!("Disabled password protection on {} shares", outcome.disabled_shares),
        );
    }
    if outcome.grace_expires_at.is_some() {
        state
            .notifier
            .info(&auth_user.user_id, "30-day grace period has been set");
    }

    match state.store.get_user(&auth_user.user_id) {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(PlanChangeResponse { user, outcome })),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to get user: {}", e))),
    }
}

fn plan_change_context(
    state: &web::Data<AppState>,
    auth_user: &AuthUser,
    target_plan_id: &str,
) -> Result<(plans::Plan, plans::Plan, plans::UsageSnapshot), HttpResponse> {
    let user = state.store.get_user(&auth_user.user_id).map_err(|e| {
        HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to get user: {}", e)))
    })?;
    let current = plans::find_plan(&user.plan_id).map_err(|e| {
        HttpResponse::InternalServerError().json(ApiResponse::<()>::error(e.to_string()))
    })?;
    let target = plans::find_plan(target_plan_id).map_err(|e| {
        HttpResponse::NotFound().json(ApiResponse::<()>::error(e.to_string()))
    })?;
    let usage = state.store.usage_snapshot(&auth_user.user_id).map_err(|e| {
        HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(format!("Failed to read usage: {}", e)))
    })?;
    Ok((current, target, usage))
}

// ==================== Notification Endpoints ====================

pub async fn list_notifications(
    state: web::Data<AppState>,
    auth_user: web::ReqData<AuthUser>,
) -> impl Responder {
    match state.store.list_notifications(&auth_user.user_id, 50) {
        Ok(notifications) => HttpResponse::Ok().json(ApiResponse::success(notifications)),
        Err(e) => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(format!("Failed to list notifications: {}", e))),
    }
}

// ==================== Routes ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(health))

        // Auth routes (no auth required)
        .route("/api/auth/login", web::post().to(login))
        .route("/api/auth/google", web::post().to(login_google))
        .route("/api/auth/me", web::get().to(get_current_user))
        .route("/api/auth/me", web::put().to(update_current_user))
        .route("/api/auth/logout", web::post().to(logout))

        // Folders
        .route("/api/folders", web::get().to(list_folders))
        .route("/api/folders", web::post().to(create_folder))
        .route("/api/folders/reorder", web::post().to(reorder_folders))
        .route("/api/folders/sort", web::post().to(sort_folders))
        .route("/api/folders/{id}", web::put().to(rename_folder))
        .route("/api/folders/{id}", web::delete().to(delete_folder))

        // Images
        .route("/api/images", web::get().to(list_images))
        .route("/api/images", web::post().to(upload_images))
        .route("/api/images/reorder", web::post().to(reorder_images))
        .route("/api/images/move", web::post().to(move_images))
        .route("/api/images/{id}/file", web::get().to(get_image_file))
        .route("/api/images/{id}/favorite", web::post().to(toggle_favorite))
        .route("/api/images/{id}", web::delete().to(delete_image))

        // Shares
        .route("/api/shares", web::get().to(list_shares))
        .route("/api/shares", web::post().to(create_share))
        .route("/api/shares/{id}", web::delete().to(delete_share))
        .route("/api/shared/{token}", web::get().to(view_shared))
        .route("/api/shared/{token}/unlock", web::post().to(unlock_shared))

        // Plans
        .route("/api/plans", web::get().to(list_plans))
        .route("/api/plans/usage", web::get().to(plan_usage))
        .route("/api/plans/evaluate", web::post().to(evaluate_plan))
        .route("/api/plans/change", web::post().to(change_plan))

        // Notifications
        .route("/api/notifications", web::get().to(list_notifications));
}
