#![allow(dead_code)]

use chrono::Utc;
use std::sync::Arc;

use hiresgo::api::{
    AppState, SYSTEM_ALL_PHOTOS, SYSTEM_ALL_PHOTOS_KEY, SYSTEM_FAVORITES, SYSTEM_FAVORITES_KEY,
};
use hiresgo::auth::AuthService;
use hiresgo::models::{Folder, FolderKind, Image, User};
use hiresgo::notify::Notifier;
use hiresgo::store::Store;

pub const DEMO_EMAIL: &str = "demo@hiresgo.app";
pub const DEMO_PASSWORD: &str = "demo1234";

pub fn app_state(store: &Arc<Store>, auth_service: &Arc<AuthService>) -> AppState {
    AppState {
        store: store.clone(),
        auth_service: auth_service.clone(),
        notifier: Arc::new(Notifier::new(store.clone())),
        demo_email: DEMO_EMAIL.to_string(),
    }
}

/// Seed the demo account the way the server does at first boot: system
/// folders first, then a couple of user folders at stride keys. Returns the
/// user and the folders in display order.
pub fn seed_demo(store: &Arc<Store>, auth_service: &Arc<AuthService>) -> (User, Vec<Folder>) {
    seed_demo_on_plan(store, auth_service, "standard")
}

pub fn seed_demo_on_plan(
    store: &Arc<Store>,
    auth_service: &Arc<AuthService>,
    plan_id: &str,
) -> (User, Vec<Folder>) {
    let mut user = User {
        id: String::new(),
        email: DEMO_EMAIL.to_string(),
        display_name: "Demo User".to_string(),
        avatar_url: String::new(),
        password_hash: auth_service.hash_password(DEMO_PASSWORD).unwrap(),
        plan_id: plan_id.to_string(),
        grace_plan_id: None,
        grace_expires_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    store.create_user(&mut user).unwrap();

    let seeds = [
        (SYSTEM_ALL_PHOTOS, SYSTEM_ALL_PHOTOS_KEY, FolderKind::System),
        (SYSTEM_FAVORITES, SYSTEM_FAVORITES_KEY, FolderKind::System),
        ("Nature", 10.0, FolderKind::User),
        ("Travel", 20.0, FolderKind::User),
    ];

    let mut folders = Vec::new();
    for (name, order_key, kind) in seeds {
        let mut folder = Folder {
            id: String::new(),
            user_id: user.id.clone(),
            name: name.to_string(),
            kind,
            order_key,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.create_folder(&mut folder).unwrap();
        folders.push(folder);
    }

    (user, folders)
}

pub fn seed_image(
    store: &Arc<Store>,
    user: &User,
    folder_id: &str,
    size_bytes: i64,
    order_key: f64,
) -> Image {
    let mut images = vec![Image {
        id: String::new(),
        user_id: user.id.clone(),
        folder_id: folder_id.to_string(),
        filename: "test.jpg".to_string(),
        caption: String::new(),
        content_type: "image/jpeg".to_string(),
        size_bytes,
        data: vec![0xFF, 0xD8, 0xFF, 0xE0],
        is_favorite: false,
        order_key,
        created_at: Utc::now(),
    }];
    store.create_images(&mut images).unwrap();
    images.remove(0)
}
