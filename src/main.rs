use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use chrono::Utc;
use std::env;
use std::sync::Arc;

use hiresgo::api::{self, AppState, SYSTEM_ALL_PHOTOS, SYSTEM_ALL_PHOTOS_KEY, SYSTEM_FAVORITES, SYSTEM_FAVORITES_KEY};
use hiresgo::auth::{AuthService, RequireAuth};
use hiresgo::models::{Folder, FolderKind, User};
use hiresgo::notify::Notifier;
use hiresgo::ordering::ORDER_STRIDE;
use hiresgo::store::Store;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load environment variables
    dotenvy::dotenv().ok();

    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .expect("PORT must be a number");

    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "hiresgo.db".to_string());

    let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
        log::warn!("JWT_SECRET not set, using default (not secure for production!)");
        "default_jwt_secret_change_me".to_string()
    });

    let store = Arc::new(Store::new(&db_path).expect("Failed to initialize database"));
    let auth_service = Arc::new(AuthService::new(jwt_secret));
    let notifier = Arc::new(Notifier::new(store.clone()));

    // Seed the demo account on first boot. Sign-in providers are mocked, so
    // this account is what both login endpoints resolve to.
    let demo_email = env::var("DEMO_EMAIL").unwrap_or_else(|_| "demo@hiresgo.app".to_string());
    let demo_password = env::var("DEMO_PASSWORD").unwrap_or_else(|_| "demo1234".to_string());

    let user_count = store.count_users().expect("Failed to count users");
    if user_count == 0 {
        log::info!("Seeding demo account: {}", demo_email);
        let password_hash = auth_service
            .hash_password(&demo_password)
            .expect("Failed to hash password");

        let mut demo_user = User {
            id: String::new(),
            email: demo_email.clone(),
            display_name: "Demo User".to_string(),
            avatar_url: String::new(),
            password_hash,
            plan_id: "standard".to_string(),
            grace_plan_id: None,
            grace_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store
            .create_user(&mut demo_user)
            .expect("Failed to create demo user");

        seed_folders(&store, &demo_user.id);
    }

    log::info!("Database: {}", db_path);
    log::info!("Starting hiresgo server on port {}", port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(RequireAuth::new(auth_service.clone()))
            .wrap(cors)
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
                notifier: notifier.clone(),
                demo_email: demo_email.clone(),
            }))
            // Payload size limit for data-URL photo uploads (50MB)
            .app_data(web::PayloadConfig::new(50 * 1024 * 1024))
            .configure(api::configure_routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

/// Create the fixed system folders plus a starter set of user folders.
/// System folders take keys below the first stride slot so they always sort
/// first; user folders start at the stride.
fn seed_folders(store: &Arc<Store>, user_id: &str) {
    let system = [
        (SYSTEM_ALL_PHOTOS, SYSTEM_ALL_PHOTOS_KEY, FolderKind::System),
        (SYSTEM_FAVORITES, SYSTEM_FAVORITES_KEY, FolderKind::System),
    ];
    let starters = ["Nature", "Travel", "Family", "Work"];

    for (name, order_key, kind) in system {
        create_seed_folder(store, user_id, name, kind, order_key);
    }
    for (i, name) in starters.iter().enumerate() {
        create_seed_folder(
            store,
            user_id,
            name,
            FolderKind::User,
            (i as f64 + 1.0) * ORDER_STRIDE,
        );
    }
}

fn create_seed_folder(
    store: &Arc<Store>,
    user_id: &str,
    name: &str,
    kind: FolderKind,
    order_key: f64,
) {
    let mut folder = Folder {
        id: String::new(),
        user_id: user_id.to_string(),
        name: name.to_string(),
        kind,
        order_key,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    if let Err(e) = store.create_folder(&mut folder) {
        log::error!("Failed to create seed folder '{}': {}", name, e);
    } else {
        log::info!("Created seed folder: {}", name);
    }
}
