use actix_web::{test, web, App};
use serde_json::json;
use std::sync::Arc;

use hiresgo::api;
use hiresgo::auth::{AuthService, RequireAuth};
use hiresgo::store::Store;

mod common;

macro_rules! init_app {
    ($store:ident, $auth:ident) => {{
        test::init_service(
            App::new()
                .wrap(RequireAuth::new($auth.clone()))
                .app_data(web::Data::new(common::app_state(&$store, &$auth)))
                .configure(api::configure_routes),
        )
        .await
    }};
}

macro_rules! login {
    ($app:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({
                "email": common::DEMO_EMAIL,
                "password": common::DEMO_PASSWORD
            }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&$app, req).await;
        resp["data"]["token"].as_str().unwrap().to_string()
    }};
}

#[actix_web::test]
async fn test_create_and_view_open_share() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth = Arc::new(AuthService::new("test_secret".to_string()));
    let (user, folders) = common::seed_demo(&store, &auth);
    let image = common::seed_image(&store, &user, &folders[2].id, 100, 10.0);

    let app = init_app!(store, auth);
    let token = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/shares")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "image_ids": [image.id],
            "protected": false
        }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], true);
    let share_token = resp["data"]["share"]["token"].as_str().unwrap().to_string();
    assert!(resp["data"]["password"].is_null());

    // The public link works without any Authorization header.
    let req = test::TestRequest::get()
        .uri(&format!("/api/shared/{}", share_token))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], true);
    let images = resp["data"]["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["id"], json!(image.id));
}

#[actix_web::test]
async fn test_protected_share_generates_password() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth = Arc::new(AuthService::new("test_secret".to_string()));
    let (user, folders) = common::seed_demo(&store, &auth);
    let image = common::seed_image(&store, &user, &folders[2].id, 100, 10.0);

    let app = init_app!(store, auth);
    let token = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/shares")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "image_ids": [image.id],
            "protected": true,
            "delivery": "manual"
        }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], true);

    // Shown once to the creator, never stored in clear.
    let password = resp["data"]["password"].as_str().unwrap().to_string();
    assert_eq!(password.len(), 8);

    let share_token = resp["data"]["share"]["token"].as_str().unwrap().to_string();

    // Viewing without the password answers 401 and flags the lock.
    let req = test::TestRequest::get()
        .uri(&format!("/api/shared/{}", share_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["protected"], json!(true));

    // Wrong password stays locked.
    let req = test::TestRequest::post()
        .uri(&format!("/api/shared/{}/unlock", share_token))
        .set_json(json!({ "password": "wrong123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    // The generated password unlocks it.
    let req = test::TestRequest::post()
        .uri(&format!("/api/shared/{}/unlock", share_token))
        .set_json(json!({ "password": password }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["data"]["images"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_protected_share_requires_plan_feature() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth = Arc::new(AuthService::new("test_secret".to_string()));
    // Free plan has no password protection.
    let (user, folders) = common::seed_demo_on_plan(&store, &auth, "free");
    let image = common::seed_image(&store, &user, &folders[2].id, 100, 10.0);

    let app = init_app!(store, auth);
    let token = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/shares")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "image_ids": [image.id],
            "protected": true
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    // Unprotected sharing still works on the free plan.
    let req = test::TestRequest::post()
        .uri("/api/shares")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "image_ids": [image.id],
            "protected": false
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
}

#[actix_web::test]
async fn test_share_with_custom_password() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth = Arc::new(AuthService::new("test_secret".to_string()));
    let (user, folders) = common::seed_demo(&store, &auth);
    let image = common::seed_image(&store, &user, &folders[2].id, 100, 10.0);

    let app = init_app!(store, auth);
    let token = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/shares")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "image_ids": [image.id],
            "protected": true,
            "password": "hunter22"
        }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    // The caller chose the password; it is not echoed back.
    assert!(resp["data"]["password"].is_null());

    let share_token = resp["data"]["share"]["token"].as_str().unwrap().to_string();
    let req = test::TestRequest::post()
        .uri(&format!("/api/shared/{}/unlock", share_token))
        .set_json(json!({ "password": "hunter22" }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["success"], true);
}

#[actix_web::test]
async fn test_share_rejects_foreign_images() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth = Arc::new(AuthService::new("test_secret".to_string()));
    common::seed_demo(&store, &auth);

    let app = init_app!(store, auth);
    let token = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/shares")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "image_ids": ["not-an-image"],
            "protected": false
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_deleted_share_link_goes_dark() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth = Arc::new(AuthService::new("test_secret".to_string()));
    let (user, folders) = common::seed_demo(&store, &auth);
    let image = common::seed_image(&store, &user, &folders[2].id, 100, 10.0);

    let app = init_app!(store, auth);
    let token = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/shares")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "image_ids": [image.id],
            "protected": false
        }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let share_id = resp["data"]["share"]["id"].as_str().unwrap().to_string();
    let share_token = resp["data"]["share"]["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/shares/{}", share_id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 204);

    let req = test::TestRequest::get()
        .uri(&format!("/api/shared/{}", share_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_list_shares() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth = Arc::new(AuthService::new("test_secret".to_string()));
    let (user, folders) = common::seed_demo(&store, &auth);
    let image = common::seed_image(&store, &user, &folders[2].id, 100, 10.0);

    let app = init_app!(store, auth);
    let token = login!(app);

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/api/shares")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({
                "image_ids": [image.id],
                "protected": false
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
    }

    let req = test::TestRequest::get()
        .uri("/api/shares")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"].as_array().unwrap().len(), 2);
}
