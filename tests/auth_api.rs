use actix_web::{test, App};
use authgate_server::auth::TokenIssuer;
use authgate_server::{api, Settings};
use serde_json::{json, Value};

mod common;
use common::{bearer, state};

#[actix_web::test]
async fn test_register_login_me_logout() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .configure(api::configure)
    ).await;

    let register_response = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({
            "name": "Test User",
            "email": "Test@Example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;
    assert_eq!(register_response.status(), 201);
    let register_body: Value = test::read_body_json(register_response).await;
    assert_eq!(register_body["code"], "E20001");
    assert_eq!(register_body["data"]["email"], "test@example.com");
    assert!(register_body["data"].get("password_hash").is_none());

    let login_response = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({
            "email": "test@example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;
    assert_eq!(login_response.status(), 200);
    let login_body: Value = test::read_body_json(login_response).await;
    let access = login_body["data"]["access_token"].as_str().unwrap().to_string();
    assert!(login_body["data"]["refresh_token"].is_string());

    let me_response = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&access))
        .send_request(&app)
        .await;
    assert_eq!(me_response.status(), 200);
    let me_body: Value = test::read_body_json(me_response).await;
    assert_eq!(me_body["data"]["name"], "Test User");

    let logout_response = test::TestRequest::post()
        .uri("/api/v1/auth/logout")
        .insert_header(bearer(&access))
        .send_request(&app)
        .await;
    assert_eq!(logout_response.status(), 204);

    let me_response = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&access))
        .send_request(&app)
        .await;
    assert_eq!(me_response.status(), 401);
}

#[actix_web::test]
async fn test_lockout_after_three_failures() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .configure(api::configure)
    ).await;

    test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"name": "Ann", "email": "ann@example.com", "password": "password123"}))
        .send_request(&app)
        .await;

    for _ in 0..2 {
        let resp = test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({"email": "ann@example.com", "password": "wrong-password"}))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 401);
    }

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({"email": "ann@example.com", "password": "wrong-password"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"]["unlock_at"].is_string());

    // Even the right password is refused while locked.
    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({"email": "ann@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);
}

#[actix_web::test]
async fn test_unauthorized_responses_are_identical() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .configure(api::configure)
    ).await;

    test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"name": "Ann", "email": "ann@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    let login: Value = test::read_body_json(
        test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({"email": "ann@example.com", "password": "password123"}))
            .send_request(&app)
            .await,
    )
    .await;
    let refresh = login["data"]["refresh_token"].as_str().unwrap().to_string();

    let mut bodies = Vec::new();

    let resp = test::TestRequest::get().uri("/api/v1/auth/me").send_request(&app).await;
    assert_eq!(resp.status(), 401);
    bodies.push(test::read_body(resp).await);

    let resp = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer("garbage"))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
    bodies.push(test::read_body(resp).await);

    let resp = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&refresh))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
    bodies.push(test::read_body(resp).await);

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({"email": "nobody@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
    bodies.push(test::read_body(resp).await);

    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
}

#[actix_web::test]
async fn test_refresh_issues_new_access_token() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .configure(api::configure)
    ).await;

    test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"name": "Ann", "email": "ann@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    let login: Value = test::read_body_json(
        test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({"email": "ann@example.com", "password": "password123"}))
            .send_request(&app)
            .await,
    )
    .await;
    let access = login["data"]["access_token"].as_str().unwrap().to_string();
    let refresh = login["data"]["refresh_token"].as_str().unwrap().to_string();

    // An access token is not accepted for refreshing.
    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .insert_header(bearer(&access))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .insert_header(bearer(&refresh))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let new_access = body["data"]["access_token"].as_str().unwrap().to_string();

    let resp = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&new_access))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_register_validation_and_conflict() {
    let app = test::init_service(
        App::new()
            .app_data(state())
            .configure(api::configure)
    ).await;

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"name": "Ann", "email": "not-an-email", "password": "password123"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"name": "Ann", "email": "ann@example.com", "password": "short"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"email": "ann@example.com"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["status"], 400);

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"name": "Ann", "email": "ann@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 201);

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({"name": "Ann", "email": "ANN@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 409);
}

#[actix_web::test]
async fn test_login_reports_store_outage() {
    let app = test::init_service(
        App::new()
            .app_data(common::state_with_store_down())
            .configure(api::configure)
    ).await;

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({"email": "ann@example.com", "password": "password123"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 503);
    let body: Value = test::read_body_json(resp).await;
    assert!(!body.to_string().contains("connection refused"));

    // A well-formed token whose session cannot be looked up is an outage, not a 401.
    let settings = Settings::new_for_test().unwrap();
    let pair = TokenIssuer::new(&settings.auth).issue_pair("user-1").unwrap();
    let resp = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&pair.access_token))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 503);
}
