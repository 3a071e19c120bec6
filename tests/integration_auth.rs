mod common;

use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

use common::{
    PASSWORD, body_json, body_of, count, create_principal, generate_unique_email, json_request,
    login, login_as, send_as, session_cookie_from, setup_test_app,
};
use opsdesk::middleware::status::{INACTIVE_MESSAGE, login_redirect_target};
use opsdesk::opsdesk_models::{PrincipalStatus, Role};

async fn post_login(app: &axum::Router, email: &str, password: &str) -> axum::response::Response {
    let credentials = json!({ "email": email, "password": password });
    let request = json_request(Method::POST, "/api/auth/login", Some(credentials.clone()))
        .body(body_of(Some(credentials)))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_success(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let principal = create_principal(&pool, Role::Manager, PrincipalStatus::Active).await;

    let response = post_login(&app, &principal.email, PASSWORD).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie_from(&response).unwrap();
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert_eq!(body["principal"]["email"], principal.email);
    assert_eq!(body["principal"]["role"], "manager");
    assert!(body["principal"].get("password_hash").is_none());
    assert!(!body["csrf_token"].as_str().unwrap().is_empty());
    assert_eq!(
        cookie,
        format!("{}={}", common::COOKIE_NAME, body["access_token"].as_str().unwrap())
    );

    let last_login: Option<chrono::DateTime<chrono::Utc>> =
        sqlx::query_scalar("SELECT last_login_at FROM principals WHERE id = $1")
            .bind(principal.id.into_inner())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(last_login.is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_wrong_password(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let principal = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;

    let response = post_login(&app, &principal.email, "not-the-password").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["message"], "The given data was invalid.");
    assert_eq!(
        body["errors"]["email"],
        json!(["These credentials do not match our records."])
    );
    assert_eq!(count(&pool, "sessions").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_unknown_email_looks_like_wrong_password(pool: PgPool) {
    let app = setup_test_app(pool.clone());

    let response = post_login(&app, &generate_unique_email(), PASSWORD).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["errors"]["email"],
        json!(["These credentials do not match our records."])
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_unknown_email_is_refused_no_faster_than_wrong_password(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let principal = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;

    let started = Instant::now();
    let response = post_login(&app, &principal.email, "not-the-password").await;
    let wrong_password = started.elapsed();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let started = Instant::now();
    let response = post_login(&app, &generate_unique_email(), "not-the-password").await;
    let unknown_email = started.elapsed();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Both paths pay for one bcrypt check.
    assert!(
        unknown_email * 3 >= wrong_password,
        "unknown email took {:?}, wrong password {:?}",
        unknown_email,
        wrong_password
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_missing_fields(pool: PgPool) {
    let app = setup_test_app(pool.clone());

    let body = json!({ "email": "not-an-email" });
    let request = json_request(Method::POST, "/api/auth/login", Some(body.clone()))
        .body(body_of(Some(body)))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password"].is_array());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_inactive_principal_cannot_login(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let principal = create_principal(&pool, Role::Employee, PrincipalStatus::Inactive).await;

    let response = post_login(&app, &principal.email, PASSWORD).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["message"], INACTIVE_MESSAGE);
    assert_eq!(count(&pool, "sessions").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_rotates_presented_session(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let principal = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;
    let first = login_as(&app, &principal).await;

    let credentials = json!({ "email": principal.email, "password": PASSWORD });
    let request = json_request(Method::POST, "/api/auth/login", Some(credentials.clone()))
        .header(header::AUTHORIZATION, first.bearer())
        .body(body_of(Some(credentials)))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stale = send_as(&app, &first, Method::GET, "/api/auth/me", None).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_logout_revokes_session(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let principal = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;
    let session = login_as(&app, &principal).await;

    let response = send_as(&app, &session, Method::POST, "/api/auth/logout", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        session_cookie_from(&response).unwrap(),
        format!("{}=", common::COOKIE_NAME)
    );
    assert_eq!(body_json(response).await["message"], "Logged out.");

    let response = send_as(&app, &session, Method::GET, "/api/auth/me", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_register_creates_active_employee(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let email = generate_unique_email();

    let body = json!({
        "name": "Grace Hopper",
        "email": email,
        "password": "cobol-forever",
        "password_confirmation": "cobol-forever",
    });
    let request = json_request(Method::POST, "/api/auth/register", Some(body.clone()))
        .body(body_of(Some(body)))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["role"], "employee");
    assert_eq!(body["status"], "active");

    login(&app, &email, "cobol-forever").await;
}

#[sqlx::test(migrations = "./migrations")]
async fn test_register_reports_mismatch_with_other_errors(pool: PgPool) {
    let app = setup_test_app(pool.clone());

    let body = json!({
        "name": "",
        "email": generate_unique_email(),
        "password": "cobol-forever",
        "password_confirmation": "cobol-for-never",
    });
    let request = json_request(Method::POST, "/api/auth/register", Some(body.clone()))
        .body(body_of(Some(body)))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let errors = body_json(response).await["errors"].clone();
    assert_eq!(
        errors["password"],
        json!(["The password confirmation does not match."])
    );
    assert!(errors["name"].is_array());
    assert!(errors.get("__all__").is_none());
    assert_eq!(count(&pool, "principals").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_register_duplicate_email(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let existing = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;

    let body = json!({
        "name": "Someone Else",
        "email": existing.email,
        "password": "password-123",
        "password_confirmation": "password-123",
    });
    let request = json_request(Method::POST, "/api/auth/register", Some(body.clone()))
        .body(body_of(Some(body)))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["errors"]["email"].is_array());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_profile_password_change_needs_current_password(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let principal = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;
    let session = login_as(&app, &principal).await;

    let response = send_as(
        &app,
        &session,
        Method::PUT,
        "/api/auth/me",
        Some(json!({
            "password": "brand-new-password",
            "password_confirmation": "brand-new-password",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["errors"]["current_password"],
        json!(["The current password field is required when changing the password."])
    );

    let response = send_as(
        &app,
        &session,
        Method::PUT,
        "/api/auth/me",
        Some(json!({
            "name": "Renamed Principal",
            "current_password": PASSWORD,
            "password": "brand-new-password",
            "password_confirmation": "brand-new-password",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Renamed Principal");

    login(&app, &principal.email, "brand-new-password").await;
}

#[sqlx::test(migrations = "./migrations")]
async fn test_form_login_redirects(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let principal = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;

    let form = |password: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header(header::ACCEPT, "text/html")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("email", &principal.email)
                    .append_pair("password", password)
                    .finish(),
            ))
            .unwrap()
    };

    let response = app.clone().oneshot(form("wrong-password")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        login_redirect_target("These credentials do not match our records.").as_str()
    );

    let response = app.clone().oneshot(form(PASSWORD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/api/auth/me");
    assert!(session_cookie_from(&response).is_some());
}
