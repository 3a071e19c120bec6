mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

use common::{
    body_json, capture_logs, count, create_principal, generate_unique_email, lazy_pool, login_as, send_as,
    send_with_cookie, session_cookie_from, setup_test_app, valid_customer,
};
use opsdesk::middleware::status::{INACTIVE_MESSAGE, login_redirect_target};
use opsdesk::opsdesk_models::{PrincipalStatus, Role};

#[tokio::test]
async fn test_missing_token_is_unauthenticated_json() {
    let app = setup_test_app(lazy_pool());

    let request = Request::builder()
        .uri("/api/customers")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({ "message": "Unauthenticated." }));
}

#[tokio::test]
async fn test_rejection_log_names_the_guarded_roles() {
    let (logs, _guard) = capture_logs();
    let app = setup_test_app(lazy_pool());

    let request = Request::builder()
        .uri("/api/principals")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let rejected = logs.event("Unauthenticated request rejected");
    assert_eq!(rejected["target"], "security");
    assert_eq!(rejected["reason"], "missing_token");
    assert!(
        rejected["required_roles"]
            .as_str()
            .is_some_and(|roles| roles.contains("admin")),
        "{}",
        rejected
    );
}

#[tokio::test]
async fn test_malformed_authorization_header_is_rejected() {
    let app = setup_test_app(lazy_pool());

    let request = Request::builder()
        .uri("/api/vendors")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_browser_is_redirected_to_login() {
    let app = setup_test_app(lazy_pool());

    let request = Request::builder()
        .uri("/api/customers")
        .header(header::ACCEPT, "text/html,application/xhtml+xml")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = setup_test_app(lazy_pool());

    let request = Request::builder()
        .uri("/api/does-not-exist")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Resource not found.");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_employee_cannot_create_customer(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let employee = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;
    let session = login_as(&app, &employee).await;

    let response = send_as(
        &app,
        &session,
        Method::POST,
        "/api/customers",
        Some(valid_customer(&generate_unique_email())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Insufficient privileges.");
    assert_eq!(body["required_roles"], json!(["admin", "manager"]));
    assert_eq!(body["user_role"], "employee");
    assert_eq!(count(&pool, "customers").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_employee_can_read_customers(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let employee = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;
    let session = login_as(&app, &employee).await;

    let response = send_as(&app, &session, Method::GET, "/api/customers", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!([]));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_manager_cannot_delete_customer(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let manager = create_principal(&pool, Role::Manager, PrincipalStatus::Active).await;
    let session = login_as(&app, &manager).await;

    let created = send_as(
        &app,
        &session,
        Method::POST,
        "/api/customers",
        Some(valid_customer(&generate_unique_email())),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let id = body_json(created).await["id"].as_str().unwrap().to_string();

    let response = send_as(
        &app,
        &session,
        Method::DELETE,
        &format!("/api/customers/{}", id),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["required_roles"], json!(["admin"]));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_inactive_principal_is_logged_out(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let employee = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;
    let session = login_as(&app, &employee).await;

    sqlx::query("UPDATE principals SET status = 'inactive' WHERE id = $1")
        .bind(employee.id.into_inner())
        .execute(&pool)
        .await
        .unwrap();

    let response = send_as(&app, &session, Method::GET, "/api/customers", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let cleared = session_cookie_from(&response).unwrap();
    assert_eq!(cleared, format!("{}=", common::COOKIE_NAME));
    assert_eq!(body_json(response).await, json!({ "message": INACTIVE_MESSAGE }));

    // The session is gone, so the same request now fails authentication.
    let response = send_as(&app, &session, Method::GET, "/api/customers", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_status_gate_ends_only_the_presenting_session(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let employee = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;
    let laptop = login_as(&app, &employee).await;
    let phone = login_as(&app, &employee).await;

    sqlx::query("UPDATE principals SET status = 'inactive' WHERE id = $1")
        .bind(employee.id.into_inner())
        .execute(&pool)
        .await
        .unwrap();

    let response = send_as(&app, &laptop, Method::GET, "/api/customers", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(count(&pool, "sessions WHERE revoked_at IS NULL").await, 1);

    // The other session is still refused, by the same gate.
    let response = send_as(&app, &phone, Method::GET, "/api/customers", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(count(&pool, "sessions WHERE revoked_at IS NULL").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_inactive_browser_is_redirected_with_message(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let employee = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;
    let session = login_as(&app, &employee).await;

    sqlx::query("UPDATE principals SET status = 'inactive' WHERE id = $1")
        .bind(employee.id.into_inner())
        .execute(&pool)
        .await
        .unwrap();

    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::ACCEPT, "text/html")
        .header(header::COOKIE, &session.cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        login_redirect_target(INACTIVE_MESSAGE).as_str()
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_cookie_writes_need_csrf_token(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let manager = create_principal(&pool, Role::Manager, PrincipalStatus::Active).await;
    let session = login_as(&app, &manager).await;

    let response = send_with_cookie(
        &app,
        &session,
        Method::POST,
        "/api/customers",
        Some(valid_customer(&generate_unique_email())),
        false,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(count(&pool, "customers").await, 0);

    let response = send_with_cookie(
        &app,
        &session,
        Method::POST,
        "/api/customers",
        Some(valid_customer(&generate_unique_email())),
        true,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(count(&pool, "customers").await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_cookie_reads_skip_csrf(pool: PgPool) {
    let app = setup_test_app(pool.clone());
    let employee = create_principal(&pool, Role::Employee, PrincipalStatus::Active).await;
    let session = login_as(&app, &employee).await;

    let response =
        send_with_cookie(&app, &session, Method::GET, "/api/auth/me", None, false).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], employee.email);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_forged_token_is_rejected(pool: PgPool) {
    let app = setup_test_app(pool.clone());

    let request = Request::builder()
        .uri("/api/customers")
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
