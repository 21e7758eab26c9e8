use axum::http::Method;
use axum::Router;

use super::http::{request, response_json};

pub const TEST_PASSWORD: &str = "posture2024";

pub fn unique_username() -> String {
    format!("user_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

/// 注册新用户并返回 (access_token, user_id)
pub async fn register_user(app: &Router) -> (String, String) {
    let response = request(
        app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "username": unique_username(),
            "password": TEST_PASSWORD,
        })),
        &[],
    )
    .await;

    let (status, _headers, body) = response_json(response).await;
    assert!(status.is_success(), "register failed: {body}");

    let token = body["data"]["accessToken"]
        .as_str()
        .expect("access token in register response")
        .to_string();
    let user_id = body["data"]["user"]["id"]
        .as_str()
        .expect("user id in register response")
        .to_string();
    (token, user_id)
}

pub async fn login_and_get_token(app: &Router) -> String {
    register_user(app).await.0
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn bearer(token: &str) -> [(&'static str, String); 1] {
    [("authorization", auth_header(token))]
}
