use axum::http::Method;
use axum::Router;
use serde_json::Value;

use super::auth::bearer;
use super::http::{assert_status_ok_json, call};

/// 保存的汇总必须与用保存的阈值重放角度序列得到的汇总一致
pub async fn assert_summary_matches_replay(app: &Router, token: &str, record: &Value) {
    let id = record["id"].as_u64().expect("record id");
    let (status, body) = call(
        app,
        Method::GET,
        &format!("/api/measurements/{id}/replay"),
        None,
        &bearer(token),
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["summary"], record["summary"]);
}
