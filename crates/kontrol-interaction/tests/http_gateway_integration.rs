//! HttpGatewayClient against an in-process axum gateway.

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use kontrol_core::gateway::{GatewayInvoker, InvocationError, unwrap_payload};
use kontrol_interaction::{ClientOptions, HttpGatewayClient};
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

const TOKEN: &str = "test-token";

async fn invoke(headers: HeaderMap, axum::Json(body): axum::Json<Value>) -> axum::response::Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "bad token").into_response();
    }

    match body["tool"].as_str().unwrap_or_default() {
        "echo" => axum::Json(json!({
            "ok": true,
            "result": { "content": [{ "type": "text", "text": body["args"].to_string() }] }
        }))
        .into_response(),
        "refuse" => axum::Json(json!({ "ok": false, "error": { "message": "tool not allowed" } }))
            .into_response(),
        "refuse_silently" => axum::Json(json!({ "ok": false })).into_response(),
        "garbage" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            axum::Json(json!({ "ok": true })).into_response()
        }
        _ => (StatusCode::NOT_FOUND, "unknown tool").into_response(),
    }
}

async fn spawn_gateway(path: &str) -> Url {
    let router = Router::new().route(path, post(invoke));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Url::parse(&format!("http://{}", addr)).expect("url")
}

fn client(base: &Url, token: &str) -> HttpGatewayClient {
    HttpGatewayClient::new(base, Some(token.to_string()), ClientOptions::default())
}

#[tokio::test]
async fn test_success_round_trip_sends_tool_and_args() {
    let base = spawn_gateway("/tools/invoke").await;
    let envelope = client(&base, TOKEN)
        .invoke("echo", json!({ "messageLimit": 2 }))
        .await
        .expect("invoke");

    assert!(envelope.ok);
    let payload = unwrap_payload(&envelope).expect("payload");
    assert_eq!(payload.as_value(), Some(&json!({ "messageLimit": 2 })));
}

#[tokio::test]
async fn test_trailing_slash_and_proxy_prefix() {
    let base = spawn_gateway("/api/gateway/tools/invoke").await;
    let prefixed = base.join("/api/gateway/").expect("join");
    let envelope = client(&prefixed, TOKEN).invoke("echo", json!({})).await;
    assert!(envelope.is_ok());
}

#[tokio::test]
async fn test_wrong_token_is_http_error() {
    let base = spawn_gateway("/tools/invoke").await;
    let err = client(&base, "nope").invoke("echo", json!({})).await.unwrap_err();
    assert_eq!(err, InvocationError::http(401, "bad token"));
}

#[tokio::test]
async fn test_remote_error_message_is_carried() {
    let base = spawn_gateway("/tools/invoke").await;
    let client = client(&base, TOKEN);

    let err = client.invoke("refuse", json!({})).await.unwrap_err();
    assert_eq!(err, InvocationError::remote(Some("tool not allowed".into())));

    let err = client.invoke("refuse_silently", json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "gateway error: gateway reported an error");
}

#[tokio::test]
async fn test_non_json_success_is_protocol_error() {
    let base = spawn_gateway("/tools/invoke").await;
    let err = client(&base, TOKEN).invoke("garbage", json!({})).await.unwrap_err();
    assert!(matches!(err, InvocationError::Protocol { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_gateway_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    drop(listener);

    let base = Url::parse(&format!("http://{}", addr)).expect("url");
    let err = client(&base, TOKEN).invoke("echo", json!({})).await.unwrap_err();
    assert!(matches!(err, InvocationError::Network { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_request_timeout_is_network_error() {
    let base = spawn_gateway("/tools/invoke").await;
    let client = HttpGatewayClient::new(
        &base,
        Some(TOKEN.to_string()),
        ClientOptions::default().with_request_timeout(Duration::from_millis(100)),
    );
    let err = client.invoke("slow", json!({})).await.unwrap_err();
    assert!(matches!(err, InvocationError::Network { .. }), "got {:?}", err);
}
