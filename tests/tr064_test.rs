// Integration tests for `Tr064Connection` against a wiremock router.

mod common;

use std::time::Duration;

use guestwifi::{
    ActionArguments, ActionError, ActionValue, ConnectionError, RouterConnection,
    RouterCredentials, Tr064Connection,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{action_response, authed_action, fake_router, fault_response, mount_status};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn open(server: &MockServer) -> Tr064Connection {
    let credentials = RouterCredentials::new(&server.uri(), "admin", "secret").unwrap();
    Tr064Connection::open(&credentials, TIMEOUT).await.unwrap()
}

#[tokio::test]
async fn test_open_reads_device_metadata() {
    let server = fake_router().await;
    let conn = open(&server).await;

    assert_eq!(conn.device_info().model_name, "FRITZ!Box 7590");
    assert_eq!(conn.device_info().firmware_version, "154.07.57");
    conn.close();
}

#[tokio::test]
async fn test_open_fails_without_description() {
    let server = MockServer::start().await;
    let credentials = RouterCredentials::new(&server.uri(), "admin", "secret").unwrap();

    let result = Tr064Connection::open(&credentials, TIMEOUT).await;
    assert!(matches!(result, Err(ConnectionError::Unreachable(_))));
}

#[tokio::test]
async fn test_open_rejects_garbage_description() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tr64desc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not xml <"))
        .mount(&server)
        .await;
    let credentials = RouterCredentials::new(&server.uri(), "admin", "secret").unwrap();

    let result = Tr064Connection::open(&credentials, TIMEOUT).await;
    assert!(matches!(result, Err(ConnectionError::Description(_))));
}

#[tokio::test]
async fn test_invoke_answers_digest_challenge() {
    let server = fake_router().await;
    mount_status(&server, "Up").await;
    let conn = open(&server).await;

    let result = conn
        .invoke("WLANConfiguration3", "GetInfo", &ActionArguments::new())
        .await
        .unwrap();
    assert_eq!(result.get("NewStatus").map(String::as_str), Some("Up"));

    let requests = server.received_requests().await.unwrap();
    let posts: Vec<_> = requests
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect();
    assert_eq!(posts.len(), 2);
    assert!(posts[0].headers.get("authorization").is_none());

    let auth = posts[1]
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(auth.starts_with("Digest username=\"admin\""));
    assert!(auth.contains("realm=\"F!Box SOAP-Auth\""));
    assert!(auth.contains("nonce=\"5C1A3E9F\""));
    assert!(auth.contains("uri=\"/upnp/control/wlanconfig3\""));

    let soap_action = posts[1]
        .headers
        .get("soapaction")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert_eq!(
        soap_action,
        "urn:dslforum-org:service:WLANConfiguration:3#GetInfo"
    );
}

#[tokio::test]
async fn test_invoke_sends_arguments() {
    let server = fake_router().await;
    authed_action(
        "SetEnable",
        ResponseTemplate::new(200).set_body_string(action_response("SetEnable", &[])),
    )
    .expect(1)
    .mount(&server)
    .await;
    let conn = open(&server).await;

    let mut args = ActionArguments::new();
    args.insert("NewEnable".to_string(), ActionValue::from(false));
    let result = conn
        .invoke("WLANConfiguration3", "SetEnable", &args)
        .await
        .unwrap();
    assert!(result.is_empty());

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests.last().unwrap().body).to_string();
    assert!(body.contains("<NewEnable>0</NewEnable>"));
}

#[tokio::test]
async fn test_invoke_reports_upnp_fault() {
    let server = fake_router().await;
    authed_action(
        "GetStatistics",
        ResponseTemplate::new(500).set_body_string(fault_response("401", "Invalid Action")),
    )
    .mount(&server)
    .await;
    let conn = open(&server).await;

    let err = conn
        .invoke("WLANConfiguration3", "GetStatistics", &ActionArguments::new())
        .await
        .unwrap_err();
    match err {
        ActionError::Fault { code, description } => {
            assert_eq!(code, "401");
            assert_eq!(description, "Invalid Action");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_invoke_rejected_credentials() {
    // Only the 401 challenge is mounted, so the authenticated retry fails too.
    let server = fake_router().await;
    let conn = open(&server).await;

    let err = conn
        .invoke("WLANConfiguration3", "GetInfo", &ActionArguments::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Unauthorized(_)));
}

#[tokio::test]
async fn test_invoke_unknown_service() {
    let server = fake_router().await;
    let conn = open(&server).await;

    let err = conn
        .invoke("WLANConfiguration9", "GetInfo", &ActionArguments::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::UnknownService(ref s) if s == "WLANConfiguration9"));
}
