// Fake FRITZ!Box for integration tests, built on wiremock.

#![allow(dead_code)]

use std::time::Duration;

use guestwifi::{RouterCredentials, Settings};
use wiremock::matchers::{body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CONTROL_URL: &str = "/upnp/control/wlanconfig3";
pub const SERVICE_TYPE: &str = "urn:dslforum-org:service:WLANConfiguration:3";

pub const DESCRIPTION: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:dslforum-org:device-1-0">
  <systemVersion><HW>226</HW><Display>154.07.57</Display></systemVersion>
  <device>
    <deviceType>urn:dslforum-org:device:InternetGatewayDevice:1</deviceType>
    <modelName>FRITZ!Box 7590</modelName>
    <deviceList>
      <device>
        <deviceType>urn:dslforum-org:device:LANDevice:1</deviceType>
        <serviceList>
          <service>
            <serviceType>urn:dslforum-org:service:WLANConfiguration:3</serviceType>
            <serviceId>urn:WLANConfiguration-com:serviceId:WLANConfiguration3</serviceId>
            <controlURL>/upnp/control/wlanconfig3</controlURL>
          </service>
        </serviceList>
      </device>
    </deviceList>
  </device>
</root>"#;

pub fn action_response(action: &str, values: &[(&str, &str)]) -> String {
    let body: String = values
        .iter()
        .map(|(k, v)| format!("<{0}>{1}</{0}>", k, v))
        .collect();
    format!(
        "<?xml version=\"1.0\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
         s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">\
         <s:Body><u:{action}Response xmlns:u=\"{SERVICE_TYPE}\">{body}</u:{action}Response>\
         </s:Body></s:Envelope>"
    )
}

pub fn fault_response(code: &str, description: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body>\
         <s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring>\
         <detail><UPnPError xmlns=\"urn:dslforum-org:control-1-0\">\
         <errorCode>{code}</errorCode><errorDescription>{description}</errorDescription>\
         </UPnPError></detail></s:Fault></s:Body></s:Envelope>"
    )
}

/// Router with a device description and a digest challenge for every
/// unauthenticated SOAP call.
pub async fn fake_router() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tr64desc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DESCRIPTION))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(CONTROL_URL))
        .respond_with(ResponseTemplate::new(401).insert_header(
            "WWW-Authenticate",
            r#"Digest realm="F!Box SOAP-Auth", nonce="5C1A3E9F", algorithm=MD5, qop="auth""#,
        ))
        .with_priority(10)
        .mount(&server)
        .await;

    server
}

/// Answer an authenticated call to `action` with `response`.
pub fn authed_action(action: &str, response: ResponseTemplate) -> Mock {
    Mock::given(method("POST"))
        .and(path(CONTROL_URL))
        .and(header_exists("authorization"))
        .and(body_string_contains(format!("<u:{} ", action)))
        .respond_with(response)
        .with_priority(1)
}

pub async fn mount_status(server: &MockServer, status: &str) {
    authed_action(
        "GetInfo",
        ResponseTemplate::new(200).set_body_string(action_response(
            "GetInfo",
            &[("NewEnable", "1"), ("NewStatus", status)],
        )),
    )
    .mount(server)
    .await;
}

pub fn settings_for(server: &MockServer) -> Settings {
    Settings {
        credentials: RouterCredentials::new(&server.uri(), "admin", "secret")
            .expect("valid credentials"),
        base_url: "/".to_string(),
        header_message: String::new(),
        settle_time: Duration::from_millis(20),
        request_timeout: Duration::from_secs(5),
        bind: "127.0.0.1".to_string(),
        port: 0,
    }
}
