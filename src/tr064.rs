//! TR-064 transport for FRITZ!Box routers.
//!
//! Opening a session fetches the device description (`/tr64desc.xml`),
//! which carries the model name, the firmware version and the table of
//! services with their control URLs. Actions are SOAP 1.1 calls posted to
//! the control URL of their service. Protected actions answer the first
//! request with a `401` and a digest challenge, which is answered once.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::time::Duration;
//! use guestwifi::config::RouterCredentials;
//! use guestwifi::connection::{ActionArguments, RouterConnection};
//! use guestwifi::tr064::Tr064Connection;
//!
//! let credentials = RouterCredentials::new("fritz.box", "admin", "secret")?;
//! let conn = Tr064Connection::open(&credentials, Duration::from_secs(10)).await?;
//! let info = conn
//!     .invoke("WLANConfiguration3", "GetInfo", &ActionArguments::new())
//!     .await?;
//! println!("{:?}", info.get("NewStatus"));
//! conn.close();
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::RouterCredentials;
use crate::connection::{ActionArguments, ActionResult, DeviceInfo, RouterConnection};
use crate::error::{ActionError, ConnectionError};

pub const TR064_PORT: u16 = 49000;
pub const DESCRIPTION_PATH: &str = "/tr64desc.xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub service_type: String,
    pub control_url: String,
}

/// A live TR-064 session with one router.
pub struct Tr064Connection {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: SecretString,
    device: DeviceInfo,
    services: HashMap<String, ServiceEndpoint>,
}

impl Tr064Connection {
    pub async fn open(
        credentials: &RouterCredentials,
        timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        if credentials.address.trim().is_empty() {
            return Err(ConnectionError::InvalidCredentials("address"));
        }
        if credentials.user.trim().is_empty() {
            return Err(ConnectionError::InvalidCredentials("user"));
        }
        if credentials.password.expose_secret().is_empty() {
            return Err(ConnectionError::InvalidCredentials("password"));
        }

        let base_url = base_url(&credentials.address)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?;

        let description_url = format!("{}{}", base_url, DESCRIPTION_PATH);
        tracing::debug!("Fetching device description from {}", description_url);

        let response = client
            .get(&description_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?;
        let xml = response
            .text()
            .await
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?;

        let (device, services) = parse_description(&xml)?;

        Ok(Self {
            client,
            base_url,
            user: credentials.user.clone(),
            password: SecretString::from(credentials.password.expose_secret().to_string()),
            device,
            services,
        })
    }

    async fn post(
        &self,
        url: &str,
        soap_action: &str,
        body: &str,
        authorization: Option<&str>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", soap_action)
            .body(body.to_string());
        if let Some(auth) = authorization {
            request = request.header(AUTHORIZATION, auth);
        }
        request.send().await
    }
}

#[async_trait]
impl RouterConnection for Tr064Connection {
    fn device_info(&self) -> &DeviceInfo {
        &self.device
    }

    async fn invoke(
        &self,
        service: &str,
        action: &str,
        arguments: &ActionArguments,
    ) -> Result<ActionResult, ActionError> {
        let endpoint = self
            .services
            .get(service)
            .ok_or_else(|| ActionError::UnknownService(service.to_string()))?;

        let url = format!("{}{}", self.base_url, endpoint.control_url);
        let soap_action = format!("{}#{}", endpoint.service_type, action);
        let body = soap_envelope(&endpoint.service_type, action, arguments);
        let http_error = |e: reqwest::Error| ActionError::Http {
            action: action.to_string(),
            message: e.to_string(),
        };

        tracing::debug!("Invoking {}:{}", service, action);
        let mut response = self
            .post(&url, &soap_action, &body, None)
            .await
            .map_err(http_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(DigestChallenge::parse)
                .ok_or_else(|| ActionError::Unauthorized(action.to_string()))?;
            let authorization = challenge.authorization(
                &self.user,
                self.password.expose_secret(),
                "POST",
                &endpoint.control_url,
                &new_cnonce(),
            );
            response = self
                .post(&url, &soap_action, &body, Some(&authorization))
                .await
                .map_err(http_error)?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(ActionError::Unauthorized(action.to_string()));
            }
        }

        let status = response.status();
        let text = response.text().await.map_err(http_error)?;

        if status.is_success() {
            parse_action_response(action, &text)
        } else if let Some(fault) = parse_fault(&text) {
            Err(fault)
        } else {
            Err(ActionError::Http {
                action: action.to_string(),
                message: format!("unexpected status {}", status),
            })
        }
    }

    fn close(self) {
        tracing::debug!("Closing router session {}", self.base_url);
    }
}

/// Base URL of the TR-064 endpoint. A bare host gets the default port.
pub fn base_url(address: &str) -> Result<String, ConnectionError> {
    let address = address.trim().trim_end_matches('/');
    if address.is_empty() || address.contains(char::is_whitespace) {
        return Err(ConnectionError::InvalidAddress(address.to_string()));
    }
    if address.contains("://") {
        Ok(address.to_string())
    } else {
        Ok(format!("http://{}:{}", address, TR064_PORT))
    }
}

fn element_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(str::trim)
}

/// Parse `/tr64desc.xml` into device metadata and the service table.
///
/// Services are keyed by the last segment of their `serviceId`, so
/// `urn:WLANConfiguration-com:serviceId:WLANConfiguration3` becomes
/// `WLANConfiguration3`.
pub fn parse_description(
    xml: &str,
) -> Result<(DeviceInfo, HashMap<String, ServiceEndpoint>), ConnectionError> {
    let doc =
        roxmltree::Document::parse(xml).map_err(|e| ConnectionError::Description(e.to_string()))?;
    let root = doc.root_element();

    let model_name = element_text(root, "modelName")
        .ok_or_else(|| ConnectionError::Description("missing modelName".to_string()))?
        .to_string();

    let firmware_version = root
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "systemVersion")
        .and_then(|n| element_text(n, "Display"))
        .unwrap_or_default()
        .to_string();

    let mut services = HashMap::new();
    for service in root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "service")
    {
        let (Some(service_id), Some(service_type), Some(control_url)) = (
            element_text(service, "serviceId"),
            element_text(service, "serviceType"),
            element_text(service, "controlURL"),
        ) else {
            continue;
        };
        let name = service_id.rsplit(':').next().unwrap_or(service_id);
        services.insert(
            name.to_string(),
            ServiceEndpoint {
                service_type: service_type.to_string(),
                control_url: control_url.to_string(),
            },
        );
    }

    Ok((
        DeviceInfo {
            firmware_version,
            model_name,
        },
        services,
    ))
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn soap_envelope(service_type: &str, action: &str, arguments: &ActionArguments) -> String {
    let args: String = arguments
        .iter()
        .map(|(name, value)| format!("<{0}>{1}</{0}>", name, xml_escape(&value.to_string())))
        .collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <s:Envelope s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\" \
         xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <s:Body><u:{action} xmlns:u=\"{service_type}\">{args}</u:{action}></s:Body>\
         </s:Envelope>"
    )
}

/// Collect the children of `<{action}Response>` as name → text.
pub fn parse_action_response(action: &str, xml: &str) -> Result<ActionResult, ActionError> {
    let malformed = |message: String| ActionError::MalformedResponse {
        action: action.to_string(),
        message,
    };

    let doc = roxmltree::Document::parse(xml).map_err(|e| malformed(e.to_string()))?;
    let response_name = format!("{}Response", action);
    let response = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == response_name)
        .ok_or_else(|| malformed(format!("missing <{}>", response_name)))?;

    Ok(response
        .children()
        .filter(|n| n.is_element())
        .map(|n| {
            (
                n.tag_name().name().to_string(),
                n.text().unwrap_or_default().to_string(),
            )
        })
        .collect())
}

/// Extract a SOAP fault. Prefers the `UPnPError` detail when present.
pub fn parse_fault(xml: &str) -> Option<ActionError> {
    let doc = roxmltree::Document::parse(xml).ok()?;
    let root = doc.root_element();

    if let Some(upnp) = root
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "UPnPError")
    {
        return Some(ActionError::Fault {
            code: element_text(upnp, "errorCode").unwrap_or_default().to_string(),
            description: element_text(upnp, "errorDescription")
                .unwrap_or_default()
                .to_string(),
        });
    }

    let fault = root
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "Fault")?;
    Some(ActionError::Fault {
        code: element_text(fault, "faultcode").unwrap_or_default().to_string(),
        description: element_text(fault, "faultstring")
            .unwrap_or_default()
            .to_string(),
    })
}

/// An HTTP digest challenge (RFC 2617) from a `WWW-Authenticate` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: Option<String>,
    pub opaque: Option<String>,
}

impl DigestChallenge {
    pub fn parse(header: &str) -> Option<Self> {
        let rest = header.trim();
        let (scheme, params) = rest.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }
        let params = parse_auth_params(params);

        Some(Self {
            realm: params.get("realm")?.clone(),
            nonce: params.get("nonce")?.clone(),
            qop: params.get("qop").cloned(),
            opaque: params.get("opaque").cloned(),
        })
    }

    fn supports_auth_qop(&self) -> bool {
        self.qop
            .as_deref()
            .is_some_and(|q| q.split(',').any(|v| v.trim() == "auth"))
    }

    /// Compute the request digest. `nc` is always 1, every call answers a
    /// fresh challenge.
    pub fn response(
        &self,
        user: &str,
        password: &str,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", user, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        if self.supports_auth_qop() {
            md5_hex(&format!(
                "{}:{}:00000001:{}:auth:{}",
                ha1, self.nonce, cnonce, ha2
            ))
        } else {
            md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        }
    }

    /// Value of the `Authorization` header answering this challenge.
    pub fn authorization(
        &self,
        user: &str,
        password: &str,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> String {
        let response = self.response(user, password, method, uri, cnonce);
        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm=MD5, response=\"{}\"",
            user, self.realm, self.nonce, uri, response
        );
        if self.supports_auth_qop() {
            header.push_str(&format!(", qop=auth, nc=00000001, cnonce=\"{}\"", cnonce));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        header
    }
}

/// Split `key=value, key="quoted, value"` into a map.
fn parse_auth_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

        let key: String = std::iter::from_fn(|| chars.next_if(|c| *c != '=' && *c != ','))
            .collect::<String>()
            .trim()
            .to_ascii_lowercase();
        if key.is_empty() {
            break;
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }

        let value = if chars.next_if_eq(&'"').is_some() {
            let mut value = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
            value
        } else {
            std::iter::from_fn(|| chars.next_if(|c| *c != ','))
                .collect::<String>()
                .trim()
                .to_string()
        };
        params.insert(key, value);
    }

    params
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn new_cnonce() -> String {
    format!("{:016x}", rand::random::<u64>())
}
