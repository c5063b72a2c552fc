//! SBI Message
//!
//! Request header and request artifact handed to the transport, the OpenAPI
//! models carried in Nbsf_Management bodies, and the generic builder that
//! turns a structured message into a request.

use serde::Serialize;

use crate::constants::{content_type, header};
use crate::error::{SbiError, SbiResult};
use crate::types::SbiServiceType;

/// SBI request header - matches the `h` part of ogs_sbi_message_t
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SbiHeader {
    pub method: String,
    pub service_name: String,
    pub api_version: String,
    pub resource_components: Vec<String>,
}

impl SbiHeader {
    pub fn new(method: &str, service: SbiServiceType, api_version: &str) -> Self {
        Self {
            method: method.to_string(),
            service_name: service.to_name().to_string(),
            api_version: api_version.to_string(),
            resource_components: Vec::new(),
        }
    }

    /// Append a resource component to the path
    pub fn with_resource(mut self, component: impl Into<String>) -> Self {
        self.resource_components.push(component.into());
        self
    }

    /// Resource path: `/{service}/{version}/{component}...`
    pub fn uri(&self) -> String {
        let mut uri = format!("/{}/{}", self.service_name, self.api_version);
        for component in &self.resource_components {
            uri.push('/');
            uri.push_str(component);
        }
        uri
    }
}

/// Request artifact ready for the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbiRequest {
    pub header: SbiHeader,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub content: Option<String>,
}

impl SbiRequest {
    /// Look up an HTTP header (case-insensitive)
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parse the request content as JSON
    pub fn json(&self) -> SbiResult<Option<serde_json::Value>> {
        match &self.content {
            Some(content) => Ok(Some(serde_json::from_str(content)?)),
            None => Ok(None),
        }
    }
}

/// S-NSSAI as carried in OpenAPI bodies (OpenAPI_snssai_t)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Snssai<'a> {
    pub sst: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd: Option<&'a str>,
}

/// PCF binding (OpenAPI_pcf_binding_t)
///
/// All string fields borrow from the caller; the model never owns session data.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcfBinding<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supi: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpsi: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_addr: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_prefix: Option<&'a str>,
    pub dnn: &'a str,
    pub snssai: Snssai<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcf_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supp_feat: Option<&'a str>,
}

/// Structured SBI message prior to serialization
#[derive(Debug, Default)]
pub struct SbiMessage<'a> {
    pub header: SbiHeader,
    pub pcf_binding: Option<&'a PcfBinding<'a>>,
}

/// Build a request artifact from a structured message
/// Port of ogs_sbi_build_request
pub fn build_request(message: &SbiMessage<'_>) -> SbiResult<SbiRequest> {
    let h = &message.header;
    if h.method.is_empty() {
        return Err(SbiError::InvalidMessage("No method".to_string()));
    }
    if h.service_name.is_empty() {
        return Err(SbiError::InvalidMessage("No service name".to_string()));
    }
    if h.api_version.is_empty() {
        return Err(SbiError::InvalidMessage("No API version".to_string()));
    }

    let content = match message.pcf_binding {
        Some(pcf_binding) => Some(serde_json::to_string(pcf_binding)?),
        None => None,
    };

    let mut headers = vec![(
        header::ACCEPT.to_string(),
        format!(
            "{},{}",
            content_type::APPLICATION_JSON,
            content_type::APPLICATION_PROBLEM_JSON
        ),
    )];
    if content.is_some() {
        headers.push((
            header::CONTENT_TYPE.to_string(),
            content_type::APPLICATION_JSON.to_string(),
        ));
    }

    let uri = h.uri();
    log::trace!("SBI request built: {} {}", h.method, uri);

    Ok(SbiRequest {
        header: h.clone(),
        uri,
        headers,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{api, method, resource};

    fn pcf_bindings_header(method: &str) -> SbiHeader {
        SbiHeader::new(method, SbiServiceType::NbsfManagement, api::V1)
            .with_resource(resource::PCF_BINDINGS)
    }

    #[test]
    fn test_header_uri() {
        let h = pcf_bindings_header(method::DELETE).with_resource("7");
        assert_eq!(h.uri(), "/nbsf-management/v1/pcfBindings/7");
    }

    #[test]
    fn test_build_request_with_pcf_binding() {
        let pcf_binding = PcfBinding {
            supi: Some("imsi-001010000000001"),
            dnn: "internet",
            snssai: Snssai { sst: 1, sd: Some("000001") },
            ..Default::default()
        };
        let message = SbiMessage {
            header: pcf_bindings_header(method::POST),
            pcf_binding: Some(&pcf_binding),
        };

        let request = build_request(&message).unwrap();
        assert_eq!(request.header.method, "POST");
        assert_eq!(request.uri, "/nbsf-management/v1/pcfBindings");
        assert_eq!(request.get_header("content-type"), Some("application/json"));

        let body = request.json().unwrap().unwrap();
        assert_eq!(body["supi"], "imsi-001010000000001");
        assert_eq!(body["dnn"], "internet");
        assert_eq!(body["snssai"]["sst"], 1);
        assert_eq!(body["snssai"]["sd"], "000001");
        assert!(body.get("gpsi").is_none());
        assert!(body.get("pcfId").is_none());
    }

    #[test]
    fn test_snssai_without_sd() {
        let snssai = Snssai { sst: 2, sd: None };
        let json = serde_json::to_string(&snssai).unwrap();
        assert_eq!(json, r#"{"sst":2}"#);
    }

    #[test]
    fn test_build_request_without_body() {
        let message = SbiMessage {
            header: pcf_bindings_header(method::DELETE).with_resource("3"),
            pcf_binding: None,
        };
        let request = build_request(&message).unwrap();
        assert!(request.content.is_none());
        assert!(request.get_header("Content-Type").is_none());
        assert!(request.json().unwrap().is_none());
    }

    #[test]
    fn test_build_request_requires_method() {
        let message = SbiMessage {
            header: pcf_bindings_header(""),
            pcf_binding: None,
        };
        assert!(matches!(
            build_request(&message),
            Err(SbiError::InvalidMessage(_))
        ));
    }
}
