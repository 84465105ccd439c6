use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the HTTP request being served when an event was logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRequestDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_url_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_url: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub query_string: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub post_data: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub session_data: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mvc_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mvc_controller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mvc_area: Option<String>,
}

impl WebRequestDetail {
    /// Overlay every field set on `other`.
    pub fn merge(&mut self, other: &WebRequestDetail) {
        fn take(dst: &mut Option<String>, src: &Option<String>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }
        take(&mut self.user_ip_address, &other.user_ip_address);
        take(&mut self.http_method, &other.http_method);
        take(&mut self.request_protocol, &other.request_protocol);
        take(&mut self.request_url, &other.request_url);
        take(&mut self.request_url_root, &other.request_url_root);
        take(&mut self.referral_url, &other.referral_url);
        take(&mut self.post_data_raw, &other.post_data_raw);
        take(&mut self.mvc_action, &other.mvc_action);
        take(&mut self.mvc_controller, &other.mvc_controller);
        take(&mut self.mvc_area, &other.mvc_area);
        for (dst, src) in [
            (&mut self.headers, &other.headers),
            (&mut self.cookies, &other.cookies),
            (&mut self.query_string, &other.query_string),
            (&mut self.post_data, &other.post_data),
            (&mut self.session_data, &other.session_data),
        ] {
            dst.extend(src.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
}

/// Per-request values the host application associates with the log
/// statements emitted while serving one logical request.
///
/// Passed explicitly into the adapter; whoever owns the request decides
/// how it is scoped (task-local, span extension, plain argument).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    user: Option<String>,
    transaction_id: Option<String>,
    web_request: Option<WebRequestDetail>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn web_request(&self) -> Option<&WebRequestDetail> {
        self.web_request.as_ref()
    }

    pub fn put_user(&mut self, user: impl Into<String>) {
        self.user = Some(user.into());
    }

    pub fn put_transaction_id(&mut self, id: impl Into<String>) {
        self.transaction_id = Some(id.into());
    }

    pub fn put_web_request(&mut self, detail: WebRequestDetail) {
        self.web_request = Some(detail);
    }

    /// Mutable access to the web request detail, creating an empty one
    /// if none is set.
    pub fn web_request_mut(&mut self) -> &mut WebRequestDetail {
        self.web_request.get_or_insert_with(WebRequestDetail::default)
    }

    pub fn clear(&mut self) {
        *self = RequestContext::default();
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.transaction_id.is_none() && self.web_request.is_none()
    }

    /// Overlay the values set on `other`; unset values leave ours intact.
    pub fn merge(&mut self, other: &RequestContext) {
        if other.user.is_some() {
            self.user.clone_from(&other.user);
        }
        if other.transaction_id.is_some() {
            self.transaction_id.clone_from(&other.transaction_id);
        }
        if let Some(detail) = &other.web_request {
            self.web_request_mut().merge(detail);
        }
    }
}
