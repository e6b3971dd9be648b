//! Permission request

use serde::{Deserialize, Serialize};

use crate::action::Action;

/// One concrete action a caller wants to perform against a target origin.
///
/// The optional fields exist only so the approval UI can show the human
/// what is about to happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub action: Action,
    pub caller_origin: String,
    pub target_origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub element_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PermissionRequest {
    pub fn new(
        action: Action,
        caller_origin: impl Into<String>,
        target_origin: impl Into<String>,
    ) -> Self {
        Self {
            action,
            caller_origin: caller_origin.into(),
            target_origin: target_origin.into(),
            element: None,
            element_ref: None,
            text: None,
            url: None,
        }
    }

    pub fn with_element(mut self, element: Option<String>) -> Self {
        self.element = element;
        self
    }

    pub fn with_ref(mut self, element_ref: Option<String>) -> Self {
        self.element_ref = element_ref;
        self
    }

    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = text;
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }
}
