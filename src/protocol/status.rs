//! `samlp:Status` and the status-code tree.

use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;

/// A `samlp:StatusCode`, possibly carrying nested sub-codes.
///
/// Only the top-level code is constrained (see [`Status::new`]); nested
/// sub-codes may be any URI.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCode {
    value: String,
    sub_codes: Vec<StatusCode>,
}

impl StatusCode {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            sub_codes: Vec::new(),
        }
    }

    pub fn with_sub_code(mut self, sub_code: StatusCode) -> Self {
        self.sub_codes.push(sub_code);
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn sub_codes(&self) -> &[StatusCode] {
        &self.sub_codes
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, "StatusCode")?;
        let value = dom::require_attribute(element, "Value")?;
        let mut sub_codes = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::SAMLP, "StatusCode") {
                sub_codes.push(StatusCode::from_xml(child)?);
            }
        }
        Ok(Self { value, sub_codes })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, "StatusCode");
        element.set_attribute("Value", &self.value);
        for sub_code in &self.sub_codes {
            element.push_child(sub_code.to_element());
        }
        element
    }
}

/// A `samlp:Status`.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    code: StatusCode,
    message: Option<String>,
    details: Vec<Element>,
}

impl Status {
    const TOP_LEVEL: [&'static str; 4] = [
        ns::status::SUCCESS,
        ns::status::REQUESTER,
        ns::status::RESPONDER,
        ns::status::VERSION_MISMATCH,
    ];

    /// The top-level status code must be one of the four values the
    /// protocol defines; anything else is a protocol violation.
    pub fn new(code: StatusCode) -> Result<Self> {
        if !Self::TOP_LEVEL.contains(&code.value()) {
            return Err(SamlError::ProtocolViolation(format!(
                "invalid top-level status code: {}",
                code.value()
            )));
        }
        Ok(Self {
            code,
            message: None,
            details: Vec::new(),
        })
    }

    pub fn success() -> Self {
        Self {
            code: StatusCode::new(ns::status::SUCCESS),
            message: None,
            details: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Appends a raw `samlp:StatusDetail` element.
    pub fn with_detail(mut self, detail: Element) -> Self {
        self.details.push(detail);
        self
    }

    pub fn code(&self) -> &StatusCode {
        &self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn details(&self) -> &[Element] {
        &self.details
    }

    pub fn is_success(&self) -> bool {
        self.code.value() == ns::status::SUCCESS
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, "Status")?;
        let mut code = None;
        let mut message = None;
        let mut details = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::SAMLP, "StatusCode") {
                if code.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "samlp:StatusCode",
                    });
                }
                code = Some(StatusCode::from_xml(child)?);
            } else if child.is_named(ns::SAMLP, "StatusMessage") {
                if message.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "samlp:StatusMessage",
                    });
                }
                message = Some(child.text());
            } else if child.is_named(ns::SAMLP, "StatusDetail") {
                details.push(child.clone());
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAMLP.to_string(),
                    expected: "StatusCode".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        let code = code.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "samlp:StatusCode",
        })?;
        let mut status = Self::new(code)?;
        status.message = message;
        status.details = details;
        Ok(status)
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, "Status");
        element.push_child(self.code.to_element());
        if let Some(message) = &self.message {
            let mut child = Element::new(ns::SAMLP, ns::prefix::SAMLP, "StatusMessage");
            child.set_text(message);
            element.push_child(child);
        }
        for detail in &self.details {
            element.push_child(detail.clone());
        }
        element
    }
}
