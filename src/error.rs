//! Crate-wide error taxonomy.
//!
//! Every fallible parse or construction operation fails synchronously with
//! one of these variants. The model never catches its own errors to
//! produce a fallback value; callers translate them into protocol-level
//! status responses where appropriate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SamlError>;

#[derive(Debug, Error)]
pub enum SamlError {
    /// The node handed to `from_xml` is not the element the type expects.
    #[error("unexpected element: expected {{{expected_ns}}}{expected}, found {{{found_ns}}}{found}")]
    UnexpectedElement {
        expected_ns: String,
        expected: String,
        found_ns: String,
        found: String,
    },

    /// A mandatory attribute is absent.
    #[error("missing required attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    /// A minimum-cardinality child is absent.
    #[error("missing required <{child}> element in <{parent}>")]
    MissingElement {
        parent: String,
        child: &'static str,
    },

    /// A maximum-cardinality constraint was exceeded.
    #[error("more than one <{child}> element in <{parent}>")]
    TooManyElements {
        parent: String,
        child: &'static str,
    },

    /// A business-rule invariant failed.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The `Version` attribute is present but not "2.0".
    #[error("unsupported SAML version: {0}")]
    UnsupportedVersion(String),

    /// A dispatched or decrypted element matches no known handler.
    #[error("unknown or unsupported element {{{namespace}}}{local_name}")]
    UnknownExtension {
        namespace: String,
        local_name: String,
    },

    /// A scalar value fails its lexical rules.
    #[error("invalid {what}: '{value}'")]
    InvalidValue { what: &'static str, value: String },

    /// The underlying tokenizer rejected the document.
    #[error("malformed XML: {0}")]
    Xml(String),

    /// A signing or encryption backend reported a failure.
    #[error("crypto backend failure: {0}")]
    Crypto(String),
}

impl From<quick_xml::Error> for SamlError {
    fn from(value: quick_xml::Error) -> Self {
        Self::Xml(value.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(value.to_string())
    }
}

impl From<openssl::error::ErrorStack> for SamlError {
    fn from(value: openssl::error::ErrorStack) -> Self {
        Self::Crypto(value.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Crypto(value.to_string())
    }
}
