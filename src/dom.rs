//! A small namespace-aware XML element tree.
//!
//! The object model works on this tree rather than on raw tokenizer
//! events. Parsed trees keep attribute order, prefixes, and the raw
//! (still-escaped) form of attribute values and character data, so
//! serializing a parsed element reproduces its original bytes. That
//! property is what keeps signatures over re-emitted XML verifiable.

mod element;
mod parse;
mod serialize;

pub use element::{Attribute, Element, Node};

use crate::error::{Result, SamlError};

/// Checks that `element` is the element a `from_xml` implementation expects.
pub(crate) fn expect_element(element: &Element, namespace: &str, local: &str) -> Result<()> {
    if element.is_named(namespace, local) {
        Ok(())
    } else {
        Err(SamlError::UnexpectedElement {
            expected_ns: namespace.to_string(),
            expected: local.to_string(),
            found_ns: element.namespace().unwrap_or_default().to_string(),
            found: element.local_name().to_string(),
        })
    }
}

/// Reads a mandatory attribute.
pub(crate) fn require_attribute(element: &Element, name: &'static str) -> Result<String> {
    element
        .attribute(name)
        .ok_or_else(|| SamlError::MissingAttribute {
            element: element.qualified_name(),
            attribute: name,
        })
}

/// Reads an optional boolean attribute; absent means `false`.
pub(crate) fn bool_attribute(element: &Element, name: &'static str) -> Result<bool> {
    match element.attribute(name).as_deref() {
        None => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(SamlError::InvalidValue {
            what: "boolean attribute",
            value: other.to_string(),
        }),
    }
}
