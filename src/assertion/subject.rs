//! `saml:Subject` and subject confirmation.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::assertion::name_id::Identifier;
use crate::context::SamlContext;
use crate::datetime::{self, check_window};
use crate::dom::{self, Attribute as DomAttribute, Element};
use crate::error::{Result, SamlError};
use crate::ns;

/// The principal all statements of an assertion are about.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    identifier: Option<Identifier>,
    confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    /// A subject needs an identifier, a confirmation, or both.
    pub fn new(
        identifier: Option<Identifier>,
        confirmations: Vec<SubjectConfirmation>,
    ) -> Result<Self> {
        if identifier.is_none() && confirmations.is_empty() {
            return Err(SamlError::ProtocolViolation(
                "a Subject without SubjectConfirmation must carry an identifier".to_string(),
            ));
        }
        Ok(Self {
            identifier,
            confirmations,
        })
    }

    pub fn from_identifier(identifier: Identifier) -> Self {
        Self {
            identifier: Some(identifier),
            confirmations: Vec::new(),
        }
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    pub fn confirmations(&self) -> &[SubjectConfirmation] {
        &self.confirmations
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "Subject")?;
        let mut identifier = None;
        let mut confirmations = Vec::new();
        for child in element.child_elements() {
            if Identifier::matches(child) {
                if identifier.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:NameID, saml:BaseID or saml:EncryptedID",
                    });
                }
                identifier = Some(Identifier::from_xml(child, ctx)?);
            } else if child.is_named(ns::SAML, "SubjectConfirmation") {
                confirmations.push(SubjectConfirmation::from_xml(child, ctx)?);
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "SubjectConfirmation".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        Self::new(identifier, confirmations)
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "Subject");
        if let Some(identifier) = &self.identifier {
            element.push_child(identifier.to_element());
        }
        for confirmation in &self.confirmations {
            element.push_child(confirmation.to_element());
        }
        element
    }
}

/// A `saml:SubjectConfirmation`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectConfirmation {
    method: String,
    identifier: Option<Identifier>,
    data: Option<SubjectConfirmationData>,
}

impl SubjectConfirmation {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            identifier: None,
            data: None,
        }
    }

    pub fn bearer() -> Self {
        Self::new(ns::cm::BEARER)
    }

    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_data(mut self, data: SubjectConfirmationData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    pub fn data(&self) -> Option<&SubjectConfirmationData> {
        self.data.as_ref()
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "SubjectConfirmation")?;
        let method = dom::require_attribute(element, "Method")?;
        let mut identifier = None;
        let mut data = None;
        for child in element.child_elements() {
            if Identifier::matches(child) {
                if identifier.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:NameID, saml:BaseID or saml:EncryptedID",
                    });
                }
                identifier = Some(Identifier::from_xml(child, ctx)?);
            } else if child.is_named(ns::SAML, "SubjectConfirmationData") {
                if data.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:SubjectConfirmationData",
                    });
                }
                data = Some(SubjectConfirmationData::from_xml(child)?);
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "SubjectConfirmationData".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        Ok(Self {
            method,
            identifier,
            data,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "SubjectConfirmation");
        element.set_attribute("Method", &self.method);
        if let Some(identifier) = &self.identifier {
            element.push_child(identifier.to_element());
        }
        if let Some(data) = &self.data {
            element.push_child(data.to_element());
        }
        element
    }
}

/// A `saml:SubjectConfirmationData`.
///
/// The element is an open type: unrecognized namespaced attributes and
/// child elements (a `ds:KeyInfo` for holder-of-key, for instance) are
/// retained raw. `Address` is checked against IPv4/IPv6 literal syntax,
/// but a mismatch only logs a warning — the SAML core makes the format a
/// SHOULD, and real deployments put hostnames in there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectConfirmationData {
    not_before: Option<DateTime<Utc>>,
    not_on_or_after: Option<DateTime<Utc>>,
    recipient: Option<String>,
    in_response_to: Option<String>,
    address: Option<String>,
    extra_attributes: Vec<DomAttribute>,
    children: Vec<Element>,
}

impl SubjectConfirmationData {
    pub fn new(
        not_before: Option<DateTime<Utc>>,
        not_on_or_after: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        check_window(not_before, not_on_or_after)?;
        Ok(Self {
            not_before,
            not_on_or_after,
            ..Self::default()
        })
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_in_response_to(mut self, in_response_to: impl Into<String>) -> Self {
        self.in_response_to = Some(in_response_to.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        check_address(&address);
        self.address = Some(address);
        self
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    pub fn not_on_or_after(&self) -> Option<DateTime<Utc>> {
        self.not_on_or_after
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    pub fn in_response_to(&self) -> Option<&str> {
        self.in_response_to.as_deref()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "SubjectConfirmationData")?;
        let not_before = element
            .attribute("NotBefore")
            .map(|value| datetime::parse_instant(&value))
            .transpose()?;
        let not_on_or_after = element
            .attribute("NotOnOrAfter")
            .map(|value| datetime::parse_instant(&value))
            .transpose()?;
        check_window(not_before, not_on_or_after)?;

        let address = element.attribute("Address");
        if let Some(address) = &address {
            check_address(address);
        }

        // namespace declarations ride along so retained prefixed
        // attributes stay bound after a rebuild
        let extra_attributes = element
            .attributes()
            .iter()
            .filter(|attribute| {
                !matches!(
                    attribute.name(),
                    "NotBefore" | "NotOnOrAfter" | "Recipient" | "InResponseTo" | "Address"
                )
            })
            .cloned()
            .collect();
        let children = element.child_elements().cloned().collect();

        Ok(Self {
            not_before,
            not_on_or_after,
            recipient: element.attribute("Recipient"),
            in_response_to: element.attribute("InResponseTo"),
            address,
            extra_attributes,
            children,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "SubjectConfirmationData");
        if let Some(not_before) = self.not_before {
            element.set_attribute("NotBefore", &datetime::format_instant(not_before));
        }
        if let Some(not_on_or_after) = self.not_on_or_after {
            element.set_attribute("NotOnOrAfter", &datetime::format_instant(not_on_or_after));
        }
        if let Some(recipient) = &self.recipient {
            element.set_attribute("Recipient", recipient);
        }
        if let Some(in_response_to) = &self.in_response_to {
            element.set_attribute("InResponseTo", in_response_to);
        }
        if let Some(address) = &self.address {
            element.set_attribute("Address", address);
        }
        for attribute in &self.extra_attributes {
            element.set_attribute(attribute.name(), &attribute.value());
        }
        for child in &self.children {
            element.push_child(child.clone());
        }
        element
    }
}

fn check_address(address: &str) {
    if address.parse::<std::net::IpAddr>().is_err() {
        warn!(address, "SubjectConfirmationData Address is not a valid IP literal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::NameId;

    #[test]
    fn subject_needs_identifier_or_confirmation() {
        assert!(Subject::new(None, Vec::new()).is_err());
        assert!(Subject::new(None, vec![SubjectConfirmation::bearer()]).is_ok());
        let identifier = Identifier::NameId(NameId::new("someone"));
        assert!(Subject::new(Some(identifier), Vec::new()).is_ok());
    }

    #[test]
    fn confirmation_data_enforces_strict_window() {
        let t1 = datetime::parse_instant("2020-01-01T00:00:00Z").unwrap();
        let t2 = datetime::parse_instant("2020-01-01T01:00:00Z").unwrap();
        assert!(SubjectConfirmationData::new(Some(t1), Some(t2)).is_ok());
        assert!(SubjectConfirmationData::new(Some(t2), Some(t1)).is_err());
        assert!(SubjectConfirmationData::new(Some(t1), Some(t1)).is_err());
    }

    #[test]
    fn invalid_address_is_kept_with_a_warning() {
        let data = SubjectConfirmationData::default().with_address("not-an-ip");
        assert_eq!(data.address(), Some("not-an-ip"));
        let data = SubjectConfirmationData::default().with_address("192.0.2.1");
        assert_eq!(data.address(), Some("192.0.2.1"));
    }

    #[test]
    fn confirmation_round_trips() {
        let xml = concat!(
            r#"<saml:SubjectConfirmation xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">"#,
            r#"<saml:SubjectConfirmationData NotOnOrAfter="2014-09-22T13:47:00Z" "#,
            r#"Recipient="https://sp.example.org/acs" "#,
            r#"InResponseTo="_2b0226190ca1c22de6f66e85f5c95158"/>"#,
            r#"</saml:SubjectConfirmation>"#
        );
        let ctx = SamlContext::new();
        let parsed =
            SubjectConfirmation::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert_eq!(parsed.method(), ns::cm::BEARER);
        assert_eq!(
            parsed.data().unwrap().in_response_to(),
            Some("_2b0226190ca1c22de6f66e85f5c95158")
        );
        assert_eq!(parsed.to_element().to_string(), xml);
    }

    #[test]
    fn foreign_content_is_retained() {
        let xml = concat!(
            r#"<saml:SubjectConfirmationData "#,
            r#"xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"xmlns:my="urn:example" my:Flag="yes">"#,
            r#"<my:Extra>payload</my:Extra>"#,
            r#"</saml:SubjectConfirmationData>"#
        );
        let parsed = SubjectConfirmationData::from_xml(&Element::parse(xml).unwrap()).unwrap();
        assert_eq!(parsed.children().len(), 1);
        assert_eq!(parsed.to_element().to_string(), xml);
    }
}
