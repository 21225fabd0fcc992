//! Assertion statements.
//!
//! An assertion carries one ordered, heterogeneous statement list. The
//! typed accessors on `Assertion` are filters over that list; relative
//! order is preserved through a round trip, never regrouped by kind.

use chrono::{DateTime, Utc};

use crate::assertion::attribute::Attribute;
use crate::assertion::encrypted::EncryptedAttribute;
use crate::assertion::unknown::UnknownElement;
use crate::datetime;
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;

/// One entry of an assertion's statement list.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Authn(AuthnStatement),
    Attribute(AttributeStatement),
    /// A generic `<saml:Statement xsi:type="...">`, retained verbatim.
    Unknown(UnknownElement),
}

impl Statement {
    pub(crate) fn parse_generic(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "Statement")?;
        if element.attribute_ns(ns::XSI, "type").is_none() {
            return Err(SamlError::MissingAttribute {
                element: element.qualified_name(),
                attribute: "xsi:type",
            });
        }
        Ok(Self::Unknown(UnknownElement::capture(element)))
    }

    pub fn to_element(&self) -> Element {
        match self {
            Self::Authn(statement) => statement.to_element(),
            Self::Attribute(statement) => statement.to_element(),
            Self::Unknown(unknown) => unknown.to_element(),
        }
    }
}

/// A `saml:AuthnStatement`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthnStatement {
    authn_instant: DateTime<Utc>,
    session_index: Option<String>,
    session_not_on_or_after: Option<DateTime<Utc>>,
    subject_locality: Option<SubjectLocality>,
    context: AuthnContext,
}

impl AuthnStatement {
    pub fn new(context: AuthnContext, authn_instant: DateTime<Utc>) -> Self {
        Self {
            authn_instant,
            session_index: None,
            session_not_on_or_after: None,
            subject_locality: None,
            context,
        }
    }

    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_index = Some(index.into());
        self
    }

    pub fn with_session_not_on_or_after(mut self, instant: DateTime<Utc>) -> Self {
        self.session_not_on_or_after = Some(instant);
        self
    }

    pub fn with_subject_locality(mut self, locality: SubjectLocality) -> Self {
        self.subject_locality = Some(locality);
        self
    }

    pub fn authn_instant(&self) -> DateTime<Utc> {
        self.authn_instant
    }

    pub fn session_index(&self) -> Option<&str> {
        self.session_index.as_deref()
    }

    pub fn session_not_on_or_after(&self) -> Option<DateTime<Utc>> {
        self.session_not_on_or_after
    }

    pub fn subject_locality(&self) -> Option<&SubjectLocality> {
        self.subject_locality.as_ref()
    }

    pub fn context(&self) -> &AuthnContext {
        &self.context
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "AuthnStatement")?;
        let authn_instant =
            datetime::parse_instant(&dom::require_attribute(element, "AuthnInstant")?)?;
        let session_not_on_or_after = element
            .attribute("SessionNotOnOrAfter")
            .map(|value| datetime::parse_instant(&value))
            .transpose()?;

        let mut subject_locality = None;
        let mut context = None;
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "SubjectLocality") {
                subject_locality = Some(SubjectLocality::from_xml(child)?);
            } else if child.is_named(ns::SAML, "AuthnContext") {
                if context.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:AuthnContext",
                    });
                }
                context = Some(AuthnContext::from_xml(child)?);
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "AuthnContext".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        let context = context.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "saml:AuthnContext",
        })?;

        Ok(Self {
            authn_instant,
            session_index: element.attribute("SessionIndex"),
            session_not_on_or_after,
            subject_locality,
            context,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "AuthnStatement");
        element.set_attribute(
            "AuthnInstant",
            &datetime::format_instant(self.authn_instant),
        );
        if let Some(index) = &self.session_index {
            element.set_attribute("SessionIndex", index);
        }
        if let Some(instant) = self.session_not_on_or_after {
            element.set_attribute(
                "SessionNotOnOrAfter",
                &datetime::format_instant(instant),
            );
        }
        if let Some(locality) = &self.subject_locality {
            element.push_child(locality.to_element());
        }
        element.push_child(self.context.to_element());
        element
    }
}

/// A `saml:AuthnContext`: at least one of a class reference or a
/// declaration reference, plus any authenticating authorities.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthnContext {
    class_ref: Option<String>,
    decl_ref: Option<String>,
    authenticating_authorities: Vec<String>,
}

impl AuthnContext {
    pub fn class_ref(uri: impl Into<String>) -> Self {
        Self {
            class_ref: Some(uri.into()),
            decl_ref: None,
            authenticating_authorities: Vec::new(),
        }
    }

    pub fn decl_ref(uri: impl Into<String>) -> Self {
        Self {
            class_ref: None,
            decl_ref: Some(uri.into()),
            authenticating_authorities: Vec::new(),
        }
    }

    pub fn with_authenticating_authority(mut self, authority: impl Into<String>) -> Self {
        self.authenticating_authorities.push(authority.into());
        self
    }

    pub fn class_reference(&self) -> Option<&str> {
        self.class_ref.as_deref()
    }

    pub fn decl_reference(&self) -> Option<&str> {
        self.decl_ref.as_deref()
    }

    pub fn authenticating_authorities(&self) -> &[String] {
        &self.authenticating_authorities
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "AuthnContext")?;
        let mut class_ref = None;
        let mut decl_ref = None;
        let mut authenticating_authorities = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "AuthnContextClassRef") {
                class_ref = Some(child.text());
            } else if child.is_named(ns::SAML, "AuthnContextDeclRef") {
                decl_ref = Some(child.text());
            } else if child.is_named(ns::SAML, "AuthenticatingAuthority") {
                authenticating_authorities.push(child.text());
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "AuthnContextClassRef".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        if class_ref.is_none() && decl_ref.is_none() {
            return Err(SamlError::MissingElement {
                parent: element.qualified_name(),
                child: "saml:AuthnContextClassRef or saml:AuthnContextDeclRef",
            });
        }
        Ok(Self {
            class_ref,
            decl_ref,
            authenticating_authorities,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "AuthnContext");
        if let Some(class_ref) = &self.class_ref {
            let mut child = Element::new(ns::SAML, ns::prefix::SAML, "AuthnContextClassRef");
            child.set_text(class_ref);
            element.push_child(child);
        }
        if let Some(decl_ref) = &self.decl_ref {
            let mut child = Element::new(ns::SAML, ns::prefix::SAML, "AuthnContextDeclRef");
            child.set_text(decl_ref);
            element.push_child(child);
        }
        for authority in &self.authenticating_authorities {
            let mut child = Element::new(ns::SAML, ns::prefix::SAML, "AuthenticatingAuthority");
            child.set_text(authority);
            element.push_child(child);
        }
        element
    }
}

/// A `saml:SubjectLocality`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectLocality {
    address: Option<String>,
    dns_name: Option<String>,
}

impl SubjectLocality {
    pub fn new(address: Option<String>, dns_name: Option<String>) -> Self {
        Self { address, dns_name }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn dns_name(&self) -> Option<&str> {
        self.dns_name.as_deref()
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "SubjectLocality")?;
        Ok(Self {
            address: element.attribute("Address"),
            dns_name: element.attribute("DNSName"),
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "SubjectLocality");
        if let Some(address) = &self.address {
            element.set_attribute("Address", address);
        }
        if let Some(dns_name) = &self.dns_name {
            element.set_attribute("DNSName", dns_name);
        }
        element
    }
}

/// One entry of an attribute statement, plaintext or encrypted, in
/// document order.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeItem {
    Plain(Attribute),
    Encrypted(EncryptedAttribute),
}

/// A `saml:AttributeStatement`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeStatement {
    items: Vec<AttributeItem>,
}

impl AttributeStatement {
    pub fn new(items: Vec<AttributeItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(SamlError::MissingElement {
                parent: "saml:AttributeStatement".to_string(),
                child: "saml:Attribute",
            });
        }
        Ok(Self { items })
    }

    pub fn from_attributes(attributes: Vec<Attribute>) -> Result<Self> {
        Self::new(attributes.into_iter().map(AttributeItem::Plain).collect())
    }

    pub fn items(&self) -> &[AttributeItem] {
        &self.items
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.items.iter().filter_map(|item| match item {
            AttributeItem::Plain(attribute) => Some(attribute),
            AttributeItem::Encrypted(_) => None,
        })
    }

    pub fn encrypted_attributes(&self) -> impl Iterator<Item = &EncryptedAttribute> {
        self.items.iter().filter_map(|item| match item {
            AttributeItem::Encrypted(attribute) => Some(attribute),
            AttributeItem::Plain(_) => None,
        })
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "AttributeStatement")?;
        let mut items = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "Attribute") {
                items.push(AttributeItem::Plain(Attribute::from_xml(child)?));
            } else if child.is_named(ns::SAML, "EncryptedAttribute") {
                items.push(AttributeItem::Encrypted(EncryptedAttribute::from_xml(
                    child,
                )?));
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "Attribute".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        Self::new(items)
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "AttributeStatement");
        for item in &self.items {
            match item {
                AttributeItem::Plain(attribute) => element.push_child(attribute.to_element()),
                AttributeItem::Encrypted(attribute) => {
                    element.push_child(attribute.to_element());
                }
            }
        }
        element
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authn_context_requires_a_reference() {
        let xml = r#"<saml:AuthnContext xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"></saml:AuthnContext>"#;
        let result = AuthnContext::from_xml(&Element::parse(xml).unwrap());
        assert!(matches!(result, Err(SamlError::MissingElement { .. })));
    }

    #[test]
    fn attribute_statement_must_not_be_empty() {
        assert!(AttributeStatement::new(Vec::new()).is_err());
    }

    #[test]
    fn authn_statement_round_trips() {
        let xml = concat!(
            r#"<saml:AuthnStatement xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"AuthnInstant="2014-09-22T13:42:00Z" SessionIndex="_session1">"#,
            r#"<saml:SubjectLocality Address="192.0.2.1"/>"#,
            r#"<saml:AuthnContext>"#,
            r#"<saml:AuthnContextClassRef>"#,
            "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport",
            r#"</saml:AuthnContextClassRef>"#,
            r#"<saml:AuthenticatingAuthority>https://idp.example.org/</saml:AuthenticatingAuthority>"#,
            r#"</saml:AuthnContext>"#,
            r#"</saml:AuthnStatement>"#
        );
        let parsed = AuthnStatement::from_xml(&Element::parse(xml).unwrap()).unwrap();
        assert_eq!(parsed.session_index(), Some("_session1"));
        assert_eq!(
            parsed.context().class_reference(),
            Some("urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport")
        );
        assert_eq!(parsed.to_element().to_string(), xml);
    }

    #[test]
    fn generic_statement_needs_xsi_type() {
        let plain = r#"<saml:Statement xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"/>"#;
        assert!(Statement::parse_generic(&Element::parse(plain).unwrap()).is_err());

        let typed = concat!(
            r#"<saml:Statement xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xmlns:x="urn:example" xsi:type="x:MyStatement">data</saml:Statement>"#
        );
        let parsed = Statement::parse_generic(&Element::parse(typed).unwrap()).unwrap();
        assert_eq!(parsed.to_element().to_string(), typed);
    }
}
