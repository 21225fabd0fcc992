//! The `saml:` assertion object model.

mod attribute;
mod conditions;
mod encrypted;
mod name_id;
mod statements;
mod subject;
mod unknown;

pub use attribute::{Attribute, AttributeValue};
pub use conditions::{AudienceRestriction, Condition, Conditions, ProxyRestriction};
pub use encrypted::{EncryptedAssertion, EncryptedAttribute, EncryptedId, NewEncryptedId};
pub use name_id::{BaseIdentifier, CustomIdentifier, Identifier, Issuer, NameId};
pub use statements::{
    AttributeItem, AttributeStatement, AuthnContext, AuthnStatement, Statement, SubjectLocality,
};
pub use subject::{Subject, SubjectConfirmation, SubjectConfirmationData};
pub use unknown::UnknownElement;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::context::{SamlContext, generate_id};
use crate::crypto::{SigningState, XmlSigner, finalize_signed};
use crate::datetime;
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;

/// A `saml:Assertion`.
///
/// An assertion must make at least one statement about something: either
/// a subject is present, or the statement list is non-empty. An
/// assertion parsed from signed XML re-emits its original bytes until a
/// new signer is attached.
#[derive(Debug, Clone)]
pub struct Assertion {
    id: String,
    issue_instant: DateTime<Utc>,
    issuer: Issuer,
    subject: Option<Subject>,
    conditions: Option<Conditions>,
    statements: Vec<Statement>,
    signing: SigningState,
}

impl Assertion {
    pub fn new(
        issuer: Issuer,
        issue_instant: DateTime<Utc>,
        subject: Option<Subject>,
        statements: Vec<Statement>,
    ) -> Result<Self> {
        Self::with_id(generate_id(), issuer, issue_instant, subject, statements)
    }

    pub fn with_id(
        id: impl Into<String>,
        issuer: Issuer,
        issue_instant: DateTime<Utc>,
        subject: Option<Subject>,
        statements: Vec<Statement>,
    ) -> Result<Self> {
        if subject.is_none() && statements.is_empty() {
            return Err(SamlError::ProtocolViolation(
                "an Assertion needs a Subject or at least one statement".to_string(),
            ));
        }
        Ok(Self {
            id: id.into(),
            issue_instant,
            issuer,
            subject,
            conditions: None,
            statements,
            signing: SigningState::Unsigned,
        })
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Attaches a signer, consumed lazily at the next serialization. On
    /// an assertion parsed from signed XML this discards the retained
    /// original bytes.
    pub fn set_signer(&mut self, signer: Arc<dyn XmlSigner>) {
        self.signing.attach_signer(signer);
    }

    /// Whether this assertion was parsed from signed XML.
    pub fn was_signed(&self) -> bool {
        self.signing.was_signed()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn issue_instant(&self) -> DateTime<Utc> {
        self.issue_instant
    }

    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn conditions(&self) -> Option<&Conditions> {
        self.conditions.as_ref()
    }

    /// The full statement list in document order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Typed filter over [`statements`](Self::statements).
    pub fn authn_statements(&self) -> impl Iterator<Item = &AuthnStatement> {
        self.statements.iter().filter_map(|statement| match statement {
            Statement::Authn(authn) => Some(authn),
            _ => None,
        })
    }

    /// Typed filter over [`statements`](Self::statements).
    pub fn attribute_statements(&self) -> impl Iterator<Item = &AttributeStatement> {
        self.statements.iter().filter_map(|statement| match statement {
            Statement::Attribute(attribute) => Some(attribute),
            _ => None,
        })
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "Assertion")?;
        let version = dom::require_attribute(element, "Version")?;
        if version != ns::VERSION {
            return Err(SamlError::UnsupportedVersion(version));
        }
        let id = dom::require_attribute(element, "ID")?;
        let issue_instant =
            datetime::parse_instant(&dom::require_attribute(element, "IssueInstant")?)?;

        let mut issuer = None;
        let mut signatures = 0usize;
        let mut subject = None;
        let mut conditions = None;
        let mut statements = Vec::new();

        for child in element.child_elements() {
            if child.is_named(ns::SAML, "Issuer") {
                if issuer.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:Issuer",
                    });
                }
                issuer = Some(Issuer::from_xml(child)?);
            } else if child.is_named(ns::DS, "Signature") {
                signatures += 1;
                if signatures > 1 {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "ds:Signature",
                    });
                }
            } else if child.is_named(ns::SAML, "Subject") {
                if subject.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:Subject",
                    });
                }
                subject = Some(Subject::from_xml(child, ctx)?);
            } else if child.is_named(ns::SAML, "Conditions") {
                if conditions.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:Conditions",
                    });
                }
                conditions = Some(Conditions::from_xml(child, ctx)?);
            } else if child.is_named(ns::SAML, "AuthnStatement") {
                statements.push(Statement::Authn(AuthnStatement::from_xml(child)?));
            } else if child.is_named(ns::SAML, "AttributeStatement") {
                statements.push(Statement::Attribute(AttributeStatement::from_xml(child)?));
            } else if child.is_named(ns::SAML, "Statement") {
                statements.push(Statement::parse_generic(child)?);
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "Assertion child".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }

        let issuer = issuer.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "saml:Issuer",
        })?;
        if subject.is_none() && statements.is_empty() {
            return Err(SamlError::ProtocolViolation(
                "an Assertion needs a Subject or at least one statement".to_string(),
            ));
        }

        Ok(Self {
            id,
            issue_instant,
            issuer,
            subject,
            conditions,
            statements,
            signing: SigningState::parsed_from(element, signatures > 0),
        })
    }

    pub fn to_element(&self) -> Result<Element> {
        finalize_signed(&self.signing, || Ok(self.build_unsigned()))
    }

    fn build_unsigned(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "Assertion");
        element.set_attribute("Version", ns::VERSION);
        element.set_attribute("ID", &self.id);
        element.set_attribute(
            "IssueInstant",
            &datetime::format_instant(self.issue_instant),
        );
        element.push_child(self.issuer.to_element());
        if let Some(subject) = &self.subject {
            element.push_child(subject.to_element());
        }
        if let Some(conditions) = &self.conditions {
            element.push_child(conditions.to_element());
        }
        for statement in &self.statements {
            element.push_child(statement.to_element());
        }
        element
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> Issuer {
        Issuer::new("https://idp.example.org/").unwrap()
    }

    fn instant() -> DateTime<Utc> {
        datetime::parse_instant("2014-09-22T13:42:00Z").unwrap()
    }

    #[test]
    fn assertion_needs_subject_or_statement() {
        assert!(Assertion::new(issuer(), instant(), None, Vec::new()).is_err());

        let statement = Statement::Authn(AuthnStatement::new(
            AuthnContext::class_ref("urn:oasis:names:tc:SAML:2.0:ac:classes:Password"),
            instant(),
        ));
        assert!(Assertion::new(issuer(), instant(), None, vec![statement]).is_ok());

        let subject = Subject::from_identifier(Identifier::NameId(NameId::new("someone")));
        assert!(Assertion::new(issuer(), instant(), Some(subject), Vec::new()).is_ok());
    }

    #[test]
    fn statement_order_is_preserved() {
        let xml = concat!(
            r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"Version="2.0" ID="_a1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:Issuer>https://idp.example.org/</saml:Issuer>"#,
            r#"<saml:AttributeStatement>"#,
            r#"<saml:Attribute Name="first"><saml:AttributeValue>1</saml:AttributeValue></saml:Attribute>"#,
            r#"</saml:AttributeStatement>"#,
            r#"<saml:AuthnStatement AuthnInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:AuthnContext><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:Password</saml:AuthnContextClassRef></saml:AuthnContext>"#,
            r#"</saml:AuthnStatement>"#,
            r#"<saml:AttributeStatement>"#,
            r#"<saml:Attribute Name="second"><saml:AttributeValue>2</saml:AttributeValue></saml:Attribute>"#,
            r#"</saml:AttributeStatement>"#,
            r#"</saml:Assertion>"#
        );
        let ctx = SamlContext::new();
        let assertion = Assertion::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();

        assert_eq!(assertion.statements().len(), 3);
        assert_eq!(assertion.authn_statements().count(), 1);
        assert_eq!(assertion.attribute_statements().count(), 2);
        // attribute statements interleaved with the authn statement stay put
        assert_eq!(assertion.to_element().unwrap().to_string(), xml);
    }

    #[test]
    fn version_must_be_2_0() {
        let xml = concat!(
            r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"Version="1.1" ID="_a1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:Issuer>https://idp.example.org/</saml:Issuer>"#,
            r#"<saml:AuthnStatement AuthnInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:AuthnContext><saml:AuthnContextClassRef>x</saml:AuthnContextClassRef></saml:AuthnContext>"#,
            r#"</saml:AuthnStatement>"#,
            r#"</saml:Assertion>"#
        );
        let ctx = SamlContext::new();
        let result = Assertion::from_xml(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(result, Err(SamlError::UnsupportedVersion(v)) if v == "1.1"));
    }

    #[test]
    fn subsecond_issue_instants_are_tolerated() {
        let xml = concat!(
            r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"Version="2.0" ID="_a1" IssueInstant="2014-09-22T13:42:00.123Z">"#,
            r#"<saml:Issuer>https://idp.example.org/</saml:Issuer>"#,
            r#"<saml:AuthnStatement AuthnInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:AuthnContext><saml:AuthnContextClassRef>x</saml:AuthnContextClassRef></saml:AuthnContext>"#,
            r#"</saml:AuthnStatement>"#,
            r#"</saml:Assertion>"#
        );
        let ctx = SamlContext::new();
        let assertion = Assertion::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert_eq!(
            datetime::format_instant(assertion.issue_instant()),
            "2014-09-22T13:42:00Z"
        );
    }
}
