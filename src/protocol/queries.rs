//! The subject queries (`AttributeQuery`, `AuthnQuery`,
//! `AuthzDecisionQuery`) and `AssertionIDRequest`.

use std::collections::{HashMap, HashSet};

use crate::assertion::{Attribute, Subject};
use crate::context::SamlContext;
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;
use crate::protocol::message::MessageFields;
use crate::protocol::authn_request::RequestedAuthnContext;

fn parse_subject(element: &Element, ctx: &SamlContext) -> Result<Subject> {
    let mut subject = None;
    for child in element.child_elements() {
        if child.is_named(ns::SAML, "Subject") {
            if subject.is_some() {
                return Err(SamlError::TooManyElements {
                    parent: element.qualified_name(),
                    child: "saml:Subject",
                });
            }
            subject = Some(Subject::from_xml(child, ctx)?);
        }
    }
    subject.ok_or_else(|| SamlError::MissingElement {
        parent: element.qualified_name(),
        child: "saml:Subject",
    })
}

/// A `samlp:AttributeQuery`.
///
/// No two attributes may share the same `(Name, NameFormat)` pair; a
/// duplicate fails construction, not serialization.
#[derive(Debug, Clone)]
pub struct AttributeQuery {
    fields: MessageFields,
    subject: Subject,
    attributes: Vec<Attribute>,
}

impl AttributeQuery {
    pub const LOCAL_NAME: &'static str = "AttributeQuery";

    pub fn new(
        fields: MessageFields,
        subject: Subject,
        attributes: Vec<Attribute>,
    ) -> Result<Self> {
        check_duplicate_attributes(&attributes)?;
        Ok(Self {
            fields,
            subject,
            attributes,
        })
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let subject = parse_subject(element, ctx)?;
        let mut attributes = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "Attribute") {
                attributes.push(Attribute::from_xml(child)?);
            }
        }
        Self::new(fields, subject, attributes)
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self.fields.unsigned_root(Self::LOCAL_NAME, None);
            element.push_child(self.subject.to_element());
            for attribute in &self.attributes {
                element.push_child(attribute.to_element());
            }
            Ok(element)
        })
    }
}

/// Duplicate detection builds a per-NameFormat set of seen names and
/// fails on the first repeat. Two absent NameFormats count as equal.
fn check_duplicate_attributes(attributes: &[Attribute]) -> Result<()> {
    let mut seen: HashMap<Option<&str>, HashSet<&str>> = HashMap::new();
    for attribute in attributes {
        let names = seen.entry(attribute.name_format()).or_default();
        if !names.insert(attribute.name()) {
            return Err(SamlError::ProtocolViolation(format!(
                "duplicate Attribute '{}' for NameFormat '{}'",
                attribute.name(),
                attribute.name_format().unwrap_or("(unset)")
            )));
        }
    }
    Ok(())
}

/// A `samlp:AuthnQuery`.
#[derive(Debug, Clone)]
pub struct AuthnQuery {
    fields: MessageFields,
    subject: Subject,
    session_index: Option<String>,
    requested_authn_context: Option<RequestedAuthnContext>,
}

impl AuthnQuery {
    pub const LOCAL_NAME: &'static str = "AuthnQuery";

    pub fn new(fields: MessageFields, subject: Subject) -> Self {
        Self {
            fields,
            subject,
            session_index: None,
            requested_authn_context: None,
        }
    }

    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_index = Some(index.into());
        self
    }

    pub fn with_requested_authn_context(mut self, context: RequestedAuthnContext) -> Self {
        self.requested_authn_context = Some(context);
        self
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn session_index(&self) -> Option<&str> {
        self.session_index.as_deref()
    }

    pub fn requested_authn_context(&self) -> Option<&RequestedAuthnContext> {
        self.requested_authn_context.as_ref()
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let subject = parse_subject(element, ctx)?;
        let mut requested_authn_context = None;
        for child in element.child_elements() {
            if child.is_named(ns::SAMLP, "RequestedAuthnContext") {
                requested_authn_context = Some(RequestedAuthnContext::from_xml(child)?);
            }
        }
        Ok(Self {
            fields,
            subject,
            session_index: element.attribute("SessionIndex"),
            requested_authn_context,
        })
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self.fields.unsigned_root(Self::LOCAL_NAME, None);
            if let Some(index) = &self.session_index {
                element.set_attribute("SessionIndex", index);
            }
            element.push_child(self.subject.to_element());
            if let Some(context) = &self.requested_authn_context {
                element.push_child(context.to_element());
            }
            Ok(element)
        })
    }
}

/// A `saml:Action` inside an authorization decision query.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    namespace: String,
    value: String,
}

impl Action {
    pub fn new(namespace: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            value: value.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "Action")?;
        Ok(Self {
            namespace: dom::require_attribute(element, "Namespace")?,
            value: element.text(),
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "Action");
        element.set_attribute("Namespace", &self.namespace);
        element.set_text(&self.value);
        element
    }
}

/// A `saml:Evidence`: assertions or assertion references backing an
/// authorization decision, retained raw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    children: Vec<Element>,
}

impl Evidence {
    pub fn new(children: Vec<Element>) -> Self {
        Self { children }
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "Evidence")?;
        Ok(Self {
            children: element.child_elements().cloned().collect(),
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "Evidence");
        for child in &self.children {
            element.push_child(child.clone());
        }
        element
    }
}

/// A `samlp:AuthzDecisionQuery`.
#[derive(Debug, Clone)]
pub struct AuthzDecisionQuery {
    fields: MessageFields,
    subject: Subject,
    resource: String,
    actions: Vec<Action>,
    evidence: Option<Evidence>,
}

impl AuthzDecisionQuery {
    pub const LOCAL_NAME: &'static str = "AuthzDecisionQuery";

    pub fn new(
        fields: MessageFields,
        subject: Subject,
        resource: impl Into<String>,
        actions: Vec<Action>,
    ) -> Result<Self> {
        if actions.is_empty() {
            return Err(SamlError::MissingElement {
                parent: "samlp:AuthzDecisionQuery".to_string(),
                child: "saml:Action",
            });
        }
        Ok(Self {
            fields,
            subject,
            resource: resource.into(),
            actions,
            evidence: None,
        })
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn evidence(&self) -> Option<&Evidence> {
        self.evidence.as_ref()
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let subject = parse_subject(element, ctx)?;
        let resource = dom::require_attribute(element, "Resource")?;
        let mut actions = Vec::new();
        let mut evidence = None;
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "Action") {
                actions.push(Action::from_xml(child)?);
            } else if child.is_named(ns::SAML, "Evidence") {
                evidence = Some(Evidence::from_xml(child)?);
            }
        }
        let mut query = Self::new(fields, subject, resource, actions)?;
        query.evidence = evidence;
        Ok(query)
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self.fields.unsigned_root(Self::LOCAL_NAME, None);
            element.set_attribute("Resource", &self.resource);
            element.push_child(self.subject.to_element());
            for action in &self.actions {
                element.push_child(action.to_element());
            }
            if let Some(evidence) = &self.evidence {
                element.push_child(evidence.to_element());
            }
            Ok(element)
        })
    }
}

/// A `samlp:AssertionIDRequest`.
#[derive(Debug, Clone)]
pub struct AssertionIdRequest {
    fields: MessageFields,
    references: Vec<String>,
}

impl AssertionIdRequest {
    pub const LOCAL_NAME: &'static str = "AssertionIDRequest";

    pub fn new(fields: MessageFields, references: Vec<String>) -> Result<Self> {
        if references.is_empty() {
            return Err(SamlError::MissingElement {
                parent: "samlp:AssertionIDRequest".to_string(),
                child: "saml:AssertionIDRef",
            });
        }
        Ok(Self { fields, references })
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let references = element
            .child_elements()
            .filter(|child| child.is_named(ns::SAML, "AssertionIDRef"))
            .map(Element::text)
            .collect();
        Self::new(fields, references)
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self.fields.unsigned_root(Self::LOCAL_NAME, None);
            for reference in &self.references {
                let mut child = Element::new(ns::SAML, ns::prefix::SAML, "AssertionIDRef");
                child.set_text(reference);
                element.push_child(child);
            }
            Ok(element)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::{Identifier, NameId};
    use crate::datetime;

    fn fields() -> MessageFields {
        MessageFields::new(datetime::parse_instant("2014-09-22T13:42:00Z").unwrap())
    }

    fn subject() -> Subject {
        Subject::from_identifier(Identifier::NameId(NameId::new("someone")))
    }

    #[test]
    fn duplicate_name_and_format_is_rejected() {
        let attributes = vec![
            Attribute::new("mail").with_name_format("urn:f"),
            Attribute::new("mail").with_name_format("urn:f"),
        ];
        assert!(AttributeQuery::new(fields(), subject(), attributes).is_err());
    }

    #[test]
    fn duplicate_name_without_format_is_rejected() {
        let attributes = vec![Attribute::new("mail"), Attribute::new("mail")];
        assert!(AttributeQuery::new(fields(), subject(), attributes).is_err());
    }

    #[test]
    fn same_name_under_different_formats_is_allowed() {
        let attributes = vec![
            Attribute::new("mail").with_name_format("urn:a"),
            Attribute::new("mail").with_name_format("urn:b"),
            Attribute::new("mail"),
        ];
        assert!(AttributeQuery::new(fields(), subject(), attributes).is_ok());
    }

    #[test]
    fn attribute_query_round_trips() {
        let xml = concat!(
            r#"<samlp:AttributeQuery xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_aq1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:Subject xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">"#,
            r#"<saml:NameID>someone</saml:NameID>"#,
            r#"</saml:Subject>"#,
            r#"<saml:Attribute xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" Name="mail"/>"#,
            r#"</samlp:AttributeQuery>"#
        );
        let ctx = SamlContext::new();
        let query = AttributeQuery::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert_eq!(query.attributes().len(), 1);
        assert_eq!(query.to_element().unwrap().to_string(), xml);
    }

    #[test]
    fn authz_decision_query_needs_an_action() {
        assert!(AuthzDecisionQuery::new(fields(), subject(), "urn:r", Vec::new()).is_err());
    }

    #[test]
    fn assertion_id_request_round_trips() {
        let xml = concat!(
            r#"<samlp:AssertionIDRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_air1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:AssertionIDRef xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">_a1</saml:AssertionIDRef>"#,
            r#"</samlp:AssertionIDRequest>"#
        );
        let ctx = SamlContext::new();
        let request =
            AssertionIdRequest::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert_eq!(request.references(), ["_a1"]);
        assert_eq!(request.to_element().unwrap().to_string(), xml);
    }
}
