//! Name identifier management: `ManageNameIDRequest`/`Response` and
//! `NameIDMappingRequest`/`Response`.

use crate::assertion::{EncryptedId, Identifier, NameId, NewEncryptedId};
use crate::context::SamlContext;
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;
use crate::protocol::authn_request::NameIdPolicy;
use crate::protocol::message::{MessageFields, StatusResponseFields};

/// What a `ManageNameIDRequest` asks for: a new plaintext identifier, a
/// new encrypted identifier, or termination of the federation.
#[derive(Debug, Clone, PartialEq)]
pub enum ManageNameIdChange {
    NewId(String),
    NewEncryptedId(NewEncryptedId),
    Terminate,
}

impl ManageNameIdChange {
    fn matches(element: &Element) -> bool {
        element.is_named(ns::SAMLP, "NewID")
            || element.is_named(ns::SAMLP, "NewEncryptedID")
            || element.is_named(ns::SAMLP, "Terminate")
    }

    fn from_xml(element: &Element) -> Result<Self> {
        if element.is_named(ns::SAMLP, "NewID") {
            Ok(Self::NewId(element.text()))
        } else if element.is_named(ns::SAMLP, "NewEncryptedID") {
            NewEncryptedId::from_xml(element).map(Self::NewEncryptedId)
        } else {
            dom::expect_element(element, ns::SAMLP, "Terminate")?;
            Ok(Self::Terminate)
        }
    }

    fn to_element(&self) -> Element {
        match self {
            Self::NewId(value) => {
                let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, "NewID");
                element.set_text(value);
                element
            }
            Self::NewEncryptedId(encrypted) => encrypted.to_element(),
            Self::Terminate => Element::new(ns::SAMLP, ns::prefix::SAMLP, "Terminate"),
        }
    }
}

/// A `samlp:ManageNameIDRequest`.
#[derive(Debug, Clone)]
pub struct ManageNameIdRequest {
    fields: MessageFields,
    identifier: Identifier,
    change: ManageNameIdChange,
}

impl ManageNameIdRequest {
    pub const LOCAL_NAME: &'static str = "ManageNameIDRequest";

    pub fn new(
        fields: MessageFields,
        identifier: Identifier,
        change: ManageNameIdChange,
    ) -> Self {
        Self {
            fields,
            identifier,
            change,
        }
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn change(&self) -> &ManageNameIdChange {
        &self.change
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let mut identifier = None;
        let mut change = None;
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "Issuer")
                || child.is_named(ns::DS, "Signature")
                || child.is_named(ns::SAMLP, "Extensions")
            {
                continue;
            }
            if Identifier::matches(child) {
                if identifier.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:NameID or saml:EncryptedID",
                    });
                }
                identifier = Some(Identifier::from_xml(child, ctx)?);
            } else if ManageNameIdChange::matches(child) {
                if change.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "samlp:NewID, samlp:NewEncryptedID or samlp:Terminate",
                    });
                }
                change = Some(ManageNameIdChange::from_xml(child)?);
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAMLP.to_string(),
                    expected: "NewID".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        let identifier = identifier.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "saml:NameID or saml:EncryptedID",
        })?;
        let change = change.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "samlp:NewID, samlp:NewEncryptedID or samlp:Terminate",
        })?;
        Ok(Self {
            fields,
            identifier,
            change,
        })
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self.fields.unsigned_root(Self::LOCAL_NAME, None);
            element.push_child(self.identifier.to_element());
            element.push_child(self.change.to_element());
            Ok(element)
        })
    }
}

/// A `samlp:ManageNameIDResponse`.
#[derive(Debug, Clone)]
pub struct ManageNameIdResponse {
    fields: MessageFields,
    status: StatusResponseFields,
}

impl ManageNameIdResponse {
    pub const LOCAL_NAME: &'static str = "ManageNameIDResponse";

    pub fn new(fields: MessageFields, status: StatusResponseFields) -> Self {
        Self { fields, status }
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn status(&self) -> &StatusResponseFields {
        &self.status
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        Ok(Self {
            fields: MessageFields::parse(element, ctx)?,
            status: StatusResponseFields::parse(element)?,
        })
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self
                .fields
                .unsigned_root(Self::LOCAL_NAME, self.status.in_response_to());
            element.push_child(self.status.status().to_element());
            Ok(element)
        })
    }
}

/// A `samlp:NameIDMappingRequest`.
#[derive(Debug, Clone)]
pub struct NameIdMappingRequest {
    fields: MessageFields,
    identifier: Identifier,
    policy: NameIdPolicy,
}

impl NameIdMappingRequest {
    pub const LOCAL_NAME: &'static str = "NameIDMappingRequest";

    pub fn new(fields: MessageFields, identifier: Identifier, policy: NameIdPolicy) -> Self {
        Self {
            fields,
            identifier,
            policy,
        }
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn policy(&self) -> &NameIdPolicy {
        &self.policy
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let mut identifier = None;
        let mut policy = None;
        for child in element.child_elements() {
            if Identifier::matches(child) {
                identifier = Some(Identifier::from_xml(child, ctx)?);
            } else if child.is_named(ns::SAMLP, "NameIDPolicy") {
                policy = Some(NameIdPolicy::from_xml(child)?);
            }
        }
        let identifier = identifier.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "saml:NameID, saml:BaseID or saml:EncryptedID",
        })?;
        let policy = policy.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "samlp:NameIDPolicy",
        })?;
        Ok(Self {
            fields,
            identifier,
            policy,
        })
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self.fields.unsigned_root(Self::LOCAL_NAME, None);
            element.push_child(self.identifier.to_element());
            element.push_child(self.policy.to_element());
            Ok(element)
        })
    }
}

/// The identifier a `NameIDMappingResponse` returns: plaintext or
/// encrypted, never a `BaseID` variant.
#[derive(Debug, Clone, PartialEq)]
pub enum MappedIdentifier {
    NameId(NameId),
    Encrypted(EncryptedId),
}

impl MappedIdentifier {
    fn from_xml(element: &Element) -> Result<Self> {
        if element.is_named(ns::SAML, "NameID") {
            NameId::from_xml(element).map(Self::NameId)
        } else {
            EncryptedId::from_xml(element).map(Self::Encrypted)
        }
    }

    fn to_element(&self) -> Element {
        match self {
            Self::NameId(name_id) => name_id.to_element(),
            Self::Encrypted(encrypted) => encrypted.to_element(),
        }
    }
}

/// A `samlp:NameIDMappingResponse`.
#[derive(Debug, Clone)]
pub struct NameIdMappingResponse {
    fields: MessageFields,
    status: StatusResponseFields,
    identifier: MappedIdentifier,
}

impl NameIdMappingResponse {
    pub const LOCAL_NAME: &'static str = "NameIDMappingResponse";

    pub fn new(
        fields: MessageFields,
        status: StatusResponseFields,
        identifier: MappedIdentifier,
    ) -> Self {
        Self {
            fields,
            status,
            identifier,
        }
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn status(&self) -> &StatusResponseFields {
        &self.status
    }

    pub fn identifier(&self) -> &MappedIdentifier {
        &self.identifier
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let status = StatusResponseFields::parse(element)?;
        let mut identifier = None;
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "NameID") || child.is_named(ns::SAML, "EncryptedID") {
                identifier = Some(MappedIdentifier::from_xml(child)?);
            } else if child.is_named(ns::SAML, "BaseID") {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "NameID or EncryptedID".to_string(),
                    found_ns: ns::SAML.to_string(),
                    found: "BaseID".to_string(),
                });
            }
        }
        let identifier = identifier.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "saml:NameID or saml:EncryptedID",
        })?;
        Ok(Self {
            fields,
            status,
            identifier,
        })
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self
                .fields
                .unsigned_root(Self::LOCAL_NAME, self.status.in_response_to());
            element.push_child(self.identifier.to_element());
            element.push_child(self.status.status().to_element());
            Ok(element)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime;

    #[test]
    fn manage_request_round_trips_with_terminate() {
        let xml = concat!(
            r#"<samlp:ManageNameIDRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_mn1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">someone</saml:NameID>"#,
            r#"<samlp:Terminate/>"#,
            r#"</samlp:ManageNameIDRequest>"#
        );
        let ctx = SamlContext::new();
        let request =
            ManageNameIdRequest::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert_eq!(request.change(), &ManageNameIdChange::Terminate);
        assert_eq!(request.to_element().unwrap().to_string(), xml);
    }

    #[test]
    fn manage_request_needs_exactly_one_change() {
        let xml = concat!(
            r#"<samlp:ManageNameIDRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_mn1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">someone</saml:NameID>"#,
            r#"<samlp:NewID>fresh</samlp:NewID>"#,
            r#"<samlp:Terminate/>"#,
            r#"</samlp:ManageNameIDRequest>"#
        );
        let ctx = SamlContext::new();
        let result = ManageNameIdRequest::from_xml(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(result, Err(SamlError::TooManyElements { .. })));
    }

    #[test]
    fn mapping_response_rejects_base_id() {
        let xml = concat!(
            r#"<samlp:NameIDMappingResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"Version="2.0" ID="_nm1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:BaseID xsi:type="saml:SomeType"/>"#,
            r#"<samlp:Status>"#,
            r#"<samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/>"#,
            r#"</samlp:Status>"#,
            r#"</samlp:NameIDMappingResponse>"#
        );
        let ctx = SamlContext::new();
        let result = NameIdMappingResponse::from_xml(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(result, Err(SamlError::UnexpectedElement { .. })));
    }

    #[test]
    fn mapping_request_requires_policy() {
        let xml = concat!(
            r#"<samlp:NameIDMappingRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_nm1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">someone</saml:NameID>"#,
            r#"</samlp:NameIDMappingRequest>"#
        );
        let ctx = SamlContext::new();
        let result = NameIdMappingRequest::from_xml(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(
            result,
            Err(SamlError::MissingElement { child: "samlp:NameIDPolicy", .. })
        ));
    }

    #[test]
    fn built_mapping_request_serializes() {
        let fields =
            MessageFields::new(datetime::parse_instant("2014-09-22T13:42:00Z").unwrap())
                .with_id("_nm2");
        let request = NameIdMappingRequest::new(
            fields,
            Identifier::NameId(NameId::new("someone")),
            NameIdPolicy::new().with_format(ns::format::PERSISTENT),
        );
        let xml = request.to_element().unwrap().to_string();
        assert!(xml.contains("<samlp:NameIDPolicy"));
        assert!(xml.contains("someone"));
    }
}
