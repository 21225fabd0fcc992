//! Subject-identifying elements: `NameID`, `Issuer`, the `BaseID`
//! extension point, and the identifier choice shared by `Subject`,
//! `SubjectConfirmation` and several protocol messages.

use crate::assertion::encrypted::EncryptedId;
use crate::assertion::unknown::UnknownElement;
use crate::context::SamlContext;
use crate::dom::{self, Element, Node};
use crate::error::{Result, SamlError};
use crate::ns;

/// A `saml:NameID`.
///
/// Format-dependent structural rules are enforced at construction: an
/// `emailAddress` value must look like an email address, the `entity`
/// format forbids all qualifier attributes, and `persistent`/`transient`
/// values are capped at 256 characters.
#[derive(Debug, Clone, PartialEq)]
pub struct NameId {
    value: String,
    format: Option<String>,
    name_qualifier: Option<String>,
    sp_name_qualifier: Option<String>,
    sp_provided_id: Option<String>,
}

impl NameId {
    /// Creates a NameID with no declared format, which carries no
    /// structural constraints.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
            sp_provided_id: None,
        }
    }

    pub fn with_format(value: impl Into<String>, format: impl Into<String>) -> Result<Self> {
        let name_id = Self {
            format: Some(format.into()),
            ..Self::new(value)
        };
        name_id.validate()?;
        Ok(name_id)
    }

    pub fn email(value: impl Into<String>) -> Result<Self> {
        Self::with_format(value, ns::format::EMAIL_ADDRESS)
    }

    pub fn entity(value: impl Into<String>) -> Result<Self> {
        Self::with_format(value, ns::format::ENTITY)
    }

    pub fn persistent(value: impl Into<String>) -> Result<Self> {
        Self::with_format(value, ns::format::PERSISTENT)
    }

    pub fn transient(value: impl Into<String>) -> Result<Self> {
        Self::with_format(value, ns::format::TRANSIENT)
    }

    pub fn with_name_qualifier(mut self, qualifier: impl Into<String>) -> Result<Self> {
        self.name_qualifier = Some(qualifier.into());
        self.validate()?;
        Ok(self)
    }

    pub fn with_sp_name_qualifier(mut self, qualifier: impl Into<String>) -> Result<Self> {
        self.sp_name_qualifier = Some(qualifier.into());
        self.validate()?;
        Ok(self)
    }

    pub fn with_sp_provided_id(mut self, id: impl Into<String>) -> Result<Self> {
        self.sp_provided_id = Some(id.into());
        self.validate()?;
        Ok(self)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn name_qualifier(&self) -> Option<&str> {
        self.name_qualifier.as_deref()
    }

    pub fn sp_name_qualifier(&self) -> Option<&str> {
        self.sp_name_qualifier.as_deref()
    }

    pub fn sp_provided_id(&self) -> Option<&str> {
        self.sp_provided_id.as_deref()
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "NameID")?;
        Self::parse_fields(element)
    }

    pub(crate) fn parse_fields(element: &Element) -> Result<Self> {
        let name_id = Self {
            value: element.text(),
            format: element.attribute("Format"),
            name_qualifier: element.attribute("NameQualifier"),
            sp_name_qualifier: element.attribute("SPNameQualifier"),
            sp_provided_id: element.attribute("SPProvidedID"),
        };
        name_id.validate()?;
        Ok(name_id)
    }

    pub fn to_element(&self) -> Element {
        self.element_as("NameID")
    }

    pub(crate) fn element_as(&self, local: &str) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, local);
        if let Some(qualifier) = &self.name_qualifier {
            element.set_attribute("NameQualifier", qualifier);
        }
        if let Some(qualifier) = &self.sp_name_qualifier {
            element.set_attribute("SPNameQualifier", qualifier);
        }
        if let Some(format) = &self.format {
            element.set_attribute("Format", format);
        }
        if let Some(id) = &self.sp_provided_id {
            element.set_attribute("SPProvidedID", id);
        }
        element.set_text(&self.value);
        element
    }

    fn validate(&self) -> Result<()> {
        match self.format.as_deref() {
            Some(ns::format::EMAIL_ADDRESS) => {
                if !is_valid_email(&self.value) {
                    return Err(SamlError::ProtocolViolation(format!(
                        "NameID value '{}' is not a valid email address",
                        self.value
                    )));
                }
            }
            Some(ns::format::ENTITY) => {
                if self.name_qualifier.is_some()
                    || self.sp_name_qualifier.is_some()
                    || self.sp_provided_id.is_some()
                {
                    return Err(SamlError::ProtocolViolation(
                        "entity-format NameID cannot have NameQualifier, SPNameQualifier \
                         or SPProvidedID"
                            .to_string(),
                    ));
                }
            }
            Some(ns::format::PERSISTENT) | Some(ns::format::TRANSIENT) => {
                if self.value.chars().count() > 256 {
                    return Err(SamlError::ProtocolViolation(format!(
                        "{} NameID may not exceed 256 characters",
                        self.format.as_deref().unwrap_or_default()
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// A `saml:Issuer`.
///
/// An issuer with no `Format`, or the `entity` format, must be a plain
/// entity identifier: no qualifier attributes and a URI of at most 1024
/// characters. Other formats fall back to the NameID rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Issuer {
    name_id: NameId,
}

impl Issuer {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        Self::from_name_id(NameId::new(value))
    }

    pub fn from_name_id(name_id: NameId) -> Result<Self> {
        let issuer = Self { name_id };
        issuer.validate()?;
        Ok(issuer)
    }

    pub fn value(&self) -> &str {
        self.name_id.value()
    }

    pub fn format(&self) -> Option<&str> {
        self.name_id.format()
    }

    pub fn name_id(&self) -> &NameId {
        &self.name_id
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "Issuer")?;
        Self::from_name_id(NameId::parse_fields(element)?)
    }

    pub fn to_element(&self) -> Element {
        self.name_id.element_as("Issuer")
    }

    fn validate(&self) -> Result<()> {
        let entity_format = match self.name_id.format() {
            None | Some(ns::format::ENTITY) => true,
            _ => false,
        };
        if !entity_format {
            return Ok(());
        }
        if self.name_id.name_qualifier().is_some()
            || self.name_id.sp_name_qualifier().is_some()
            || self.name_id.sp_provided_id().is_some()
        {
            return Err(SamlError::ProtocolViolation(
                "an entity-format Issuer cannot have NameQualifier, SPNameQualifier \
                 or SPProvidedID"
                    .to_string(),
            ));
        }
        let value = self.name_id.value();
        if value.chars().count() > 1024 || !is_valid_uri(value) {
            return Err(SamlError::ProtocolViolation(format!(
                "Issuer value '{value}' is not a valid entity identifier"
            )));
        }
        Ok(())
    }
}

/// A registered `BaseID` extension type, parsed into the standard
/// qualifier attributes plus its raw extension content.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomIdentifier {
    xsi_type_raw: String,
    type_namespace: String,
    type_local: String,
    name_qualifier: Option<String>,
    sp_name_qualifier: Option<String>,
    content: Vec<Node>,
}

impl CustomIdentifier {
    /// Parses a `saml:BaseID` element; meant to be called from a
    /// registered identifier handler.
    pub fn parse(element: &Element) -> Result<Self> {
        let raw = element
            .attribute_ns(ns::XSI, "type")
            .ok_or_else(|| SamlError::MissingAttribute {
                element: element.qualified_name(),
                attribute: "xsi:type",
            })?;
        let (type_namespace, type_local) = element.resolve_qname(&raw)?;
        Ok(Self {
            xsi_type_raw: raw,
            type_namespace: type_namespace.unwrap_or_default(),
            type_local,
            name_qualifier: element.attribute("NameQualifier"),
            sp_name_qualifier: element.attribute("SPNameQualifier"),
            content: element.children().to_vec(),
        })
    }

    pub fn xsi_type(&self) -> (&str, &str) {
        (&self.type_namespace, &self.type_local)
    }

    pub fn name_qualifier(&self) -> Option<&str> {
        self.name_qualifier.as_deref()
    }

    pub fn sp_name_qualifier(&self) -> Option<&str> {
        self.sp_name_qualifier.as_deref()
    }

    pub fn content(&self) -> &[Node] {
        &self.content
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "BaseID");
        if let Some((prefix, _)) = self.xsi_type_raw.split_once(':') {
            element.set_attribute(&format!("xmlns:{prefix}"), &self.type_namespace);
        }
        element.set_attribute(&format!("xmlns:{}", ns::prefix::XSI), ns::XSI);
        element.set_attribute(
            &format!("{}:type", ns::prefix::XSI),
            &self.xsi_type_raw,
        );
        if let Some(qualifier) = &self.name_qualifier {
            element.set_attribute("NameQualifier", qualifier);
        }
        if let Some(qualifier) = &self.sp_name_qualifier {
            element.set_attribute("SPNameQualifier", qualifier);
        }
        for node in &self.content {
            element.push_node(node.clone());
        }
        element
    }
}

/// The `saml:BaseID` extension point.
///
/// Dispatch is driven by the mandatory `xsi:type` attribute: a registered
/// handler gets the element, anything else is retained verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseIdentifier {
    Custom(CustomIdentifier),
    Unknown(UnknownElement),
}

impl BaseIdentifier {
    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "BaseID")?;
        let type_value = element
            .attribute_ns(ns::XSI, "type")
            .ok_or_else(|| SamlError::MissingAttribute {
                element: element.qualified_name(),
                attribute: "xsi:type",
            })?;
        let (type_namespace, type_local) = element.resolve_qname(&type_value)?;
        let type_namespace = type_namespace.unwrap_or_default();
        match ctx
            .registry()
            .identifier_handler(&type_namespace, &type_local)
        {
            Some(handler) => handler(element, ctx),
            None => Ok(Self::Unknown(UnknownElement::capture(element))),
        }
    }

    pub fn to_element(&self) -> Element {
        match self {
            Self::Custom(custom) => custom.to_element(),
            Self::Unknown(unknown) => unknown.to_element(),
        }
    }
}

/// The identifier choice: exactly one of `NameID`, a `BaseID` variant,
/// or `EncryptedID`.
#[derive(Debug, Clone, PartialEq)]
pub enum Identifier {
    NameId(NameId),
    Base(BaseIdentifier),
    Encrypted(EncryptedId),
}

impl Identifier {
    pub(crate) fn matches(element: &Element) -> bool {
        element.is_named(ns::SAML, "NameID")
            || element.is_named(ns::SAML, "BaseID")
            || element.is_named(ns::SAML, "EncryptedID")
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        if element.is_named(ns::SAML, "NameID") {
            NameId::from_xml(element).map(Self::NameId)
        } else if element.is_named(ns::SAML, "BaseID") {
            BaseIdentifier::from_xml(element, ctx).map(Self::Base)
        } else if element.is_named(ns::SAML, "EncryptedID") {
            EncryptedId::from_xml(element).map(Self::Encrypted)
        } else {
            Err(SamlError::UnknownExtension {
                namespace: element.namespace().unwrap_or_default().to_string(),
                local_name: element.local_name().to_string(),
            })
        }
    }

    pub fn to_element(&self) -> Element {
        match self {
            Self::NameId(name_id) => name_id.to_element(),
            Self::Base(base) => base.to_element(),
            Self::Encrypted(encrypted) => encrypted.to_element(),
        }
    }

    pub fn as_name_id(&self) -> Option<&NameId> {
        match self {
            Self::NameId(name_id) => Some(name_id),
            _ => None,
        }
    }
}

fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return false;
    }
    !value.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn is_valid_uri(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let scheme_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    scheme_ok
        && !rest.is_empty()
        && !value.chars().any(|c| c.is_whitespace() || c.is_control())
}
