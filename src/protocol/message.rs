//! The shared protocol message envelope.
//!
//! Every `samlp:` request and response carries the same attribute set
//! (ID, Version, IssueInstant, Destination, Consent) and leading
//! children (Issuer, Signature, Extensions). Concrete message types
//! embed [`MessageFields`] and delegate the envelope to it; responses
//! additionally embed [`StatusResponseFields`].

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::assertion::Issuer;
use crate::context::{SamlContext, generate_id};
use crate::crypto::{SigningState, XmlSigner, finalize_signed};
use crate::datetime;
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;
use crate::protocol::extensions::Extensions;
use crate::protocol::status::Status;

#[derive(Debug, Clone)]
pub struct MessageFields {
    id: String,
    issue_instant: DateTime<Utc>,
    destination: Option<String>,
    consent: Option<String>,
    issuer: Option<Issuer>,
    extensions: Option<Extensions>,
    signing: SigningState,
}

impl MessageFields {
    pub fn new(issue_instant: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            issue_instant,
            destination: None,
            consent: None,
            issuer: None,
            extensions: None,
            signing: SigningState::Unsigned,
        }
    }

    /// Envelope with the issue instant taken from the context clock.
    pub fn now(ctx: &SamlContext) -> Self {
        Self::new(ctx.now())
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_consent(mut self, consent: impl Into<String>) -> Self {
        self.consent = Some(consent.into());
        self
    }

    pub fn with_issuer(mut self, issuer: Issuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn issue_instant(&self) -> DateTime<Utc> {
        self.issue_instant
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn consent(&self) -> Option<&str> {
        self.consent.as_deref()
    }

    pub fn issuer(&self) -> Option<&Issuer> {
        self.issuer.as_ref()
    }

    pub fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }

    /// Attaches a signer, consumed lazily at the next serialization. On
    /// a message parsed from signed XML this discards the retained
    /// original bytes.
    pub fn set_signer(&mut self, signer: Arc<dyn XmlSigner>) {
        self.signing.attach_signer(signer);
    }

    /// Whether this message was parsed from signed XML.
    pub fn was_signed(&self) -> bool {
        self.signing.was_signed()
    }

    /// Parses the envelope attributes and leading children. Body
    /// children are left to the concrete message type.
    pub(crate) fn parse(element: &Element, _ctx: &SamlContext) -> Result<Self> {
        let id = dom::require_attribute(element, "ID")?;
        let version = dom::require_attribute(element, "Version")?;
        if version != ns::VERSION {
            return Err(SamlError::UnsupportedVersion(version));
        }
        let issue_instant =
            datetime::parse_instant(&dom::require_attribute(element, "IssueInstant")?)?;

        let mut issuer = None;
        let mut extensions = None;
        let mut signatures = 0usize;
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
            } else if child.is_named(ns::SAMLP, "Extensions") {
                if extensions.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "samlp:Extensions",
                    });
                }
                extensions = Some(Extensions::from_xml(child)?);
            }
        }

        Ok(Self {
            id,
            issue_instant,
            destination: element.attribute("Destination"),
            consent: element.attribute("Consent"),
            issuer,
            extensions,
            signing: SigningState::parsed_from(element, signatures > 0),
        })
    }

    /// Builds the unsigned root element: envelope attributes in their
    /// fixed order, then Issuer and Extensions. `Consent` equal to the
    /// well-known "unspecified" URI is omitted entirely.
    pub(crate) fn unsigned_root(&self, local: &str, in_response_to: Option<&str>) -> Element {
        let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, local);
        element.set_attribute("Version", ns::VERSION);
        element.set_attribute("ID", &self.id);
        element.set_attribute(
            "IssueInstant",
            &datetime::format_instant(self.issue_instant),
        );
        if let Some(in_response_to) = in_response_to {
            element.set_attribute("InResponseTo", in_response_to);
        }
        if let Some(destination) = &self.destination {
            element.set_attribute("Destination", destination);
        }
        if let Some(consent) = &self.consent
            && consent != ns::consent::UNSPECIFIED
        {
            element.set_attribute("Consent", consent);
        }
        if let Some(issuer) = &self.issuer {
            element.push_child(issuer.to_element());
        }
        if let Some(extensions) = &self.extensions {
            element.push_child(extensions.to_element());
        }
        element
    }

    /// Serializes according to the signing lifecycle; see
    /// [`crate::crypto::SigningState`].
    pub(crate) fn finalize(&self, build: impl FnOnce() -> Result<Element>) -> Result<Element> {
        finalize_signed(&self.signing, build)
    }
}

/// The additions all status responses share.
#[derive(Debug, Clone)]
pub struct StatusResponseFields {
    in_response_to: Option<String>,
    status: Status,
}

impl StatusResponseFields {
    pub fn new(status: Status) -> Self {
        Self {
            in_response_to: None,
            status,
        }
    }

    pub fn with_in_response_to(mut self, id: impl Into<String>) -> Self {
        self.in_response_to = Some(id.into());
        self
    }

    pub fn in_response_to(&self) -> Option<&str> {
        self.in_response_to.as_deref()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub(crate) fn parse(element: &Element) -> Result<Self> {
        let mut status = None;
        for child in element.child_elements() {
            if child.is_named(ns::SAMLP, "Status") {
                if status.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "samlp:Status",
                    });
                }
                status = Some(Status::from_xml(child)?);
            }
        }
        let status = status.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "samlp:Status",
        })?;
        Ok(Self {
            in_response_to: element.attribute("InResponseTo"),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> MessageFields {
        MessageFields::new(datetime::parse_instant("2014-09-22T13:42:00Z").unwrap())
            .with_id("_2b0226190ca1c22de6f66e85f5c95158")
    }

    #[test]
    fn unspecified_consent_is_omitted() {
        let root = fields()
            .with_consent(ns::consent::UNSPECIFIED)
            .unsigned_root("LogoutRequest", None);
        assert_eq!(root.attribute("Consent"), None);

        let root = fields()
            .with_consent(ns::consent::OBTAINED)
            .unsigned_root("LogoutRequest", None);
        assert_eq!(root.attribute("Consent"), Some(ns::consent::OBTAINED.to_string()));
    }

    #[test]
    fn envelope_attribute_order_is_fixed() {
        let root = fields()
            .with_destination("https://sp.example.org/acs")
            .unsigned_root("Response", Some("_request1"));
        let xml = root.to_string();
        assert!(xml.starts_with(concat!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_2b0226190ca1c22de6f66e85f5c95158" "#,
            r#"IssueInstant="2014-09-22T13:42:00Z" InResponseTo="_request1" "#,
            r#"Destination="https://sp.example.org/acs""#
        )));
    }

    #[test]
    fn version_other_than_2_0_is_rejected() {
        let xml = concat!(
            r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="3.0" ID="_x" IssueInstant="2014-09-22T13:42:00Z"/>"#
        );
        let ctx = SamlContext::new();
        let result = MessageFields::parse(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(result, Err(SamlError::UnsupportedVersion(v)) if v == "3.0"));
    }

    #[test]
    fn second_signature_is_rejected() {
        let xml = concat!(
            r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"xmlns:ds="http://www.w3.org/2000/09/xmldsig#" "#,
            r#"Version="2.0" ID="_x" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<ds:Signature/><ds:Signature/>"#,
            r#"</samlp:LogoutResponse>"#
        );
        let ctx = SamlContext::new();
        let result = MessageFields::parse(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(
            result,
            Err(SamlError::TooManyElements { child: "ds:Signature", .. })
        ));
    }
}
