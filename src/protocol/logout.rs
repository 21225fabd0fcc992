//! `samlp:LogoutRequest` and `samlp:LogoutResponse`.

use chrono::{DateTime, Utc};

use crate::assertion::Identifier;
use crate::context::SamlContext;
use crate::datetime;
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;
use crate::protocol::message::{MessageFields, StatusResponseFields};

/// A `samlp:LogoutRequest`.
#[derive(Debug, Clone)]
pub struct LogoutRequest {
    fields: MessageFields,
    not_on_or_after: Option<DateTime<Utc>>,
    reason: Option<String>,
    identifier: Identifier,
    session_indexes: Vec<String>,
}

impl LogoutRequest {
    pub const LOCAL_NAME: &'static str = "LogoutRequest";

    pub fn new(fields: MessageFields, identifier: Identifier) -> Self {
        Self {
            fields,
            not_on_or_after: None,
            reason: None,
            identifier,
            session_indexes: Vec::new(),
        }
    }

    pub fn with_not_on_or_after(mut self, instant: DateTime<Utc>) -> Self {
        self.not_on_or_after = Some(instant);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_indexes.push(index.into());
        self
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn not_on_or_after(&self) -> Option<DateTime<Utc>> {
        self.not_on_or_after
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// The identifier of the principal being logged out.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn session_indexes(&self) -> &[String] {
        &self.session_indexes
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let not_on_or_after = element
            .attribute("NotOnOrAfter")
            .map(|value| datetime::parse_instant(&value))
            .transpose()?;

        let mut identifier = None;
        let mut session_indexes = Vec::new();
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
                        child: "saml:NameID, saml:BaseID or saml:EncryptedID",
                    });
                }
                identifier = Some(Identifier::from_xml(child, ctx)?);
            } else if child.is_named(ns::SAMLP, "SessionIndex") {
                session_indexes.push(child.text());
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAMLP.to_string(),
                    expected: "SessionIndex".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        let identifier = identifier.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "saml:NameID, saml:BaseID or saml:EncryptedID",
        })?;

        Ok(Self {
            fields,
            not_on_or_after,
            reason: element.attribute("Reason"),
            identifier,
            session_indexes,
        })
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self.fields.unsigned_root(Self::LOCAL_NAME, None);
            if let Some(instant) = self.not_on_or_after {
                element.set_attribute("NotOnOrAfter", &datetime::format_instant(instant));
            }
            if let Some(reason) = &self.reason {
                element.set_attribute("Reason", reason);
            }
            element.push_child(self.identifier.to_element());
            for index in &self.session_indexes {
                let mut child = Element::new(ns::SAMLP, ns::prefix::SAMLP, "SessionIndex");
                child.set_text(index);
                element.push_child(child);
            }
            Ok(element)
        })
    }
}

/// A `samlp:LogoutResponse`.
#[derive(Debug, Clone)]
pub struct LogoutResponse {
    fields: MessageFields,
    status: StatusResponseFields,
}

impl LogoutResponse {
    pub const LOCAL_NAME: &'static str = "LogoutResponse";

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::NameId;
    use crate::protocol::status::Status;

    #[test]
    fn logout_request_round_trips() {
        let xml = concat!(
            r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_lr1" IssueInstant="2014-09-22T13:42:00Z" "#,
            r#"NotOnOrAfter="2014-09-22T13:47:00Z" "#,
            r#"Reason="urn:oasis:names:tc:SAML:2.0:logout:user">"#,
            r#"<saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">https://sp.example.org/</saml:Issuer>"#,
            r#"<saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">someone</saml:NameID>"#,
            r#"<samlp:SessionIndex>_session1</samlp:SessionIndex>"#,
            r#"<samlp:SessionIndex>_session2</samlp:SessionIndex>"#,
            r#"</samlp:LogoutRequest>"#
        );
        let ctx = SamlContext::new();
        let request = LogoutRequest::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert_eq!(request.reason(), Some(ns::logout::USER));
        assert_eq!(request.session_indexes().len(), 2);
        assert!(request.identifier().as_name_id().is_some());
        assert_eq!(request.to_element().unwrap().to_string(), xml);
    }

    #[test]
    fn logout_request_requires_an_identifier() {
        let xml = concat!(
            r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_lr1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<samlp:SessionIndex>_session1</samlp:SessionIndex>"#,
            r#"</samlp:LogoutRequest>"#
        );
        let ctx = SamlContext::new();
        let result = LogoutRequest::from_xml(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(result, Err(SamlError::MissingElement { .. })));
    }

    #[test]
    fn logout_response_round_trips() {
        let xml = concat!(
            r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_lrsp1" IssueInstant="2014-09-22T13:42:01Z" "#,
            r#"InResponseTo="_lr1">"#,
            r#"<samlp:Status>"#,
            r#"<samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/>"#,
            r#"</samlp:Status>"#,
            r#"</samlp:LogoutResponse>"#
        );
        let ctx = SamlContext::new();
        let response = LogoutResponse::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert!(response.status().status().is_success());
        assert_eq!(response.to_element().unwrap().to_string(), xml);
    }

    #[test]
    fn built_logout_response_uses_context_clock() {
        let instant = datetime::parse_instant("2020-01-01T00:00:00Z").unwrap();
        let ctx = SamlContext::with_clock(crate::context::FixedClock(instant));
        let fields = MessageFields::now(&ctx);
        let response = LogoutResponse::new(fields, StatusResponseFields::new(Status::success()));
        let xml = response.to_element().unwrap().to_string();
        assert!(xml.contains(r#"IssueInstant="2020-01-01T00:00:00Z""#));
    }
}
