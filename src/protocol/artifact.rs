//! `samlp:ArtifactResolve` and `samlp:ArtifactResponse`.

use crate::context::SamlContext;
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;
use crate::protocol::factory::Message;
use crate::protocol::message::{MessageFields, StatusResponseFields};

/// A `samlp:ArtifactResolve`.
#[derive(Debug, Clone)]
pub struct ArtifactResolve {
    fields: MessageFields,
    artifact: String,
}

impl ArtifactResolve {
    pub const LOCAL_NAME: &'static str = "ArtifactResolve";

    pub fn new(fields: MessageFields, artifact: impl Into<String>) -> Self {
        Self {
            fields,
            artifact: artifact.into(),
        }
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let artifact = element
            .first_child(ns::SAMLP, "Artifact")
            .map(Element::text)
            .ok_or_else(|| SamlError::MissingElement {
                parent: element.qualified_name(),
                child: "samlp:Artifact",
            })?;
        Ok(Self { fields, artifact })
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self.fields.unsigned_root(Self::LOCAL_NAME, None);
            let mut artifact = Element::new(ns::SAMLP, ns::prefix::SAMLP, "Artifact");
            artifact.set_text(&self.artifact);
            element.push_child(artifact);
            Ok(element)
        })
    }
}

/// A `samlp:ArtifactResponse`.
///
/// The wrapped protocol message is retained as a raw element so content
/// this process cannot interpret still round-trips; [`Self::message`]
/// re-dispatches it through the message factory on demand.
#[derive(Debug, Clone)]
pub struct ArtifactResponse {
    fields: MessageFields,
    status: StatusResponseFields,
    payload: Option<Element>,
}

impl ArtifactResponse {
    pub const LOCAL_NAME: &'static str = "ArtifactResponse";

    pub fn new(fields: MessageFields, status: StatusResponseFields) -> Self {
        Self {
            fields,
            status,
            payload: None,
        }
    }

    pub fn with_message(mut self, message: &Message) -> Result<Self> {
        self.payload = Some(message.to_element()?);
        Ok(self)
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

    /// The wrapped element, exactly as parsed or attached.
    pub fn payload(&self) -> Option<&Element> {
        self.payload.as_ref()
    }

    /// Dispatches the wrapped element to a typed message.
    pub fn message(&self, ctx: &SamlContext) -> Result<Option<Message>> {
        self.payload
            .as_ref()
            .map(|element| Message::from_xml(element, ctx))
            .transpose()
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let status = StatusResponseFields::parse(element)?;
        let mut payload = None;
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "Issuer")
                || child.is_named(ns::DS, "Signature")
                || child.is_named(ns::SAMLP, "Extensions")
                || child.is_named(ns::SAMLP, "Status")
            {
                continue;
            }
            if payload.is_some() {
                return Err(SamlError::TooManyElements {
                    parent: element.qualified_name(),
                    child: "wrapped protocol message",
                });
            }
            payload = Some(child.clone());
        }
        Ok(Self {
            fields,
            status,
            payload,
        })
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self
                .fields
                .unsigned_root(Self::LOCAL_NAME, self.status.in_response_to());
            element.push_child(self.status.status().to_element());
            if let Some(payload) = &self.payload {
                element.push_child(payload.clone());
            }
            Ok(element)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_resolve_round_trips() {
        let xml = concat!(
            r#"<samlp:ArtifactResolve xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_ar1" IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<samlp:Artifact>AAQAAMh48/1oXIM+sDo7Dh2qMp1HM4IF5DaRNmDj6RdUmllwn9jJHyEgIi8=</samlp:Artifact>"#,
            r#"</samlp:ArtifactResolve>"#
        );
        let ctx = SamlContext::new();
        let resolve = ArtifactResolve::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert!(resolve.artifact().starts_with("AAQAAMh48"));
        assert_eq!(resolve.to_element().unwrap().to_string(), xml);
    }

    #[test]
    fn artifact_resolve_requires_artifact() {
        let xml = concat!(
            r#"<samlp:ArtifactResolve xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_ar1" IssueInstant="2014-09-22T13:42:00Z"/>"#
        );
        let ctx = SamlContext::new();
        let result = ArtifactResolve::from_xml(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(
            result,
            Err(SamlError::MissingElement { child: "samlp:Artifact", .. })
        ));
    }

    #[test]
    fn artifact_response_redispatches_payload() {
        let xml = concat!(
            r#"<samlp:ArtifactResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_arsp1" IssueInstant="2014-09-22T13:42:01Z" "#,
            r#"InResponseTo="_ar1">"#,
            r#"<samlp:Status>"#,
            r#"<samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/>"#,
            r#"</samlp:Status>"#,
            r#"<samlp:LogoutResponse Version="2.0" ID="_lr1" "#,
            r#"IssueInstant="2014-09-22T13:42:00Z">"#,
            r#"<samlp:Status>"#,
            r#"<samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/>"#,
            r#"</samlp:Status>"#,
            r#"</samlp:LogoutResponse>"#,
            r#"</samlp:ArtifactResponse>"#
        );
        let ctx = SamlContext::new();
        let response =
            ArtifactResponse::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        let wrapped = response.message(&ctx).unwrap().unwrap();
        assert!(matches!(wrapped, Message::LogoutResponse(_)));
        assert_eq!(response.to_element().unwrap().to_string(), xml);
    }
}
