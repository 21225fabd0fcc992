//! The protocol message factory.
//!
//! Routes an XML element to the concrete message type by namespace and
//! local name, delegating parsing entirely to that type's `from_xml`.

use crate::context::SamlContext;
use crate::dom::Element;
use crate::error::{Result, SamlError};
use crate::ns;
use crate::protocol::artifact::{ArtifactResolve, ArtifactResponse};
use crate::protocol::authn_request::AuthnRequest;
use crate::protocol::logout::{LogoutRequest, LogoutResponse};
use crate::protocol::message::MessageFields;
use crate::protocol::name_id_mapping::{
    ManageNameIdRequest, ManageNameIdResponse, NameIdMappingRequest, NameIdMappingResponse,
};
use crate::protocol::queries::{
    AssertionIdRequest, AttributeQuery, AuthnQuery, AuthzDecisionQuery,
};
use crate::protocol::response::Response;

/// Any protocol message.
#[derive(Debug, Clone)]
pub enum Message {
    AuthnRequest(AuthnRequest),
    Response(Response),
    LogoutRequest(LogoutRequest),
    LogoutResponse(LogoutResponse),
    ArtifactResolve(ArtifactResolve),
    ArtifactResponse(ArtifactResponse),
    AttributeQuery(AttributeQuery),
    AuthnQuery(AuthnQuery),
    AuthzDecisionQuery(AuthzDecisionQuery),
    AssertionIdRequest(AssertionIdRequest),
    NameIdMappingRequest(NameIdMappingRequest),
    NameIdMappingResponse(NameIdMappingResponse),
    ManageNameIdRequest(ManageNameIdRequest),
    ManageNameIdResponse(ManageNameIdResponse),
}

impl Message {
    /// Shorthand for [`MessageFactory::from_xml`].
    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        MessageFactory::from_xml(element, ctx)
    }

    pub fn to_element(&self) -> Result<Element> {
        match self {
            Self::AuthnRequest(message) => message.to_element(),
            Self::Response(message) => message.to_element(),
            Self::LogoutRequest(message) => message.to_element(),
            Self::LogoutResponse(message) => message.to_element(),
            Self::ArtifactResolve(message) => message.to_element(),
            Self::ArtifactResponse(message) => message.to_element(),
            Self::AttributeQuery(message) => message.to_element(),
            Self::AuthnQuery(message) => message.to_element(),
            Self::AuthzDecisionQuery(message) => message.to_element(),
            Self::AssertionIdRequest(message) => message.to_element(),
            Self::NameIdMappingRequest(message) => message.to_element(),
            Self::NameIdMappingResponse(message) => message.to_element(),
            Self::ManageNameIdRequest(message) => message.to_element(),
            Self::ManageNameIdResponse(message) => message.to_element(),
        }
    }

    pub fn fields(&self) -> &MessageFields {
        match self {
            Self::AuthnRequest(message) => message.fields(),
            Self::Response(message) => message.fields(),
            Self::LogoutRequest(message) => message.fields(),
            Self::LogoutResponse(message) => message.fields(),
            Self::ArtifactResolve(message) => message.fields(),
            Self::ArtifactResponse(message) => message.fields(),
            Self::AttributeQuery(message) => message.fields(),
            Self::AuthnQuery(message) => message.fields(),
            Self::AuthzDecisionQuery(message) => message.fields(),
            Self::AssertionIdRequest(message) => message.fields(),
            Self::NameIdMappingRequest(message) => message.fields(),
            Self::NameIdMappingResponse(message) => message.fields(),
            Self::ManageNameIdRequest(message) => message.fields(),
            Self::ManageNameIdResponse(message) => message.fields(),
        }
    }

    pub fn id(&self) -> &str {
        self.fields().id()
    }
}

pub struct MessageFactory;

impl MessageFactory {
    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Message> {
        let namespace = element.namespace().unwrap_or_default();
        if namespace != ns::SAMLP {
            return Err(SamlError::ProtocolViolation(format!(
                "unknown namespace of SAML message: '{namespace}'"
            )));
        }
        match element.local_name() {
            AuthnRequest::LOCAL_NAME => {
                AuthnRequest::from_xml(element, ctx).map(Message::AuthnRequest)
            }
            Response::LOCAL_NAME => Response::from_xml(element, ctx).map(Message::Response),
            LogoutRequest::LOCAL_NAME => {
                LogoutRequest::from_xml(element, ctx).map(Message::LogoutRequest)
            }
            LogoutResponse::LOCAL_NAME => {
                LogoutResponse::from_xml(element, ctx).map(Message::LogoutResponse)
            }
            ArtifactResolve::LOCAL_NAME => {
                ArtifactResolve::from_xml(element, ctx).map(Message::ArtifactResolve)
            }
            ArtifactResponse::LOCAL_NAME => {
                ArtifactResponse::from_xml(element, ctx).map(Message::ArtifactResponse)
            }
            AttributeQuery::LOCAL_NAME => {
                AttributeQuery::from_xml(element, ctx).map(Message::AttributeQuery)
            }
            AuthnQuery::LOCAL_NAME => {
                AuthnQuery::from_xml(element, ctx).map(Message::AuthnQuery)
            }
            AuthzDecisionQuery::LOCAL_NAME => {
                AuthzDecisionQuery::from_xml(element, ctx).map(Message::AuthzDecisionQuery)
            }
            AssertionIdRequest::LOCAL_NAME => {
                AssertionIdRequest::from_xml(element, ctx).map(Message::AssertionIdRequest)
            }
            NameIdMappingRequest::LOCAL_NAME => {
                NameIdMappingRequest::from_xml(element, ctx).map(Message::NameIdMappingRequest)
            }
            NameIdMappingResponse::LOCAL_NAME => {
                NameIdMappingResponse::from_xml(element, ctx)
                    .map(Message::NameIdMappingResponse)
            }
            ManageNameIdRequest::LOCAL_NAME => {
                ManageNameIdRequest::from_xml(element, ctx).map(Message::ManageNameIdRequest)
            }
            ManageNameIdResponse::LOCAL_NAME => {
                ManageNameIdResponse::from_xml(element, ctx).map(Message::ManageNameIdResponse)
            }
            other => Err(SamlError::UnknownExtension {
                namespace: namespace.to_string(),
                local_name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_authn_request() {
        let xml = concat!(
            r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_2b0226190ca1c22de6f66e85f5c95158" "#,
            r#"IssueInstant="2014-09-22T13:42:00Z"/>"#
        );
        let ctx = SamlContext::new();
        let message = MessageFactory::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert!(matches!(message, Message::AuthnRequest(_)));
        assert_eq!(message.id(), "_2b0226190ca1c22de6f66e85f5c95158");
    }

    #[test]
    fn wrong_namespace_is_named_in_the_error() {
        let xml = concat!(
            r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"Version="2.0" ID="_x" IssueInstant="2014-09-22T13:42:00Z"/>"#
        );
        let ctx = SamlContext::new();
        let result = MessageFactory::from_xml(&Element::parse(xml).unwrap(), &ctx);
        let Err(SamlError::ProtocolViolation(message)) = result else {
            panic!("expected a protocol violation");
        };
        assert!(message.contains("urn:oasis:names:tc:SAML:2.0:assertion"));
    }

    #[test]
    fn unknown_local_name_is_fatal() {
        let xml = concat!(
            r#"<samlp:FrobnicateRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
            r#"Version="2.0" ID="_x" IssueInstant="2014-09-22T13:42:00Z"/>"#
        );
        let ctx = SamlContext::new();
        let result = MessageFactory::from_xml(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(
            result,
            Err(SamlError::UnknownExtension { local_name, .. }) if local_name == "FrobnicateRequest"
        ));
    }
}
