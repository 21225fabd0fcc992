//! `samlp:Response`.

use crate::assertion::{Assertion, EncryptedAssertion};
use crate::context::SamlContext;
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;
use crate::protocol::message::{MessageFields, StatusResponseFields};

/// One assertion of a response, plaintext or encrypted, in document
/// order.
#[derive(Debug, Clone)]
pub enum ResponseAssertion {
    Plain(Assertion),
    Encrypted(EncryptedAssertion),
}

/// A `samlp:Response`.
#[derive(Debug, Clone)]
pub struct Response {
    fields: MessageFields,
    status: StatusResponseFields,
    assertions: Vec<ResponseAssertion>,
}

impl Response {
    pub const LOCAL_NAME: &'static str = "Response";

    pub fn new(fields: MessageFields, status: StatusResponseFields) -> Self {
        Self {
            fields,
            status,
            assertions: Vec::new(),
        }
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(ResponseAssertion::Plain(assertion));
        self
    }

    pub fn with_encrypted_assertion(mut self, assertion: EncryptedAssertion) -> Self {
        self.assertions.push(ResponseAssertion::Encrypted(assertion));
        self
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

    pub fn assertions(&self) -> &[ResponseAssertion] {
        &self.assertions
    }

    /// Typed filter over [`assertions`](Self::assertions).
    pub fn plain_assertions(&self) -> impl Iterator<Item = &Assertion> {
        self.assertions.iter().filter_map(|entry| match entry {
            ResponseAssertion::Plain(assertion) => Some(assertion),
            ResponseAssertion::Encrypted(_) => None,
        })
    }

    /// Typed filter over [`assertions`](Self::assertions).
    pub fn encrypted_assertions(&self) -> impl Iterator<Item = &EncryptedAssertion> {
        self.assertions.iter().filter_map(|entry| match entry {
            ResponseAssertion::Encrypted(assertion) => Some(assertion),
            ResponseAssertion::Plain(_) => None,
        })
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;
        let status = StatusResponseFields::parse(element)?;

        let mut assertions = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "Issuer")
                || child.is_named(ns::DS, "Signature")
                || child.is_named(ns::SAMLP, "Extensions")
                || child.is_named(ns::SAMLP, "Status")
            {
                continue;
            }
            if child.is_named(ns::SAML, "Assertion") {
                assertions.push(ResponseAssertion::Plain(Assertion::from_xml(child, ctx)?));
            } else if child.is_named(ns::SAML, "EncryptedAssertion") {
                assertions.push(ResponseAssertion::Encrypted(EncryptedAssertion::from_xml(
                    child,
                )?));
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "Assertion".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }

        Ok(Self {
            fields,
            status,
            assertions,
        })
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self
                .fields
                .unsigned_root(Self::LOCAL_NAME, self.status.in_response_to());
            element.push_child(self.status.status().to_element());
            for entry in &self.assertions {
                match entry {
                    ResponseAssertion::Plain(assertion) => {
                        element.push_child(assertion.to_element()?);
                    }
                    ResponseAssertion::Encrypted(assertion) => {
                        element.push_child(assertion.to_element());
                    }
                }
            }
            Ok(element)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::status::Status;

    const RESPONSE: &str = concat!(
        r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
        r#"Version="2.0" ID="_resp1" IssueInstant="2014-09-22T13:42:05Z" "#,
        r#"InResponseTo="_2b0226190ca1c22de6f66e85f5c95158">"#,
        r#"<saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">https://idp.example.org/</saml:Issuer>"#,
        r#"<samlp:Status>"#,
        r#"<samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/>"#,
        r#"</samlp:Status>"#,
        r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
        r#"Version="2.0" ID="_a1" IssueInstant="2014-09-22T13:42:05Z">"#,
        r#"<saml:Issuer>https://idp.example.org/</saml:Issuer>"#,
        r#"<saml:Subject><saml:NameID>someone</saml:NameID></saml:Subject>"#,
        r#"</saml:Assertion>"#,
        r#"</samlp:Response>"#
    );

    #[test]
    fn response_round_trips() {
        let ctx = SamlContext::new();
        let response = Response::from_xml(&Element::parse(RESPONSE).unwrap(), &ctx).unwrap();
        assert!(response.status().status().is_success());
        assert_eq!(
            response.status().in_response_to(),
            Some("_2b0226190ca1c22de6f66e85f5c95158")
        );
        assert_eq!(response.plain_assertions().count(), 1);
        assert_eq!(response.to_element().unwrap().to_string(), RESPONSE);
    }

    #[test]
    fn built_response_carries_status_first() {
        let fields =
            MessageFields::new(crate::datetime::parse_instant("2014-09-22T13:42:05Z").unwrap());
        let response = Response::new(
            fields,
            StatusResponseFields::new(Status::success()).with_in_response_to("_req"),
        );
        let element = response.to_element().unwrap();
        let first = element.child_elements().next().unwrap();
        assert!(first.is_named(ns::SAMLP, "Status"));
    }
}
