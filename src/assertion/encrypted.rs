//! Encrypted-element envelopes.
//!
//! These wrappers carry opaque `xenc:EncryptedData` (plus any transported
//! `xenc:EncryptedKey` siblings) exactly as parsed. Encrypting
//! serializes the plaintext element and hands the bytes to the backend;
//! decrypting reverses that and re-dispatches the recovered element to
//! the concrete type by namespace and local name.

use crate::assertion::Assertion;
use crate::assertion::attribute::Attribute;
use crate::assertion::name_id::{BaseIdentifier, Identifier, NameId};
use crate::context::SamlContext;
use crate::crypto::{DecryptionBackend, EncryptionBackend};
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;

/// Shared content of the `EncryptedElementType` wrappers.
#[derive(Debug, Clone, PartialEq)]
struct EncryptedContent {
    data: Element,
    keys: Vec<Element>,
}

impl EncryptedContent {
    fn parse(element: &Element) -> Result<Self> {
        let mut data = None;
        let mut keys = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::XENC, "EncryptedData") {
                if data.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "xenc:EncryptedData",
                    });
                }
                data = Some(child.clone());
            } else if child.is_named(ns::XENC, "EncryptedKey") {
                keys.push(child.clone());
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::XENC.to_string(),
                    expected: "EncryptedData".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        let data = data.ok_or_else(|| SamlError::MissingElement {
            parent: element.qualified_name(),
            child: "xenc:EncryptedData",
        })?;
        Ok(Self { data, keys })
    }

    fn encrypt(plaintext: &Element, backend: &dyn EncryptionBackend) -> Result<Self> {
        let data = backend.encrypt(plaintext.to_string().as_bytes())?;
        Ok(Self {
            data,
            keys: Vec::new(),
        })
    }

    fn decrypt(&self, backend: &dyn DecryptionBackend) -> Result<Element> {
        let plaintext = backend.decrypt(&self.data)?;
        let text = String::from_utf8(plaintext)
            .map_err(|_| SamlError::Crypto("decrypted payload is not UTF-8".to_string()))?;
        Element::parse(&text)
    }

    fn wrap(&self, namespace: &str, prefix: &str, local: &str) -> Element {
        let mut element = Element::new(namespace, prefix, local);
        element.push_child(self.data.clone());
        for key in &self.keys {
            element.push_child(key.clone());
        }
        element
    }
}

/// A `saml:EncryptedID`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedId {
    content: EncryptedContent,
}

impl EncryptedId {
    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "EncryptedID")?;
        Ok(Self {
            content: EncryptedContent::parse(element)?,
        })
    }

    /// Encrypts a plaintext identifier element (`saml:NameID` or
    /// `saml:BaseID`).
    pub fn encrypt(plaintext: &Element, backend: &dyn EncryptionBackend) -> Result<Self> {
        Ok(Self {
            content: EncryptedContent::encrypt(plaintext, backend)?,
        })
    }

    /// Decrypts and dispatches the recovered identifier element.
    pub fn decrypt(
        &self,
        backend: &dyn DecryptionBackend,
        ctx: &SamlContext,
    ) -> Result<Identifier> {
        let element = self.content.decrypt(backend)?;
        if element.is_named(ns::SAML, "NameID") {
            NameId::from_xml(&element).map(Identifier::NameId)
        } else if element.is_named(ns::SAML, "BaseID") {
            BaseIdentifier::from_xml(&element, ctx).map(Identifier::Base)
        } else {
            Err(SamlError::UnknownExtension {
                namespace: element.namespace().unwrap_or_default().to_string(),
                local_name: element.local_name().to_string(),
            })
        }
    }

    pub fn encrypted_data(&self) -> &Element {
        &self.content.data
    }

    pub fn to_element(&self) -> Element {
        self.content.wrap(ns::SAML, ns::prefix::SAML, "EncryptedID")
    }
}

/// A `samlp:NewEncryptedID`, as carried by `ManageNameIDRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEncryptedId {
    content: EncryptedContent,
}

impl NewEncryptedId {
    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, "NewEncryptedID")?;
        Ok(Self {
            content: EncryptedContent::parse(element)?,
        })
    }

    pub fn encrypt(plaintext: &Element, backend: &dyn EncryptionBackend) -> Result<Self> {
        Ok(Self {
            content: EncryptedContent::encrypt(plaintext, backend)?,
        })
    }

    /// Decrypts the wrapped `samlp:NewID` and returns its value.
    pub fn decrypt(&self, backend: &dyn DecryptionBackend) -> Result<String> {
        let element = self.content.decrypt(backend)?;
        dom::expect_element(&element, ns::SAMLP, "NewID")?;
        Ok(element.text())
    }

    pub fn to_element(&self) -> Element {
        self.content
            .wrap(ns::SAMLP, ns::prefix::SAMLP, "NewEncryptedID")
    }
}

/// A `saml:EncryptedAssertion`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedAssertion {
    content: EncryptedContent,
}

impl EncryptedAssertion {
    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "EncryptedAssertion")?;
        Ok(Self {
            content: EncryptedContent::parse(element)?,
        })
    }

    pub fn encrypt(assertion: &Assertion, backend: &dyn EncryptionBackend) -> Result<Self> {
        let plaintext = assertion.to_element()?;
        Ok(Self {
            content: EncryptedContent::encrypt(&plaintext, backend)?,
        })
    }

    pub fn decrypt(
        &self,
        backend: &dyn DecryptionBackend,
        ctx: &SamlContext,
    ) -> Result<Assertion> {
        let element = self.content.decrypt(backend)?;
        if element.is_named(ns::SAML, "Assertion") {
            Assertion::from_xml(&element, ctx)
        } else {
            Err(SamlError::UnknownExtension {
                namespace: element.namespace().unwrap_or_default().to_string(),
                local_name: element.local_name().to_string(),
            })
        }
    }

    pub fn to_element(&self) -> Element {
        self.content
            .wrap(ns::SAML, ns::prefix::SAML, "EncryptedAssertion")
    }
}

/// A `saml:EncryptedAttribute`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedAttribute {
    content: EncryptedContent,
}

impl EncryptedAttribute {
    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "EncryptedAttribute")?;
        Ok(Self {
            content: EncryptedContent::parse(element)?,
        })
    }

    pub fn encrypt(attribute: &Attribute, backend: &dyn EncryptionBackend) -> Result<Self> {
        Ok(Self {
            content: EncryptedContent::encrypt(&attribute.to_element(), backend)?,
        })
    }

    pub fn decrypt(&self, backend: &dyn DecryptionBackend) -> Result<Attribute> {
        let element = self.content.decrypt(backend)?;
        if element.is_named(ns::SAML, "Attribute") {
            Attribute::from_xml(&element)
        } else {
            Err(SamlError::UnknownExtension {
                namespace: element.namespace().unwrap_or_default().to_string(),
                local_name: element.local_name().to_string(),
            })
        }
    }

    pub fn to_element(&self) -> Element {
        self.content
            .wrap(ns::SAML, ns::prefix::SAML, "EncryptedAttribute")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCRYPTED_ID: &str = concat!(
        r#"<saml:EncryptedID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
        r#"xmlns:xenc="http://www.w3.org/2001/04/xmlenc#">"#,
        r#"<xenc:EncryptedData Type="http://www.w3.org/2001/04/xmlenc#Element">"#,
        r#"<xenc:EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes128-cbc"/>"#,
        r#"<xenc:CipherData><xenc:CipherValue>b2hhaQ==</xenc:CipherValue></xenc:CipherData>"#,
        r#"</xenc:EncryptedData>"#,
        r#"</saml:EncryptedID>"#
    );

    #[test]
    fn encrypted_id_retains_ciphertext_verbatim() {
        let parsed = EncryptedId::from_xml(&Element::parse(ENCRYPTED_ID).unwrap()).unwrap();
        assert_eq!(parsed.to_element().to_string(), ENCRYPTED_ID);
    }

    #[test]
    fn encrypted_id_requires_encrypted_data() {
        let xml = r#"<saml:EncryptedID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"></saml:EncryptedID>"#;
        let result = EncryptedId::from_xml(&Element::parse(xml).unwrap());
        assert!(matches!(
            result,
            Err(SamlError::MissingElement { child: "xenc:EncryptedData", .. })
        ));
    }

    struct EchoBackend;

    impl EncryptionBackend for EchoBackend {
        fn encrypt(&self, plaintext: &[u8]) -> Result<Element> {
            use base64::Engine as _;
            let mut data = Element::new(ns::XENC, ns::prefix::XENC, "EncryptedData");
            let mut cipher_data = Element::new(ns::XENC, ns::prefix::XENC, "CipherData");
            let mut cipher_value = Element::new(ns::XENC, ns::prefix::XENC, "CipherValue");
            cipher_value
                .set_text(&base64::engine::general_purpose::STANDARD.encode(plaintext));
            cipher_data.push_child(cipher_value);
            data.push_child(cipher_data);
            Ok(data)
        }
    }

    impl DecryptionBackend for EchoBackend {
        fn decrypt(&self, encrypted_data: &Element) -> Result<Vec<u8>> {
            use base64::Engine as _;
            let value = encrypted_data
                .first_child(ns::XENC, "CipherData")
                .and_then(|data| data.first_child(ns::XENC, "CipherValue"))
                .map(|value| value.text())
                .unwrap_or_default();
            Ok(base64::engine::general_purpose::STANDARD.decode(value.as_bytes())?)
        }
    }

    #[test]
    fn identifier_decryption_dispatches_name_id() {
        let name_id = NameId::new("someone");
        let ctx = SamlContext::new();
        let encrypted = EncryptedId::encrypt(&name_id.to_element(), &EchoBackend).unwrap();
        let recovered = encrypted.decrypt(&EchoBackend, &ctx).unwrap();
        assert_eq!(recovered.as_name_id().unwrap().value(), "someone");
    }

    #[test]
    fn unsupported_decrypted_identifier_is_fatal() {
        let ctx = SamlContext::new();
        let stranger = Element::new("urn:example", "e", "Stranger");
        let encrypted = EncryptedId::encrypt(&stranger, &EchoBackend).unwrap();
        let result = encrypted.decrypt(&EchoBackend, &ctx);
        assert!(matches!(result, Err(SamlError::UnknownExtension { .. })));
    }
}
