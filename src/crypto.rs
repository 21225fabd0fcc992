//! Signing and encryption collaborator contracts.
//!
//! The object model performs no cryptographic math itself. Signing and
//! encryption are narrow trait contracts; the [`signer`] and
//! [`encryption`] modules provide reference backends built on ring and
//! openssl, and any other implementation of the traits can stand in.
//!
//! This module also owns the signing lifecycle shared by protocol
//! messages and assertions. An element parsed from signed XML keeps its
//! original tree and re-emits it verbatim, because a signature computed
//! over canonicalized XML does not survive re-derivation from typed
//! fields; only attaching a fresh signer discards the retained bytes.

pub mod encryption;
pub mod signer;

pub use encryption::{AesCbcDecryptor, AesCbcEncryptor};
pub use signer::RsaSha256Signer;

use std::fmt;
use std::sync::Arc;

use crate::dom::{Element, Node};
use crate::error::Result;
use crate::ns;

/// Produces a `ds:Signature` element covering the given element tree.
pub trait XmlSigner: Send + Sync {
    fn sign(&self, target: &Element) -> Result<Element>;
}

/// Verifies the `ds:Signature` of a parsed element tree.
///
/// Verification is delegated entirely to the implementation; the object
/// model only hands over the retained original tree.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, signed: &Element) -> Result<()>;
}

/// Encrypts serialized plaintext into an `xenc:EncryptedData` subtree.
pub trait EncryptionBackend {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Element>;
}

/// Recovers the plaintext bytes of an `xenc:EncryptedData` subtree.
pub trait DecryptionBackend {
    fn decrypt(&self, encrypted_data: &Element) -> Result<Vec<u8>>;
}

/// Signing lifecycle of a message or assertion.
#[derive(Clone, Default)]
pub enum SigningState {
    /// Constructed programmatically, no signer attached.
    #[default]
    Unsigned,
    /// A signer is attached; the signature is produced at serialization.
    Pending(Arc<dyn XmlSigner>),
    /// Parsed from signed XML; the original tree is re-emitted verbatim.
    ParsedSigned { original: Element },
    /// Parsed from signed XML, then a new signer was attached explicitly:
    /// the retained bytes are discarded and the object is re-signed.
    Resign { signer: Arc<dyn XmlSigner> },
}

impl SigningState {
    /// Marks the object for (re-)signing at next serialization.
    pub fn attach_signer(&mut self, signer: Arc<dyn XmlSigner>) {
        *self = match std::mem::take(self) {
            SigningState::ParsedSigned { .. } | SigningState::Resign { .. } => {
                SigningState::Resign { signer }
            }
            _ => SigningState::Pending(signer),
        };
    }

    /// Whether the object arrived as signed XML.
    pub fn was_signed(&self) -> bool {
        matches!(
            self,
            SigningState::ParsedSigned { .. } | SigningState::Resign { .. }
        )
    }

    pub(crate) fn parsed_from(element: &Element, signed: bool) -> Self {
        if signed {
            SigningState::ParsedSigned {
                original: element.clone(),
            }
        } else {
            SigningState::Unsigned
        }
    }
}

impl fmt::Debug for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningState::Unsigned => f.write_str("Unsigned"),
            SigningState::Pending(_) => f.write_str("Pending"),
            SigningState::ParsedSigned { .. } => f.write_str("ParsedSigned"),
            SigningState::Resign { .. } => f.write_str("Resign"),
        }
    }
}

/// Serializes an envelope according to its signing state.
///
/// The `ds:Signature` element is schema-mandated to follow `saml:Issuer`
/// immediately, so a fresh signature is inserted right after the issuer
/// child (or first, when there is none).
pub(crate) fn finalize_signed(
    state: &SigningState,
    build: impl FnOnce() -> Result<Element>,
) -> Result<Element> {
    match state {
        SigningState::ParsedSigned { original } => Ok(original.clone()),
        SigningState::Unsigned => build(),
        SigningState::Pending(signer) | SigningState::Resign { signer } => {
            let mut unsigned = build()?;
            let signature = signer.sign(&unsigned)?;
            let index = signature_index(&unsigned);
            unsigned.insert_child(index, signature);
            Ok(unsigned)
        }
    }
}

fn signature_index(element: &Element) -> usize {
    element
        .children()
        .iter()
        .position(|node| match node {
            Node::Element(child) => child.is_named(ns::SAML, "Issuer"),
            _ => false,
        })
        .map_or(0, |issuer| issuer + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamlError;

    struct StubSigner;

    impl XmlSigner for StubSigner {
        fn sign(&self, _target: &Element) -> Result<Element> {
            Ok(Element::new(ns::DS, ns::prefix::DS, "Signature"))
        }
    }

    struct FailingSigner;

    impl XmlSigner for FailingSigner {
        fn sign(&self, _target: &Element) -> Result<Element> {
            Err(SamlError::Crypto("no key".to_string()))
        }
    }

    #[test]
    fn unsigned_state_emits_no_signature() {
        let state = SigningState::Unsigned;
        let out = finalize_signed(&state, || {
            Ok(Element::new(ns::SAMLP, ns::prefix::SAMLP, "LogoutResponse"))
        })
        .unwrap();
        assert!(out.first_child(ns::DS, "Signature").is_none());
    }

    #[test]
    fn pending_signature_lands_after_issuer() {
        let mut state = SigningState::Unsigned;
        state.attach_signer(Arc::new(StubSigner));
        let out = finalize_signed(&state, || {
            let mut el = Element::new(ns::SAMLP, ns::prefix::SAMLP, "LogoutResponse");
            el.push_child(Element::new(ns::SAML, ns::prefix::SAML, "Issuer"));
            el.push_child(Element::new(ns::SAMLP, ns::prefix::SAMLP, "Status"));
            Ok(el)
        })
        .unwrap();
        let names: Vec<_> = out.child_elements().map(Element::local_name).collect();
        assert_eq!(names, ["Issuer", "Signature", "Status"]);
    }

    #[test]
    fn parsed_signed_re_emits_retained_tree() {
        let original = Element::parse(r#"<x a="1"><keep/></x>"#).unwrap();
        let state = SigningState::parsed_from(&original, true);
        let out = finalize_signed(&state, || panic!("must not rebuild")).unwrap();
        assert_eq!(out.to_string(), r#"<x a="1"><keep/></x>"#);
    }

    #[test]
    fn attaching_signer_after_parse_discards_retained_tree() {
        let original = Element::parse("<x/>").unwrap();
        let mut state = SigningState::parsed_from(&original, true);
        state.attach_signer(Arc::new(StubSigner));
        let out = finalize_signed(&state, || Ok(Element::parse("<y/>").unwrap())).unwrap();
        assert_eq!(out.local_name(), "y");
        assert!(out.first_child(ns::DS, "Signature").is_some());
    }

    #[test]
    fn signer_failure_propagates() {
        let mut state = SigningState::Unsigned;
        state.attach_signer(Arc::new(FailingSigner));
        let result = finalize_signed(&state, || Ok(Element::parse("<x/>").unwrap()));
        assert!(matches!(result, Err(SamlError::Crypto(_))));
    }
}
