//! Reference enveloped-signature backend.
//!
//! Produces an XMLDSig `ds:Signature` over the serialized form of the
//! target element: the content digest goes into the `Reference`, the
//! signature is computed over the serialized `ds:SignedInfo` with
//! RSA-SHA256. Serialization of the tree built by this crate is
//! deterministic, which stands in for canonicalization here; deployments
//! with stricter canonicalization needs supply their own [`XmlSigner`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use sha2::{Digest, Sha256};

use super::XmlSigner;
use crate::dom::Element;
use crate::error::{Result, SamlError};
use crate::ns;

const PEM_PRIVATE_KEY_TAG: &str = "PRIVATE KEY";
const PEM_RSA_PRIVATE_KEY_TAG: &str = "RSA PRIVATE KEY";
const PEM_CERTIFICATE_TAG: &str = "CERTIFICATE";

/// RSA-SHA256 signer with an optional embedded X.509 certificate.
pub struct RsaSha256Signer {
    key_pair: RsaKeyPair,
    certificate_b64: Option<String>,
}

impl RsaSha256Signer {
    /// Creates a signer from a PEM private key and, optionally, a PEM
    /// certificate to embed in `ds:KeyInfo`.
    pub fn from_pem(private_key_pem: &[u8], certificate_pem: Option<&[u8]>) -> Result<Self> {
        let key_pair = key_pair_from_pem(private_key_pem)?;
        let certificate_b64 = certificate_pem
            .map(|data| {
                let pem = parse_pem(data, &[PEM_CERTIFICATE_TAG])?;
                Ok::<_, SamlError>(BASE64.encode(pem.contents()))
            })
            .transpose()?;
        Ok(Self {
            key_pair,
            certificate_b64,
        })
    }

    fn signed_info(&self, reference_uri: &str, digest_b64: &str) -> Element {
        let mut signed_info = Element::new(ns::DS, ns::prefix::DS, "SignedInfo");

        let mut c14n = Element::new(ns::DS, ns::prefix::DS, "CanonicalizationMethod");
        c14n.set_attribute("Algorithm", ns::alg::EXC_C14N);
        signed_info.push_child(c14n);

        let mut method = Element::new(ns::DS, ns::prefix::DS, "SignatureMethod");
        method.set_attribute("Algorithm", ns::alg::RSA_SHA256);
        signed_info.push_child(method);

        let mut reference = Element::new(ns::DS, ns::prefix::DS, "Reference");
        reference.set_attribute("URI", reference_uri);

        let mut transforms = Element::new(ns::DS, ns::prefix::DS, "Transforms");
        for algorithm in [ns::alg::ENVELOPED_SIGNATURE, ns::alg::EXC_C14N] {
            let mut transform = Element::new(ns::DS, ns::prefix::DS, "Transform");
            transform.set_attribute("Algorithm", algorithm);
            transforms.push_child(transform);
        }
        reference.push_child(transforms);

        let mut digest_method = Element::new(ns::DS, ns::prefix::DS, "DigestMethod");
        digest_method.set_attribute("Algorithm", ns::alg::SHA256);
        reference.push_child(digest_method);

        let mut digest_value = Element::new(ns::DS, ns::prefix::DS, "DigestValue");
        digest_value.set_text(digest_b64);
        reference.push_child(digest_value);

        signed_info.push_child(reference);
        signed_info
    }
}

impl XmlSigner for RsaSha256Signer {
    fn sign(&self, target: &Element) -> Result<Element> {
        let content_digest = Sha256::digest(target.to_string().as_bytes());
        let reference_uri = target
            .attribute("ID")
            .map(|id| format!("#{id}"))
            .unwrap_or_default();
        let signed_info = self.signed_info(&reference_uri, &BASE64.encode(content_digest));

        let mut signature_bytes = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &SystemRandom::new(),
                signed_info.to_string().as_bytes(),
                &mut signature_bytes,
            )
            .map_err(|e| SamlError::Crypto(format!("RSA signing failed: {e}")))?;

        let mut signature = Element::new(ns::DS, ns::prefix::DS, "Signature");
        signature.push_child(signed_info);

        let mut signature_value = Element::new(ns::DS, ns::prefix::DS, "SignatureValue");
        signature_value.set_text(&BASE64.encode(&signature_bytes));
        signature.push_child(signature_value);

        if let Some(certificate) = &self.certificate_b64 {
            let mut key_info = Element::new(ns::DS, ns::prefix::DS, "KeyInfo");
            let mut x509_data = Element::new(ns::DS, ns::prefix::DS, "X509Data");
            let mut x509_certificate = Element::new(ns::DS, ns::prefix::DS, "X509Certificate");
            x509_certificate.set_text(certificate);
            x509_data.push_child(x509_certificate);
            key_info.push_child(x509_data);
            signature.push_child(key_info);
        }

        Ok(signature)
    }
}

fn key_pair_from_pem(pem_data: &[u8]) -> Result<RsaKeyPair> {
    let pem = parse_pem(pem_data, &[PEM_PRIVATE_KEY_TAG, PEM_RSA_PRIVATE_KEY_TAG])?;
    let result = if pem.tag() == PEM_RSA_PRIVATE_KEY_TAG {
        RsaKeyPair::from_der(pem.contents())
    } else {
        RsaKeyPair::from_pkcs8(pem.contents())
    };
    result.map_err(|e| SamlError::Crypto(format!("unusable RSA private key: {e}")))
}

fn parse_pem(data: &[u8], expected_tags: &[&str]) -> Result<pem::Pem> {
    let parsed =
        pem::parse(data).map_err(|e| SamlError::Crypto(format!("invalid PEM data: {e}")))?;
    if !expected_tags.contains(&parsed.tag()) {
        return Err(SamlError::Crypto(format!(
            "unexpected PEM block '{}'",
            parsed.tag()
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_key_pem() {
        let not_a_key = pem::encode(&pem::Pem::new("CERTIFICATE", vec![1, 2, 3]));
        assert!(RsaSha256Signer::from_pem(not_a_key.as_bytes(), None).is_err());
    }

    #[test]
    fn rejects_garbage_pem() {
        assert!(RsaSha256Signer::from_pem(b"not pem at all", None).is_err());
    }
}
