//! Reference XML-encryption backends.
//!
//! Data encryption is AES-CBC with the IV prefixed to the ciphertext,
//! key transport is RSA-OAEP, matching what SAML deployments commonly
//! emit. The encryptor produces a complete `xenc:EncryptedData` subtree;
//! the decryptor reads one back, supporting the three AES-CBC key sizes
//! and both RSA key-transport paddings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::Padding;
use openssl::symm::Cipher;
use rand::RngCore;

use super::{DecryptionBackend, EncryptionBackend};
use crate::dom::Element;
use crate::error::{Result, SamlError};
use crate::ns;

const IV_LEN: usize = 16;

/// Encrypts to `xenc:EncryptedData` with a fresh AES-128-CBC session key
/// transported under RSA-OAEP.
pub struct AesCbcEncryptor {
    public_key: PKey<Public>,
}

impl AesCbcEncryptor {
    pub fn from_public_key_pem(pem_data: &[u8]) -> Result<Self> {
        let public_key = PKey::public_key_from_pem(pem_data)?;
        Ok(Self { public_key })
    }

    /// Reads the public key out of an X.509 certificate.
    pub fn from_certificate_pem(pem_data: &[u8]) -> Result<Self> {
        let certificate = openssl::x509::X509::from_pem(pem_data)?;
        Ok(Self {
            public_key: certificate.public_key()?,
        })
    }
}

impl EncryptionBackend for AesCbcEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Element> {
        let mut session_key = [0u8; 16];
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut session_key);
        rand::rng().fill_bytes(&mut iv);

        let ciphertext =
            openssl::symm::encrypt(Cipher::aes_128_cbc(), &session_key, Some(&iv), plaintext)?;
        let mut payload = Vec::with_capacity(IV_LEN + ciphertext.len());
        payload.extend_from_slice(&iv);
        payload.extend_from_slice(&ciphertext);

        let rsa = self.public_key.rsa()?;
        let mut wrapped_key = vec![0u8; rsa.size() as usize];
        let wrapped_len =
            rsa.public_encrypt(&session_key, &mut wrapped_key, Padding::PKCS1_OAEP)?;
        wrapped_key.truncate(wrapped_len);

        Ok(build_encrypted_data(
            ns::alg::AES128_CBC,
            &BASE64.encode(&payload),
            &BASE64.encode(&wrapped_key),
        ))
    }
}

/// Decrypts `xenc:EncryptedData` produced by [`AesCbcEncryptor`] or a
/// compatible implementation.
pub struct AesCbcDecryptor {
    private_key: PKey<Private>,
}

impl AesCbcDecryptor {
    pub fn from_private_key_pem(pem_data: &[u8]) -> Result<Self> {
        let private_key = PKey::private_key_from_pem(pem_data)?;
        Ok(Self { private_key })
    }
}

impl DecryptionBackend for AesCbcDecryptor {
    fn decrypt(&self, encrypted_data: &Element) -> Result<Vec<u8>> {
        let cipher = data_cipher(encrypted_data)?;
        let session_key = self.unwrap_session_key(encrypted_data)?;

        let payload = BASE64.decode(cipher_value(encrypted_data)?.as_bytes())?;
        if payload.len() <= IV_LEN {
            return Err(SamlError::Crypto("encrypted payload too short".to_string()));
        }
        let (iv, ciphertext) = payload.split_at(IV_LEN);
        if session_key.len() < cipher.key_len() {
            return Err(SamlError::Crypto("session key too short".to_string()));
        }
        let plaintext = openssl::symm::decrypt(
            cipher,
            &session_key[..cipher.key_len()],
            Some(iv),
            ciphertext,
        )?;
        Ok(plaintext)
    }
}

impl AesCbcDecryptor {
    fn unwrap_session_key(&self, encrypted_data: &Element) -> Result<Vec<u8>> {
        let encrypted_key = encrypted_data
            .first_child(ns::DS, "KeyInfo")
            .and_then(|key_info| key_info.first_child(ns::XENC, "EncryptedKey"))
            .ok_or_else(|| missing(encrypted_data, "xenc:EncryptedKey"))?;

        let padding = match algorithm(encrypted_key)?.as_str() {
            ns::alg::RSA_OAEP_MGF1P => Padding::PKCS1_OAEP,
            ns::alg::RSA_1_5 => Padding::PKCS1,
            other => {
                return Err(SamlError::Crypto(format!(
                    "unsupported key transport algorithm: {other}"
                )));
            }
        };

        let wrapped = BASE64.decode(cipher_value(encrypted_key)?.as_bytes())?;
        let rsa = self.private_key.rsa()?;
        let mut session_key = vec![0u8; rsa.size() as usize];
        let len = rsa.private_decrypt(&wrapped, &mut session_key, padding)?;
        session_key.truncate(len);
        Ok(session_key)
    }
}

fn build_encrypted_data(algorithm: &str, cipher_b64: &str, wrapped_key_b64: &str) -> Element {
    let mut encrypted_data = Element::new(ns::XENC, ns::prefix::XENC, "EncryptedData");
    encrypted_data.set_attribute("Type", ns::alg::XMLENC_ELEMENT);

    let mut method = Element::new(ns::XENC, ns::prefix::XENC, "EncryptionMethod");
    method.set_attribute("Algorithm", algorithm);
    encrypted_data.push_child(method);

    let mut key_info = Element::new(ns::DS, ns::prefix::DS, "KeyInfo");
    let mut encrypted_key = Element::new(ns::XENC, ns::prefix::XENC, "EncryptedKey");
    let mut key_method = Element::new(ns::XENC, ns::prefix::XENC, "EncryptionMethod");
    key_method.set_attribute("Algorithm", ns::alg::RSA_OAEP_MGF1P);
    encrypted_key.push_child(key_method);
    encrypted_key.push_child(cipher_data(wrapped_key_b64));
    key_info.push_child(encrypted_key);
    encrypted_data.push_child(key_info);

    encrypted_data.push_child(cipher_data(cipher_b64));
    encrypted_data
}

fn cipher_data(value_b64: &str) -> Element {
    let mut cipher_data = Element::new(ns::XENC, ns::prefix::XENC, "CipherData");
    let mut cipher_value = Element::new(ns::XENC, ns::prefix::XENC, "CipherValue");
    cipher_value.set_text(value_b64);
    cipher_data.push_child(cipher_value);
    cipher_data
}

fn data_cipher(encrypted_data: &Element) -> Result<Cipher> {
    match algorithm(encrypted_data)?.as_str() {
        ns::alg::AES128_CBC => Ok(Cipher::aes_128_cbc()),
        ns::alg::AES192_CBC => Ok(Cipher::aes_192_cbc()),
        ns::alg::AES256_CBC => Ok(Cipher::aes_256_cbc()),
        other => Err(SamlError::Crypto(format!(
            "unsupported data encryption algorithm: {other}"
        ))),
    }
}

fn algorithm(parent: &Element) -> Result<String> {
    parent
        .first_child(ns::XENC, "EncryptionMethod")
        .and_then(|method| method.attribute("Algorithm"))
        .ok_or_else(|| missing(parent, "xenc:EncryptionMethod"))
}

fn cipher_value(parent: &Element) -> Result<String> {
    parent
        .first_child(ns::XENC, "CipherData")
        .and_then(|data| data.first_child(ns::XENC, "CipherValue"))
        .map(|value| value.text())
        .ok_or_else(|| missing(parent, "xenc:CipherValue"))
}

fn missing(parent: &Element, what: &str) -> SamlError {
    SamlError::Crypto(format!(
        "<{}> lacks a {what} element",
        parent.qualified_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_pair() -> (Vec<u8>, Vec<u8>) {
        let rsa = openssl::rsa::Rsa::generate(2048).unwrap();
        let key = PKey::from_rsa(rsa).unwrap();
        (
            key.private_key_to_pem_pkcs8().unwrap(),
            key.public_key_to_pem().unwrap(),
        )
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let (private_pem, public_pem) = key_pair();
        let encryptor = AesCbcEncryptor::from_public_key_pem(&public_pem).unwrap();
        let decryptor = AesCbcDecryptor::from_private_key_pem(&private_pem).unwrap();

        let plaintext = br#"<saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">someone</saml:NameID>"#;
        let encrypted = encryptor.encrypt(plaintext).unwrap();
        assert!(encrypted.is_named(ns::XENC, "EncryptedData"));

        let recovered = decryptor.decrypt(&encrypted).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn decrypt_rejects_unknown_algorithm() {
        let (private_pem, public_pem) = key_pair();
        let encryptor = AesCbcEncryptor::from_public_key_pem(&public_pem).unwrap();
        let decryptor = AesCbcDecryptor::from_private_key_pem(&private_pem).unwrap();

        let encrypted = encryptor.encrypt(b"<x/>").unwrap();
        let tampered = encrypted
            .to_string()
            .replace(ns::alg::AES128_CBC, "urn:example:not-a-cipher");
        let tampered = Element::parse(&tampered).unwrap();

        assert!(decryptor.decrypt(&tampered).is_err());
    }
}
