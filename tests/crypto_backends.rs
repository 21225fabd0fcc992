//! End-to-end exercises of the reference crypto backends against the
//! object model: sign-then-reparse and encrypt-then-decrypt flows.

use std::sync::Arc;

use openssl::pkey::PKey;
use openssl::rsa::Rsa;

use saml2_objects::SamlContext;
use saml2_objects::assertion::{
    Assertion, AuthnContext, AuthnStatement, EncryptedAssertion, EncryptedId, Identifier,
    Issuer, NameId, Statement, Subject,
};
use saml2_objects::crypto::{AesCbcDecryptor, AesCbcEncryptor, RsaSha256Signer};
use saml2_objects::datetime::parse_instant;
use saml2_objects::dom::Element;
use saml2_objects::ns;
use saml2_objects::protocol::{LogoutRequest, Message, MessageFields};

struct TestKeys {
    private_pem: Vec<u8>,
    public_pem: Vec<u8>,
}

fn test_keys() -> TestKeys {
    let rsa = Rsa::generate(2048).unwrap();
    let key = PKey::from_rsa(rsa).unwrap();
    TestKeys {
        private_pem: key.private_key_to_pem_pkcs8().unwrap(),
        public_pem: key.public_key_to_pem().unwrap(),
    }
}

fn sample_assertion() -> Assertion {
    let issuer = Issuer::new("https://idp.example.org/").unwrap();
    let instant = parse_instant("2014-09-22T13:42:05Z").unwrap();
    let subject = Subject::from_identifier(Identifier::NameId(NameId::new("someone")));
    let statement = Statement::Authn(AuthnStatement::new(
        AuthnContext::class_ref("urn:oasis:names:tc:SAML:2.0:ac:classes:Password"),
        instant,
    ));
    Assertion::new(issuer, instant, Some(subject), vec![statement]).unwrap()
}

#[test]
fn signed_logout_request_carries_signature_after_issuer() {
    let keys = test_keys();
    let signer = RsaSha256Signer::from_pem(&keys.private_pem, None).unwrap();

    let fields = MessageFields::new(parse_instant("2014-09-22T13:42:00Z").unwrap())
        .with_issuer(Issuer::new("https://sp.example.org/").unwrap());
    let mut request = LogoutRequest::new(fields, Identifier::NameId(NameId::new("someone")));
    request.fields_mut().set_signer(Arc::new(signer));

    let element = request.to_element().unwrap();
    let children: Vec<_> = element
        .child_elements()
        .map(|child| child.local_name().to_string())
        .collect();
    assert_eq!(children, ["Issuer", "Signature", "NameID"]);

    let signature = element.first_child(ns::DS, "Signature").unwrap();
    assert!(signature.first_child(ns::DS, "SignedInfo").is_some());
    assert!(signature.first_child(ns::DS, "SignatureValue").is_some());

    // a reparse of the signed bytes is in the parsed-signed state and
    // reproduces them verbatim
    let ctx = SamlContext::new();
    let wire = element.to_string();
    let reparsed = Message::from_xml(&Element::parse(&wire).unwrap(), &ctx).unwrap();
    assert!(reparsed.fields().was_signed());
    assert_eq!(reparsed.to_element().unwrap().to_string(), wire);
}

#[test]
fn assertion_encrypts_and_decrypts() {
    let keys = test_keys();
    let encryptor = AesCbcEncryptor::from_public_key_pem(&keys.public_pem).unwrap();
    let decryptor = AesCbcDecryptor::from_private_key_pem(&keys.private_pem).unwrap();
    let ctx = SamlContext::new();

    let assertion = sample_assertion();
    let encrypted = EncryptedAssertion::encrypt(&assertion, &encryptor).unwrap();

    // the ciphertext envelope round-trips as XML
    let wire = encrypted.to_element().to_string();
    let reparsed = EncryptedAssertion::from_xml(&Element::parse(&wire).unwrap()).unwrap();

    let decrypted = reparsed.decrypt(&decryptor, &ctx).unwrap();
    assert_eq!(decrypted.id(), assertion.id());
    assert_eq!(decrypted.issuer().value(), "https://idp.example.org/");
    assert_eq!(decrypted.authn_statements().count(), 1);
}

#[test]
fn encrypted_id_round_trips_through_subject() {
    let keys = test_keys();
    let encryptor = AesCbcEncryptor::from_public_key_pem(&keys.public_pem).unwrap();
    let decryptor = AesCbcDecryptor::from_private_key_pem(&keys.private_pem).unwrap();
    let ctx = SamlContext::new();

    let name_id = NameId::persistent("aaf23196-1773-2113-474a-fe114412ab72").unwrap();
    let encrypted = EncryptedId::encrypt(&name_id.to_element(), &encryptor).unwrap();
    let subject = Subject::from_identifier(Identifier::Encrypted(encrypted));

    let wire = subject.to_element().to_string();
    let reparsed = Subject::from_xml(&Element::parse(&wire).unwrap(), &ctx).unwrap();
    let Some(Identifier::Encrypted(encrypted)) = reparsed.identifier() else {
        panic!("expected an encrypted identifier");
    };

    let recovered = encrypted.decrypt(&decryptor, &ctx).unwrap();
    let recovered = recovered.as_name_id().expect("NameID expected");
    assert_eq!(recovered.value(), "aaf23196-1773-2113-474a-fe114412ab72");
    assert_eq!(recovered.format(), Some(ns::format::PERSISTENT));
}

#[test]
fn wrong_key_fails_decryption() {
    let keys = test_keys();
    let other = test_keys();
    let encryptor = AesCbcEncryptor::from_public_key_pem(&keys.public_pem).unwrap();
    let decryptor = AesCbcDecryptor::from_private_key_pem(&other.private_pem).unwrap();
    let ctx = SamlContext::new();

    let encrypted = EncryptedAssertion::encrypt(&sample_assertion(), &encryptor).unwrap();
    assert!(encrypted.decrypt(&decryptor, &ctx).is_err());
}
