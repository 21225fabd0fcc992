//! SAML 2.0 object model.
//!
//! Typed representations of the elements defined by the SAML 2.0 assertion
//! (`saml:`) and protocol (`samlp:`) schemas. Every element type parses
//! itself from an XML element tree and serializes itself back, preserving
//! the exact bytes of signed or unrecognized content so that signatures
//! stay verifiable across a round trip.
//!
//! The crate carries no transport bindings and no cryptographic math of its
//! own: signing and encryption are delegated to the backends in
//! [`crypto`], which can be replaced by any implementation of the
//! collaborator traits defined there.

pub mod assertion;
pub mod context;
pub mod crypto;
pub mod datetime;
pub mod dom;
pub mod error;
pub mod ns;
pub mod protocol;
pub mod registry;
pub mod schema;

pub use context::SamlContext;
pub use dom::Element;
pub use error::{Result, SamlError};
