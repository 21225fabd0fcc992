//! The `samlp:` protocol object model.

mod artifact;
mod authn_request;
mod extensions;
mod factory;
mod logout;
mod message;
mod name_id_mapping;
mod queries;
mod response;
mod status;

pub use artifact::{ArtifactResolve, ArtifactResponse};
pub use authn_request::{
    AuthnRequest, IdpEntry, IdpList, NameIdPolicy, RequestedAuthnContext, Scoping,
};
pub use extensions::Extensions;
pub use factory::{Message, MessageFactory};
pub use logout::{LogoutRequest, LogoutResponse};
pub use message::{MessageFields, StatusResponseFields};
pub use name_id_mapping::{
    ManageNameIdChange, ManageNameIdRequest, ManageNameIdResponse, MappedIdentifier,
    NameIdMappingRequest, NameIdMappingResponse,
};
pub use queries::{
    Action, AssertionIdRequest, AttributeQuery, AuthnQuery, AuthzDecisionQuery, Evidence,
};
pub use response::{Response, ResponseAssertion};
pub use status::{Status, StatusCode};
