//! Extension-point dispatch registry.
//!
//! `<saml:BaseID>` and `<saml:Condition>` are the two elements the schema
//! designs for third-party subtyping via `xsi:type`. The registry maps a
//! resolved type name (namespace URI plus local name) to a parse handler
//! producing the corresponding closed enum, so registered extensions get
//! typed parsing while everything else falls back to a raw passthrough
//! wrapper. The handler signatures make it impossible to register a
//! handler for the wrong extension point.

use std::collections::HashMap;

use crate::assertion::{BaseIdentifier, Condition};
use crate::context::SamlContext;
use crate::dom::Element;
use crate::error::Result;

pub type ConditionHandler = fn(&Element, &SamlContext) -> Result<Condition>;
pub type IdentifierHandler = fn(&Element, &SamlContext) -> Result<BaseIdentifier>;

#[derive(Default)]
pub struct ExtensionRegistry {
    conditions: HashMap<(String, String), ConditionHandler>,
    identifiers: HashMap<(String, String), IdentifierHandler>,
}

impl ExtensionRegistry {
    pub fn register_condition(
        &mut self,
        namespace: &str,
        local: &str,
        handler: ConditionHandler,
    ) {
        self.conditions
            .insert((namespace.to_string(), local.to_string()), handler);
    }

    pub fn register_identifier(
        &mut self,
        namespace: &str,
        local: &str,
        handler: IdentifierHandler,
    ) {
        self.identifiers
            .insert((namespace.to_string(), local.to_string()), handler);
    }

    pub fn condition_handler(&self, namespace: &str, local: &str) -> Option<ConditionHandler> {
        self.conditions
            .get(&(namespace.to_string(), local.to_string()))
            .copied()
    }

    pub fn identifier_handler(&self, namespace: &str, local: &str) -> Option<IdentifierHandler> {
        self.identifiers
            .get(&(namespace.to_string(), local.to_string()))
            .copied()
    }
}
