//! `samlp:AuthnRequest` and its companion elements.

use crate::assertion::{Conditions, Subject};
use crate::context::SamlContext;
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;
use crate::protocol::message::MessageFields;

/// A `samlp:NameIDPolicy`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameIdPolicy {
    format: Option<String>,
    sp_name_qualifier: Option<String>,
    allow_create: bool,
}

impl NameIdPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_sp_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.sp_name_qualifier = Some(qualifier.into());
        self
    }

    pub fn with_allow_create(mut self) -> Self {
        self.allow_create = true;
        self
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn sp_name_qualifier(&self) -> Option<&str> {
        self.sp_name_qualifier.as_deref()
    }

    pub fn allow_create(&self) -> bool {
        self.allow_create
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, "NameIDPolicy")?;
        Ok(Self {
            format: element.attribute("Format"),
            sp_name_qualifier: element.attribute("SPNameQualifier"),
            allow_create: dom::bool_attribute(element, "AllowCreate")?,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, "NameIDPolicy");
        if let Some(format) = &self.format {
            element.set_attribute("Format", format);
        }
        if let Some(qualifier) = &self.sp_name_qualifier {
            element.set_attribute("SPNameQualifier", qualifier);
        }
        if self.allow_create {
            element.set_attribute("AllowCreate", "true");
        }
        element
    }
}

/// A `samlp:RequestedAuthnContext`.
///
/// The schema makes class references and declaration references an
/// exclusive choice; at least one reference must be present.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedAuthnContext {
    comparison: Option<String>,
    class_refs: Vec<String>,
    decl_refs: Vec<String>,
}

impl RequestedAuthnContext {
    pub fn with_class_refs(class_refs: Vec<String>) -> Result<Self> {
        Self::build(None, class_refs, Vec::new())
    }

    pub fn with_decl_refs(decl_refs: Vec<String>) -> Result<Self> {
        Self::build(None, Vec::new(), decl_refs)
    }

    fn build(
        comparison: Option<String>,
        class_refs: Vec<String>,
        decl_refs: Vec<String>,
    ) -> Result<Self> {
        if class_refs.is_empty() && decl_refs.is_empty() {
            return Err(SamlError::MissingElement {
                parent: "samlp:RequestedAuthnContext".to_string(),
                child: "saml:AuthnContextClassRef or saml:AuthnContextDeclRef",
            });
        }
        if !class_refs.is_empty() && !decl_refs.is_empty() {
            return Err(SamlError::ProtocolViolation(
                "RequestedAuthnContext cannot mix class and declaration references".to_string(),
            ));
        }
        Ok(Self {
            comparison,
            class_refs,
            decl_refs,
        })
    }

    pub fn with_comparison(mut self, comparison: impl Into<String>) -> Self {
        self.comparison = Some(comparison.into());
        self
    }

    pub fn comparison(&self) -> Option<&str> {
        self.comparison.as_deref()
    }

    pub fn class_refs(&self) -> &[String] {
        &self.class_refs
    }

    pub fn decl_refs(&self) -> &[String] {
        &self.decl_refs
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, "RequestedAuthnContext")?;
        let mut class_refs = Vec::new();
        let mut decl_refs = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "AuthnContextClassRef") {
                class_refs.push(child.text());
            } else if child.is_named(ns::SAML, "AuthnContextDeclRef") {
                decl_refs.push(child.text());
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "AuthnContextClassRef".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        Self::build(element.attribute("Comparison"), class_refs, decl_refs)
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, "RequestedAuthnContext");
        if let Some(comparison) = &self.comparison {
            element.set_attribute("Comparison", comparison);
        }
        for class_ref in &self.class_refs {
            let mut child = Element::new(ns::SAML, ns::prefix::SAML, "AuthnContextClassRef");
            child.set_text(class_ref);
            element.push_child(child);
        }
        for decl_ref in &self.decl_refs {
            let mut child = Element::new(ns::SAML, ns::prefix::SAML, "AuthnContextDeclRef");
            child.set_text(decl_ref);
            element.push_child(child);
        }
        element
    }
}

/// One `samlp:IDPEntry` of a `samlp:IDPList`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdpEntry {
    provider_id: String,
    name: Option<String>,
    loc: Option<String>,
}

impl IdpEntry {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            name: None,
            loc: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_loc(mut self, loc: impl Into<String>) -> Self {
        self.loc = Some(loc.into());
        self
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn loc(&self) -> Option<&str> {
        self.loc.as_deref()
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, "IDPEntry")?;
        Ok(Self {
            provider_id: dom::require_attribute(element, "ProviderID")?,
            name: element.attribute("Name"),
            loc: element.attribute("Loc"),
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, "IDPEntry");
        element.set_attribute("ProviderID", &self.provider_id);
        if let Some(name) = &self.name {
            element.set_attribute("Name", name);
        }
        if let Some(loc) = &self.loc {
            element.set_attribute("Loc", loc);
        }
        element
    }
}

/// A `samlp:IDPList`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdpList {
    entries: Vec<IdpEntry>,
    get_complete: Option<String>,
}

impl IdpList {
    pub fn new(entries: Vec<IdpEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(SamlError::MissingElement {
                parent: "samlp:IDPList".to_string(),
                child: "samlp:IDPEntry",
            });
        }
        Ok(Self {
            entries,
            get_complete: None,
        })
    }

    pub fn with_get_complete(mut self, uri: impl Into<String>) -> Self {
        self.get_complete = Some(uri.into());
        self
    }

    pub fn entries(&self) -> &[IdpEntry] {
        &self.entries
    }

    pub fn get_complete(&self) -> Option<&str> {
        self.get_complete.as_deref()
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, "IDPList")?;
        let mut entries = Vec::new();
        let mut get_complete = None;
        for child in element.child_elements() {
            if child.is_named(ns::SAMLP, "IDPEntry") {
                entries.push(IdpEntry::from_xml(child)?);
            } else if child.is_named(ns::SAMLP, "GetComplete") {
                get_complete = Some(child.text());
            }
        }
        let mut list = Self::new(entries)?;
        list.get_complete = get_complete;
        Ok(list)
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, "IDPList");
        for entry in &self.entries {
            element.push_child(entry.to_element());
        }
        if let Some(uri) = &self.get_complete {
            let mut child = Element::new(ns::SAMLP, ns::prefix::SAMLP, "GetComplete");
            child.set_text(uri);
            element.push_child(child);
        }
        element
    }
}

/// A `samlp:Scoping`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scoping {
    proxy_count: Option<u32>,
    idp_list: Option<IdpList>,
    requester_ids: Vec<String>,
}

impl Scoping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proxy_count(mut self, count: u32) -> Self {
        self.proxy_count = Some(count);
        self
    }

    pub fn with_idp_list(mut self, list: IdpList) -> Self {
        self.idp_list = Some(list);
        self
    }

    pub fn with_requester_id(mut self, id: impl Into<String>) -> Self {
        self.requester_ids.push(id.into());
        self
    }

    pub fn proxy_count(&self) -> Option<u32> {
        self.proxy_count
    }

    pub fn idp_list(&self) -> Option<&IdpList> {
        self.idp_list.as_ref()
    }

    pub fn requester_ids(&self) -> &[String] {
        &self.requester_ids
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, "Scoping")?;
        let proxy_count = element
            .attribute("ProxyCount")
            .map(|value| {
                value.parse::<u32>().map_err(|_| SamlError::InvalidValue {
                    what: "Scoping ProxyCount",
                    value,
                })
            })
            .transpose()?;
        let mut idp_list = None;
        let mut requester_ids = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::SAMLP, "IDPList") {
                idp_list = Some(IdpList::from_xml(child)?);
            } else if child.is_named(ns::SAMLP, "RequesterID") {
                requester_ids.push(child.text());
            }
        }
        Ok(Self {
            proxy_count,
            idp_list,
            requester_ids,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, "Scoping");
        if let Some(count) = self.proxy_count {
            element.set_attribute("ProxyCount", &count.to_string());
        }
        if let Some(list) = &self.idp_list {
            element.push_child(list.to_element());
        }
        for id in &self.requester_ids {
            let mut child = Element::new(ns::SAMLP, ns::prefix::SAMLP, "RequesterID");
            child.set_text(id);
            element.push_child(child);
        }
        element
    }
}

/// A `samlp:AuthnRequest`.
///
/// `ForceAuthn` and `IsPassive` are omitted on the wire when false,
/// never emitted as `"false"`.
#[derive(Debug, Clone)]
pub struct AuthnRequest {
    fields: MessageFields,
    force_authn: bool,
    is_passive: bool,
    protocol_binding: Option<String>,
    assertion_consumer_service_index: Option<u16>,
    assertion_consumer_service_url: Option<String>,
    attribute_consuming_service_index: Option<u16>,
    provider_name: Option<String>,
    subject: Option<Subject>,
    name_id_policy: Option<NameIdPolicy>,
    conditions: Option<Conditions>,
    requested_authn_context: Option<RequestedAuthnContext>,
    scoping: Option<Scoping>,
}

impl AuthnRequest {
    pub const LOCAL_NAME: &'static str = "AuthnRequest";

    pub fn new(fields: MessageFields) -> Self {
        Self {
            fields,
            force_authn: false,
            is_passive: false,
            protocol_binding: None,
            assertion_consumer_service_index: None,
            assertion_consumer_service_url: None,
            attribute_consuming_service_index: None,
            provider_name: None,
            subject: None,
            name_id_policy: None,
            conditions: None,
            requested_authn_context: None,
            scoping: None,
        }
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut MessageFields {
        &mut self.fields
    }

    pub fn with_force_authn(mut self) -> Self {
        self.force_authn = true;
        self
    }

    pub fn with_is_passive(mut self) -> Self {
        self.is_passive = true;
        self
    }

    pub fn with_protocol_binding(mut self, binding: impl Into<String>) -> Self {
        self.protocol_binding = Some(binding.into());
        self
    }

    pub fn with_assertion_consumer_service_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    pub fn with_assertion_consumer_service_index(mut self, index: u16) -> Self {
        self.assertion_consumer_service_index = Some(index);
        self
    }

    pub fn with_attribute_consuming_service_index(mut self, index: u16) -> Self {
        self.attribute_consuming_service_index = Some(index);
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn with_requested_authn_context(mut self, context: RequestedAuthnContext) -> Self {
        self.requested_authn_context = Some(context);
        self
    }

    pub fn with_scoping(mut self, scoping: Scoping) -> Self {
        self.scoping = Some(scoping);
        self
    }

    pub fn force_authn(&self) -> bool {
        self.force_authn
    }

    pub fn is_passive(&self) -> bool {
        self.is_passive
    }

    pub fn protocol_binding(&self) -> Option<&str> {
        self.protocol_binding.as_deref()
    }

    pub fn assertion_consumer_service_url(&self) -> Option<&str> {
        self.assertion_consumer_service_url.as_deref()
    }

    pub fn assertion_consumer_service_index(&self) -> Option<u16> {
        self.assertion_consumer_service_index
    }

    pub fn attribute_consuming_service_index(&self) -> Option<u16> {
        self.attribute_consuming_service_index
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider_name.as_deref()
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn name_id_policy(&self) -> Option<&NameIdPolicy> {
        self.name_id_policy.as_ref()
    }

    pub fn conditions(&self) -> Option<&Conditions> {
        self.conditions.as_ref()
    }

    pub fn requested_authn_context(&self) -> Option<&RequestedAuthnContext> {
        self.requested_authn_context.as_ref()
    }

    pub fn scoping(&self) -> Option<&Scoping> {
        self.scoping.as_ref()
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, Self::LOCAL_NAME)?;
        let fields = MessageFields::parse(element, ctx)?;

        let mut request = Self::new(fields);
        request.force_authn = dom::bool_attribute(element, "ForceAuthn")?;
        request.is_passive = dom::bool_attribute(element, "IsPassive")?;
        request.protocol_binding = element.attribute("ProtocolBinding");
        request.assertion_consumer_service_index =
            index_attribute(element, "AssertionConsumerServiceIndex")?;
        request.assertion_consumer_service_url =
            element.attribute("AssertionConsumerServiceURL");
        request.attribute_consuming_service_index =
            index_attribute(element, "AttributeConsumingServiceIndex")?;
        request.provider_name = element.attribute("ProviderName");

        for child in element.child_elements() {
            if child.is_named(ns::SAML, "Issuer")
                || child.is_named(ns::DS, "Signature")
                || child.is_named(ns::SAMLP, "Extensions")
            {
                continue;
            }
            if child.is_named(ns::SAML, "Subject") {
                request.subject = Some(Subject::from_xml(child, ctx)?);
            } else if child.is_named(ns::SAMLP, "NameIDPolicy") {
                request.name_id_policy = Some(NameIdPolicy::from_xml(child)?);
            } else if child.is_named(ns::SAML, "Conditions") {
                request.conditions = Some(Conditions::from_xml(child, ctx)?);
            } else if child.is_named(ns::SAMLP, "RequestedAuthnContext") {
                request.requested_authn_context = Some(RequestedAuthnContext::from_xml(child)?);
            } else if child.is_named(ns::SAMLP, "Scoping") {
                request.scoping = Some(Scoping::from_xml(child)?);
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAMLP.to_string(),
                    expected: "AuthnRequest child".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        Ok(request)
    }

    pub fn to_element(&self) -> Result<Element> {
        self.fields.finalize(|| {
            let mut element = self.fields.unsigned_root(Self::LOCAL_NAME, None);
            if self.force_authn {
                element.set_attribute("ForceAuthn", "true");
            }
            if self.is_passive {
                element.set_attribute("IsPassive", "true");
            }
            if let Some(binding) = &self.protocol_binding {
                element.set_attribute("ProtocolBinding", binding);
            }
            if let Some(index) = self.assertion_consumer_service_index {
                element.set_attribute("AssertionConsumerServiceIndex", &index.to_string());
            }
            if let Some(url) = &self.assertion_consumer_service_url {
                element.set_attribute("AssertionConsumerServiceURL", url);
            }
            if let Some(index) = self.attribute_consuming_service_index {
                element.set_attribute("AttributeConsumingServiceIndex", &index.to_string());
            }
            if let Some(name) = &self.provider_name {
                element.set_attribute("ProviderName", name);
            }
            if let Some(subject) = &self.subject {
                element.push_child(subject.to_element());
            }
            if let Some(policy) = &self.name_id_policy {
                element.push_child(policy.to_element());
            }
            if let Some(conditions) = &self.conditions {
                element.push_child(conditions.to_element());
            }
            if let Some(context) = &self.requested_authn_context {
                element.push_child(context.to_element());
            }
            if let Some(scoping) = &self.scoping {
                element.push_child(scoping.to_element());
            }
            Ok(element)
        })
    }
}

fn index_attribute(element: &Element, name: &'static str) -> Result<Option<u16>> {
    element
        .attribute(name)
        .map(|value| {
            value.parse::<u16>().map_err(|_| SamlError::InvalidValue {
                what: "service index",
                value,
            })
        })
        .transpose()
}
