//! `saml:Conditions` and the condition extension point.
//!
//! The schema-defined condition elements (`AudienceRestriction`,
//! `OneTimeUse`, `ProxyRestriction`) appear under their own names and are
//! parsed directly. The generic `<saml:Condition>` element is the
//! extension point: it must carry an `xsi:type`, which is dispatched
//! through the registry, falling back to a verbatim passthrough for
//! types this process does not know.

use chrono::{DateTime, Utc};

use crate::assertion::unknown::UnknownElement;
use crate::context::SamlContext;
use crate::datetime::{self, check_window};
use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;

/// One entry of the condition extension point.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    AudienceRestriction(AudienceRestriction),
    OneTimeUse,
    ProxyRestriction(ProxyRestriction),
    Unknown(UnknownElement),
}

impl Condition {
    /// Parses a generic `<saml:Condition xsi:type="...">` element.
    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "Condition")?;
        let type_value = element
            .attribute_ns(ns::XSI, "type")
            .ok_or_else(|| SamlError::MissingAttribute {
                element: element.qualified_name(),
                attribute: "xsi:type",
            })?;
        let (type_namespace, type_local) = element.resolve_qname(&type_value)?;
        let type_namespace = type_namespace.unwrap_or_default();
        match ctx
            .registry()
            .condition_handler(&type_namespace, &type_local)
        {
            Some(handler) => handler(element, ctx),
            None => Ok(Self::Unknown(UnknownElement::capture(element))),
        }
    }

    pub fn to_element(&self) -> Element {
        match self {
            Self::AudienceRestriction(restriction) => restriction.to_element(),
            Self::OneTimeUse => Element::new(ns::SAML, ns::prefix::SAML, "OneTimeUse"),
            Self::ProxyRestriction(restriction) => restriction.to_element(),
            Self::Unknown(unknown) => unknown.to_element(),
        }
    }
}

/// A `saml:AudienceRestriction`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudienceRestriction {
    audiences: Vec<String>,
}

impl AudienceRestriction {
    pub fn new(audiences: Vec<String>) -> Result<Self> {
        if audiences.is_empty() {
            return Err(SamlError::MissingElement {
                parent: "saml:AudienceRestriction".to_string(),
                child: "saml:Audience",
            });
        }
        Ok(Self { audiences })
    }

    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "AudienceRestriction")?;
        let audiences = element
            .child_elements()
            .filter(|child| child.is_named(ns::SAML, "Audience"))
            .map(Element::text)
            .collect();
        Self::new(audiences)
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "AudienceRestriction");
        for audience in &self.audiences {
            let mut child = Element::new(ns::SAML, ns::prefix::SAML, "Audience");
            child.set_text(audience);
            element.push_child(child);
        }
        element
    }
}

/// A `saml:ProxyRestriction`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyRestriction {
    count: Option<u32>,
    audiences: Vec<String>,
}

impl ProxyRestriction {
    pub fn new(count: Option<u32>, audiences: Vec<String>) -> Self {
        Self { count, audiences }
    }

    pub fn count(&self) -> Option<u32> {
        self.count
    }

    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "ProxyRestriction")?;
        let count = element
            .attribute("Count")
            .map(|value| {
                value.parse::<u32>().map_err(|_| SamlError::InvalidValue {
                    what: "ProxyRestriction Count",
                    value,
                })
            })
            .transpose()?;
        let audiences = element
            .child_elements()
            .filter(|child| child.is_named(ns::SAML, "Audience"))
            .map(Element::text)
            .collect();
        Ok(Self { count, audiences })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "ProxyRestriction");
        if let Some(count) = self.count {
            element.set_attribute("Count", &count.to_string());
        }
        for audience in &self.audiences {
            let mut child = Element::new(ns::SAML, ns::prefix::SAML, "Audience");
            child.set_text(audience);
            element.push_child(child);
        }
        element
    }
}

/// A `saml:Conditions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    not_before: Option<DateTime<Utc>>,
    not_on_or_after: Option<DateTime<Utc>>,
    conditions: Vec<Condition>,
    audience_restrictions: Vec<AudienceRestriction>,
    one_time_use: bool,
    proxy_restriction: Option<ProxyRestriction>,
}

impl Conditions {
    /// When both bounds are present, `not_before` must strictly precede
    /// `not_on_or_after`.
    pub fn new(
        not_before: Option<DateTime<Utc>>,
        not_on_or_after: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        check_window(not_before, not_on_or_after)?;
        Ok(Self {
            not_before,
            not_on_or_after,
            ..Self::default()
        })
    }

    pub fn with_audience_restriction(mut self, restriction: AudienceRestriction) -> Self {
        self.audience_restrictions.push(restriction);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_one_time_use(mut self) -> Self {
        self.one_time_use = true;
        self
    }

    pub fn with_proxy_restriction(mut self, restriction: ProxyRestriction) -> Self {
        self.proxy_restriction = Some(restriction);
        self
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    pub fn not_on_or_after(&self) -> Option<DateTime<Utc>> {
        self.not_on_or_after
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn audience_restrictions(&self) -> &[AudienceRestriction] {
        &self.audience_restrictions
    }

    pub fn one_time_use(&self) -> bool {
        self.one_time_use
    }

    pub fn proxy_restriction(&self) -> Option<&ProxyRestriction> {
        self.proxy_restriction.as_ref()
    }

    pub fn from_xml(element: &Element, ctx: &SamlContext) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "Conditions")?;
        let not_before = element
            .attribute("NotBefore")
            .map(|value| datetime::parse_instant(&value))
            .transpose()?;
        let not_on_or_after = element
            .attribute("NotOnOrAfter")
            .map(|value| datetime::parse_instant(&value))
            .transpose()?;
        check_window(not_before, not_on_or_after)?;

        let mut conditions = Vec::new();
        let mut audience_restrictions = Vec::new();
        let mut one_time_use = false;
        let mut proxy_restriction = None;

        for child in element.child_elements() {
            if child.is_named(ns::SAML, "Condition") {
                conditions.push(Condition::from_xml(child, ctx)?);
            } else if child.is_named(ns::SAML, "AudienceRestriction") {
                audience_restrictions.push(AudienceRestriction::from_xml(child)?);
            } else if child.is_named(ns::SAML, "OneTimeUse") {
                if one_time_use {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:OneTimeUse",
                    });
                }
                one_time_use = true;
            } else if child.is_named(ns::SAML, "ProxyRestriction") {
                if proxy_restriction.is_some() {
                    return Err(SamlError::TooManyElements {
                        parent: element.qualified_name(),
                        child: "saml:ProxyRestriction",
                    });
                }
                proxy_restriction = Some(ProxyRestriction::from_xml(child)?);
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "Condition".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }

        Ok(Self {
            not_before,
            not_on_or_after,
            conditions,
            audience_restrictions,
            one_time_use,
            proxy_restriction,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "Conditions");
        if let Some(not_before) = self.not_before {
            element.set_attribute("NotBefore", &datetime::format_instant(not_before));
        }
        if let Some(not_on_or_after) = self.not_on_or_after {
            element.set_attribute("NotOnOrAfter", &datetime::format_instant(not_on_or_after));
        }
        for condition in &self.conditions {
            element.push_child(condition.to_element());
        }
        for restriction in &self.audience_restrictions {
            element.push_child(restriction.to_element());
        }
        if self.one_time_use {
            element.push_child(Element::new(ns::SAML, ns::prefix::SAML, "OneTimeUse"));
        }
        if let Some(restriction) = &self.proxy_restriction {
            element.push_child(restriction.to_element());
        }
        element
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(value: &str) -> DateTime<Utc> {
        datetime::parse_instant(value).unwrap()
    }

    #[test]
    fn window_must_be_strictly_ordered() {
        let t1 = instant("2020-06-01T12:00:00Z");
        let t2 = instant("2020-06-01T12:05:00Z");
        assert!(Conditions::new(Some(t1), Some(t2)).is_ok());
        assert!(Conditions::new(Some(t2), Some(t1)).is_err());
        assert!(Conditions::new(Some(t1), Some(t1)).is_err());
        assert!(Conditions::new(Some(t1), None).is_ok());
        assert!(Conditions::new(None, None).is_ok());
    }

    #[test]
    fn audience_restriction_needs_an_audience() {
        assert!(AudienceRestriction::new(Vec::new()).is_err());
        let xml = r#"<saml:AudienceRestriction xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"></saml:AudienceRestriction>"#;
        assert!(AudienceRestriction::from_xml(&Element::parse(xml).unwrap()).is_err());
    }

    #[test]
    fn duplicate_singletons_are_rejected() {
        let xml = concat!(
            r#"<saml:Conditions xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">"#,
            r#"<saml:OneTimeUse/><saml:OneTimeUse/>"#,
            r#"</saml:Conditions>"#
        );
        let ctx = SamlContext::new();
        let result = Conditions::from_xml(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(
            result,
            Err(SamlError::TooManyElements { child: "saml:OneTimeUse", .. })
        ));
    }

    #[test]
    fn conditions_round_trip() {
        let xml = concat!(
            r#"<saml:Conditions xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"NotBefore="2014-09-22T13:42:00Z" NotOnOrAfter="2014-09-22T13:47:00Z">"#,
            r#"<saml:AudienceRestriction>"#,
            r#"<saml:Audience>https://sp.example.org/</saml:Audience>"#,
            r#"</saml:AudienceRestriction>"#,
            r#"<saml:OneTimeUse/>"#,
            r#"<saml:ProxyRestriction Count="2">"#,
            r#"<saml:Audience>https://proxy.example.org/</saml:Audience>"#,
            r#"</saml:ProxyRestriction>"#,
            r#"</saml:Conditions>"#
        );
        let ctx = SamlContext::new();
        let parsed = Conditions::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert!(parsed.one_time_use());
        assert_eq!(parsed.proxy_restriction().unwrap().count(), Some(2));
        assert_eq!(parsed.to_element().to_string(), xml);
    }

    #[test]
    fn unknown_condition_type_round_trips_verbatim() {
        let xml = concat!(
            r#"<saml:Condition xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xmlns:x="urn:example:ext" xsi:type="x:UnregisteredType">"#,
            r#"<x:Payload>keep me</x:Payload>"#,
            r#"</saml:Condition>"#
        );
        let ctx = SamlContext::new();
        let parsed = Condition::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        let Condition::Unknown(unknown) = &parsed else {
            panic!("expected unknown condition");
        };
        assert_eq!(
            unknown.xsi_type(),
            Some(("urn:example:ext", "UnregisteredType"))
        );
        assert_eq!(parsed.to_element().to_string(), xml);
    }

    #[test]
    fn condition_without_xsi_type_is_rejected() {
        let xml = r#"<saml:Condition xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"/>"#;
        let ctx = SamlContext::new();
        let result = Condition::from_xml(&Element::parse(xml).unwrap(), &ctx);
        assert!(matches!(
            result,
            Err(SamlError::MissingAttribute { attribute: "xsi:type", .. })
        ));
    }

    #[test]
    fn registered_condition_handler_wins() {
        fn handler(
            _element: &Element,
            _ctx: &SamlContext,
        ) -> crate::error::Result<Condition> {
            Ok(Condition::OneTimeUse)
        }
        let mut ctx = SamlContext::new();
        ctx.registry_mut()
            .register_condition("urn:example:ext", "Known", handler);
        let xml = concat!(
            r#"<saml:Condition xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xmlns:x="urn:example:ext" xsi:type="x:Known"/>"#
        );
        let parsed = Condition::from_xml(&Element::parse(xml).unwrap(), &ctx).unwrap();
        assert_eq!(parsed, Condition::OneTimeUse);
    }
}
