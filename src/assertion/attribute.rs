//! `saml:Attribute` and its values.

use crate::dom::{self, Element};
use crate::error::{Result, SamlError};
use crate::ns;

/// A single attribute value element.
///
/// Values are retained as raw subtrees: an `AttributeValue` may carry an
/// `xsi:type`, `xsi:nil`, or arbitrary structured content, all of which
/// must survive a round trip untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    element: Element,
}

impl AttributeValue {
    /// Builds a plain `xs:string` value the way SAML producers
    /// conventionally emit one.
    pub fn string(value: &str) -> Self {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "AttributeValue");
        element.set_attribute(&format!("xmlns:{}", ns::prefix::XS), ns::XS);
        element.set_attribute(&format!("xmlns:{}", ns::prefix::XSI), ns::XSI);
        element.set_attribute(&format!("{}:type", ns::prefix::XSI), "xs:string");
        element.set_text(value);
        Self { element }
    }

    pub fn from_element(element: &Element) -> Self {
        Self {
            element: element.clone(),
        }
    }

    /// The character content of the value.
    pub fn text(&self) -> String {
        self.element.text()
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn to_element(&self) -> Element {
        self.element.clone()
    }
}

/// A `saml:Attribute`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    name_format: Option<String>,
    friendly_name: Option<String>,
    values: Vec<AttributeValue>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_format: None,
            friendly_name: None,
            values: Vec::new(),
        }
    }

    pub fn with_name_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }

    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    pub fn with_value(mut self, value: AttributeValue) -> Self {
        self.values.push(value);
        self
    }

    pub fn with_string_value(self, value: &str) -> Self {
        self.with_value(AttributeValue::string(value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_format(&self) -> Option<&str> {
        self.name_format.as_deref()
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref()
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAML, "Attribute")?;
        let name = dom::require_attribute(element, "Name")?;
        let mut values = Vec::new();
        for child in element.child_elements() {
            if child.is_named(ns::SAML, "AttributeValue") {
                values.push(AttributeValue::from_element(child));
            } else {
                return Err(SamlError::UnexpectedElement {
                    expected_ns: ns::SAML.to_string(),
                    expected: "AttributeValue".to_string(),
                    found_ns: child.namespace().unwrap_or_default().to_string(),
                    found: child.local_name().to_string(),
                });
            }
        }
        Ok(Self {
            name,
            name_format: element.attribute("NameFormat"),
            friendly_name: element.attribute("FriendlyName"),
            values,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAML, ns::prefix::SAML, "Attribute");
        element.set_attribute("Name", &self.name);
        if let Some(format) = &self.name_format {
            element.set_attribute("NameFormat", format);
        }
        if let Some(name) = &self.friendly_name {
            element.set_attribute("FriendlyName", name);
        }
        for value in &self.values {
            element.push_child(value.to_element());
        }
        element
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_requires_name() {
        let xml = r#"<saml:Attribute xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"/>"#;
        let result = Attribute::from_xml(&Element::parse(xml).unwrap());
        assert!(matches!(
            result,
            Err(SamlError::MissingAttribute { attribute: "Name", .. })
        ));
    }

    #[test]
    fn typed_values_round_trip_raw() {
        let xml = concat!(
            r#"<saml:Attribute xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
            r#"Name="urn:oid:2.5.4.4" "#,
            r#"NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:uri" "#,
            r#"FriendlyName="sn">"#,
            r#"<saml:AttributeValue xmlns:xs="http://www.w3.org/2001/XMLSchema" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xsi:type="xs:string">Jensen</saml:AttributeValue>"#,
            r#"</saml:Attribute>"#
        );
        let parsed = Attribute::from_xml(&Element::parse(xml).unwrap()).unwrap();
        assert_eq!(parsed.name(), "urn:oid:2.5.4.4");
        assert_eq!(parsed.values()[0].text(), "Jensen");
        assert_eq!(parsed.to_element().to_string(), xml);
    }

    #[test]
    fn built_string_value_carries_xs_type() {
        let attribute = Attribute::new("mail").with_string_value("user@example.com");
        let xml = attribute.to_element().to_string();
        assert!(xml.contains(r#"xsi:type="xs:string""#));
        assert!(xml.contains("user@example.com"));
    }
}
