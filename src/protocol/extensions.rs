//! `samlp:Extensions`: an ordered list of opaque foreign elements.

use crate::dom::{self, Element};
use crate::error::Result;
use crate::ns;

/// Extension content is never interpreted, only retained and re-emitted
/// in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extensions {
    children: Vec<Element>,
}

impl Extensions {
    pub fn new(children: Vec<Element>) -> Self {
        Self { children }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn from_xml(element: &Element) -> Result<Self> {
        dom::expect_element(element, ns::SAMLP, "Extensions")?;
        Ok(Self {
            children: element.child_elements().cloned().collect(),
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = Element::new(ns::SAMLP, ns::prefix::SAMLP, "Extensions");
        for child in &self.children {
            element.push_child(child.clone());
        }
        element
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_elements_round_trip_in_order() {
        let xml = concat!(
            r#"<samlp:Extensions xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol">"#,
            r#"<a:First xmlns:a="urn:example:a">1</a:First>"#,
            r#"<b:Second xmlns:b="urn:example:b" flag="true"/>"#,
            r#"</samlp:Extensions>"#
        );
        let parsed = Extensions::from_xml(&Element::parse(xml).unwrap()).unwrap();
        assert_eq!(parsed.children().len(), 2);
        assert_eq!(parsed.to_element().to_string(), xml);
    }
}
