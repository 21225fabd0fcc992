use crate::dom::Element;
use crate::ns;

/// Passthrough wrapper for an element carrying an unrecognized
/// `xsi:type`.
///
/// The original tree is retained and re-emitted verbatim, so documents
/// using extension types this process has no handler for still round-trip
/// intact.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownElement {
    element: Element,
    xsi_type: Option<(String, String)>,
}

impl UnknownElement {
    pub(crate) fn capture(element: &Element) -> Self {
        let xsi_type = element
            .attribute_ns(ns::XSI, "type")
            .and_then(|value| element.resolve_qname(&value).ok())
            .map(|(namespace, local)| (namespace.unwrap_or_default(), local));
        Self {
            element: element.clone(),
            xsi_type,
        }
    }

    /// The retained element, exactly as parsed.
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// The resolved `xsi:type` name, when one was present.
    pub fn xsi_type(&self) -> Option<(&str, &str)> {
        self.xsi_type
            .as_ref()
            .map(|(namespace, local)| (namespace.as_str(), local.as_str()))
    }

    pub fn to_element(&self) -> Element {
        self.element.clone()
    }
}
