use std::fmt;

use quick_xml::escape::{escape, partial_escape, unescape};

use crate::error::{Result, SamlError};

/// An attribute as it appears on an element.
///
/// `value` is kept in its raw (escaped) wire form so a parsed attribute
/// re-serializes byte-identically.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub(crate) name: String,
    pub(crate) value: String,
}

impl Attribute {
    /// The qualified name as written, e.g. `xsi:type`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// The unescaped attribute value.
    pub fn value(&self) -> String {
        unescape_or_raw(&self.value)
    }

    /// The raw wire form of the value.
    pub fn raw_value(&self) -> &str {
        &self.value
    }

    /// Whether this attribute is an `xmlns` / `xmlns:*` declaration.
    pub fn is_namespace_declaration(&self) -> bool {
        self.name == "xmlns" || self.name.starts_with("xmlns:")
    }
}

/// One node in an element's child list.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Character data, raw (escaped) wire form.
    Text(String),
    /// CDATA section content, verbatim.
    CData(String),
    /// Comment content, verbatim.
    Comment(String),
}

/// An XML element with its resolved namespace and ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub(crate) prefix: Option<String>,
    pub(crate) local: String,
    pub(crate) namespace: Option<String>,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) children: Vec<Node>,
    /// Namespace bindings in scope at this element when it was parsed,
    /// in document order; later entries shadow earlier ones.
    pub(crate) scope: Vec<(Option<String>, String)>,
    pub(crate) self_closing: bool,
}

impl Element {
    /// Creates an element for programmatic construction.
    ///
    /// An empty `prefix` produces an unprefixed element. The namespace is
    /// declared automatically at serialization time when not already in
    /// scope.
    pub fn new(namespace: &str, prefix: &str, local: &str) -> Self {
        Self {
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
            local: local.to_string(),
            namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
            attributes: Vec::new(),
            children: Vec::new(),
            scope: Vec::new(),
            self_closing: true,
        }
    }

    /// Parses a document and returns its root element.
    pub fn parse(xml: &str) -> Result<Element> {
        super::parse::parse(xml)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The tag name as written, e.g. `saml:Assertion`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }

    pub fn is_named(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == Some(namespace)
    }

    /// Sets an attribute, replacing any existing attribute of that name.
    /// The value is escaped on entry.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let escaped = escape(value).into_owned();
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.name == name) {
            existing.value = escaped;
        } else {
            self.attributes.push(Attribute {
                name: name.to_string(),
                value: escaped,
            });
        }
    }

    /// Looks up an attribute by its name as written and unescapes it.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value())
    }

    /// Looks up an attribute by resolved namespace and local name.
    pub fn attribute_ns(&self, namespace: &str, local: &str) -> Option<String> {
        self.attributes.iter().find_map(|a| {
            if a.local_name() != local || a.is_namespace_declaration() {
                return None;
            }
            // Unprefixed attributes are never in a namespace.
            let prefix = a.prefix()?;
            (self.resolve_prefix(Some(prefix)).as_deref() == Some(namespace))
                .then(|| a.value())
        })
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn push_child(&mut self, element: Element) {
        self.self_closing = false;
        self.children.push(Node::Element(element));
    }

    pub fn push_node(&mut self, node: Node) {
        self.self_closing = false;
        self.children.push(node);
    }

    /// Appends character data, escaping it on entry.
    pub fn push_text(&mut self, text: &str) {
        self.self_closing = false;
        self.children
            .push(Node::Text(partial_escape(text).into_owned()));
    }

    /// Replaces all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        self.push_text(text);
    }

    /// Concatenated, unescaped character data of the direct children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(raw) => out.push_str(&unescape_or_raw(raw)),
                Node::CData(raw) => out.push_str(raw),
                _ => {}
            }
        }
        out
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn first_child(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is_named(namespace, local))
    }

    /// Inserts a child element at `index` among all child nodes.
    pub fn insert_child(&mut self, index: usize, element: Element) {
        self.self_closing = false;
        self.children.insert(index, Node::Element(element));
    }

    /// Resolves a namespace prefix against this element's own declarations
    /// and, for parsed elements, the bindings that were in scope.
    pub fn resolve_prefix(&self, prefix: Option<&str>) -> Option<String> {
        if prefix == Some("xml") {
            return Some("http://www.w3.org/XML/1998/namespace".to_string());
        }
        let own = self.attributes.iter().rev().find_map(|a| match prefix {
            Some(p) => (a.name.strip_prefix("xmlns:") == Some(p)).then(|| a.value()),
            None => (a.name == "xmlns").then(|| a.value()),
        });
        let uri = own.or_else(|| {
            self.scope
                .iter()
                .rev()
                .find(|(bound, _)| bound.as_deref() == prefix)
                .map(|(_, uri)| uri.clone())
        })?;
        (!uri.is_empty()).then_some(uri)
    }

    /// Resolves a QName-valued string (e.g. an `xsi:type` value) to a
    /// namespace/local-name pair using the in-scope bindings.
    pub fn resolve_qname(&self, value: &str) -> Result<(Option<String>, String)> {
        match value.split_once(':') {
            Some((prefix, local)) => {
                let uri = self
                    .resolve_prefix(Some(prefix))
                    .ok_or_else(|| SamlError::InvalidValue {
                        what: "QName",
                        value: value.to_string(),
                    })?;
                Ok((Some(uri), local.to_string()))
            }
            None => Ok((self.resolve_prefix(None), value.to_string())),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let mut bindings = Vec::new();
        super::serialize::write_element(&mut out, self, &mut bindings);
        f.write_str(&out)
    }
}

pub(crate) fn unescape_or_raw(raw: &str) -> String {
    unescape(raw)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructed_element_escapes_values() {
        let mut element = Element::new("urn:example", "ex", "Thing");
        element.set_attribute("Name", "a<b&c");
        element.set_text("x < y");
        let xml = element.to_string();
        assert_eq!(
            xml,
            r#"<ex:Thing xmlns:ex="urn:example" Name="a&lt;b&amp;c">x &lt; y</ex:Thing>"#
        );
    }

    #[test]
    fn attribute_ns_resolves_prefixes() {
        let element = Element::parse(
            r#"<a xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="x:T"/>"#,
        )
        .unwrap();
        assert_eq!(
            element.attribute_ns("http://www.w3.org/2001/XMLSchema-instance", "type"),
            Some("x:T".to_string())
        );
        assert_eq!(element.attribute_ns("urn:other", "type"), None);
    }

    #[test]
    fn qname_resolution_uses_scope() {
        let root = Element::parse(
            r#"<a xmlns:m="urn:mine"><b attr="m:Custom"/></a>"#,
        )
        .unwrap();
        let child = root.child_elements().next().unwrap();
        let (ns, local) = child.resolve_qname("m:Custom").unwrap();
        assert_eq!(ns.as_deref(), Some("urn:mine"));
        assert_eq!(local, "Custom");
        assert!(child.resolve_qname("nope:Custom").is_err());
    }
}
