//! Direct serialization of [`Element`] trees.
//!
//! Attribute order and raw values are emitted verbatim. A namespace
//! declaration is generated only for an element whose prefix is not
//! already bound to its namespace, and only when the element does not
//! declare it explicitly, so parsed trees round-trip byte-identically.

use quick_xml::escape::escape;

use super::element::{Element, Node};

pub(super) fn write_element(
    out: &mut String,
    element: &Element,
    bindings: &mut Vec<(Option<String>, String)>,
) {
    let qname = element.qualified_name();
    out.push('<');
    out.push_str(&qname);

    let mut declared = 0;
    for attr in &element.attributes {
        if attr.name == "xmlns" {
            bindings.push((None, attr.value()));
            declared += 1;
        } else if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
            bindings.push((Some(prefix.to_string()), attr.value()));
            declared += 1;
        }
    }

    if let Some(uri) = element.namespace() {
        let bound = bindings
            .iter()
            .rev()
            .find(|(prefix, _)| prefix.as_deref() == element.prefix())
            .map(|(_, uri)| uri.as_str());
        if bound != Some(uri) {
            match element.prefix() {
                Some(prefix) => {
                    out.push_str(" xmlns:");
                    out.push_str(prefix);
                }
                None => out.push_str(" xmlns"),
            }
            out.push_str("=\"");
            out.push_str(&escape(uri));
            out.push('"');
            bindings.push((element.prefix().map(str::to_string), uri.to_string()));
            declared += 1;
        }
    }

    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&attr.value);
        out.push('"');
    }

    if element.self_closing && element.children.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        for child in &element.children {
            match child {
                Node::Element(inner) => write_element(out, inner, bindings),
                Node::Text(raw) => out.push_str(raw),
                Node::CData(raw) => {
                    out.push_str("<![CDATA[");
                    out.push_str(raw);
                    out.push_str("]]>");
                }
                Node::Comment(raw) => {
                    out.push_str("<!--");
                    out.push_str(raw);
                    out.push_str("-->");
                }
            }
        }
        out.push_str("</");
        out.push_str(&qname);
        out.push('>');
    }

    bindings.truncate(bindings.len() - declared);
}

#[cfg(test)]
mod tests {
    use crate::dom::Element;

    #[test]
    fn parsed_tree_round_trips_byte_identically() {
        let xml = concat!(
            r#"<p:Outer xmlns:p="urn:proto" ID="_abc" Version="2.0">"#,
            r#"<p:Inner attr="1&amp;2">text</p:Inner>"#,
            r#"<Plain/><!-- keep --><p:Empty></p:Empty>"#,
            r#"</p:Outer>"#
        );
        let element = Element::parse(xml).unwrap();
        assert_eq!(element.to_string(), xml);
    }

    #[test]
    fn nested_construction_declares_each_namespace_once() {
        let mut outer = Element::new("urn:a", "a", "Outer");
        let mut inner = Element::new("urn:a", "a", "Inner");
        inner.push_child(Element::new("urn:b", "b", "Leaf"));
        outer.push_child(inner);
        assert_eq!(
            outer.to_string(),
            concat!(
                r#"<a:Outer xmlns:a="urn:a">"#,
                r#"<a:Inner><b:Leaf xmlns:b="urn:b"/></a:Inner>"#,
                r#"</a:Outer>"#
            )
        );
    }

    #[test]
    fn shadowed_prefix_is_redeclared() {
        let mut outer = Element::new("urn:one", "x", "Outer");
        outer.push_child(Element::new("urn:two", "x", "Inner"));
        assert_eq!(
            outer.to_string(),
            r#"<x:Outer xmlns:x="urn:one"><x:Inner xmlns:x="urn:two"/></x:Outer>"#
        );
    }

    #[test]
    fn constructed_empty_element_self_closes() {
        let element = Element::new("", "", "a");
        assert_eq!(element.to_string(), "<a/>");
        let parsed = Element::parse("<a></a>").unwrap();
        assert_eq!(parsed.to_string(), "<a></a>");
    }
}
