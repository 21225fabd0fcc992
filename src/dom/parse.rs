//! Event-loop parser building [`Element`] trees from documents.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::element::{Attribute, Element, Node, unescape_or_raw};
use crate::error::{Result, SamlError};

pub(super) fn parse(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut bindings: Vec<(Option<String>, String)> = Vec::new();
    let mut stack: Vec<(Element, usize)> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let opened = open_element(&start, &mut bindings, false)?;
                stack.push(opened);
            }
            Event::Empty(start) => {
                let (element, declared) = open_element(&start, &mut bindings, true)?;
                bindings.truncate(bindings.len() - declared);
                attach(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let (element, declared) = stack
                    .pop()
                    .ok_or_else(|| SamlError::Xml("unbalanced end tag".to_string()))?;
                bindings.truncate(bindings.len() - declared);
                attach(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                if let Some((parent, _)) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::Text(String::from_utf8_lossy(&text).into_owned()));
                }
            }
            Event::CData(cdata) => {
                if let Some((parent, _)) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::CData(String::from_utf8_lossy(&cdata).into_owned()));
                }
            }
            Event::Comment(comment) => {
                if let Some((parent, _)) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
            }
            Event::Eof => break,
            // declarations, processing instructions, doctypes
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SamlError::Xml("unclosed element".to_string()));
    }
    root.ok_or_else(|| SamlError::Xml("document contains no element".to_string()))
}

/// Builds an element from a start tag, pushing its namespace declarations
/// onto the binding stack. Returns the element and how many bindings it
/// declared.
fn open_element(
    start: &BytesStart<'_>,
    bindings: &mut Vec<(Option<String>, String)>,
    self_closing: bool,
) -> Result<(Element, usize)> {
    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| SamlError::Xml(e.to_string()))?
        .to_string();

    let mut attributes = Vec::new();
    let mut declared = 0;
    for attr in start.attributes() {
        let attr = attr?;
        let name = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| SamlError::Xml(e.to_string()))?
            .to_string();
        let value = String::from_utf8_lossy(&attr.value).into_owned();

        if name == "xmlns" {
            bindings.push((None, unescape_or_raw(&value)));
            declared += 1;
        } else if let Some(prefix) = name.strip_prefix("xmlns:") {
            bindings.push((Some(prefix.to_string()), unescape_or_raw(&value)));
            declared += 1;
        }
        attributes.push(Attribute { name, value });
    }

    let (prefix, local) = match raw_name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, raw_name),
    };
    let namespace = resolve(bindings, prefix.as_deref());

    let element = Element {
        prefix,
        local,
        namespace,
        attributes,
        children: Vec::new(),
        scope: bindings.clone(),
        self_closing,
    };
    Ok((element, declared))
}

fn resolve(bindings: &[(Option<String>, String)], prefix: Option<&str>) -> Option<String> {
    let uri = bindings
        .iter()
        .rev()
        .find(|(bound, _)| bound.as_deref() == prefix)
        .map(|(_, uri)| uri.clone())?;
    (!uri.is_empty()).then_some(uri)
}

fn attach(
    element: Element,
    stack: &mut Vec<(Element, usize)>,
    root: &mut Option<Element>,
) -> Result<()> {
    if let Some((parent, _)) = stack.last_mut() {
        parent.children.push(Node::Element(element));
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(SamlError::Xml("multiple root elements".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_namespaces_through_nesting() {
        let root = Element::parse(
            r#"<p:Outer xmlns:p="urn:proto" xmlns="urn:plain"><Inner/><p:Other/></p:Outer>"#,
        )
        .unwrap();
        assert!(root.is_named("urn:proto", "Outer"));
        let mut children = root.child_elements();
        assert!(children.next().unwrap().is_named("urn:plain", "Inner"));
        assert!(children.next().unwrap().is_named("urn:proto", "Other"));
    }

    #[test]
    fn keeps_character_data_raw() {
        let root = Element::parse("<a>x &amp; y</a>").unwrap();
        assert_eq!(root.text(), "x & y");
        assert_eq!(root.to_string(), "<a>x &amp; y</a>");
    }

    #[test]
    fn rejects_unbalanced_documents() {
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(Element::parse("no markup").is_err());
    }

    #[test]
    fn skips_declaration_and_comments_outside_root() {
        let root =
            Element::parse("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a><!-- hi --></a>")
                .unwrap();
        assert_eq!(root.local_name(), "a");
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn default_namespace_can_be_unset() {
        let root = Element::parse(r#"<a xmlns="urn:x"><b xmlns=""/></a>"#).unwrap();
        let child = root.child_elements().next().unwrap();
        assert_eq!(child.namespace(), None);
    }
}
