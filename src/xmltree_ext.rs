use std::io::Read;

use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

use crate::{DavError, DavResult};

pub(crate) const NS_DAV_URI: &str = "DAV:";

/// Small helpers on top of xmltree::Element. "D:tag" style constructors,
/// and serialization of a whole response document.
pub(crate) trait ElementExt {
    fn new2(e: &str) -> Self;
    fn new_text(e: &str, t: impl Into<String>) -> Self;
    fn text(self, t: impl Into<String>) -> Self;
    fn ns(self, prefix: &str, namespace: &str) -> Self;
    fn push(&mut self, e: Element);
    fn text_content(&self) -> String;
    fn parse2<R: Read>(r: R) -> Result<Element, DavError>;
    fn render(&self) -> DavResult<Vec<u8>>;
}

impl ElementExt for Element {
    fn new2(e: &str) -> Element {
        match e.split_once(':') {
            None => Element::new(e),
            Some((pfx, name)) => {
                let mut e = Element::new(name);
                e.prefix = Some(pfx.to_string());
                e
            }
        }
    }

    fn new_text(e: &str, t: impl Into<String>) -> Element {
        Element::new2(e).text(t)
    }

    fn text(mut self, t: impl Into<String>) -> Element {
        self.children.push(XMLNode::Text(t.into()));
        self
    }

    fn ns(mut self, prefix: &str, namespace: &str) -> Element {
        let mut ns = self.namespaces.unwrap_or_else(Namespace::empty);
        ns.force_put(prefix.to_string(), namespace.to_string());
        self.namespaces = Some(ns);
        self
    }

    fn push(&mut self, e: Element) {
        self.children.push(XMLNode::Element(e));
    }

    fn text_content(&self) -> String {
        self.get_text().map(|t| t.to_string()).unwrap_or_default()
    }

    fn parse2<R: Read>(r: R) -> Result<Element, DavError> {
        match Element::parse(r) {
            Ok(elem) => Ok(elem),
            Err(xmltree::ParseError::MalformedXml(_)) => Err(DavError::XmlParseError),
            Err(_) => Err(DavError::XmlReadError),
        }
    }

    fn render(&self) -> DavResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let config = EmitterConfig::new()
            .write_document_declaration(true)
            .normalize_empty_elements(true)
            .perform_indent(false);
        self.write_with_config(&mut buffer, config)
            .map_err(|_| DavError::XmlWriteError)?;
        Ok(buffer)
    }
}

/// Iterate over the element children, skipping text and comment nodes.
pub(crate) fn child_elems(e: &Element) -> impl Iterator<Item = &Element> {
    e.children.iter().filter_map(|n| n.as_element())
}

/// Is this element in the DAV: namespace (or namespace-less, which we
/// accept for sloppy clients) with the given local name?
pub(crate) fn is_dav_elem(e: &Element, name: &str) -> bool {
    e.name == name
        && match e.namespace.as_deref() {
            Some(ns) => ns == NS_DAV_URI,
            None => true,
        }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_and_match() {
        let xml = r#"<D:propfind xmlns:D="DAV:"><D:allprop/></D:propfind>"#;
        let elem = Element::parse2(Cursor::new(xml)).unwrap();
        assert!(is_dav_elem(&elem, "propfind"));
        let children: Vec<&Element> = child_elems(&elem).collect();
        assert_eq!(children.len(), 1);
        assert!(is_dav_elem(children[0], "allprop"));
    }

    #[test]
    fn render_roundtrip() {
        let mut root = Element::new2("D:multistatus").ns("D", NS_DAV_URI);
        root.push(Element::new_text("D:href", "/a/b"));
        let out = String::from_utf8(root.render().unwrap()).unwrap();
        assert!(out.contains("xmlns:D=\"DAV:\""));
        assert!(out.contains("<D:href>/a/b</D:href>"));
    }
}
