use std::io::Cursor;

use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use xmltree::Element;

use crate::access::{Acl, Privilege};
use crate::body::Body;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::multistatus::{status_line, MultiStatus};
use crate::node::{DavNode, DavProperty, PrincipalKind, PropRequest, PropValue};
use crate::ns::{Existence, NodeKind, NsError};
use crate::util::{datetime_to_httpdate, datetime_to_rfc3339};
use crate::xmltree_ext::{child_elems, is_dav_elem, ElementExt};
use crate::{DavError, DavInner, DavResult};

// Live properties the engine answers itself, before asking the node.
const WELL_KNOWN: &[&str] = &[
    "creationdate",
    "displayname",
    "getcontentlanguage",
    "getcontentlength",
    "getcontenttype",
    "getetag",
    "getlastmodified",
    "resourcetype",
    "owner",
    "current-user-principal",
    "current-user-privilege-set",
    "acl",
    "supported-privilege-set",
    "supported-report-set",
    "principal-URL",
    "sync-token",
];

// The subset of engine properties included in an allprop response.
const ALLPROP: &[&str] = &[
    "creationdate",
    "displayname",
    "getcontentlanguage",
    "getcontentlength",
    "getcontenttype",
    "getetag",
    "getlastmodified",
    "resourcetype",
];

const REPORTS: &[&str] = &[
    "sync-collection",
    "expand-property",
    "acl-principal-prop-set",
    "principal-match",
    "principal-property-search",
];

fn parse_propfind(body: &[u8]) -> DavResult<PropRequest> {
    if body.is_empty() {
        // No body at all means allprop.
        return Ok(PropRequest::AllProp);
    }
    let root = Element::parse2(Cursor::new(body))?;
    if !is_dav_elem(&root, "propfind") {
        return Err(DavError::XmlParseError);
    }
    let children: Vec<&Element> = child_elems(&root).collect();
    match children.as_slice() {
        [e] if is_dav_elem(e, "allprop") => Ok(PropRequest::AllProp),
        [e] if is_dav_elem(e, "propname") => Ok(PropRequest::PropName),
        [e] if is_dav_elem(e, "prop") => Ok(PropRequest::Named(
            child_elems(e).map(DavProperty::from_element).collect(),
        )),
        _ => Err(DavError::XmlParseError),
    }
}

/// Renders property values for one node at a time into `D:response`
/// elements. Shared between PROPFIND and the REPORT handlers.
pub(crate) struct PropWriter<'a> {
    inner: &'a DavInner,
    request: PropRequest,
    minimal: bool,
}

impl<'a> PropWriter<'a> {
    pub fn new(inner: &'a DavInner, request: PropRequest, minimal: bool) -> PropWriter<'a> {
        PropWriter {
            inner,
            request,
            minimal,
        }
    }

    pub fn from_request(inner: &'a DavInner, req: &Request<()>, request: PropRequest) -> PropWriter<'a> {
        let minimal = req
            .headers()
            .typed_get::<davheaders::Prefer>()
            .map(|p| p.minimal)
            .unwrap_or(false)
            || req
                .headers()
                .typed_get::<davheaders::Brief>()
                .map(|b| b.0)
                .unwrap_or(false);
        PropWriter::new(inner, request, minimal)
    }

    /// Build the `D:response` element for one node.
    pub async fn response_for(&self, path: &DavPath, node: &dyn DavNode) -> DavResult<Element> {
        let node_path = node_path(path, node);
        let href = node_path.as_url_string_with_prefix();

        if !node.exists() || node.status() != StatusCode::OK {
            let status = if node.exists() {
                node.status()
            } else {
                StatusCode::NOT_FOUND
            };
            let mut response = Element::new2("D:response");
            response.push(Element::new_text("D:href", href));
            response.push(Element::new_text("D:status", status_line(status)));
            return Ok(response);
        }

        let mut found = Element::new2("D:prop");
        let mut unknown: Vec<DavProperty> = Vec::new();

        match &self.request {
            PropRequest::PropName => {
                for name in ALLPROP {
                    found.push(Element::new2(&format!("D:{}", name)));
                }
                for prop in node.allprop_properties() {
                    found.push(prop.to_element());
                }
            }
            PropRequest::AllProp => {
                // Lock discovery placeholders, for clients that ask.
                found.push(Element::new2("D:lockdiscovery"));
                found.push(Element::new2("D:supportedlock"));
                for name in ALLPROP {
                    let prop = DavProperty::dav(*name);
                    if let Some(elem) = self.build_prop(&node_path, node, &prop).await {
                        found.push(elem);
                    }
                }
                for prop in node.allprop_properties() {
                    if let Some(elem) = self.build_prop(&node_path, node, &prop).await {
                        found.push(elem);
                    }
                }
            }
            PropRequest::Named(props) => {
                for prop in props {
                    match self.build_prop(&node_path, node, prop).await {
                        Some(elem) => found.push(elem),
                        None => unknown.push(prop.clone()),
                    }
                }
            }
        }

        let mut response = Element::new2("D:response");
        response.push(Element::new_text("D:href", href));
        response.push(propstat(found, StatusCode::OK));
        if !unknown.is_empty() && !self.minimal {
            let mut prop = Element::new2("D:prop");
            for p in unknown {
                prop.push(p.to_element());
            }
            response.push(propstat(prop, StatusCode::NOT_FOUND));
        }
        Ok(response)
    }

    // Two-tier lookup: engine-known properties first, then the node's
    // own callback. None means "report as not found".
    async fn build_prop(
        &self,
        path: &DavPath,
        node: &dyn DavNode,
        prop: &DavProperty,
    ) -> Option<Element> {
        if let Some(name) = WELL_KNOWN.iter().find(|&&n| prop.is_dav(n)) {
            if let Some(elem) = self.known_prop(path, node, name).await {
                return Some(elem);
            }
        }
        match node.generate_property(prop) {
            PropValue::Handled(elem) => Some(elem),
            PropValue::Unhandled => None,
        }
    }

    // Flattened text of one property value. Used by the
    // principal-property-search report to match literals.
    pub async fn property_text(
        &self,
        path: &DavPath,
        node: &dyn DavNode,
        prop: &DavProperty,
    ) -> Option<String> {
        self.build_prop(path, node, prop)
            .await
            .map(|e| e.text_content())
    }

    async fn known_prop(&self, path: &DavPath, node: &dyn DavNode, name: &str) -> Option<Element> {
        match name {
            "creationdate" => node
                .created()
                .map(|t| Element::new_text("D:creationdate", datetime_to_rfc3339(&t))),
            "displayname" => {
                let n = path.file_name_utf8();
                if n.is_empty() {
                    None
                } else {
                    Some(Element::new_text("D:displayname", n))
                }
            }
            "getcontentlanguage" => node
                .content_language()
                .map(|l| Element::new_text("D:getcontentlanguage", l)),
            "getcontentlength" => node
                .content_length()
                .map(|l| Element::new_text("D:getcontentlength", l.to_string())),
            "getcontenttype" => node
                .content_type()
                .map(|t| Element::new_text("D:getcontenttype", t)),
            "getetag" => node
                .etag()
                .map(|t| Element::new_text("D:getetag", format!("\"{}\"", t))),
            "getlastmodified" => node
                .modified()
                .map(|t| Element::new_text("D:getlastmodified", datetime_to_httpdate(&t))),
            "resourcetype" => {
                let mut e = Element::new2("D:resourcetype");
                if node.is_collection() {
                    e.push(Element::new2("D:collection"));
                }
                if node.principal() != PrincipalKind::None {
                    e.push(Element::new2("D:principal"));
                }
                Some(e)
            }
            "owner" => node.owner().map(|o| {
                let mut e = Element::new2("D:owner");
                e.push(Element::new_text("D:href", o));
                e
            }),
            "current-user-principal" => {
                let mut e = Element::new2("D:current-user-principal");
                match self.inner.creds.principal.as_deref() {
                    Some(p) => e.push(Element::new_text("D:href", p)),
                    None => e.push(Element::new2("D:unauthenticated")),
                }
                Some(e)
            }
            "current-user-privilege-set" => {
                let entity = self.inner.ns.get_shared(path.as_str()).await.ok()?;
                let access = self
                    .inner
                    .access()
                    .check_access(&entity, Privilege::empty(), true)
                    .await
                    .ok()?;
                let mut e = Element::new2("D:current-user-privilege-set");
                for n in access.privileges.xml_names() {
                    let mut p = Element::new2("D:privilege");
                    p.push(Element::new2(&format!("D:{}", n)));
                    e.push(p);
                }
                Some(e)
            }
            "acl" => {
                let entity = self.inner.ns.get_shared(path.as_str()).await.ok()?;
                // Reading the list back needs read-acl.
                let access = self
                    .inner
                    .access()
                    .check_access(&entity, Privilege::READ_ACL, true)
                    .await
                    .ok()?;
                if !access.allowed {
                    return None;
                }
                let acl = Acl::decode(entity.acl.as_deref()?).ok()?;
                let mut e = Element::new2("D:acl");
                for ace in acl.to_xml() {
                    e.push(ace);
                }
                Some(e)
            }
            "supported-privilege-set" => Some(supported_privilege_set()),
            "supported-report-set" => {
                let mut e = Element::new2("D:supported-report-set");
                for r in REPORTS {
                    let mut sr = Element::new2("D:supported-report");
                    let mut rep = Element::new2("D:report");
                    rep.push(Element::new2(&format!("D:{}", r)));
                    sr.push(rep);
                    e.push(sr);
                }
                Some(e)
            }
            "principal-URL" => {
                if node.principal() == PrincipalKind::None {
                    None
                } else {
                    let mut e = Element::new2("D:principal-URL");
                    e.push(Element::new_text(
                        "D:href",
                        path.as_url_string_with_prefix(),
                    ));
                    Some(e)
                }
            }
            "sync-token" => node
                .sync_token()
                .map(|t| Element::new_text("D:sync-token", t)),
            _ => None,
        }
    }
}

fn propstat(prop: Element, status: StatusCode) -> Element {
    let mut ps = Element::new2("D:propstat");
    ps.push(prop);
    ps.push(Element::new_text("D:status", status_line(status)));
    ps
}

// The path of a node, anchored at the request prefix.
fn node_path(req_path: &DavPath, node: &dyn DavNode) -> DavPath {
    let mut p = req_path.with_path(&node.uri());
    p.add_slash_if(node.is_collection());
    p
}

fn supported_privilege_set() -> Element {
    fn privilege(name: &str, abstract_: bool, children: Vec<Element>) -> Element {
        let mut sp = Element::new2("D:supported-privilege");
        let mut p = Element::new2("D:privilege");
        p.push(Element::new2(&format!("D:{}", name)));
        sp.push(p);
        if abstract_ {
            sp.push(Element::new2("D:abstract"));
        }
        for c in children {
            sp.push(c);
        }
        sp
    }
    let write = privilege(
        "write",
        false,
        vec![
            privilege("write-properties", false, vec![]),
            privilege("write-content", false, vec![]),
            privilege("bind", false, vec![]),
            privilege("unbind", false, vec![]),
        ],
    );
    let all = privilege(
        "all",
        true,
        vec![
            privilege("read", false, vec![]),
            write,
            privilege("read-acl", false, vec![]),
            privilege("write-acl", false, vec![]),
        ],
    );
    let mut e = Element::new2("D:supported-privilege-set");
    e.push(all);
    e
}

impl DavInner {
    pub(crate) async fn handle_propfind(
        &self,
        req: &Request<()>,
        body: &[u8],
    ) -> DavResult<Response<Body>> {
        let request = parse_propfind(body)?;

        // Default depth on PROPFIND is infinity. A bad literal is a
        // client error, not an absent header.
        let depth = req
            .headers()
            .typed_try_get::<davheaders::Depth>()
            .map_err(|_| DavError::Status(StatusCode::BAD_REQUEST))?
            .unwrap_or(davheaders::Depth::Infinity);

        let mut path = self.path(req);
        let node = self
            .ns
            .get_node(&path, Existence::MustExist, NodeKind::Unknown)
            .await?;
        path.add_slash_if(node.is_collection());

        // Disclosing anything needs at least some access.
        self.require_privilege(&path, Privilege::empty()).await?;

        let writer = PropWriter::from_request(self, req, request);
        let mut ms = MultiStatus::new();

        // Depth-first, parents before children.
        let mut stack: Vec<(DavPath, Box<dyn DavNode>, u32)> = vec![(path, node, 0)];
        while let Some((p, n, level)) = stack.pop() {
            ms.push_response(writer.response_for(&p, &*n).await?);

            let descend = n.exists()
                && n.is_collection()
                && match depth {
                    davheaders::Depth::Zero => false,
                    davheaders::Depth::One => level == 0,
                    davheaders::Depth::Infinity => true,
                };
            if !descend {
                continue;
            }
            let mut members = Vec::new();
            for child in self.ns.get_children(&p).await? {
                let cpath = node_path(&p, &*child);
                // Silently omit members the caller may not see.
                let visible = match self.ns.get_shared(cpath.as_str()).await {
                    Ok(entity) => self
                        .access()
                        .check_access(&entity, Privilege::empty(), true)
                        .await
                        .map(|a| a.allowed)
                        .unwrap_or(false),
                    Err(_) => false,
                };
                if visible {
                    members.push((cpath, child, level + 1));
                }
            }
            // Reversed, so the stack pops them in namespace order.
            stack.extend(members.into_iter().rev());
        }

        ms.into_response()
    }

    pub(crate) async fn handle_proppatch(
        &self,
        req: &Request<()>,
        body: &[u8],
    ) -> DavResult<Response<Body>> {
        let root = Element::parse2(Cursor::new(body))?;
        if !is_dav_elem(&root, "propertyupdate") {
            return Err(DavError::XmlParseError);
        }

        let mut path = self.path(req);
        let node = self
            .ns
            .get_node(&path, Existence::MustExist, NodeKind::Unknown)
            .await?;
        path.add_slash_if(node.is_collection());

        self.require_privilege(&path, Privilege::WRITE_PROPS).await?;

        if let Some(code) = crate::conditional::if_match(req, Some(&*node), &*self.ns, &path).await
        {
            return Err(code.into());
        }

        // (property, element, is-remove) triples in request order.
        let mut updates: Vec<(DavProperty, Element, bool)> = Vec::new();
        for block in child_elems(&root) {
            let remove = if is_dav_elem(block, "set") {
                false
            } else if is_dav_elem(block, "remove") {
                true
            } else {
                return Err(DavError::XmlParseError);
            };
            let mut props = child_elems(block).filter(|e| is_dav_elem(e, "prop"));
            let (Some(prop), None) = (props.next(), props.next()) else {
                return Err(DavError::XmlParseError);
            };
            let mut any = false;
            for elem in child_elems(prop) {
                // A removed property is named by an empty element.
                if remove && child_elems(elem).next().is_some() {
                    return Err(DavError::XmlParseError);
                }
                updates.push((DavProperty::from_element(elem), elem.clone(), remove));
                any = true;
            }
            if !any {
                return Err(DavError::XmlParseError);
            }
        }

        let mut succeeded: Vec<DavProperty> = Vec::new();
        let mut failed: Vec<(DavProperty, StatusCode)> = Vec::new();
        for (prop, elem, remove) in updates {
            // Live engine properties are protected.
            let result = if WELL_KNOWN.iter().any(|&n| prop.is_dav(n)) {
                Err(NsError::Forbidden)
            } else if remove {
                node.remove_property(&prop)
            } else {
                node.set_property(&prop, &elem)
            };
            match result {
                Ok(()) => succeeded.push(prop),
                Err(e) => {
                    let status = match e {
                        NsError::NotFound => StatusCode::NOT_FOUND,
                        NsError::NotImplemented | NsError::Forbidden => StatusCode::FORBIDDEN,
                        NsError::InsufficientStorage => StatusCode::INSUFFICIENT_STORAGE,
                        _ => StatusCode::INTERNAL_SERVER_ERROR,
                    };
                    failed.push((prop, status));
                }
            }
        }

        // Partial application must not stick.
        if !failed.is_empty() && !succeeded.is_empty() {
            if let Err(e) = self.ns.rollback().await {
                error!("proppatch rollback failed: {}", e);
            }
        }

        let mut response = Element::new2("D:response");
        response.push(Element::new_text("D:href", path.as_url_string_with_prefix()));
        if !succeeded.is_empty() {
            // Any failure downgrades the whole set to 424.
            let status = if failed.is_empty() {
                StatusCode::OK
            } else {
                StatusCode::FAILED_DEPENDENCY
            };
            let mut prop = Element::new2("D:prop");
            for p in succeeded {
                prop.push(p.to_element());
            }
            response.push(propstat(prop, status));
        }
        let mut by_status: Vec<(StatusCode, Element)> = Vec::new();
        for (p, status) in failed {
            match by_status.iter_mut().find(|(s, _)| *s == status) {
                Some((_, prop)) => prop.push(p.to_element()),
                None => {
                    let mut prop = Element::new2("D:prop");
                    prop.push(p.to_element());
                    by_status.push((status, prop));
                }
            }
        }
        for (status, prop) in by_status {
            response.push(propstat(prop, status));
        }

        let mut ms = MultiStatus::new();
        ms.push_response(response);
        ms.into_response()
    }
}
