//! The REPORT method: `sync-collection` (RFC6578) plus the RFC3744
//! principal reports.
use std::io::Cursor;

use futures_util::future::{BoxFuture, FutureExt};
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use xmltree::Element;

use crate::access::Privilege;
use crate::body::Body;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::handle_props::PropWriter;
use crate::multistatus::{status_line, MultiStatus};
use crate::node::{DavNode, DavProperty, PrincipalKind, PropRequest};
use crate::ns::{Existence, NodeKind};
use crate::xmltree_ext::{child_elems, is_dav_elem, ElementExt};
use crate::{DavError, DavInner, DavResult};

// Parse an optional <D:prop> child into a property request. Reports
// without one just get hrefs and statuses.
fn parse_prop(root: &Element) -> Option<PropRequest> {
    child_elems(root)
        .find(|e| is_dav_elem(e, "prop"))
        .map(|prop| PropRequest::Named(child_elems(prop).map(DavProperty::from_element).collect()))
}

impl DavInner {
    pub(crate) async fn handle_report(
        &self,
        req: &Request<()>,
        body: &[u8],
    ) -> DavResult<Response<Body>> {
        let root = Element::parse2(Cursor::new(body))?;

        let mut path = self.path(req);
        let node = self
            .ns
            .get_node(&path, Existence::MustExist, NodeKind::Unknown)
            .await?;
        path.add_slash_if(node.is_collection());

        self.require_privilege(&path, Privilege::READ).await?;

        if is_dav_elem(&root, "sync-collection") {
            self.report_sync_collection(req, &root, path).await
        } else if is_dav_elem(&root, "expand-property") {
            // Acknowledged, not expanded.
            MultiStatus::new().into_response()
        } else if is_dav_elem(&root, "acl-principal-prop-set") {
            self.report_acl_principal_prop_set(req, &root, path).await
        } else if is_dav_elem(&root, "principal-match") {
            self.report_principal_match(req, &root, path).await
        } else if is_dav_elem(&root, "principal-property-search") {
            self.report_principal_property_search(req, &root, path).await
        } else {
            debug!("unknown report type {}", root.name);
            Err(StatusCode::BAD_REQUEST.into())
        }
    }

    async fn report_sync_collection(
        &self,
        req: &Request<()>,
        root: &Element,
        path: DavPath,
    ) -> DavResult<Response<Body>> {
        let mut token: Option<String> = None;
        let mut limit: Option<u32> = None;
        let mut recurse: Option<bool> = None;
        for child in child_elems(root) {
            if is_dav_elem(child, "sync-token") {
                let t = child.text_content();
                if !t.is_empty() {
                    token = Some(t);
                }
            } else if is_dav_elem(child, "sync-level") {
                recurse = Some(match child.text_content().trim() {
                    "1" => false,
                    "infinite" => true,
                    _ => return Err(DavError::XmlParseError),
                });
            } else if is_dav_elem(child, "limit") {
                if let Some(n) = child_elems(child).find(|e| is_dav_elem(e, "nresults")) {
                    let n: i64 = n
                        .text_content()
                        .trim()
                        .parse()
                        .map_err(|_| DavError::XmlParseError)?;
                    // -1 means unbounded.
                    if n >= 0 {
                        limit = Some(n as u32);
                    }
                }
            }
        }
        // No sync-level: fall back to the Depth header. The default for
        // REPORT is 0, which means direct members only.
        let recurse = match recurse {
            Some(r) => r,
            None => matches!(
                req.headers()
                    .typed_try_get::<davheaders::Depth>()
                    .map_err(|_| DavError::Status(StatusCode::BAD_REQUEST))?,
                Some(davheaders::Depth::Infinity)
            ),
        };

        let request = parse_prop(root).unwrap_or(PropRequest::Named(Vec::new()));
        let writer = PropWriter::from_request(self, req, request);

        let wsr = self
            .ns
            .get_sync_report(&path, token.as_deref(), limit, recurse)
            .await?;
        if !wsr.token_valid {
            // Required to be distinct from "collection not found".
            return Err(DavError::condition_msg(
                StatusCode::PRECONDITION_FAILED,
                "valid-sync-token",
                "Invalid sync token",
            ));
        }

        let mut ms = MultiStatus::new();
        for item in &wsr.items {
            let item_path = {
                let mut p = path.with_path(&item.node.uri());
                p.add_slash_if(item.node.is_collection());
                p
            };
            if item.deleted {
                ms.push_status(&item_path, StatusCode::NOT_FOUND);
            } else if !item.can_sync {
                // This member cannot be reported through this feed; the
                // client must sync it on its own.
                let mut response = Element::new2("D:response");
                response.push(Element::new_text(
                    "D:href",
                    item_path.as_url_string_with_prefix(),
                ));
                response.push(Element::new_text(
                    "D:status",
                    status_line(StatusCode::FORBIDDEN),
                ));
                let mut err = Element::new2("D:error");
                err.push(Element::new2("D:sync-traversal-supported"));
                response.push(err);
                ms.push_response(response);
            } else {
                ms.push_response(writer.response_for(&item_path, &*item.node).await?);
            }
        }
        if wsr.truncated {
            // RFC6578 §3.6: a truncated result carries the target itself
            // with 507, so the client knows to sync again.
            ms.push_status(&path, StatusCode::INSUFFICIENT_STORAGE);
        }
        // The continuation token concludes the report, even when empty
        // or truncated.
        ms.push_sync_token(&wsr.token);
        ms.into_response()
    }

    async fn report_acl_principal_prop_set(
        &self,
        req: &Request<()>,
        root: &Element,
        path: DavPath,
    ) -> DavResult<Response<Body>> {
        let entity = self.ns.get_shared(path.as_str()).await?;
        self.access()
            .check_access(&entity, Privilege::READ_ACL, false)
            .await?;
        let acl = self.access().effective_acl(&entity).await?;

        let request = parse_prop(root).unwrap_or(PropRequest::Named(Vec::new()));
        let writer = PropWriter::from_request(self, req, request);

        let mut ms = MultiStatus::new();
        for href in acl.principal_hrefs() {
            match self.ns.get_principal(&href).await {
                Ok(principal) => {
                    let ppath = {
                        let mut p = path.with_path(&principal.uri());
                        p.add_slash_if(principal.is_collection());
                        p
                    };
                    ms.push_response(writer.response_for(&ppath, &*principal).await?);
                }
                Err(e) => debug!("acl-principal-prop-set: skipping {}: {}", href, e),
            }
        }
        ms.into_response()
    }

    // Walk a subtree collecting the nodes the caller owns.
    fn owned_nodes<'a>(
        &'a self,
        path: DavPath,
        out: &'a mut Vec<(DavPath, Box<dyn DavNode>)>,
    ) -> BoxFuture<'a, DavResult<()>> {
        async move {
            let children = self.ns.get_children(&path).await?;
            for child in children {
                let mut cpath = path.with_path(&child.uri());
                cpath.add_slash_if(child.is_collection());
                if child.owner().map(|o| self.creds.matches(&o)).unwrap_or(false) {
                    out.push((cpath.clone(), child));
                    if let Some((_, c)) = out.last() {
                        if c.is_collection() {
                            self.owned_nodes(cpath, out).await?;
                        }
                    }
                } else if child.is_collection() {
                    self.owned_nodes(cpath, out).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn report_principal_match(
        &self,
        req: &Request<()>,
        root: &Element,
        path: DavPath,
    ) -> DavResult<Response<Body>> {
        // Either <D:self/> or <D:principal-property><D:owner/>.
        let match_owner = child_elems(root)
            .find(|e| is_dav_elem(e, "principal-property"))
            .map(|e| child_elems(e).any(|p| is_dav_elem(p, "owner")))
            .unwrap_or(false);
        let match_self = child_elems(root).any(|e| is_dav_elem(e, "self"));
        if !match_owner && !match_self {
            return Err(DavError::XmlParseError);
        }

        let mut matches: Vec<(DavPath, Box<dyn DavNode>)> = Vec::new();
        if match_self {
            // Principal nodes under the target that denote the caller,
            // directly or through group membership.
            for child in self.ns.get_children(&path).await? {
                if child.principal() == PrincipalKind::None {
                    continue;
                }
                let mut cpath = path.with_path(&child.uri());
                cpath.add_slash_if(child.is_collection());
                if self.creds.matches(cpath.as_str()) {
                    matches.push((cpath, child));
                }
            }
        } else {
            let mut out = Vec::new();
            self.owned_nodes(path.clone(), &mut out).await?;
            matches = out;
        }

        let request = parse_prop(root);
        let mut ms = MultiStatus::new();
        match request {
            Some(request) => {
                let writer = PropWriter::from_request(self, req, request);
                for (p, node) in &matches {
                    ms.push_response(writer.response_for(p, &**node).await?);
                }
            }
            None => {
                for (p, _) in &matches {
                    ms.push_status(p, StatusCode::OK);
                }
            }
        }
        ms.into_response()
    }

    async fn report_principal_property_search(
        &self,
        req: &Request<()>,
        root: &Element,
        path: DavPath,
    ) -> DavResult<Response<Body>> {
        // (property, literal) criteria; all must match.
        let mut criteria: Vec<(DavProperty, String)> = Vec::new();
        for search in child_elems(root).filter(|e| is_dav_elem(e, "property-search")) {
            let prop = search
                .children
                .iter()
                .filter_map(|n| n.as_element())
                .find(|e| is_dav_elem(e, "prop"))
                .and_then(|p| child_elems(p).next())
                .ok_or(DavError::XmlParseError)?;
            let literal = child_elems(search)
                .find(|e| is_dav_elem(e, "match"))
                .map(|m| m.text_content())
                .ok_or(DavError::XmlParseError)?;
            criteria.push((DavProperty::from_element(prop), literal));
        }
        if criteria.is_empty() {
            return Err(DavError::XmlParseError);
        }

        let request = parse_prop(root).unwrap_or(PropRequest::Named(Vec::new()));
        let writer = PropWriter::from_request(self, req, request);

        let mut ms = MultiStatus::new();
        for child in self.ns.get_children(&path).await? {
            if child.principal() == PrincipalKind::None {
                continue;
            }
            let mut cpath = path.with_path(&child.uri());
            cpath.add_slash_if(child.is_collection());
            let mut all = true;
            for (prop, literal) in &criteria {
                let value = writer.property_text(&cpath, &*child, prop).await;
                let matched = value
                    .map(|v| v.to_lowercase().contains(&literal.to_lowercase()))
                    .unwrap_or(false);
                if !matched {
                    all = false;
                    break;
                }
            }
            if all {
                ms.push_response(writer.response_for(&cpath, &*child).await?);
            }
        }
        ms.into_response()
    }
}
