use std::time::SystemTime;

use headers::HeaderMapExt;
use http::{Method, StatusCode};

use crate::davheaders;
use crate::davpath::DavPath;
use crate::node::DavNode;
use crate::ns::{DavNamespace, Existence, NodeKind};

type Request = http::Request<()>;

pub(crate) fn etaglist_match(tags: &davheaders::ETagList, tag: &davheaders::ETag) -> bool {
    match tags {
        davheaders::ETagList::Star => true,
        davheaders::ETagList::Tags(t) => t.iter().any(|x| x == tag),
    }
}

// Handle the if-headers: RFC 7232, HTTP/1.1 Conditional Requests.
pub(crate) fn http_if_match(req: &Request, node: Option<&dyn DavNode>) -> Option<StatusCode> {
    let modified = node
        .and_then(|n| n.modified())
        .map(SystemTime::from);

    if let Some(r) = req.headers().typed_get::<davheaders::IfMatch>() {
        let etag = node.and_then(davheaders::ETag::from_node);
        if etag.map_or(true, |m| !etaglist_match(&r.0, &m)) {
            debug!("precondition fail: If-Match {:?}", r);
            return Some(StatusCode::PRECONDITION_FAILED);
        }
    } else if let Some(r) = req.headers().typed_get::<headers::IfUnmodifiedSince>() {
        match modified {
            None => return Some(StatusCode::PRECONDITION_FAILED),
            Some(m) => {
                if !r.precondition_passes(m) {
                    debug!("precondition fail: If-Unmodified-Since {:?}", r);
                    return Some(StatusCode::PRECONDITION_FAILED);
                }
            }
        }
    }

    // If-Schedule-Tag-Match only applies to nodes that carry a schedule tag.
    if let Some(r) = req.headers().typed_get::<davheaders::ScheduleTagMatch>() {
        if let Some(tag) = node.and_then(|n| n.schedule_tag()) {
            let tag = davheaders::ETag::new(false, tag);
            if tag.map_or(true, |t| t != r.0) {
                debug!("precondition fail: If-Schedule-Tag-Match {:?}", r);
                return Some(StatusCode::PRECONDITION_FAILED);
            }
        }
    }

    if let Some(r) = req.headers().typed_get::<davheaders::IfNoneMatch>() {
        let etag = node.and_then(davheaders::ETag::from_node);
        let star = r.0 == davheaders::ETagList::Star;
        let tag_matches = etag.map_or(false, |m| etaglist_match(&r.0, &m));
        // A "*" matches any existing resource, even one without an etag.
        if tag_matches || (star && node.map_or(false, |n| n.exists())) {
            debug!("precondition fail: If-None-Match {:?}", r);
            if req.method() == Method::GET || req.method() == Method::HEAD {
                return Some(StatusCode::NOT_MODIFIED);
            } else {
                return Some(StatusCode::PRECONDITION_FAILED);
            }
        }
    } else if let Some(r) = req.headers().typed_get::<headers::IfModifiedSince>() {
        if req.method() == Method::GET || req.method() == Method::HEAD {
            if let Some(m) = modified {
                if !r.is_modified(m) {
                    debug!("not-modified If-Modified-Since {:?}", r);
                    return Some(StatusCode::NOT_MODIFIED);
                }
            }
        }
    }
    None
}

// Evaluate one state token. Tokens are matched against the current sync
// token of the nearest enclosing collection, so a client can make a
// mutation conditional on the collection not having changed under it.
async fn state_token_matches(ns: &dyn DavNamespace, path: &DavPath, token: &str) -> bool {
    let col = if path.is_collection() {
        path.clone()
    } else {
        path.parent()
    };
    match ns.get_sync_token(&col).await {
        Ok(Some(t)) => t == token,
        _ => false,
    }
}

// handle the If header: RFC4918, 10.4.  If Header
//
// returns true if the header was not present, or if any of the iflists
// evaluated to true. Also returns the state tokens we encountered.
//
// caller should fail with 412 Precondition Failed if the first value
// in the returned tuple is false.
pub(crate) async fn dav_if_match(
    req: &Request,
    ns: &dyn DavNamespace,
    path: &DavPath,
) -> (bool, Vec<String>) {
    let mut tokens: Vec<String> = Vec::new();
    let mut any_list_ok = false;

    let r = match req.headers().typed_get::<davheaders::If>() {
        Some(r) => r,
        None => return (true, tokens),
    };

    for iflist in r.0.iter() {
        // save and return all statetokens that we encountered.
        tokens.extend(iflist.conditions.iter().filter_map(|c| match &c.item {
            davheaders::IfItem::StateToken(t) => Some(t.to_owned()),
            _ => None,
        }));

        // skip over if a previous list already evaluated to true.
        if any_list_ok {
            continue;
        }

        // find the resource that this list is about.
        let mut anchor: Option<DavPath> = None;
        let (p, valid) = match iflist.resource_tag {
            Some(ref url) => match DavPath::from_url(url, path.prefix()) {
                Ok(p) => (&*anchor.insert(p), true),
                Err(_) => (path, false),
            },
            None => (path, true),
        };

        // now process the conditions. they must all be true.
        let mut list_ok = false;
        for cond in iflist.conditions.iter() {
            let cond_ok = match cond.item {
                davheaders::IfItem::StateToken(ref s) => {
                    // tokens in DAV: namespace always evaluate to false (10.4.8)
                    if !valid || s.starts_with("DAV:") {
                        false
                    } else {
                        state_token_matches(ns, p, s).await
                    }
                }
                davheaders::IfItem::ETag(ref tag) => {
                    if !valid {
                        false
                    } else {
                        match ns.get_node(p, Existence::MustExist, NodeKind::Unknown).await {
                            Ok(node) => match davheaders::ETag::from_node(&*node) {
                                Some(etag) => tag == &etag,
                                None => false,
                            },
                            Err(_) => false,
                        }
                    }
                }
            };
            if cond_ok == cond.not {
                list_ok = false;
                break;
            }
            list_ok = true;
        }
        if list_ok {
            any_list_ok = true;
        }
    }
    if !any_list_ok {
        debug!("precondition fail: If {:?}", r.0);
    }
    (any_list_ok, tokens)
}

// Handle both the HTTP conditional If: headers, and the webdav If: header.
pub(crate) async fn if_match(
    req: &Request,
    node: Option<&dyn DavNode>,
    ns: &dyn DavNamespace,
    path: &DavPath,
) -> Option<StatusCode> {
    match dav_if_match(req, ns, path).await {
        (true, _) => {}
        (false, _) => return Some(StatusCode::PRECONDITION_FAILED),
    }
    http_if_match(req, node)
}

// Like if_match, but also returns all state tokens seen in the If header.
pub(crate) async fn if_match_get_tokens(
    req: &Request,
    node: Option<&dyn DavNode>,
    ns: &dyn DavNamespace,
    path: &DavPath,
) -> Result<Vec<String>, StatusCode> {
    if let Some(code) = http_if_match(req, node) {
        return Err(code);
    }
    match dav_if_match(req, ns, path).await {
        (true, v) => Ok(v),
        (false, _) => Err(StatusCode::PRECONDITION_FAILED),
    }
}
