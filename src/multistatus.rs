//! Multistatus response building.
//!
//! A `D:multistatus` document is built as one element tree and rendered
//! into the response body in a single pass. `MultiError` is the shape the
//! destructive methods use: they collect per-path failures and only
//! produce a 207 when there is more than a single status to report.
use http::{Response, StatusCode};
use xmltree::Element;

use crate::body::Body;
use crate::davpath::DavPath;
use crate::xmltree_ext::{ElementExt, NS_DAV_URI};
use crate::{DavError, DavResult};

pub(crate) const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// "HTTP/1.1 207 Multi-Status" and friends, for `D:status` elements.
pub(crate) fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
}

/// A `D:multistatus` document under construction.
pub(crate) struct MultiStatus {
    root: Element,
}

impl MultiStatus {
    pub fn new() -> MultiStatus {
        MultiStatus {
            root: Element::new2("D:multistatus").ns("D", NS_DAV_URI),
        }
    }

    /// Append a fully built `D:response` element.
    pub fn push_response(&mut self, response: Element) {
        self.root.push(response);
    }

    /// Append a response carrying just an href and a status.
    pub fn push_status(&mut self, path: &DavPath, status: StatusCode) {
        self.root.push(href_status_response(path, status));
    }

    /// Append the trailing `D:sync-token` element of a sync report.
    pub fn push_sync_token(&mut self, token: &str) {
        self.root.push(Element::new_text("D:sync-token", token));
    }

    /// Render into a 207 response.
    pub fn into_response(self) -> DavResult<Response<Body>> {
        let buffer = self.root.render()?;
        Response::builder()
            .status(StatusCode::MULTI_STATUS)
            .header("content-type", XML_CONTENT_TYPE)
            .body(Body::from(buffer))
            .map_err(|_| DavError::XmlWriteError)
    }
}

/// Build a `D:response` with only an href and a status.
pub(crate) fn href_status_response(path: &DavPath, status: StatusCode) -> Element {
    let mut response = Element::new2("D:response");
    response.push(Element::new_text("D:href", path.as_url_string_with_prefix()));
    response.push(Element::new_text("D:status", status_line(status)));
    response
}

/// Collected per-path failures of a destructive method (DELETE, COPY,
/// MOVE). Produces a plain status response when there is nothing more to
/// say than the overall outcome, a 207 otherwise.
pub(crate) struct MultiError {
    req_path: DavPath,
    entries: Vec<(DavPath, StatusCode)>,
}

impl MultiError {
    pub fn new(req_path: DavPath) -> MultiError {
        MultiError {
            req_path,
            entries: Vec::new(),
        }
    }

    pub fn add_status(&mut self, path: &DavPath, status: impl Into<DavError>) {
        let status = status.into().statuscode();
        self.entries.push((path.clone(), status));
    }

    /// Finish the response. `status` is the success status for the whole
    /// operation, used when no per-path failures were recorded.
    pub fn finalstatus(self, path: &DavPath, status: impl Into<DavError>) -> DavResult<Response<Body>> {
        let status = status.into().statuscode();
        // Nothing recorded, or one entry about the request path itself:
        // a plain response says it all.
        let plain = match self.entries.as_slice() {
            [] => Some(status),
            [(p, s)] if *p == self.req_path => Some(*s),
            _ => None,
        };
        if let Some(status) = plain {
            let resp = Response::builder()
                .status(status)
                .body(Body::empty())
                .map_err(|_| DavError::XmlWriteError)?;
            return Ok(resp);
        }
        let mut ms = MultiStatus::new();
        for (p, s) in &self.entries {
            ms.push_status(p, *s);
        }
        if !self.entries.iter().any(|(p, _)| p == path) {
            ms.push_status(path, status);
        }
        ms.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_failure_is_plain() {
        let path = DavPath::new("/a/b", "").unwrap();
        let mut me = MultiError::new(path.clone());
        me.add_status(&path, StatusCode::FORBIDDEN);
        let resp = me.finalstatus(&path, StatusCode::NO_CONTENT).unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn multiple_failures_are_multistatus() {
        let path = DavPath::new("/a/", "").unwrap();
        let mut me = MultiError::new(path.clone());
        me.add_status(&DavPath::new("/a/x", "").unwrap(), StatusCode::FORBIDDEN);
        me.add_status(&DavPath::new("/a/y", "").unwrap(), StatusCode::FORBIDDEN);
        let resp = me.finalstatus(&path, StatusCode::NO_CONTENT).unwrap();
        assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    }

    #[test]
    fn no_failures_plain_success() {
        let path = DavPath::new("/a/", "").unwrap();
        let me = MultiError::new(path.clone());
        let resp = me.finalstatus(&path, StatusCode::NO_CONTENT).unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
