use http::{Method, Request, Response, StatusCode};

use crate::access::Privilege;
use crate::body::Body;
use crate::conditional::if_match;
use crate::davheaders;
use crate::ns::{Existence, NodeKind};
use crate::util::datetime_to_httpdate;
use crate::{DavInner, DavResult};

impl DavInner {
    pub(crate) async fn handle_get(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let head = req.method() == Method::HEAD;
        let path = self.path(req);

        let node = self
            .ns
            .get_node(&path, Existence::MustExist, NodeKind::Unknown)
            .await?;
        // No collection listings here; clients use PROPFIND.
        if !node.allows_content() {
            return Err(StatusCode::NOT_FOUND.into());
        }

        self.require_privilege(&path, Privilege::READ).await?;

        if let Some(code) = if_match(req, Some(&*node), &*self.ns, &path).await {
            // 304 is a response, not an error.
            if code == StatusCode::NOT_MODIFIED {
                let mut res = Response::builder().status(code);
                if let Some(etag) = davheaders::ETag::from_node(&*node) {
                    res = res.header("etag", etag.to_string());
                }
                return Ok(res.body(Body::empty()).unwrap());
            }
            return Err(code.into());
        }

        let content = self.ns.get_content(&path).await?;

        let mut res = Response::builder().status(StatusCode::OK);
        let ctype = content
            .content_type
            .clone()
            .or_else(|| node.content_type())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        res = res.header("content-type", ctype);
        res = res.header("content-length", content.data.len().to_string());
        if let Some(etag) = davheaders::ETag::from_node(&*node) {
            res = res.header("etag", etag.to_string());
        }
        if let Some(modified) = node.modified() {
            res = res.header("last-modified", datetime_to_httpdate(&modified));
        }
        if let Some(lang) = node.content_language() {
            res = res.header("content-language", lang);
        }
        res = res.header("accept-ranges", "none");

        let body = if head {
            Body::empty()
        } else {
            Body::from(content.data)
        };
        Ok(res.body(body).unwrap())
    }
}
