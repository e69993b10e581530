use bytes::Bytes;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::access::Privilege;
use crate::body::Body;
use crate::conditional::if_match;
use crate::davheaders;
use crate::ns::{Existence, NodeKind};
use crate::{DavInner, DavResult};

impl DavInner {
    pub(crate) async fn handle_put(
        &self,
        req: &Request<()>,
        body: Bytes,
    ) -> DavResult<Response<Body>> {
        let path = self.path(req);
        if path.is_collection() {
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }

        let node = self
            .ns
            .get_node(&path, Existence::MayExist, NodeKind::Entity)
            .await?;
        if node.exists() && !node.allows_content() {
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }
        let exists = node.exists();

        // "If-None-Match: *" turns this into a create-only request: the
        // namespace must refuse if someone else created the node first.
        let create_new = req
            .headers()
            .typed_get::<davheaders::IfNoneMatch>()
            .map(|r| r.0 == davheaders::ETagList::Star)
            .unwrap_or(false);

        let meta = if exists { Some(&*node) } else { None };
        if let Some(code) = if_match(req, meta, &*self.ns, &path).await {
            return Err(code.into());
        }

        if exists {
            self.require_privilege(&path, Privilege::WRITE_CONTENT)
                .await?;
        } else {
            self.require_privilege(&path.parent(), Privilege::BIND)
                .await?;
        }

        let content_type = req
            .headers()
            .typed_get::<davheaders::ContentType>()
            .map(|c| c.0);

        let result = self
            .ns
            .put_content(&path, body, content_type, create_new, &self.creds)
            .await?;

        let mut res = Response::builder().status(if result.created {
            StatusCode::CREATED
        } else {
            StatusCode::NO_CONTENT
        });
        if let Some(tag) = result.etag {
            if let Ok(etag) = davheaders::ETag::new(false, tag) {
                res = res.header("etag", etag.to_string());
            }
        }
        let res = res
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap();
        Ok(res)
    }
}
