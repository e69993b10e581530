use http::{Request, Response, StatusCode};

use crate::access::Privilege;
use crate::body::Body;
use crate::conditional::if_match_get_tokens;
use crate::ns::{Existence, NodeKind, NsError};
use crate::{DavError, DavInner, DavResult};

impl DavInner {
    pub(crate) async fn handle_mkcol(
        &self,
        req: &Request<()>,
        body: &[u8],
    ) -> DavResult<Response<Body>> {
        // Extended MKCOL (RFC5689) bodies are not supported.
        if !body.is_empty() {
            return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
        }

        let mut path = self.path(req);
        path.add_slash();

        // The parent collection must exist.
        let parent = path.parent();
        if let Err(e) = self
            .ns
            .get_node(&parent, Existence::MustExist, NodeKind::Collection)
            .await
        {
            return Err(match e {
                NsError::NotFound => DavError::Status(StatusCode::CONFLICT),
                other => other.into(),
            });
        }

        // Creating a member needs bind on the parent.
        self.require_privilege(&parent, Privilege::BIND).await?;

        // Synchronization preconditions against the parent collection.
        if let Err(code) = if_match_get_tokens(req, None, &*self.ns, &path).await {
            return Err(code.into());
        }

        match self.ns.make_collection(&path, &self.creds).await {
            Ok(()) => {}
            // An existing target is 405, not 409.
            Err(NsError::Exists) => {
                debug!("mkcol: {} already exists", path);
                return Err(StatusCode::METHOD_NOT_ALLOWED.into());
            }
            Err(NsError::NotFound) => return Err(StatusCode::CONFLICT.into()),
            Err(e) => return Err(e.into()),
        }

        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap();
        Ok(res)
    }
}
