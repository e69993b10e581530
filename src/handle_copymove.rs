use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::access::Privilege;
use crate::body::Body;
use crate::conditional::if_match;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::ns::{Existence, NodeKind, NsError};
use crate::util::DavMethod;
use crate::{DavError, DavInner, DavResult};

impl DavInner {
    pub(crate) async fn handle_copymove(
        &self,
        req: &Request<()>,
        method: DavMethod,
    ) -> DavResult<Response<Body>> {
        let copy = method == DavMethod::Copy;
        let mut path = self.path(req);

        let node = self
            .ns
            .get_node(&path, Existence::MustExist, NodeKind::Unknown)
            .await?;
        path.add_slash_if(node.is_collection());

        // COPY can be shallow; MOVE always takes the whole tree.
        let depth = req
            .headers()
            .typed_try_get::<davheaders::Depth>()
            .map_err(|_| DavError::Status(StatusCode::BAD_REQUEST))?;
        let recurse = match (copy, depth) {
            (true, Some(davheaders::Depth::Zero)) => false,
            (_, None | Some(davheaders::Depth::Infinity)) => true,
            _ => return Err(StatusCode::BAD_REQUEST.into()),
        };

        let dest = req
            .headers()
            .typed_get::<davheaders::Destination>()
            .ok_or(DavError::Status(StatusCode::BAD_REQUEST))?;
        let mut dest_path = DavPath::new(&dest.0, &self.prefix)?;
        dest_path.add_slash_if(node.is_collection());

        let overwrite = req
            .headers()
            .typed_get::<davheaders::Overwrite>()
            .map(|o| o.0)
            .unwrap_or(true);

        if path == dest_path {
            debug!("{}: source and destination are equal", method.as_str());
            return Err(StatusCode::FORBIDDEN.into());
        }

        if let Some(code) = if_match(req, Some(&*node), &*self.ns, &path).await {
            return Err(code.into());
        }

        // The destination's parent must exist.
        let dest_parent = dest_path.parent();
        if let Err(e) = self
            .ns
            .get_node(&dest_parent, Existence::MustExist, NodeKind::Collection)
            .await
        {
            return Err(match e {
                NsError::NotFound => DavError::Status(StatusCode::CONFLICT),
                other => other.into(),
            });
        }

        let dest_node = self
            .ns
            .get_node(&dest_path, Existence::MayExist, NodeKind::Unknown)
            .await?;
        if dest_node.exists() && !overwrite {
            return Err(StatusCode::PRECONDITION_FAILED.into());
        }

        // COPY reads the source; MOVE unbinds it from its parent.
        if copy {
            self.require_privilege(&path, Privilege::READ).await?;
        } else {
            self.require_privilege(&path.parent(), Privilege::UNBIND)
                .await?;
        }
        self.require_privilege(&dest_parent, Privilege::BIND).await?;
        if dest_node.exists() {
            self.require_privilege(&dest_parent, Privilege::UNBIND)
                .await?;
        }

        self.ns
            .copy_move(&path, &dest_path, copy, overwrite, recurse, &self.creds)
            .await?;

        let status = if dest_node.exists() {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::CREATED
        };
        let res = Response::builder()
            .status(status)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap();
        Ok(res)
    }
}
