use futures_util::future::{BoxFuture, FutureExt};
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::access::Privilege;
use crate::body::Body;
use crate::conditional::if_match;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::multistatus::MultiError;
use crate::ns::{Existence, NodeKind};
use crate::{DavError, DavInner, DavResult};

impl DavInner {
    // Delete the tree below a path, bottom-up, collecting per-path
    // failures. An empty result means everything went.
    fn delete_items<'a>(&'a self, path: DavPath) -> BoxFuture<'a, Vec<(DavPath, DavError)>> {
        async move {
            let mut errs = Vec::new();

            // Removing a member needs unbind on its parent collection.
            let parent = path.parent();
            let allowed = match self.ns.get_shared(parent.as_str()).await {
                Ok(entity) => self
                    .access()
                    .check_access(&entity, Privilege::UNBIND, true)
                    .await
                    .map(|a| a.allowed)
                    .unwrap_or(false),
                Err(_) => false,
            };
            if !allowed {
                errs.push((path, DavError::Status(StatusCode::FORBIDDEN)));
                return errs;
            }

            let node = match self
                .ns
                .get_node(&path, Existence::MustExist, NodeKind::Unknown)
                .await
            {
                Ok(node) => node,
                Err(e) => {
                    errs.push((path, e.into()));
                    return errs;
                }
            };

            if node.is_collection() {
                match self.ns.get_children(&path).await {
                    Ok(children) => {
                        for child in children {
                            let cpath = path.with_path(&child.uri());
                            errs.extend(self.delete_items(cpath).await);
                        }
                    }
                    Err(e) => {
                        errs.push((path, e.into()));
                        return errs;
                    }
                }
                // Leave a partially cleared collection in place.
                if !errs.is_empty() {
                    return errs;
                }
            }

            if let Err(e) = self.ns.delete(&path, &self.creds).await {
                errs.push((path, e.into()));
            }
            errs
        }
        .boxed()
    }

    pub(crate) async fn handle_delete(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        // Only Depth: infinity makes sense on DELETE; a bad literal is
        // just as much of a client error as a shallow depth.
        match req.headers().typed_try_get::<davheaders::Depth>() {
            Ok(None) | Ok(Some(davheaders::Depth::Infinity)) => {}
            _ => return Err(StatusCode::BAD_REQUEST.into()),
        }

        let mut path = self.path(req);
        let node = self
            .ns
            .get_node(&path, Existence::MustExist, NodeKind::Unknown)
            .await?;
        path.add_slash_if(node.is_collection());

        if let Some(code) = if_match(req, Some(&*node), &*self.ns, &path).await {
            return Err(code.into());
        }

        let mut me = MultiError::new(path.clone());
        for (p, e) in self.delete_items(path.clone()).await {
            me.add_status(&p, e);
        }
        me.finalstatus(&path, StatusCode::NO_CONTENT)
    }
}
