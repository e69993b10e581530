use std::io::Cursor;

use http::{Request, Response, StatusCode};
use xmltree::Element;

use crate::access::{ace_from_element, AceWho, Acl};
use crate::body::Body;
use crate::conditional::if_match;
use crate::ns::{Existence, NodeKind};
use crate::xmltree_ext::{child_elems, is_dav_elem, ElementExt};
use crate::{DavError, DavInner, DavResult};

impl DavInner {
    pub(crate) async fn handle_acl(
        &self,
        req: &Request<()>,
        body: &[u8],
    ) -> DavResult<Response<Body>> {
        let root = Element::parse2(Cursor::new(body))?;
        if !is_dav_elem(&root, "acl") {
            return Err(DavError::XmlParseError);
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

        let mut aces = Vec::new();
        for child in child_elems(&root) {
            if !is_dav_elem(child, "ace") {
                return Err(DavError::XmlParseError);
            }
            let ace = ace_from_element(child)?;
            // Every named principal must resolve.
            if let AceWho::Href(h) = &ace.who {
                if self.ns.get_principal(h).await.is_err() {
                    return Err(DavError::condition_msg(
                        StatusCode::FORBIDDEN,
                        "recognized-principal",
                        format!("unknown principal {}", h),
                    ));
                }
            }
            aces.push(ace);
        }

        // change_access checks write-acl on the target itself.
        let entity = self.ns.get_shared(path.as_str()).await?;
        self.access().change_access(&entity, &Acl::new(aces)).await?;

        let res = Response::builder()
            .status(StatusCode::OK)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap();
        Ok(res)
    }
}
