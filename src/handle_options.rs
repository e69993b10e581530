use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::ns::{Existence, NodeKind};
use crate::util::DavMethod;
use crate::{DavInner, DavResult};

const ALL_METHODS: [DavMethod; 12] = [
    DavMethod::Options,
    DavMethod::Head,
    DavMethod::Get,
    DavMethod::Put,
    DavMethod::PropFind,
    DavMethod::PropPatch,
    DavMethod::MkCol,
    DavMethod::Copy,
    DavMethod::Move,
    DavMethod::Delete,
    DavMethod::Acl,
    DavMethod::Report,
];

impl DavInner {
    pub(crate) async fn handle_options(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);

        let mut methods: Vec<DavMethod> = ALL_METHODS
            .iter()
            .copied()
            .filter(|&m| self.allow.map(|a| a.contains(m)).unwrap_or(true))
            .collect();

        // Tailor the Allow list to the target, unless this is "OPTIONS *".
        if !path.is_star() {
            match self
                .ns
                .get_node(&path, Existence::MayExist, NodeKind::Unknown)
                .await
            {
                Ok(node) if node.exists() => {
                    methods.retain(|&m| m != DavMethod::MkCol);
                    if !node.allows_content() {
                        methods.retain(|&m| m != DavMethod::Put);
                    }
                }
                _ => {
                    // Absent target: only creation makes sense.
                    methods.retain(|&m| {
                        matches!(m, DavMethod::Options | DavMethod::MkCol | DavMethod::Put)
                    });
                }
            }
        }

        let allow = methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let res = Response::builder()
            .status(StatusCode::OK)
            // No class 2: locking is not implemented.
            .header("dav", "1, 3, access-control, sync-collection")
            .header("ms-author-via", "DAV")
            .header("allow", allow)
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap();
        Ok(res)
    }
}
