//
// This module contains the main entry point of the library,
// DavHandler.
//
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use bytes::{buf::Buf, Bytes};
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::access::{AccessEngine, CurrentAccess, Privilege};
use crate::body::Body;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::ns::{Credentials, DavNamespace};
use crate::util::{dav_method, dav_xml_error, DavMethod, DavMethodSet};
use crate::DavResult;

// Upper bound on a PROPFIND/PROPPATCH/ACL/REPORT body.
const MAX_XML_BODY: usize = 65536;
// Default upper bound on a PUT body.
const MAX_PUT_BODY: usize = 16 * 1024 * 1024;

/// WebDAV protocol handler.
///
/// Build one with [`builder`](Self::builder), then call
/// [`handle`](Self::handle) for anonymous requests or
/// [`handle_auth`](Self::handle_auth) once the server in front has
/// established who the caller is.
#[derive(Clone, Default)]
pub struct DavHandler {
    pub(crate) config: Arc<DavConfig>,
}

/// Configuration of the handler.
#[derive(Clone, Default)]
pub struct DavConfig {
    // Prefix to be stripped off when handling request.
    pub(crate) prefix: Option<String>,
    // Namespace backend.
    pub(crate) ns: Option<Box<dyn DavNamespace>>,
    // Set of allowed methods (None means "all methods")
    pub(crate) allow: Option<DavMethodSet>,
    // Anonymous callers of auth-requiring methods get 405 by default,
    // 403 when this is set.
    pub(crate) forbid_anonymous: Option<bool>,
    // Privilege ceiling on a principal's own home collection.
    pub(crate) home_ceiling: Option<Privilege>,
    // Maximum PUT body size.
    pub(crate) max_put_body: Option<usize>,
}

impl DavConfig {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the configuration that was built to generate a [`DavHandler`].
    pub fn build_handler(self) -> DavHandler {
        DavHandler {
            config: Arc::new(self),
        }
    }

    /// Prefix to be stripped off before translating the rest of
    /// the request path to a namespace path.
    pub fn strip_prefix(self, prefix: impl Into<String>) -> Self {
        let mut this = self;
        this.prefix = Some(prefix.into());
        this
    }

    /// Set the namespace backend to use.
    pub fn namespace(self, ns: Box<dyn DavNamespace>) -> Self {
        let mut this = self;
        this.ns = Some(ns);
        this
    }

    /// Which methods to allow (default is all methods).
    pub fn methods(self, allow: DavMethodSet) -> Self {
        let mut this = self;
        this.allow = Some(allow);
        this
    }

    /// Respond 403 instead of 405 when an anonymous caller uses a
    /// method that requires authentication.
    pub fn forbid_anonymous(self, forbid: bool) -> Self {
        let mut this = self;
        this.forbid_anonymous = Some(forbid);
        this
    }

    /// Privilege ceiling applied to a principal's own home collection,
    /// whatever the stored access control lists say. The default is
    /// everything except write-acl.
    pub fn home_ceiling(self, ceiling: Privilege) -> Self {
        let mut this = self;
        this.home_ceiling = Some(ceiling);
        this
    }

    /// Maximum accepted PUT body size in bytes.
    pub fn max_put_body(self, size: usize) -> Self {
        let mut this = self;
        this.max_put_body = Some(size);
        this
    }

    fn merge(&self, new: Self) -> Self {
        Self {
            prefix: new.prefix.or_else(|| self.prefix.clone()),
            ns: new.ns.or_else(|| self.ns.clone()),
            allow: new.allow.or(self.allow),
            forbid_anonymous: new.forbid_anonymous.or(self.forbid_anonymous),
            home_ceiling: new.home_ceiling.or(self.home_ceiling),
            max_put_body: new.max_put_body.or(self.max_put_body),
        }
    }
}

// The actual inner struct.
//
// At the start of the request, DavConfig is used to generate
// a DavInner struct. DavInner::handle then handles the request.
pub(crate) struct DavInner {
    pub prefix: String,
    pub ns: Box<dyn DavNamespace>,
    pub allow: Option<DavMethodSet>,
    pub forbid_anonymous: bool,
    pub home_ceiling: Privilege,
    pub max_put_body: usize,
    pub creds: Credentials,
}

impl DavHandler {
    /// Create a new `DavHandler` with an empty configuration.
    pub fn new() -> Self {
        Self {
            config: Default::default(),
        }
    }

    /// Return a configuration builder.
    pub fn builder() -> DavConfig {
        DavConfig::new()
    }

    /// Process a request from an anonymous caller.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        self.handle_auth(req, Credentials::anonymous()).await
    }

    /// Process a request with the caller's identity established by the
    /// server in front of the engine.
    pub async fn handle_auth<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
        credentials: Credentials,
    ) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        match DavInner::new(self.config.as_ref().clone(), credentials) {
            Some(inner) => inner.handle(req).await,
            None => no_namespace_response(),
        }
    }

    /// Handle a request, overriding parts of the config.
    pub async fn handle_with<ReqBody, ReqData, ReqError>(
        &self,
        config: DavConfig,
        req: Request<ReqBody>,
        credentials: Credentials,
    ) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        match DavInner::new(self.config.merge(config), credentials) {
            Some(inner) => inner.handle(req).await,
            None => no_namespace_response(),
        }
    }
}

// Without a namespace nothing can be answered.
fn no_namespace_response() -> Response<Body> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("connection", "close")
        .body(Body::empty())
        .unwrap()
}

impl DavInner {
    pub fn new(cfg: DavConfig, creds: Credentials) -> Option<Self> {
        let DavConfig {
            prefix,
            ns,
            allow,
            forbid_anonymous,
            home_ceiling,
            max_put_body,
        } = cfg;
        Some(Self {
            prefix: prefix.unwrap_or_default(),
            ns: ns?,
            allow,
            forbid_anonymous: forbid_anonymous.unwrap_or(false),
            home_ceiling: home_ceiling.unwrap_or(Privilege::all() - Privilege::WRITE_ACL),
            max_put_body: max_put_body.unwrap_or(MAX_PUT_BODY),
            creds,
        })
    }

    // helper.
    pub(crate) fn path(&self, req: &Request<()>) -> DavPath {
        // This never fails (has been checked before)
        DavPath::from_uri(req.uri(), &self.prefix).unwrap()
    }

    // the per-request access engine.
    pub(crate) fn access(&self) -> AccessEngine<'_> {
        AccessEngine::new(&*self.ns, &self.creds).with_home_ceiling(self.home_ceiling)
    }

    // load the access facet of a node and require a privilege on it.
    pub(crate) async fn require_privilege(
        &self,
        path: &DavPath,
        want: Privilege,
    ) -> DavResult<CurrentAccess> {
        let entity = self.ns.get_shared(path.as_str()).await?;
        let access = self.access().check_access(&entity, want, false).await?;
        Ok(access)
    }

    // drain request body, bounded.
    pub(crate) async fn read_request<ReqBody, ReqData, ReqError>(
        &self,
        body: ReqBody,
        max_size: usize,
    ) -> DavResult<Bytes>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let mut data = Vec::new();
        let mut body = std::pin::pin!(body);

        while let Some(res) = std::future::poll_fn(|cx| body.as_mut().poll_frame(cx)).await {
            let mut frame = res.map_err(|_| {
                DavError::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, "UnexpectedEof"))
            })?;

            let Some(buf) = frame.data_mut() else {
                continue;
            };

            while buf.has_remaining() {
                if data.len() + buf.remaining() > max_size {
                    return Err(StatusCode::PAYLOAD_TOO_LARGE.into());
                }
                let b = buf.chunk();
                let l = b.len();
                data.extend_from_slice(b);
                buf.advance(l);
            }
        }
        Ok(Bytes::from(data))
    }

    // internal dispatcher.
    async fn handle<ReqBody, ReqData, ReqError>(self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let ns = self.ns.clone();

        // Turn any DavError results into a HTTP error response.
        match self.handle2(req).await {
            Ok(resp) => {
                debug!("== END REQUEST result OK");
                resp
            }
            Err(err) => {
                debug!("== END REQUEST result {:?}", err);
                if err.is_internal() {
                    error!("internal error, rolling back: {}", err);
                    if let Err(e) = ns.rollback().await {
                        error!("rollback failed: {}", e);
                    }
                }
                error_response(&err)
            }
        }
    }

    // internal dispatcher part 2.
    async fn handle2<ReqBody, ReqData, ReqError>(
        self,
        req: Request<ReqBody>,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let (req, body) = {
            let (parts, body) = req.into_parts();
            (Request::from_parts(parts, ()), body)
        };

        // translate HTTP method to Webdav method, honoring the
        // method override header.
        let override_method = req
            .headers()
            .get("x-http-method-override")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| http::Method::from_bytes(s.trim().as_bytes()).ok());
        let method_result = match override_method {
            Some(ref m) => dav_method(m),
            None => dav_method(req.method()),
        };
        let method = match method_result {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", req.method(), req.uri());
                return Err(e);
            }
        };

        // see if method is allowed.
        if let Some(ref a) = self.allow {
            if !a.contains(method) {
                debug!(
                    "method {} not allowed on request {}",
                    req.method(),
                    req.uri()
                );
                return Err(DavError::StatusClose(StatusCode::METHOD_NOT_ALLOWED));
            }
        }

        // the authorization gate: methods that mutate are not handed out
        // to anonymous callers at all.
        if method.requires_auth() && !self.creds.is_authenticated() {
            debug!("anonymous {} refused on {}", method.as_str(), req.uri());
            return Err(if self.forbid_anonymous {
                DavError::Status(StatusCode::FORBIDDEN)
            } else {
                DavError::StatusClose(StatusCode::METHOD_NOT_ALLOWED)
            });
        }

        // make sure the request path is valid.
        let path = DavPath::from_uri(req.uri(), &self.prefix)?;

        let max_body = match method {
            DavMethod::Put => self.max_put_body,
            _ => MAX_XML_BODY,
        };
        let body_data = self.read_request(body, max_body).await?;

        // Not all methods accept a body.
        match method {
            DavMethod::Put
            | DavMethod::PropFind
            | DavMethod::PropPatch
            | DavMethod::MkCol
            | DavMethod::Acl
            | DavMethod::Report => {}
            _ => {
                if !body_data.is_empty() {
                    return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
                }
            }
        }

        debug!("== START REQUEST {:?} {}", method, path);

        match method {
            DavMethod::Options => self.handle_options(&req).await,
            DavMethod::PropFind => self.handle_propfind(&req, &body_data).await,
            DavMethod::PropPatch => self.handle_proppatch(&req, &body_data).await,
            DavMethod::MkCol => self.handle_mkcol(&req, &body_data).await,
            DavMethod::Delete => self.handle_delete(&req).await,
            DavMethod::Head | DavMethod::Get => self.handle_get(&req).await,
            DavMethod::Copy | DavMethod::Move => self.handle_copymove(&req, method).await,
            DavMethod::Put => self.handle_put(&req, body_data).await,
            DavMethod::Acl => self.handle_acl(&req, &body_data).await,
            DavMethod::Report => self.handle_report(&req, &body_data).await,
        }
    }
}

// Render a DavError. Recognized protocol errors get a minimal
// <D:error> body; internal ones just a status, no detail.
fn error_response(err: &DavError) -> Response<Body> {
    let status = err.statuscode();
    let mut resp = Response::builder().status(status);
    if err.must_close() {
        resp = resp.header("connection", "close");
    }
    match err {
        DavError::Condition { tag, msg, .. } => resp
            .header("content-type", crate::multistatus::XML_CONTENT_TYPE)
            .body(dav_xml_error(Some(tag), msg.as_deref()))
            .unwrap(),
        _ => resp
            .header("content-length", "0")
            .body(Body::empty())
            .unwrap(),
    }
}
