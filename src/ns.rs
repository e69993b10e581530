//! The namespace collaborator interface.
//!
//! The protocol engine is storage-agnostic: every lookup and mutation goes
//! through [`DavNamespace`]. An implementation maps decoded paths to nodes,
//! lists children, stores content, keeps a per-collection change feed for
//! sync reports, and persists access control lists. The engine supplies the
//! request's [`Credentials`] to every mutating call so the namespace can
//! record ownership.
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::access::SharedEntity;
use crate::davpath::DavPath;
use crate::node::DavNode;

/// Errors a namespace implementation can return.
///
/// These deliberately carry no payload; they map 1:1 onto an HTTP status
/// and the engine adds context when logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsError {
    /// Operation not implemented by this namespace.
    NotImplemented,
    /// Something went wrong internally.
    GeneralFailure,
    /// Target already exists.
    Exists,
    /// Target not found.
    NotFound,
    /// Operation refused by the namespace itself.
    Forbidden,
    /// Out of storage space.
    InsufficientStorage,
    /// Request entity too large.
    TooLarge,
}

impl Error for NsError {}

impl fmt::Display for NsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Result of a namespace call.
pub type NsResult<T> = Result<T, NsError>;

/// Convenience alias for boxed futures returned by namespace methods.
pub type NsFuture<'a, T> = Pin<Box<dyn Future<Output = NsResult<T>> + Send + 'a>>;

/// What existence state the caller expects of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    MustExist,
    MustNotExist,
    MayExist,
}

/// What kind of node the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Collection,
    Entity,
    Principal,
    Unknown,
}

/// The identity of the caller, as established by the server in front of
/// the engine. `principal` and `groups` are principal hrefs, decoded,
/// without the URL prefix.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub principal: Option<String>,
    pub groups: Vec<String>,
    pub superuser: bool,
}

impl Credentials {
    /// An anonymous caller.
    pub fn anonymous() -> Credentials {
        Credentials::default()
    }

    /// An authenticated user principal.
    pub fn user(principal: impl Into<String>) -> Credentials {
        Credentials {
            principal: Some(principal.into()),
            groups: Vec::new(),
            superuser: false,
        }
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Credentials {
        self.groups = groups;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Does this principal href denote the caller, directly or through
    /// group membership? Trailing slashes are ignored.
    pub fn matches(&self, href: &str) -> bool {
        let href = href.trim_end_matches('/');
        if let Some(p) = self.principal.as_deref() {
            if p.trim_end_matches('/') == href {
                return true;
            }
        }
        self.groups
            .iter()
            .any(|g| g.trim_end_matches('/') == href)
    }

    /// Last segment of the principal href, e.g. "alice".
    pub fn account_name(&self) -> Option<&str> {
        self.principal
            .as_deref()
            .map(|p| p.trim_end_matches('/'))
            .and_then(|p| p.rsplit('/').next())
            .filter(|s| !s.is_empty())
    }
}

/// Content of a non-collection node, returned by `get_content`.
#[derive(Debug, Clone)]
pub struct Content {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Result of storing content.
#[derive(Debug, Clone)]
pub struct PutResult {
    /// True if the node did not exist before.
    pub created: bool,
    /// New entity tag, without quotes.
    pub etag: Option<String>,
}

/// One changed or removed member in a sync report.
#[derive(Debug)]
pub struct SyncReportItem {
    pub node: Box<dyn DavNode>,
    /// False when the member is itself a collection whose contents cannot
    /// be reported in this feed (the client must sync it separately).
    pub can_sync: bool,
    /// True when the member was removed since the given token.
    pub deleted: bool,
}

/// A change report for one collection.
#[derive(Debug)]
pub struct SyncReport {
    pub items: Vec<SyncReportItem>,
    /// True when the item list was cut short by the requested limit.
    pub truncated: bool,
    /// False when the presented token was not (or no longer is) a token
    /// of this collection.
    pub token_valid: bool,
    /// The token representing the state the items bring the client up to.
    pub token: String,
}

/// A pluggable hierarchical namespace.
///
/// Paths passed in are always normalized and percent-decoded; collection
/// paths carry a trailing slash. All methods return boxed futures, the
/// same way the node lookups in the handler are awaited.
pub trait DavNamespace: fmt::Debug + Send + Sync {
    /// Look up a single node. The `existence` and `kind` hints let the
    /// namespace fail early with [`NsError::NotFound`] / [`NsError::Exists`]
    /// instead of returning a node the caller would reject anyway.
    fn get_node<'a>(
        &'a self,
        path: &'a DavPath,
        existence: Existence,
        kind: NodeKind,
    ) -> NsFuture<'a, Box<dyn DavNode>>;

    /// Direct members of a collection.
    fn get_children<'a>(&'a self, path: &'a DavPath) -> NsFuture<'a, Vec<Box<dyn DavNode>>>;

    /// Create a collection. [`NsError::Exists`] if the path is taken,
    /// [`NsError::NotFound`] if the parent does not exist.
    fn make_collection<'a>(
        &'a self,
        path: &'a DavPath,
        creds: &'a Credentials,
    ) -> NsFuture<'a, ()>;

    /// Remove a node. Collections are removed with everything below them.
    fn delete<'a>(&'a self, path: &'a DavPath, creds: &'a Credentials) -> NsFuture<'a, ()>;

    /// Duplicate (`copy == true`) or rename a node. `recurse` is false for
    /// a depth-0 COPY of a collection, which duplicates the collection
    /// without members.
    fn copy_move<'a>(
        &'a self,
        from: &'a DavPath,
        to: &'a DavPath,
        copy: bool,
        overwrite: bool,
        recurse: bool,
        creds: &'a Credentials,
    ) -> NsFuture<'a, ()>;

    /// Content of a non-collection node.
    fn get_content<'a>(&'a self, path: &'a DavPath) -> NsFuture<'a, Content>;

    /// Store content. With `create_new`, fail with [`NsError::Exists`] if
    /// the node already exists.
    fn put_content<'a>(
        &'a self,
        path: &'a DavPath,
        data: Bytes,
        content_type: Option<String>,
        create_new: bool,
        creds: &'a Credentials,
    ) -> NsFuture<'a, PutResult>;

    /// Changes in a collection since `token` (all members when `None`).
    /// `limit` caps the number of items; `recurse` asks for a tree-wide
    /// feed instead of direct members only.
    fn get_sync_report<'a>(
        &'a self,
        path: &'a DavPath,
        token: Option<&'a str>,
        limit: Option<u32>,
        recurse: bool,
    ) -> NsFuture<'a, SyncReport>;

    /// Current sync token of a collection, `None` if it keeps no feed.
    fn get_sync_token<'a>(&'a self, path: &'a DavPath) -> NsFuture<'a, Option<String>>;

    /// Shared access-control facet of a node, for the access engine.
    /// `path` is the decoded path, collection paths with trailing slash.
    fn get_shared<'a>(&'a self, path: &'a str) -> NsFuture<'a, SharedEntity>;

    /// Persist a changed access control list for a node.
    fn set_acl<'a>(
        &'a self,
        path: &'a str,
        acl: &'a str,
        creds: &'a Credentials,
    ) -> NsFuture<'a, ()>;

    /// Look up a principal node by href.
    fn get_principal<'a>(&'a self, href: &'a str) -> NsFuture<'a, Box<dyn DavNode>>;

    /// The collection under which per-user home collections live.
    fn user_home_root(&self) -> String {
        "/user/".to_string()
    }

    /// Undo namespace changes made by the current request, called when a
    /// handler fails after it already mutated something.
    fn rollback<'a>(&'a self) -> NsFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn box_clone(&self) -> Box<dyn DavNamespace>;
}

impl Clone for Box<dyn DavNamespace> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_matching() {
        let c = Credentials::user("/principals/alice").with_groups(vec!["/principals/staff".to_string()]);
        assert!(c.matches("/principals/alice"));
        assert!(c.matches("/principals/alice/"));
        assert!(c.matches("/principals/staff"));
        assert!(!c.matches("/principals/bob"));
        assert_eq!(c.account_name(), Some("alice"));
        assert!(!Credentials::anonymous().is_authenticated());
    }
}
