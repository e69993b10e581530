//! Ephemeral in-memory namespace.
//!
//! Keeps the whole tree in a `BTreeMap` behind a mutex, including dead
//! properties, per-node access control lists and a change log that backs
//! the `sync-collection` report. Nothing is persisted; this is for tests,
//! demos, and as a starting point for real namespace implementations.
//!
//! A fresh [`MemNs`] contains `/`, `/principals/` and `/user/`. The root
//! grants everything to authenticated callers and read to everyone;
//! [`add_user`](MemNs::add_user) creates a principal plus a home
//! collection owned by it.
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use xmltree::Element;

use crate::access::SharedEntity;
use crate::davpath::DavPath;
use crate::node::{DavNode, DavProperty, PrincipalKind, PropValue};
use crate::ns::{
    Content, Credentials, DavNamespace, Existence, NodeKind, NsError, NsFuture, NsResult,
    PutResult, SyncReport, SyncReportItem,
};
use crate::xmltree_ext::NS_DAV_URI;

// Default access on a fresh root: everything for authenticated callers,
// read for everyone.
const ROOT_ACL: &str = "+aU;+rA";

#[derive(Debug, Clone)]
struct Entry {
    is_collection: bool,
    principal: PrincipalKind,
    content: Bytes,
    content_type: Option<String>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    etag: String,
    owner: Option<String>,
    acl: Option<String>,
    // Dead properties: (namespace, local name, rendered element).
    props: Vec<(Option<String>, String, Element)>,
}

impl Entry {
    fn collection(owner: Option<String>, acl: Option<String>) -> Entry {
        Entry {
            is_collection: true,
            principal: PrincipalKind::None,
            content: Bytes::new(),
            content_type: None,
            created: Utc::now(),
            modified: Utc::now(),
            etag: new_etag(),
            owner,
            acl,
            props: Vec::new(),
        }
    }

    fn principal(owner: Option<String>) -> Entry {
        Entry {
            principal: PrincipalKind::User,
            is_collection: false,
            ..Entry::collection(owner, None)
        }
    }
}

fn new_etag() -> String {
    Uuid::new_v4().simple().to_string()
}

fn prop_ns(ns: &Option<String>) -> &str {
    ns.as_deref().unwrap_or(NS_DAV_URI)
}

#[derive(Debug, Clone)]
struct Change {
    seq: u64,
    path: String,
    deleted: bool,
}

#[derive(Debug)]
struct MemInner {
    nodes: BTreeMap<String, Entry>,
    changes: Vec<Change>,
    seq: u64,
}

impl MemInner {
    // Map lookup tolerant of a missing trailing slash.
    fn resolve(&self, path: &str) -> Option<String> {
        if self.nodes.contains_key(path) {
            return Some(path.to_string());
        }
        let alt = if path.ends_with('/') {
            path.trim_end_matches('/').to_string()
        } else {
            format!("{}/", path)
        };
        if !alt.is_empty() && self.nodes.contains_key(&alt) {
            Some(alt)
        } else {
            None
        }
    }

    fn record(&mut self, path: &str, deleted: bool) -> u64 {
        self.seq += 1;
        self.changes.push(Change {
            seq: self.seq,
            path: path.to_string(),
            deleted,
        });
        self.seq
    }

    fn token(&self) -> String {
        format!("sync:{}", self.seq)
    }

    // Keys of a node and, for collections, everything below it.
    fn subtree(&self, key: &str) -> Vec<String> {
        let mut keys = vec![key.to_string()];
        if key.ends_with('/') {
            keys.extend(
                self.nodes
                    .range(key.to_string()..)
                    .skip(1)
                    .take_while(|(k, _)| k.starts_with(key))
                    .map(|(k, _)| k.clone()),
            );
        }
        keys
    }
}

/// In-memory namespace. Cloning is shallow; clones share the tree.
#[derive(Debug, Clone)]
pub struct MemNs {
    inner: Arc<Mutex<MemInner>>,
}

impl Default for MemNs {
    fn default() -> Self {
        MemNs::new()
    }
}

impl MemNs {
    pub fn new() -> MemNs {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Entry::collection(None, Some(ROOT_ACL.to_string())),
        );
        nodes.insert("/principals/".to_string(), Entry::collection(None, None));
        nodes.insert("/user/".to_string(), Entry::collection(None, None));
        MemNs {
            inner: Arc::new(Mutex::new(MemInner {
                nodes,
                changes: Vec::new(),
                seq: 0,
            })),
        }
    }

    /// Create a user principal and its home collection. Returns the
    /// principal href, e.g. `/principals/alice`.
    pub fn add_user(&self, name: &str) -> String {
        let href = format!("/principals/{}", name);
        let mut inner = self.inner.lock().unwrap();
        inner
            .nodes
            .insert(href.clone(), Entry::principal(Some(href.clone())));
        inner.nodes.insert(
            format!("/user/{}/", name),
            // The owner gets everything (the engine's home ceiling still
            // withholds write-acl); everyone else is locked out.
            Entry::collection(Some(href.clone()), Some("+aO;-aA".to_string())),
        );
        href
    }

    fn snapshot(&self, inner: &MemInner, key: &str) -> MemDavNode {
        MemDavNode {
            ns: self.clone(),
            path: key.to_string(),
            entry: inner.nodes.get(key).cloned(),
            token: if key.ends_with('/') {
                Some(inner.token())
            } else {
                None
            },
        }
    }

    fn missing(&self, path: &str) -> MemDavNode {
        MemDavNode {
            ns: self.clone(),
            path: path.to_string(),
            entry: None,
            token: None,
        }
    }
}

#[derive(Debug)]
struct MemDavNode {
    ns: MemNs,
    path: String,
    entry: Option<Entry>,
    token: Option<String>,
}

impl DavNode for MemDavNode {
    fn uri(&self) -> String {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.entry.is_some()
    }

    fn is_collection(&self) -> bool {
        match &self.entry {
            Some(e) => e.is_collection,
            None => self.path.ends_with('/'),
        }
    }

    fn principal(&self) -> PrincipalKind {
        self.entry
            .as_ref()
            .map(|e| e.principal)
            .unwrap_or(PrincipalKind::None)
    }

    fn allows_content(&self) -> bool {
        !self.is_collection() && self.principal() == PrincipalKind::None
    }

    fn owner(&self) -> Option<String> {
        self.entry.as_ref().and_then(|e| e.owner.clone())
    }

    fn created(&self) -> Option<DateTime<Utc>> {
        self.entry.as_ref().map(|e| e.created)
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        self.entry.as_ref().map(|e| e.modified)
    }

    fn etag(&self) -> Option<String> {
        self.entry.as_ref().map(|e| e.etag.clone())
    }

    fn content_length(&self) -> Option<u64> {
        self.entry
            .as_ref()
            .filter(|e| !e.is_collection)
            .map(|e| e.content.len() as u64)
    }

    fn content_type(&self) -> Option<String> {
        self.entry.as_ref().and_then(|e| e.content_type.clone())
    }

    fn sync_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn generate_property(&self, prop: &DavProperty) -> PropValue {
        let entry = match &self.entry {
            Some(e) => e,
            None => return PropValue::Unhandled,
        };
        for (ns, name, elem) in &entry.props {
            if *name == prop.name && prop_ns(ns) == prop_ns(&prop.namespace) {
                return PropValue::Handled(elem.clone());
            }
        }
        PropValue::Unhandled
    }

    fn set_property(&self, prop: &DavProperty, value: &Element) -> NsResult<()> {
        let mut stored = prop.to_element();
        stored.children = value.children.clone();
        let mut inner = self.ns.inner.lock().unwrap();
        let entry = inner.nodes.get_mut(&self.path).ok_or(NsError::NotFound)?;
        match entry
            .props
            .iter_mut()
            .find(|(ns, name, _)| *name == prop.name && prop_ns(ns) == prop_ns(&prop.namespace))
        {
            Some((_, _, elem)) => *elem = stored,
            None => entry
                .props
                .push((prop.namespace.clone(), prop.name.clone(), stored)),
        }
        entry.modified = Utc::now();
        Ok(())
    }

    fn remove_property(&self, prop: &DavProperty) -> NsResult<()> {
        let mut inner = self.ns.inner.lock().unwrap();
        let entry = inner.nodes.get_mut(&self.path).ok_or(NsError::NotFound)?;
        let before = entry.props.len();
        entry
            .props
            .retain(|(ns, name, _)| !(*name == prop.name && prop_ns(ns) == prop_ns(&prop.namespace)));
        if entry.props.len() == before {
            return Err(NsError::NotFound);
        }
        entry.modified = Utc::now();
        Ok(())
    }

    fn supported_properties(&self) -> Vec<DavProperty> {
        self.entry
            .as_ref()
            .map(|e| {
                e.props
                    .iter()
                    .map(|(ns, name, _)| DavProperty::new(ns.clone(), name))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn allprop_properties(&self) -> Vec<DavProperty> {
        self.supported_properties()
    }
}

impl DavNamespace for MemNs {
    fn get_node<'a>(
        &'a self,
        path: &'a DavPath,
        existence: Existence,
        kind: NodeKind,
    ) -> NsFuture<'a, Box<dyn DavNode>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            match inner.resolve(path.as_str()) {
                Some(key) => {
                    if existence == Existence::MustNotExist {
                        return Err(NsError::Exists);
                    }
                    let entry = &inner.nodes[&key];
                    let ok = match kind {
                        NodeKind::Collection => entry.is_collection,
                        NodeKind::Entity => !entry.is_collection,
                        NodeKind::Principal => entry.principal != PrincipalKind::None,
                        NodeKind::Unknown => true,
                    };
                    if !ok {
                        return Err(NsError::NotFound);
                    }
                    Ok(Box::new(self.snapshot(&inner, &key)) as Box<dyn DavNode>)
                }
                None => match existence {
                    Existence::MustExist => Err(NsError::NotFound),
                    _ => Ok(Box::new(self.missing(path.as_str())) as Box<dyn DavNode>),
                },
            }
        })
    }

    fn get_children<'a>(&'a self, path: &'a DavPath) -> NsFuture<'a, Vec<Box<dyn DavNode>>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            let base = inner.resolve(path.as_str()).ok_or(NsError::NotFound)?;
            if !base.ends_with('/') {
                return Err(NsError::NotFound);
            }
            let mut children: Vec<Box<dyn DavNode>> = Vec::new();
            for key in inner
                .nodes
                .range(base.clone()..)
                .map(|(k, _)| k)
                .skip(1)
                .take_while(|k| k.starts_with(&base))
            {
                let rest = &key[base.len()..];
                if !rest.trim_end_matches('/').contains('/') {
                    children.push(Box::new(self.snapshot(&inner, key)));
                }
            }
            Ok(children)
        })
    }

    fn make_collection<'a>(
        &'a self,
        path: &'a DavPath,
        creds: &'a Credentials,
    ) -> NsFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let key = path.as_str().to_string();
            if inner.resolve(&key).is_some() {
                return Err(NsError::Exists);
            }
            if inner.resolve(path.parent().as_str()).is_none() {
                return Err(NsError::NotFound);
            }
            inner.nodes.insert(
                key.clone(),
                Entry::collection(creds.principal.clone(), None),
            );
            inner.record(&key, false);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, path: &'a DavPath, _creds: &'a Credentials) -> NsFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let key = inner.resolve(path.as_str()).ok_or(NsError::NotFound)?;
            for k in inner.subtree(&key) {
                inner.nodes.remove(&k);
                inner.record(&k, true);
            }
            Ok(())
        })
    }

    fn copy_move<'a>(
        &'a self,
        from: &'a DavPath,
        to: &'a DavPath,
        copy: bool,
        overwrite: bool,
        recurse: bool,
        _creds: &'a Credentials,
    ) -> NsFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let from_key = inner.resolve(from.as_str()).ok_or(NsError::NotFound)?;
            let to_key = to.as_str().to_string();
            // Into its own subtree never ends well.
            if from_key.ends_with('/') && to_key.starts_with(&from_key) {
                return Err(NsError::Forbidden);
            }

            if let Some(existing) = inner.resolve(&to_key) {
                if !overwrite {
                    return Err(NsError::Exists);
                }
                for k in inner.subtree(&existing) {
                    inner.nodes.remove(&k);
                    inner.record(&k, true);
                }
            }
            if inner.resolve(to.parent().as_str()).is_none() {
                return Err(NsError::NotFound);
            }

            let source = if recurse {
                inner.subtree(&from_key)
            } else {
                vec![from_key.clone()]
            };
            for k in &source {
                let mut entry = inner.nodes[k].clone();
                if copy {
                    entry.etag = new_etag();
                }
                let dest = format!("{}{}", to_key, &k[from_key.len()..]);
                inner.nodes.insert(dest.clone(), entry);
                inner.record(&dest, false);
            }
            if !copy {
                // A shallow MOVE is never requested; take the whole tree.
                for k in inner.subtree(&from_key) {
                    inner.nodes.remove(&k);
                    inner.record(&k, true);
                }
            }
            Ok(())
        })
    }

    fn get_content<'a>(&'a self, path: &'a DavPath) -> NsFuture<'a, Content> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            let key = inner.resolve(path.as_str()).ok_or(NsError::NotFound)?;
            let entry = &inner.nodes[&key];
            if entry.is_collection {
                return Err(NsError::Forbidden);
            }
            Ok(Content {
                data: entry.content.clone(),
                content_type: entry.content_type.clone(),
            })
        })
    }

    fn put_content<'a>(
        &'a self,
        path: &'a DavPath,
        data: Bytes,
        content_type: Option<String>,
        create_new: bool,
        creds: &'a Credentials,
    ) -> NsFuture<'a, PutResult> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let key = path.as_str().to_string();
            let created = match inner.resolve(&key) {
                Some(existing) => {
                    if create_new {
                        return Err(NsError::Exists);
                    }
                    let entry = inner.nodes.get_mut(&existing).ok_or(NsError::NotFound)?;
                    if entry.is_collection {
                        return Err(NsError::Forbidden);
                    }
                    entry.content = data;
                    if content_type.is_some() {
                        entry.content_type = content_type;
                    }
                    entry.modified = Utc::now();
                    entry.etag = new_etag();
                    false
                }
                None => {
                    if inner.resolve(path.parent().as_str()).is_none() {
                        return Err(NsError::NotFound);
                    }
                    let mut entry = Entry::collection(creds.principal.clone(), None);
                    entry.is_collection = false;
                    entry.content = data;
                    entry.content_type = content_type;
                    inner.nodes.insert(key.clone(), entry);
                    true
                }
            };
            inner.record(&key, false);
            let etag = inner.nodes[&key].etag.clone();
            Ok(PutResult {
                created,
                etag: Some(etag),
            })
        })
    }

    fn get_sync_report<'a>(
        &'a self,
        path: &'a DavPath,
        token: Option<&'a str>,
        limit: Option<u32>,
        recurse: bool,
    ) -> NsFuture<'a, SyncReport> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            let base = inner.resolve(path.as_str()).ok_or(NsError::NotFound)?;
            if !base.ends_with('/') {
                return Err(NsError::NotFound);
            }
            let current = inner.token();

            let since = match token {
                None => 0,
                Some(t) => match t.strip_prefix("sync:").and_then(|s| s.parse::<u64>().ok()) {
                    Some(n) if n <= inner.seq => n,
                    _ => {
                        return Ok(SyncReport {
                            items: Vec::new(),
                            truncated: false,
                            token_valid: false,
                            token: current,
                        });
                    }
                },
            };

            let in_scope = |p: &str| {
                p.starts_with(&base)
                    && p != base
                    && (recurse || !p[base.len()..].trim_end_matches('/').contains('/'))
            };

            // Latest state per member path since the token.
            let mut latest: BTreeMap<String, bool> = BTreeMap::new();
            if since == 0 {
                for key in inner.nodes.keys().filter(|k| in_scope(k)) {
                    latest.insert(key.clone(), false);
                }
            } else {
                for c in inner.changes.iter().filter(|c| c.seq > since) {
                    if in_scope(&c.path) {
                        latest.insert(c.path.clone(), c.deleted);
                    }
                }
            }

            let mut items = Vec::new();
            let mut truncated = false;
            for (key, deleted) in latest {
                if limit.map(|l| items.len() as u32 >= l).unwrap_or(false) {
                    truncated = true;
                    break;
                }
                let (node, deleted) = if inner.nodes.contains_key(&key) {
                    (self.snapshot(&inner, &key), false)
                } else if deleted {
                    (self.missing(&key), true)
                } else {
                    continue;
                };
                items.push(SyncReportItem {
                    node: Box::new(node),
                    can_sync: true,
                    deleted,
                });
            }

            Ok(SyncReport {
                items,
                truncated,
                token_valid: true,
                token: current,
            })
        })
    }

    fn get_sync_token<'a>(&'a self, path: &'a DavPath) -> NsFuture<'a, Option<String>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .resolve(path.as_str())
                .filter(|k| k.ends_with('/'))
                .map(|_| inner.token()))
        })
    }

    fn get_shared<'a>(&'a self, path: &'a str) -> NsFuture<'a, SharedEntity> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            let key = inner.resolve(path).ok_or(NsError::NotFound)?;
            let entry = &inner.nodes[&key];
            let parent = if key == "/" {
                None
            } else {
                let trimmed = key.trim_end_matches('/');
                trimmed.rfind('/').map(|i| trimmed[..=i].to_string())
            };
            Ok(SharedEntity::new(
                key.clone(),
                entry.owner.clone(),
                entry.acl.clone(),
                parent,
                entry.is_collection,
            ))
        })
    }

    fn set_acl<'a>(
        &'a self,
        path: &'a str,
        acl: &'a str,
        _creds: &'a Credentials,
    ) -> NsFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let key = inner.resolve(path).ok_or(NsError::NotFound)?;
            let entry = inner.nodes.get_mut(&key).ok_or(NsError::NotFound)?;
            entry.acl = Some(acl.to_string());
            entry.modified = Utc::now();
            inner.record(&key, false);
            Ok(())
        })
    }

    fn get_principal<'a>(&'a self, href: &'a str) -> NsFuture<'a, Box<dyn DavNode>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            let key = inner.resolve(href).ok_or(NsError::NotFound)?;
            if inner.nodes[&key].principal == PrincipalKind::None {
                return Err(NsError::NotFound);
            }
            Ok(Box::new(self.snapshot(&inner, &key)) as Box<dyn DavNode>)
        })
    }

    fn box_clone(&self) -> Box<dyn DavNamespace> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> DavPath {
        DavPath::new(s, "").unwrap()
    }

    #[tokio::test]
    async fn tree_basics() {
        let ns = MemNs::new();
        let alice = ns.add_user("alice");
        let creds = Credentials::user(alice);

        ns.make_collection(&path("/user/alice/notes/"), &creds)
            .await
            .unwrap();
        let r = ns
            .put_content(
                &path("/user/alice/notes/a.txt"),
                Bytes::from_static(b"hi"),
                Some("text/plain".to_string()),
                false,
                &creds,
            )
            .await
            .unwrap();
        assert!(r.created);

        let children = ns.get_children(&path("/user/alice/notes/")).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].uri(), "/user/alice/notes/a.txt");

        let c = ns.get_content(&path("/user/alice/notes/a.txt")).await.unwrap();
        assert_eq!(&c.data[..], b"hi");

        // Slash-insensitive lookup.
        let n = ns
            .get_node(&path("/user/alice/notes"), Existence::MustExist, NodeKind::Unknown)
            .await
            .unwrap();
        assert!(n.is_collection());
    }

    #[tokio::test]
    async fn sync_feed() {
        let ns = MemNs::new();
        let creds = Credentials::user("/principals/x");
        ns.make_collection(&path("/c/"), &creds).await.unwrap();

        let r0 = ns
            .get_sync_report(&path("/c/"), None, None, false)
            .await
            .unwrap();
        assert!(r0.token_valid);
        assert!(r0.items.is_empty());

        ns.put_content(&path("/c/one"), Bytes::new(), None, false, &creds)
            .await
            .unwrap();
        let r1 = ns
            .get_sync_report(&path("/c/"), Some(&r0.token), None, false)
            .await
            .unwrap();
        assert!(r1.token_valid);
        assert_eq!(r1.items.len(), 1);
        assert!(!r1.items[0].deleted);

        ns.delete(&path("/c/one"), &creds).await.unwrap();
        let r2 = ns
            .get_sync_report(&path("/c/"), Some(&r1.token), None, false)
            .await
            .unwrap();
        assert_eq!(r2.items.len(), 1);
        assert!(r2.items[0].deleted);

        // Nothing changed, same token comes back.
        let r3 = ns
            .get_sync_report(&path("/c/"), Some(&r2.token), None, false)
            .await
            .unwrap();
        assert!(r3.items.is_empty());
        assert_eq!(r3.token, r2.token);

        let bad = ns
            .get_sync_report(&path("/c/"), Some("sync:999999"), None, false)
            .await
            .unwrap();
        assert!(!bad.token_valid);
    }

    #[tokio::test]
    async fn copy_and_move() {
        let ns = MemNs::new();
        let creds = Credentials::user("/principals/x");
        ns.make_collection(&path("/src/"), &creds).await.unwrap();
        ns.put_content(&path("/src/f"), Bytes::from_static(b"x"), None, false, &creds)
            .await
            .unwrap();

        ns.copy_move(&path("/src/"), &path("/dst/"), true, true, true, &creds)
            .await
            .unwrap();
        assert!(ns.get_content(&path("/dst/f")).await.is_ok());
        assert!(ns.get_content(&path("/src/f")).await.is_ok());

        ns.copy_move(&path("/src/"), &path("/moved/"), false, true, true, &creds)
            .await
            .unwrap();
        assert!(ns.get_content(&path("/src/f")).await.is_err());
        assert!(ns.get_content(&path("/moved/f")).await.is_ok());
    }
}
