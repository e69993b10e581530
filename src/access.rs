//! Hierarchical access control.
//!
//! Every node can carry an access control list; a node without one inherits
//! from its nearest ancestor collection that has one, and the namespace
//! root must always carry a default list. [`AccessEngine::check_access`]
//! merges those lists top-down and evaluates them for the current caller,
//! caching the result per desired-privilege on the entity (collections
//! only; a non-collection's effective access depends on its parent chain
//! and would stale immediately).
//!
//! Lists are stored by the namespace in a compact single-line text form.
//! Entries are separated by `;`, each entry is
//! `[+|-]<privileges><who>[arg]`:
//!
//! - `+` grants (default), `-` denies;
//! - privileges: `a` all, `r` read, `w` write, `p` write-properties,
//!   `c` write-content, `b` bind, `u` unbind, `l` read-acl, `L` write-acl;
//! - who: `A` all, `U` authenticated, `N` unauthenticated, `O` owner,
//!   `S` self, `P<href>` a named principal, `R<prop>` property-based.
//!
//! `+rO;+aP/principals/alice;-aA` reads: owner may read, alice may do
//! anything, everyone else nothing.
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};

use bitflags::bitflags;
use xmltree::Element;

use crate::ns::{Credentials, DavNamespace, NsError, NsResult};
use crate::xmltree_ext::{child_elems, is_dav_elem, ElementExt};
use crate::{DavError, DavResult};

// An inheritance chain deeper than this means a parent-pointer loop.
const MAX_ACL_DEPTH: usize = 64;

bitflags! {
    /// WebDAV-ACL privileges as a bit set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Privilege: u32 {
        const READ          = 0x0001;
        const WRITE_PROPS   = 0x0002;
        const WRITE_CONTENT = 0x0004;
        const BIND          = 0x0008;
        const UNBIND        = 0x0010;
        const READ_ACL      = 0x0020;
        const WRITE_ACL     = 0x0040;
        /// Aggregate: write-properties, write-content, bind, unbind.
        const WRITE = 0x0002 | 0x0004 | 0x0008 | 0x0010;
    }
}

impl Privilege {
    fn encode(self, out: &mut String) {
        if self == Privilege::all() {
            out.push('a');
            return;
        }
        let mut p = self;
        if p.contains(Privilege::WRITE) {
            out.push('w');
            p.remove(Privilege::WRITE);
        }
        for (flag, c) in [
            (Privilege::READ, 'r'),
            (Privilege::WRITE_PROPS, 'p'),
            (Privilege::WRITE_CONTENT, 'c'),
            (Privilege::BIND, 'b'),
            (Privilege::UNBIND, 'u'),
            (Privilege::READ_ACL, 'l'),
            (Privilege::WRITE_ACL, 'L'),
        ] {
            if p.contains(flag) {
                out.push(c);
            }
        }
    }

    fn from_char(c: char) -> Option<Privilege> {
        Some(match c {
            'a' => Privilege::all(),
            'r' => Privilege::READ,
            'w' => Privilege::WRITE,
            'p' => Privilege::WRITE_PROPS,
            'c' => Privilege::WRITE_CONTENT,
            'b' => Privilege::BIND,
            'u' => Privilege::UNBIND,
            'l' => Privilege::READ_ACL,
            'L' => Privilege::WRITE_ACL,
            _ => return None,
        })
    }

    /// The XML element names making up this set, most aggregate first.
    pub(crate) fn xml_names(self) -> Vec<&'static str> {
        if self == Privilege::all() {
            return vec!["all"];
        }
        let mut v = Vec::new();
        let mut p = self;
        if p.contains(Privilege::WRITE) {
            v.push("write");
            p.remove(Privilege::WRITE);
        }
        for (flag, name) in [
            (Privilege::READ, "read"),
            (Privilege::WRITE_PROPS, "write-properties"),
            (Privilege::WRITE_CONTENT, "write-content"),
            (Privilege::BIND, "bind"),
            (Privilege::UNBIND, "unbind"),
            (Privilege::READ_ACL, "read-acl"),
            (Privilege::WRITE_ACL, "write-acl"),
        ] {
            if p.contains(flag) {
                v.push(name);
            }
        }
        v
    }

    pub(crate) fn from_xml_name(name: &str) -> Option<Privilege> {
        Some(match name {
            "all" => Privilege::all(),
            "read" => Privilege::READ,
            "write" => Privilege::WRITE,
            "write-properties" => Privilege::WRITE_PROPS,
            "write-content" => Privilege::WRITE_CONTENT,
            "bind" => Privilege::BIND,
            "unbind" => Privilege::UNBIND,
            "read-acl" => Privilege::READ_ACL,
            "write-acl" => Privilege::WRITE_ACL,
            _ => return None,
        })
    }
}

/// The principal selector of an access control entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AceWho {
    All,
    Authenticated,
    Unauthenticated,
    Owner,
    /// The entity itself, when it is the caller's own principal resource.
    Self_,
    /// A named principal (or group) href.
    Href(String),
    /// Principals named by a property of the entity. Never matched during
    /// evaluation; resolved only by the principal reports.
    Property(String),
}

impl AceWho {
    fn matches(&self, creds: &Credentials, owner: Option<&str>, self_href: Option<&str>) -> bool {
        match self {
            AceWho::All => true,
            AceWho::Authenticated => creds.is_authenticated(),
            AceWho::Unauthenticated => !creds.is_authenticated(),
            AceWho::Owner => owner.map(|o| creds.matches(o)).unwrap_or(false),
            AceWho::Self_ => self_href.map(|s| creds.matches(s)).unwrap_or(false),
            AceWho::Href(h) => creds.matches(h),
            AceWho::Property(_) => false,
        }
    }
}

/// One access control entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ace {
    pub deny: bool,
    pub who: AceWho,
    pub privileges: Privilege,
}

impl Ace {
    pub fn grant(who: AceWho, privileges: Privilege) -> Ace {
        Ace {
            deny: false,
            who,
            privileges,
        }
    }

    pub fn deny(who: AceWho, privileges: Privilege) -> Ace {
        Ace {
            deny: true,
            who,
            privileges,
        }
    }
}

/// Error decoding a stored access control list.
#[derive(Debug)]
pub struct AclParseError(String);

impl Error for AclParseError {}

impl fmt::Display for AclParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed acl entry {:?}", self.0)
    }
}

/// The outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentAccess {
    pub allowed: bool,
    /// Full set of privileges the merged list grants the caller.
    pub privileges: Privilege,
}

/// An ordered list of access control entries. Order is significant: the
/// first entry matching the caller that mentions a privilege decides that
/// privilege, so a deny listed before a grant wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    pub aces: Vec<Ace>,
}

impl Acl {
    pub fn new(aces: Vec<Ace>) -> Acl {
        Acl { aces }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, ace) in self.aces.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            out.push(if ace.deny { '-' } else { '+' });
            ace.privileges.encode(&mut out);
            match &ace.who {
                AceWho::All => out.push('A'),
                AceWho::Authenticated => out.push('U'),
                AceWho::Unauthenticated => out.push('N'),
                AceWho::Owner => out.push('O'),
                AceWho::Self_ => out.push('S'),
                AceWho::Href(h) => {
                    out.push('P');
                    out.push_str(h);
                }
                AceWho::Property(p) => {
                    out.push('R');
                    out.push_str(p);
                }
            }
        }
        out
    }

    pub fn decode(s: &str) -> Result<Acl, AclParseError> {
        let mut aces = Vec::new();
        for entry in s.split(';') {
            if entry.is_empty() {
                continue;
            }
            let mut chars = entry.chars().peekable();
            let deny = match chars.peek() {
                Some('-') => {
                    chars.next();
                    true
                }
                Some('+') => {
                    chars.next();
                    false
                }
                _ => false,
            };
            let mut privileges = Privilege::empty();
            let who = loop {
                let c = chars
                    .next()
                    .ok_or_else(|| AclParseError(entry.to_string()))?;
                if let Some(p) = Privilege::from_char(c) {
                    privileges |= p;
                    continue;
                }
                let rest: String = chars.collect();
                break match c {
                    'A' => AceWho::All,
                    'U' => AceWho::Authenticated,
                    'N' => AceWho::Unauthenticated,
                    'O' => AceWho::Owner,
                    'S' => AceWho::Self_,
                    'P' => AceWho::Href(rest),
                    'R' => AceWho::Property(rest),
                    _ => return Err(AclParseError(entry.to_string())),
                };
            };
            if privileges.is_empty() {
                return Err(AclParseError(entry.to_string()));
            }
            aces.push(Ace {
                deny,
                who,
                privileges,
            });
        }
        Ok(Acl { aces })
    }

    /// Merge this (child) list with an inherited one. Child entries come
    /// first, so they take precedence under first-match-wins.
    pub fn merge(&self, inherited: &Acl) -> Acl {
        let mut aces = self.aces.clone();
        aces.extend(inherited.aces.iter().cloned());
        Acl { aces }
    }

    /// Evaluate the list for a caller.
    ///
    /// Each privilege bit is decided by the first entry that matches the
    /// caller and mentions that bit. `want` empty means "any": the check
    /// passes if anything at all is granted.
    pub fn evaluate(
        &self,
        creds: &Credentials,
        owner: Option<&str>,
        self_href: Option<&str>,
    ) -> Privilege {
        let mut granted = Privilege::empty();
        let mut decided = Privilege::empty();
        for ace in &self.aces {
            if decided == Privilege::all() {
                break;
            }
            if !ace.who.matches(creds, owner, self_href) {
                continue;
            }
            let fresh = ace.privileges - decided;
            if !ace.deny {
                granted |= fresh;
            }
            decided |= fresh;
        }
        granted
    }

    /// All principal hrefs named anywhere in the list.
    pub fn principal_hrefs(&self) -> Vec<String> {
        let mut v = Vec::new();
        for ace in &self.aces {
            if let AceWho::Href(h) = &ace.who {
                if !v.contains(h) {
                    v.push(h.clone());
                }
            }
        }
        v
    }

    /// Render as a list of `D:ace` elements, for the `acl` property.
    pub(crate) fn to_xml(&self) -> Vec<Element> {
        self.aces.iter().map(ace_to_element).collect()
    }
}

fn ace_to_element(ace: &Ace) -> Element {
    let mut principal = Element::new2("D:principal");
    match &ace.who {
        AceWho::All => principal.push(Element::new2("D:all")),
        AceWho::Authenticated => principal.push(Element::new2("D:authenticated")),
        AceWho::Unauthenticated => principal.push(Element::new2("D:unauthenticated")),
        AceWho::Self_ => principal.push(Element::new2("D:self")),
        AceWho::Href(h) => principal.push(Element::new_text("D:href", h.clone())),
        AceWho::Owner => {
            let mut prop = Element::new2("D:property");
            prop.push(Element::new2("D:owner"));
            principal.push(prop);
        }
        AceWho::Property(p) => {
            let mut prop = Element::new2("D:property");
            prop.push(Element::new2(&format!("D:{}", p)));
            principal.push(prop);
        }
    }
    let mut verb = Element::new2(if ace.deny { "D:deny" } else { "D:grant" });
    for name in ace.privileges.xml_names() {
        let mut priv_elem = Element::new2("D:privilege");
        priv_elem.push(Element::new2(&format!("D:{}", name)));
        verb.push(priv_elem);
    }
    let mut e = Element::new2("D:ace");
    e.push(principal);
    e.push(verb);
    e
}

/// Parse one `D:ace` element from an ACL method body.
pub(crate) fn ace_from_element(e: &Element) -> DavResult<Ace> {
    let mut who = None;
    let mut deny = None;
    let mut privileges = Privilege::empty();
    for child in child_elems(e) {
        if is_dav_elem(child, "principal") {
            for p in child_elems(child) {
                who = Some(match p.name.as_str() {
                    "all" => AceWho::All,
                    "authenticated" => AceWho::Authenticated,
                    "unauthenticated" => AceWho::Unauthenticated,
                    "self" => AceWho::Self_,
                    "href" => AceWho::Href(p.text_content().trim().to_string()),
                    "property" => match child_elems(p).next() {
                        Some(t) if t.name == "owner" => AceWho::Owner,
                        Some(t) => AceWho::Property(t.name.clone()),
                        None => return Err(DavError::XmlParseError),
                    },
                    _ => {
                        return Err(DavError::Condition {
                            status: http::StatusCode::FORBIDDEN,
                            tag: "recognized-principal",
                            msg: Some(format!("unknown principal type {}", p.name)),
                        });
                    }
                });
            }
        } else if is_dav_elem(child, "grant") || is_dav_elem(child, "deny") {
            deny = Some(child.name == "deny");
            for priv_elem in child_elems(child) {
                for p in child_elems(priv_elem) {
                    privileges |= Privilege::from_xml_name(&p.name).ok_or_else(|| {
                        DavError::Condition {
                            status: http::StatusCode::FORBIDDEN,
                            tag: "not-supported-privilege",
                            msg: Some(format!("unknown privilege {}", p.name)),
                        }
                    })?;
                }
            }
        }
        // "invert" and friends are not supported; ignore.
    }
    match (who, deny) {
        (Some(who), Some(deny)) if !privileges.is_empty() => Ok(Ace {
            deny,
            who,
            privileges,
        }),
        _ => Err(DavError::XmlParseError),
    }
}

/// Per-entity cache of access check results, keyed by the desired
/// privilege bits. Scoped to one request's view of the tree.
pub type AccessState = Arc<Mutex<HashMap<u32, CurrentAccess>>>;

/// The access-control facet of a node, as handed out by the namespace.
#[derive(Debug, Clone)]
pub struct SharedEntity {
    /// Decoded path, collections with trailing slash.
    pub path: String,
    pub owner: Option<String>,
    /// Encoded access control list, `None` to inherit.
    pub acl: Option<String>,
    /// Path of the parent collection, `None` for the root.
    pub parent: Option<String>,
    pub is_collection: bool,
    pub state: AccessState,
}

impl SharedEntity {
    pub fn new(
        path: impl Into<String>,
        owner: Option<String>,
        acl: Option<String>,
        parent: Option<String>,
        is_collection: bool,
    ) -> SharedEntity {
        SharedEntity {
            path: path.into(),
            owner,
            acl,
            parent,
            is_collection,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn own_acl(&self) -> NsResult<Option<Acl>> {
        match self.acl.as_deref() {
            None => Ok(None),
            Some(s) => match Acl::decode(s) {
                Ok(acl) => Ok(Some(acl)),
                Err(e) => {
                    error!("stored acl on {} is malformed: {}", self.path, e);
                    Err(NsError::GeneralFailure)
                }
            },
        }
    }
}

/// Per-request access resolution engine.
pub struct AccessEngine<'a> {
    ns: &'a dyn DavNamespace,
    creds: &'a Credentials,
    home_root: String,
    /// Ceiling applied to a principal's own home collection.
    home_ceiling: Privilege,
}

impl<'a> AccessEngine<'a> {
    pub fn new(ns: &'a dyn DavNamespace, creds: &'a Credentials) -> AccessEngine<'a> {
        AccessEngine {
            home_root: ns.user_home_root(),
            ns,
            creds,
            home_ceiling: Privilege::all() - Privilege::WRITE_ACL,
        }
    }

    pub fn with_home_ceiling(mut self, ceiling: Privilege) -> AccessEngine<'a> {
        self.home_ceiling = ceiling;
        self
    }

    /// The caller's own home collection path, if authenticated.
    fn own_home(&self) -> Option<String> {
        self.creds
            .account_name()
            .map(|name| format!("{}{}/", self.home_root, name))
    }

    /// Merged access control list for an entity: the root's default list
    /// with each descendant's own list overlaid walking down to the
    /// entity. The root must carry a list; a chain without one is a
    /// configuration error, not a property of the request.
    async fn merged_acl(&self, entity: &SharedEntity) -> NsResult<Acl> {
        let mut chain: Vec<Acl> = Vec::new();
        if let Some(acl) = entity.own_acl()? {
            chain.push(acl);
        }
        let mut parent = entity.parent.clone();
        let mut depth = 0;
        let mut seen_root = entity.parent.is_none();
        while let Some(p) = parent {
            depth += 1;
            if depth > MAX_ACL_DEPTH {
                error!("acl inheritance chain too deep at {}", entity.path);
                return Err(NsError::GeneralFailure);
            }
            let ancestor = self.ns.get_shared(&p).await?;
            if let Some(acl) = ancestor.own_acl()? {
                chain.push(acl);
            }
            seen_root = ancestor.parent.is_none();
            parent = ancestor.parent;
        }
        if !seen_root {
            error!("acl chain of {} did not terminate at the root", entity.path);
            return Err(NsError::GeneralFailure);
        }
        let mut merged = match chain.pop() {
            Some(root_acl) => root_acl,
            None => {
                error!("namespace root has no default acl (required)");
                return Err(NsError::GeneralFailure);
            }
        };
        while let Some(child) = chain.pop() {
            merged = child.merge(&merged);
        }
        Ok(merged)
    }

    /// The effective (inheritance-merged) access control list of an
    /// entity.
    pub async fn effective_acl(&self, entity: &SharedEntity) -> NsResult<Acl> {
        self.merged_acl(entity).await
    }

    /// Check whether the caller holds `want` on `entity`.
    ///
    /// `want` empty means "any access at all". On denial this fails with
    /// [`NsError::Forbidden`] unless `always_return` is set, in which case
    /// the denied result is returned for the caller to render (the
    /// current-user-privilege-set property needs exactly that).
    pub async fn check_access(
        &self,
        entity: &SharedEntity,
        want: Privilege,
        always_return: bool,
    ) -> NsResult<CurrentAccess> {
        let cached = entity
            .state
            .lock()
            .unwrap()
            .get(&want.bits())
            .copied();
        let access = match cached {
            Some(access) => access,
            None => {
                let access = self.resolve(entity, want).await?;
                if entity.is_collection {
                    entity
                        .state
                        .lock()
                        .unwrap()
                        .insert(want.bits(), access);
                }
                access
            }
        };
        if !access.allowed && !always_return {
            debug!("access denied on {} (want {:?})", entity.path, want);
            return Err(NsError::Forbidden);
        }
        Ok(access)
    }

    async fn resolve(&self, entity: &SharedEntity, want: Privilege) -> NsResult<CurrentAccess> {
        if self.creds.superuser {
            return Ok(CurrentAccess {
                allowed: true,
                privileges: Privilege::all(),
            });
        }

        // The home root itself admits nobody but the superuser.
        if entity.path == self.home_root {
            return Ok(CurrentAccess {
                allowed: false,
                privileges: Privilege::empty(),
            });
        }

        let acl = self.merged_acl(entity).await?;
        let mut granted = acl.evaluate(
            self.creds,
            entity.owner.as_deref(),
            Some(entity.path.as_str()),
        );

        // A principal's own home gets a privilege ceiling no stored list
        // can exceed.
        if let Some(home) = self.own_home() {
            if entity.path == home || entity.path.starts_with(&home) {
                granted &= self.home_ceiling;
            }
        }

        let allowed = if want.is_empty() {
            !granted.is_empty()
        } else {
            granted.contains(want)
        };
        Ok(CurrentAccess {
            allowed,
            privileges: granted,
        })
    }

    /// Replace the full access control list of a node. Requires write-acl
    /// on the node itself.
    pub async fn change_access(&self, entity: &SharedEntity, acl: &Acl) -> NsResult<()> {
        self.check_access(entity, Privilege::WRITE_ACL, false).await?;
        self.ns
            .set_acl(&entity.path, &acl.encode(), self.creds)
            .await
    }

    /// Merge entries into the stored access control list of a node,
    /// ahead of the existing ones so they take precedence under
    /// first-match-wins. Requires write-acl on the node itself.
    pub async fn default_access(&self, entity: &SharedEntity, acl: &Acl) -> NsResult<()> {
        self.check_access(entity, Privilege::WRITE_ACL, false).await?;
        let merged = match entity.own_acl()? {
            Some(existing) => acl.merge(&existing),
            None => acl.clone(),
        };
        self.ns
            .set_acl(&entity.path, &merged.encode(), self.creds)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Credentials {
        Credentials::user("/principals/alice")
    }

    #[test]
    fn encode_decode_roundtrip() {
        let acl = Acl::new(vec![
            Ace::grant(AceWho::Owner, Privilege::READ | Privilege::WRITE),
            Ace::grant(AceWho::Href("/principals/alice".into()), Privilege::all()),
            Ace::deny(AceWho::All, Privilege::all()),
            Ace::grant(AceWho::Property("group-owner".into()), Privilege::READ_ACL),
        ]);
        let enc = acl.encode();
        assert_eq!(Acl::decode(&enc).unwrap(), acl);
        assert!(Acl::decode("+qZ").is_err());
        assert!(Acl::decode("+A").is_err());
    }

    #[test]
    fn deny_before_grant_wins() {
        let acl = Acl::decode("-rP/principals/alice;+aA").unwrap();
        let granted = acl.evaluate(&alice(), None, None);
        assert!(!granted.contains(Privilege::READ));
        assert!(granted.contains(Privilege::WRITE));

        // Reversed order: the grant decides first.
        let acl = Acl::decode("+aA;-rP/principals/alice").unwrap();
        let granted = acl.evaluate(&alice(), None, None);
        assert!(granted.contains(Privilege::READ));
    }

    #[test]
    fn merge_puts_child_first() {
        let parent = Acl::decode("+aA").unwrap();
        let child = Acl::decode("-aP/principals/alice").unwrap();
        let merged = child.merge(&parent);
        assert!(merged.evaluate(&alice(), None, None).is_empty());
        let bob = Credentials::user("/principals/bob");
        assert_eq!(merged.evaluate(&bob, None, None), Privilege::all());
    }

    #[test]
    fn owner_and_self_selectors() {
        let acl = Acl::decode("+wO;+rS;-aA").unwrap();
        let granted = acl.evaluate(&alice(), Some("/principals/alice"), None);
        assert!(granted.contains(Privilege::WRITE));
        assert!(!granted.contains(Privilege::READ));
        let granted = acl.evaluate(&alice(), None, Some("/principals/alice/"));
        assert!(granted.contains(Privilege::READ));
    }

    #[test]
    fn unauthenticated_selector() {
        let acl = Acl::decode("+rN;+aU").unwrap();
        let anon = Credentials::anonymous();
        assert_eq!(acl.evaluate(&anon, None, None), Privilege::READ);
        assert_eq!(acl.evaluate(&alice(), None, None), Privilege::all());
    }

    #[test]
    fn xml_ace_roundtrip() {
        let acl = Acl::decode("+rwO;-aA").unwrap();
        for (elem, orig) in acl.to_xml().iter().zip(&acl.aces) {
            let back = ace_from_element(elem).unwrap();
            assert_eq!(&back, orig);
        }
    }

    #[test]
    fn principal_hrefs_from_acl() {
        let acl = Acl::decode("+aP/principals/alice;+rP/principals/staff;-aP/principals/alice").unwrap();
        assert_eq!(
            acl.principal_hrefs(),
            vec!["/principals/alice".to_string(), "/principals/staff".to_string()]
        );
    }

    #[cfg(feature = "memns")]
    #[tokio::test]
    async fn default_access_merges_ahead_of_stored_list() {
        let ns = crate::memns::MemNs::new();
        ns.add_user("alice");
        let mut root = Credentials::user("/principals/root");
        root.superuser = true;

        let engine = AccessEngine::new(&ns, &root);
        let entity = ns.get_shared("/").await.unwrap();
        let extra = Acl::decode("-rP/principals/bob").unwrap();
        engine.default_access(&entity, &extra).await.unwrap();

        // The new entry decides first; the stored grants stay behind it.
        let stored = ns.get_shared("/").await.unwrap();
        let acl = Acl::decode(stored.acl.as_deref().unwrap()).unwrap();
        let bob = Credentials::user("/principals/bob");
        let granted = acl.evaluate(&bob, None, None);
        assert!(!granted.contains(Privilege::READ));
        assert!(granted.contains(Privilege::WRITE));
        assert_eq!(acl.evaluate(&alice(), None, None), Privilege::all());
    }
}
