//! The resource node and property model.
//!
//! A node is a single entry in the hierarchical namespace, constructed on
//! demand per request by the namespace implementation. The engine knows the
//! core WebDAV/ACL property set; everything else goes through the node's
//! [`generate_property`](DavNode::generate_property) callback, and finally
//! falls through to "unknown" (empty tag, per-property 404). That two-tier
//! lookup is what keeps the protocol extensible to calendar-specific or
//! custom namespaces without the engine knowing about them.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use http::StatusCode;
use xmltree::Element;

use crate::ns::{NsError, NsResult};
use crate::xmltree_ext::{ElementExt, NS_DAV_URI};

/// Is this node a principal, and of which kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    None,
    User,
    Group,
}

/// A single property: namespaced tag plus an optional string value.
///
/// The value is the request-supplied match criterion for search reports,
/// or `None` for a plain property-name request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DavProperty {
    pub namespace: Option<String>,
    pub name: String,
    pub value: Option<String>,
}

impl DavProperty {
    /// A property in the DAV: namespace.
    pub fn dav(name: impl Into<String>) -> DavProperty {
        DavProperty {
            namespace: Some(NS_DAV_URI.to_string()),
            name: name.into(),
            value: None,
        }
    }

    pub fn new(namespace: Option<String>, name: impl Into<String>) -> DavProperty {
        DavProperty {
            namespace,
            name: name.into(),
            value: None,
        }
    }

    pub(crate) fn from_element(e: &Element) -> DavProperty {
        DavProperty {
            namespace: e.namespace.clone(),
            name: e.name.clone(),
            value: {
                let t = e.text_content();
                if t.is_empty() { None } else { Some(t) }
            },
        }
    }

    /// True for a property in the DAV: namespace with this local name.
    /// A missing namespace is treated as DAV: for sloppy clients.
    pub fn is_dav(&self, name: &str) -> bool {
        self.name == name
            && match self.namespace.as_deref() {
                Some(ns) => ns == NS_DAV_URI,
                None => true,
            }
    }

    /// Empty element for this property, suitable for a multistatus body.
    pub(crate) fn to_element(&self) -> Element {
        match self.namespace.as_deref() {
            Some(NS_DAV_URI) | None => Element::new2(&format!("D:{}", self.name)),
            Some(ns) => {
                let mut e = Element::new(&self.name);
                e.attributes.insert("xmlns".to_string(), ns.to_string());
                e
            }
        }
    }
}

/// Result of asking a node to produce a property value.
#[derive(Debug)]
pub enum PropValue {
    /// The node produced the (complete) property element.
    Handled(Element),
    /// Not a property this node knows about.
    Unhandled,
}

/// The parsed shape of a PROPFIND body. Immutable once parsed.
#[derive(Debug)]
pub enum PropRequest {
    Named(Vec<DavProperty>),
    PropName,
    AllProp,
}

/// A node in the namespace.
///
/// Implementations come entirely from the namespace collaborator. The
/// engine never persists nodes; `exists`/`status` may be toggled by the
/// namespace while a single request is processed, uri and collection-ness
/// are fixed at construction.
pub trait DavNode: Debug + Send + Sync {
    /// Decoded path of this node, without prefix. Collections end in "/".
    fn uri(&self) -> String;

    fn exists(&self) -> bool;

    fn is_collection(&self) -> bool;

    /// Node-level status. Anything other than OK makes multistatus
    /// renderers emit just href + status for this node.
    fn status(&self) -> StatusCode {
        StatusCode::OK
    }

    fn principal(&self) -> PrincipalKind {
        PrincipalKind::None
    }

    /// May content be PUT to / read from this node.
    fn allows_content(&self) -> bool {
        !self.is_collection()
    }

    /// Owner principal href.
    fn owner(&self) -> Option<String> {
        None
    }

    fn created(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Strong entity tag, without quotes.
    fn etag(&self) -> Option<String> {
        None
    }

    fn content_length(&self) -> Option<u64> {
        None
    }

    fn content_type(&self) -> Option<String> {
        None
    }

    fn content_language(&self) -> Option<String> {
        None
    }

    /// Current sync token of this collection, if the namespace keeps a
    /// change feed for it.
    fn sync_token(&self) -> Option<String> {
        None
    }

    /// Schedule tag, for nodes that are scheduling object resources
    /// (RFC6638). Plain nodes have none, and If-Schedule-Tag-Match
    /// does not apply to them.
    fn schedule_tag(&self) -> Option<String> {
        None
    }

    /// Produce a namespace-specific property value. Return
    /// [`PropValue::Unhandled`] for tags this node does not know; the
    /// engine reports those as not-found.
    #[allow(unused_variables)]
    fn generate_property(&self, prop: &DavProperty) -> PropValue {
        PropValue::Unhandled
    }

    /// PROPPATCH set callback.
    #[allow(unused_variables)]
    fn set_property(&self, prop: &DavProperty, value: &Element) -> NsResult<()> {
        Err(NsError::NotImplemented)
    }

    /// PROPPATCH remove callback.
    #[allow(unused_variables)]
    fn remove_property(&self, prop: &DavProperty) -> NsResult<()> {
        Err(NsError::NotImplemented)
    }

    /// Node-specific property tags, beyond the engine-known set.
    fn supported_properties(&self) -> Vec<DavProperty> {
        Vec::new()
    }

    /// The subset of [`supported_properties`](Self::supported_properties)
    /// that belongs in an `allprop` response.
    fn allprop_properties(&self) -> Vec<DavProperty> {
        Vec::new()
    }
}
