//! `Webdav` (RFC4918) is HTTP (GET/HEAD/PUT/DELETE) plus a bunch of extra methods.
//!
//! This crate implements the WebDAV method set (PROPFIND, PROPPATCH, MKCOL,
//! COPY, MOVE, DELETE, PUT) together with the WebDAV-ACL (RFC3744) and
//! WebDAV-Sync (RFC6578) extensions, as a protocol engine over an abstract
//! hierarchical namespace. It uses the types from the `http` crate, so with
//! a bit of glue code it can be mounted in any Rust HTTP server framework.
//!
//! The crate does not ship a storage layer. You supply a "namespace" -- an
//! implementation of [`ns::DavNamespace`] -- that resolves URIs to nodes,
//! performs the actual create/delete/copy operations, persists access
//! control lists, and serves the change feed that backs the
//! `sync-collection` report. Calendar and contacts servers plug in their
//! own node kinds and custom properties through the [`node::DavNode`]
//! callback interface; the engine only knows the core WebDAV/ACL property
//! set and delegates everything else.
//!
//! What the engine does handle, completely:
//!
//! - header and precondition processing (`Depth`, `If`, `If-Match`,
//!   `If-None-Match`, `Prefer`/`Brief`);
//! - hierarchical access control: per-collection ACLs merged up the tree,
//!   evaluated per privilege, with a per-entity result cache;
//! - PROPFIND/PROPPATCH with multistatus partial-failure semantics;
//! - REPORT: `sync-collection`, `expand-property`, `acl-principal-prop-set`,
//!   `principal-match` and `principal-property-search`.
//!
//! LOCK/UNLOCK are not implemented; the `DAV` header does not advertise
//! compliance class 2.
//!
//! Included is one namespace implementation:
//!
//! - [`memns`]: ephemeral in-memory namespace with ACLs, dead properties
//!   and a change log. Mostly useful for tests and demos.
//!
//! Authentication is out of scope: resolve the principal before calling the
//! handler and pass it in as [`Credentials`] via
//! [`DavHandler::handle_auth`].
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate log;

mod conditional;
mod davhandler;
mod davheaders;
mod errors;
mod handle_acl;
mod handle_copymove;
mod handle_delete;
mod handle_get;
mod handle_mkcol;
mod handle_options;
mod handle_props;
mod handle_put;
mod handle_report;
mod multistatus;
mod util;
mod xmltree_ext;

pub mod access;
pub mod body;
pub mod davpath;
#[cfg(feature = "memns")]
#[cfg_attr(docsrs, doc(cfg(feature = "memns")))]
pub mod memns;
pub mod node;
pub mod ns;

pub(crate) use crate::davhandler::DavInner;
pub(crate) use crate::errors::{DavError, DavResult};

pub use crate::davhandler::{DavConfig, DavHandler};
pub use crate::ns::Credentials;
pub use crate::util::{DavMethod, DavMethodSet};
