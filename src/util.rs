use chrono::{DateTime, SecondsFormat, Utc};
use http::method::InvalidMethod;

use crate::body::Body;
use crate::errors::DavError;
use crate::DavResult;

/// HTTP methods supported by DavHandler.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[repr(u32)]
pub enum DavMethod {
    Head      = 0x0001,
    Get       = 0x0002,
    Put       = 0x0004,
    Options   = 0x0008,
    PropFind  = 0x0010,
    PropPatch = 0x0020,
    MkCol     = 0x0040,
    Copy      = 0x0080,
    Move      = 0x0100,
    Delete    = 0x0200,
    Acl       = 0x0400,
    Report    = 0x0800,
}

// translate method into our own enum that has webdav methods as well.
pub(crate) fn dav_method(m: &http::Method) -> DavResult<DavMethod> {
    let m = match *m {
        http::Method::HEAD => DavMethod::Head,
        http::Method::GET => DavMethod::Get,
        http::Method::PUT => DavMethod::Put,
        http::Method::DELETE => DavMethod::Delete,
        http::Method::OPTIONS => DavMethod::Options,
        _ => match m.as_str() {
            "PROPFIND" => DavMethod::PropFind,
            "PROPPATCH" => DavMethod::PropPatch,
            "MKCOL" => DavMethod::MkCol,
            "COPY" => DavMethod::Copy,
            "MOVE" => DavMethod::Move,
            "ACL" => DavMethod::Acl,
            "REPORT" => DavMethod::Report,
            _ => {
                return Err(DavError::UnknownDavMethod);
            }
        },
    };
    Ok(m)
}

impl DavMethod {
    /// Does this method mutate the namespace or the access control state?
    ///
    /// Mutating methods are refused for anonymous callers before a handler
    /// is even selected.
    pub fn requires_auth(self) -> bool {
        matches!(
            self,
            DavMethod::Put
                | DavMethod::PropPatch
                | DavMethod::MkCol
                | DavMethod::Copy
                | DavMethod::Move
                | DavMethod::Delete
                | DavMethod::Acl
        )
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            DavMethod::Head => "HEAD",
            DavMethod::Get => "GET",
            DavMethod::Put => "PUT",
            DavMethod::Options => "OPTIONS",
            DavMethod::PropFind => "PROPFIND",
            DavMethod::PropPatch => "PROPPATCH",
            DavMethod::MkCol => "MKCOL",
            DavMethod::Copy => "COPY",
            DavMethod::Move => "MOVE",
            DavMethod::Delete => "DELETE",
            DavMethod::Acl => "ACL",
            DavMethod::Report => "REPORT",
        }
    }
}

// for external use.
impl std::convert::TryFrom<&http::Method> for DavMethod {
    type Error = InvalidMethod;

    fn try_from(value: &http::Method) -> Result<Self, Self::Error> {
        dav_method(value).map_err(|_| {
            // A trick to get at the value of http::method::InvalidMethod.
            http::method::Method::from_bytes(b"").unwrap_err()
        })
    }
}

/// A set of allowed [`DavMethod`]s.
#[derive(Clone, Copy, Debug)]
pub struct DavMethodSet(u32);

impl DavMethodSet {
    /// New set, all methods allowed.
    pub fn all() -> DavMethodSet {
        DavMethodSet(0xffffffff)
    }

    /// New empty set.
    pub fn none() -> DavMethodSet {
        DavMethodSet(0)
    }

    /// Add a method.
    pub fn add(&mut self, m: DavMethod) -> &Self {
        self.0 |= m as u32;
        self
    }

    /// Remove a method.
    pub fn remove(&mut self, m: DavMethod) -> &Self {
        self.0 &= !(m as u32);
        self
    }

    /// Check if a method is in the set.
    pub fn contains(&self, m: DavMethod) -> bool {
        self.0 & (m as u32) > 0
    }

    /// Generate a DavMethodSet from a list of words.
    pub fn from_vec(v: Vec<impl AsRef<str>>) -> Result<DavMethodSet, InvalidMethod> {
        const HTTP_RO: u32 = DavMethod::Get as u32 | DavMethod::Head as u32 | DavMethod::Options as u32;
        const WEBDAV_RO: u32 = HTTP_RO | DavMethod::PropFind as u32 | DavMethod::Report as u32;
        const WEBDAV_RW: u32 = 0xffffffff;

        let mut m: u32 = 0;
        for w in &v {
            m |= match w.as_ref().to_lowercase().as_str() {
                "head" => DavMethod::Head as u32,
                "get" => DavMethod::Get as u32,
                "put" => DavMethod::Put as u32,
                "delete" => DavMethod::Delete as u32,
                "options" => DavMethod::Options as u32,
                "propfind" => DavMethod::PropFind as u32,
                "proppatch" => DavMethod::PropPatch as u32,
                "mkcol" => DavMethod::MkCol as u32,
                "copy" => DavMethod::Copy as u32,
                "move" => DavMethod::Move as u32,
                "acl" => DavMethod::Acl as u32,
                "report" => DavMethod::Report as u32,
                "webdav-ro" => WEBDAV_RO,
                "webdav-rw" => WEBDAV_RW,
                _ => {
                    // A trick to get at the value of http::method::InvalidMethod.
                    let invalid_method = http::method::Method::from_bytes(b"").unwrap_err();
                    return Err(invalid_method);
                }
            };
        }
        Ok(DavMethodSet(m))
    }
}

// Minimal <D:error> body, with an optional precondition element inside.
pub(crate) fn dav_xml_error(tag: Option<&str>, msg: Option<&str>) -> Body {
    let mut inner = String::new();
    if let Some(tag) = tag {
        inner.push_str(&format!("<D:{}/>\n", tag));
    }
    if let Some(msg) = msg {
        inner.push_str(&format!(
            "<D:responsedescription>{}</D:responsedescription>\n",
            xml_escape(msg)
        ));
    }
    let xml = format!(
        "{}\n{}\n{}{}\n",
        r#"<?xml version="1.0" encoding="utf-8" ?>"#,
        r#"<D:error xmlns:D="DAV:">"#,
        inner,
        r#"</D:error>"#
    );
    Body::from(xml)
}

pub(crate) fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn datetime_to_rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn datetime_to_httpdate(t: &DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_set_from_words() {
        let set = DavMethodSet::from_vec(vec!["propfind", "report"]).unwrap();
        assert!(set.contains(DavMethod::PropFind));
        assert!(set.contains(DavMethod::Report));
        assert!(!set.contains(DavMethod::Delete));
        assert!(DavMethodSet::from_vec(vec!["lock"]).is_err());
    }

    #[test]
    fn auth_required_methods() {
        assert!(DavMethod::Acl.requires_auth());
        assert!(DavMethod::MkCol.requires_auth());
        assert!(!DavMethod::PropFind.requires_auth());
        assert!(!DavMethod::Report.requires_auth());
    }
}
