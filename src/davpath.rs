//! The path part of a request URL, relative to a prefix.
//!
//! Paths are kept percent-decoded internally; encoding is reapplied when a
//! path is turned back into an href. Collections carry a trailing slash,
//! non-collections never do.
use std::error::Error;
use std::fmt;

use percent_encoding::{percent_decode, percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::DavError;

// Encode all non-unreserved characters, except '/'.
// See RFC3986, and https://en.wikipedia.org/wiki/Percent-encoding .
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Path information relative to a prefix.
#[derive(Clone)]
pub struct DavPath {
    pub(crate) path: Vec<u8>,
    pub(crate) prefix: Vec<u8>,
}

/// Error returned by some of the DavPath methods.
#[derive(Debug)]
pub enum ParseError {
    /// cannot parse
    InvalidPath,
    /// outside of prefix
    IllegalPath,
    /// too many dotdots
    ForbiddenPath,
}

impl Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<ParseError> for DavError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::InvalidPath => DavError::InvalidPath,
            ParseError::IllegalPath => DavError::IllegalPath,
            ParseError::ForbiddenPath => DavError::ForbiddenPath,
        }
    }
}

impl fmt::Display for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_url_string_with_prefix())
    }
}

impl fmt::Debug for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_url_string_with_prefix())
    }
}

// a decoded segment can contain any value except '/' or '\0'
fn valid_segment(src: &[u8]) -> Result<(), ParseError> {
    let mut p = percent_decode(src);
    if p.any(|x| x == 0 || x == b'/') {
        return Err(ParseError::InvalidPath);
    }
    Ok(())
}

// make path safe:
// - raw path before decoding can contain only printable ascii
// - make sure path is absolute
// - remove query part (everything after ?)
// - merge consecutive slashes
// - process . and ..
// - decode percent encoded bytes, fail on invalid encodings.
// - do not allow NUL or '/' in segments.
fn normalize_path(rp: &[u8]) -> Result<Vec<u8>, ParseError> {
    // must consist of printable ASCII
    if rp.iter().any(|&x| !(32..=126).contains(&x)) {
        return Err(ParseError::InvalidPath);
    }

    // don't allow fragments. query part gets deleted.
    let mut rawpath = rp;
    if let Some(pos) = rawpath.iter().position(|&x| x == b'?' || x == b'#') {
        if rawpath[pos] == b'#' {
            return Err(ParseError::InvalidPath);
        }
        rawpath = &rawpath[..pos];
    }

    // must start with "/"
    if rawpath.is_empty() || rawpath[0] != b'/' {
        return Err(ParseError::InvalidPath);
    }

    // split up in segments
    let isdir = matches!(rawpath.last(), Some(b'/'));
    let mut v: Vec<&[u8]> = Vec::new();
    for segment in rawpath.split(|&c| c == b'/') {
        match segment {
            b"." | b"" => {}
            b".." => {
                if v.len() < 2 {
                    return Err(ParseError::ForbiddenPath);
                }
                v.pop();
                v.pop();
            }
            s => {
                valid_segment(s)?;
                v.push(b"/");
                v.push(s);
            }
        }
    }
    if isdir || v.is_empty() {
        v.push(b"/");
    }
    Ok(v.iter().flat_map(|s| percent_decode(s)).collect())
}

/// Comparison ignores any trailing slash, so /foo == /foo/
impl PartialEq for DavPath {
    fn eq(&self, rhs: &DavPath) -> bool {
        let mut a = self.path.as_slice();
        if a.len() > 1 && a.ends_with(b"/") {
            a = &a[..a.len() - 1];
        }
        let mut b = rhs.path.as_slice();
        if b.len() > 1 && b.ends_with(b"/") {
            b = &b[..b.len() - 1];
        }
        self.prefix == rhs.prefix && a == b
    }
}

impl Eq for DavPath {}

impl DavPath {
    /// From a URL-encoded path and (not encoded) prefix.
    pub fn new(src: &str, prefix: &str) -> Result<DavPath, ParseError> {
        let path = normalize_path(src.as_bytes())?;
        let mut prefix = prefix.as_bytes();
        if !path.starts_with(prefix) {
            return Err(ParseError::IllegalPath);
        }
        let pflen = prefix.len();
        if prefix.ends_with(b"/") {
            prefix = &prefix[..pflen - 1];
        } else if path.len() != pflen && (path.len() < pflen || path[pflen] != b'/') {
            return Err(ParseError::IllegalPath);
        }
        Ok(DavPath {
            path: path[prefix.len()..].to_vec(),
            prefix: prefix.to_vec(),
        })
    }

    /// From a request URI.
    pub(crate) fn from_uri(uri: &http::uri::Uri, prefix: &str) -> Result<Self, ParseError> {
        match uri.path() {
            "*" => Ok(DavPath {
                prefix: b"".to_vec(),
                path: b"*".to_vec(),
            }),
            path if path.starts_with('/') => DavPath::new(path, prefix),
            _ => Err(ParseError::InvalidPath),
        }
    }

    /// From a url::Url and (not-url-encoded) prefix string.
    pub(crate) fn from_url(url: &url::Url, prefix: &str) -> Result<Self, ParseError> {
        DavPath::new(url.path(), prefix)
    }

    // is this a "star" request (only used with OPTIONS)
    pub(crate) fn is_star(&self) -> bool {
        self.path == b"*"
    }

    /// As URL encoded string, without prefix.
    pub fn as_url_string(&self) -> String {
        percent_encode(&self.path, PATH_ENCODE_SET).to_string()
    }

    /// As URL encoded string, with prefix. This is the href form.
    pub fn as_url_string_with_prefix(&self) -> String {
        let mut p = percent_encode(&self.prefix, PATH_ENCODE_SET).to_string();
        p.push_str(&self.as_url_string());
        p
    }

    /// As UTF-8 string, decoded, with prefix.
    pub fn as_utf8_string_with_prefix(&self) -> String {
        let mut p = self.prefix.clone();
        p.extend_from_slice(&self.path);
        String::from_utf8_lossy(&p).to_string()
    }

    /// As raw bytes, not encoded, no prefix.
    pub fn as_bytes(&self) -> &[u8] {
        self.path.as_slice()
    }

    /// As a decoded string, no prefix. This is the namespace-internal form.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.path).unwrap_or("/")
    }

    /// Is this a collection, i.e. does the URL path end in "/".
    pub fn is_collection(&self) -> bool {
        self.path.ends_with(b"/")
    }

    /// Return the URL prefix.
    pub fn prefix(&self) -> &str {
        std::str::from_utf8(&self.prefix).unwrap_or("")
    }

    /// Remove any trailing slash.
    pub fn remove_slash(&mut self) {
        let mut l = self.path.len();
        while l > 1 && self.path[l - 1] == b'/' {
            l -= 1;
        }
        self.path.truncate(l);
    }

    /// Add a slash to the end of the path (if not already present).
    pub fn add_slash(&mut self) {
        if !self.is_collection() {
            self.path.push(b'/');
        }
    }

    pub(crate) fn add_slash_if(&mut self, b: bool) {
        if b && !self.is_collection() {
            self.path.push(b'/');
        }
    }

    /// Is this the root of the namespace.
    pub fn is_root(&self) -> bool {
        self.path == b"/"
    }

    /// The parent collection. The parent of "/" is "/".
    pub fn parent(&self) -> DavPath {
        let mut segs = self
            .path
            .split(|&c| c == b'/')
            .filter(|e| !e.is_empty())
            .collect::<Vec<&[u8]>>();
        segs.pop();
        segs.push(b"");
        segs.insert(0, b"");
        DavPath {
            prefix: self.prefix.clone(),
            path: segs.join(&b'/').to_vec(),
        }
    }

    /// The filename is the last segment of the path. Can be empty.
    pub fn file_name(&self) -> &[u8] {
        self.path
            .split(|&c| c == b'/')
            .filter(|e| !e.is_empty())
            .next_back()
            .unwrap_or(b"")
    }

    pub(crate) fn file_name_utf8(&self) -> String {
        String::from_utf8_lossy(self.file_name()).to_string()
    }

    /// Count the number of segments the path has. "/" has 0.
    pub fn num_segments(&self) -> usize {
        self.path
            .split(|&c| c == b'/')
            .filter(|e| !e.is_empty())
            .count()
    }

    /// A sibling/child path with the same prefix.
    pub(crate) fn with_path(&self, path: &str) -> DavPath {
        DavPath {
            prefix: self.prefix.clone(),
            path: path.as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize() {
        let p = DavPath::new("/foo//bar/./baz/../", "").unwrap();
        assert_eq!(p.as_str(), "/foo/bar/");
        assert!(p.is_collection());
        assert!(DavPath::new("/../x", "").is_err());
        assert!(DavPath::new("nope", "").is_err());
    }

    #[test]
    fn prefix_handling() {
        let p = DavPath::new("/dav/a/b", "/dav").unwrap();
        assert_eq!(p.as_str(), "/a/b");
        assert_eq!(p.as_url_string_with_prefix(), "/dav/a/b");
        assert!(DavPath::new("/other/a", "/dav").is_err());
    }

    #[test]
    fn url_roundtrip_reserved_chars() {
        let p = DavPath::new("/a%20b/c%26d", "").unwrap();
        assert_eq!(p.as_str(), "/a b/c&d");
        let enc = p.as_url_string();
        let dec = percent_decode(enc.as_bytes()).collect::<Vec<u8>>();
        assert_eq!(dec, p.as_bytes());
    }

    #[test]
    fn parent_and_name() {
        let p = DavPath::new("/a/b/c", "").unwrap();
        assert_eq!(p.parent().as_str(), "/a/b/");
        assert_eq!(p.file_name(), b"c");
        assert_eq!(p.num_segments(), 3);
        let root = DavPath::new("/", "").unwrap();
        assert_eq!(root.parent().as_str(), "/");
        assert_eq!(root.num_segments(), 0);
        // Single segment: parent is the root, not an empty path.
        let top = DavPath::new("/f", "").unwrap();
        assert_eq!(top.parent().as_str(), "/");
    }

    #[test]
    fn trailing_slash_eq() {
        let a = DavPath::new("/a/b", "").unwrap();
        let b = DavPath::new("/a/b/", "").unwrap();
        assert_eq!(a, b);
    }
}
