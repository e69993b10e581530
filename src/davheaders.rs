//! Typed decoding of the WebDAV request headers.
//!
//! Everything here is a pure parse; the precondition logic that consumes
//! these values lives in `conditional.rs` and the method handlers.
use std::convert::TryFrom;
use std::fmt::Display;
use std::str::FromStr;

use headers::Header;
use http::header::{HeaderName, HeaderValue};

use crate::node::DavNode;

pub static DEPTH: HeaderName = HeaderName::from_static("depth");
pub static OVERWRITE: HeaderName = HeaderName::from_static("overwrite");
pub static DESTINATION: HeaderName = HeaderName::from_static("destination");
pub static ETAG: HeaderName = HeaderName::from_static("etag");
pub static IF_MATCH: HeaderName = HeaderName::from_static("if-match");
pub static IF_NONE_MATCH: HeaderName = HeaderName::from_static("if-none-match");
pub static IF_SCHEDULE_TAG_MATCH: HeaderName = HeaderName::from_static("if-schedule-tag-match");
pub static IF: HeaderName = HeaderName::from_static("if");
pub static PREFER: HeaderName = HeaderName::from_static("prefer");
pub static BRIEF: HeaderName = HeaderName::from_static("brief");

// helper.
fn one<'i, I>(values: &mut I) -> Result<&'i HeaderValue, headers::Error>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let v = values.next().ok_or_else(invalid)?;
    if values.next().is_some() {
        Err(invalid())
    } else {
        Ok(v)
    }
}

// helper
fn invalid() -> headers::Error {
    headers::Error::invalid()
}

// helper
fn map_invalid(_e: impl std::error::Error) -> headers::Error {
    headers::Error::invalid()
}

macro_rules! header {
    ($tname:ident, $hname:ident, $sname:expr) => {
        pub static $hname: HeaderName = HeaderName::from_static($sname);

        #[derive(Debug, Clone, PartialEq)]
        pub struct $tname(pub String);

        impl Header for $tname {
            fn name() -> &'static HeaderName {
                &$hname
            }

            fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
            where
                I: Iterator<Item = &'i HeaderValue>,
            {
                one(values)?
                    .to_str()
                    .map(|x| $tname(x.to_owned()))
                    .map_err(map_invalid)
            }

            fn encode<E>(&self, values: &mut E)
            where
                E: Extend<HeaderValue>,
            {
                let value = HeaderValue::from_str(&self.0).unwrap();
                values.extend(std::iter::once(value))
            }
        }
    };
}

header!(ContentType, CONTENT_TYPE, "content-type");

/// Depth: header.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Header for Depth {
    fn name() -> &'static HeaderName {
        &DEPTH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?;
        match value.as_bytes() {
            b"0" => Ok(Depth::Zero),
            b"1" => Ok(Depth::One),
            b"infinity" | b"Infinity" => Ok(Depth::Infinity),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = match *self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "Infinity",
        };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

/// Destination: header. Either an absolute path, or a full URL of which
/// only the path part is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination(pub String);

impl Header for Destination {
    fn name() -> &'static HeaderName {
        &DESTINATION
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let s = one(values)?.to_str().map_err(map_invalid)?;
        if s.starts_with('/') {
            return Ok(Destination(s.to_string()));
        }
        let url = url::Url::parse(s).map_err(map_invalid)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }
        Ok(Destination(url.path().to_string()))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        values.extend(std::iter::once(HeaderValue::from_str(&self.0).unwrap()));
    }
}

/// Overwrite: header, "T" or "F". Absence means true.
#[derive(Debug, Clone, PartialEq)]
pub struct Overwrite(pub bool);

impl Header for Overwrite {
    fn name() -> &'static HeaderName {
        &OVERWRITE
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let line = one(values)?;
        match line.as_bytes() {
            b"F" => Ok(Overwrite(false)),
            b"T" => Ok(Overwrite(true)),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = match self.0 {
            true => "T",
            false => "F",
        };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

#[derive(Debug, Clone)]
pub struct ETag {
    tag: String,
    weak: bool,
}

impl ETag {
    pub fn new(weak: bool, t: impl Into<String>) -> Result<ETag, headers::Error> {
        let t = t.into();
        if t.contains('\"') {
            Err(invalid())
        } else {
            let w = if weak { "W/" } else { "" };
            Ok(ETag {
                tag: format!("{}\"{}\"", w, t),
                weak,
            })
        }
    }

    pub fn from_node(node: &dyn DavNode) -> Option<ETag> {
        let tag = node.etag()?;
        Some(ETag {
            tag: format!("\"{}\"", tag),
            weak: false,
        })
    }

    #[allow(dead_code)]
    pub fn is_weak(&self) -> bool {
        self.weak
    }
}

impl FromStr for ETag {
    type Err = headers::Error;

    fn from_str(t: &str) -> Result<Self, Self::Err> {
        let (weak, s) = if let Some(t) = t.strip_prefix("W/") {
            (true, t)
        } else {
            (false, t)
        };
        if s.starts_with('\"') && s.ends_with('\"') && !s[1..s.len() - 1].contains('\"') {
            Ok(ETag {
                tag: t.to_owned(),
                weak,
            })
        } else {
            Err(invalid())
        }
    }
}

impl TryFrom<&HeaderValue> for ETag {
    type Error = headers::Error;

    fn try_from(value: &HeaderValue) -> Result<Self, Self::Error> {
        let s = value.to_str().map_err(map_invalid)?;
        ETag::from_str(s)
    }
}

impl Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.tag)
    }
}

/// Weak tags never compare equal, not even to themselves.
impl PartialEq for ETag {
    fn eq(&self, other: &Self) -> bool {
        !self.weak && !other.weak && self.tag == other.tag
    }
}

impl Header for ETag {
    fn name() -> &'static HeaderName {
        &ETAG
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?;
        ETag::try_from(value)
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        values.extend(std::iter::once(HeaderValue::from_str(&self.tag).unwrap()));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ETagList {
    Tags(Vec<ETag>),
    Star,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfMatch(pub ETagList);

#[derive(Debug, Clone, PartialEq)]
pub struct IfNoneMatch(pub ETagList);

// Decode a list of etags. Not a full parser; we don't handle commas
// inside etags - but nothing generates those anyway.
fn decode_etaglist<'i, I>(values: &mut I) -> Result<ETagList, headers::Error>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let mut v = Vec::new();
    let mut count = 0usize;
    for value in values {
        let s = value.to_str().map_err(map_invalid)?;
        if s.trim() == "*" {
            return Ok(ETagList::Star);
        }
        for t in s.split(',') {
            // Simply skip misformed etags, they will never match.
            if let Ok(t) = ETag::from_str(t.trim()) {
                v.push(t);
            }
        }
        count += 1;
    }
    if count != 0 {
        Ok(ETagList::Tags(v))
    } else {
        Err(invalid())
    }
}

fn encode_etaglist<E>(m: &ETagList, values: &mut E)
where
    E: Extend<HeaderValue>,
{
    let value = match *m {
        ETagList::Star => "*".to_string(),
        ETagList::Tags(ref t) => t
            .iter()
            .map(|t| t.tag.as_str())
            .collect::<Vec<&str>>()
            .join(", "),
    };
    values.extend(std::iter::once(HeaderValue::from_str(&value).unwrap()));
}

impl Header for IfMatch {
    fn name() -> &'static HeaderName {
        &IF_MATCH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        Ok(IfMatch(decode_etaglist(values)?))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        encode_etaglist(&self.0, values)
    }
}

impl Header for IfNoneMatch {
    fn name() -> &'static HeaderName {
        &IF_NONE_MATCH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        Ok(IfNoneMatch(decode_etaglist(values)?))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        encode_etaglist(&self.0, values)
    }
}

/// If-Schedule-Tag-Match (RFC6638): a single entity tag that must match
/// the schedule tag of a scheduling object resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleTagMatch(pub ETag);

impl Header for ScheduleTagMatch {
    fn name() -> &'static HeaderName {
        &IF_SCHEDULE_TAG_MATCH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?;
        Ok(ScheduleTagMatch(ETag::try_from(value)?))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        self.0.encode(values)
    }
}

/// Response preferences, from Prefer (RFC7240) with the legacy
/// Brief: header folded in by the handler.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Prefer {
    pub minimal: bool,
    pub representation: bool,
}

impl Header for Prefer {
    fn name() -> &'static HeaderName {
        &PREFER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let mut prefer = Prefer::default();
        let mut count = 0usize;
        for value in values {
            let s = value.to_str().map_err(map_invalid)?;
            for token in s.split(',') {
                match token.trim().to_lowercase().as_str() {
                    "return-minimal" | "return=minimal" => prefer.minimal = true,
                    "return-representation" | "return=representation" => {
                        prefer.representation = true
                    }
                    // Unknown preferences are ignored, per RFC7240.
                    _ => {}
                }
            }
            count += 1;
        }
        if count != 0 { Ok(prefer) } else { Err(invalid()) }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let mut v = Vec::new();
        if self.minimal {
            v.push("return-minimal");
        }
        if self.representation {
            v.push("return-representation");
        }
        values.extend(std::iter::once(
            HeaderValue::from_str(&v.join(", ")).unwrap(),
        ));
    }
}

/// Legacy Brief: header, "t" meaning minimal response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brief(pub bool);

impl Header for Brief {
    fn name() -> &'static HeaderName {
        &BRIEF
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        match one(values)?.as_bytes() {
            b"t" | b"T" => Ok(Brief(true)),
            b"f" | b"F" => Ok(Brief(false)),
            _ => Err(invalid()),
        }
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = if self.0 { "t" } else { "f" };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

// The "If" header contains IfLists, of which the results are ORed.
#[derive(Debug, Clone, PartialEq)]
pub struct If(pub Vec<IfList>);

// An IfList contains Conditions, of which the results are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub struct IfList {
    pub resource_tag: Option<url::Url>,
    pub conditions: Vec<IfCondition>,
}

// helpers.
impl IfList {
    fn new() -> IfList {
        IfList {
            resource_tag: None,
            conditions: Vec::new(),
        }
    }
    fn add(&mut self, not: bool, item: IfItem) {
        self.conditions.push(IfCondition { not, item });
    }
}

// Single Condition is [NOT] State-Token | ETag
#[derive(Debug, Clone, PartialEq)]
pub struct IfCondition {
    pub not: bool,
    pub item: IfItem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IfItem {
    StateToken(String),
    ETag(ETag),
}

// Tokens of the If header.
#[derive(Debug, Clone, PartialEq)]
enum IfToken {
    ListOpen,
    ListClose,
    Not,
    Word(String),
    Pointy(String),
    ETag(ETag),
    End,
}

#[derive(Debug, Clone, PartialEq)]
enum IfState {
    Start,
    RTag,
    List,
    Not,
    Bad,
}

struct IfLexer<'a> {
    buf: &'a [u8],
}

impl<'a> IfLexer<'a> {
    fn new(buf: &'a [u8]) -> IfLexer<'a> {
        IfLexer { buf }
    }

    // everything up to (excluding) the closing delimiter, quote-aware.
    fn delimited(&mut self, close: u8) -> Result<&'a [u8], headers::Error> {
        let mut quoted = false;
        for (i, &c) in self.buf.iter().enumerate().skip(1) {
            if c == b'"' {
                quoted = !quoted;
            } else if c == close && !quoted {
                let tok = &self.buf[1..i];
                self.buf = &self.buf[i + 1..];
                return Ok(tok);
            } else if c.is_ascii_whitespace() {
                return Err(invalid());
            }
        }
        Err(invalid())
    }

    fn word(&mut self) -> Result<&'a [u8], headers::Error> {
        let end = self
            .buf
            .iter()
            .position(|&c| c.is_ascii_whitespace() || b"<>()[]".contains(&c) || c < 32)
            .unwrap_or(self.buf.len());
        if end == 0 {
            return Err(invalid());
        }
        let tok = &self.buf[..end];
        self.buf = &self.buf[end..];
        Ok(tok)
    }

    fn next_token(&mut self) -> Result<IfToken, headers::Error> {
        while let [c, rest @ ..] = self.buf {
            if !c.is_ascii_whitespace() {
                break;
            }
            self.buf = rest;
        }
        let Some(&c) = self.buf.first() else {
            return Ok(IfToken::End);
        };
        match c {
            b'(' => {
                self.buf = &self.buf[1..];
                Ok(IfToken::ListOpen)
            }
            b')' => {
                self.buf = &self.buf[1..];
                Ok(IfToken::ListClose)
            }
            b'<' => {
                let tok = self.delimited(b'>')?;
                let s = String::from_utf8(tok.to_vec()).map_err(map_invalid)?;
                Ok(IfToken::Pointy(s))
            }
            b'[' => {
                let tok = self.delimited(b']')?;
                let s = std::str::from_utf8(tok).map_err(map_invalid)?;
                Ok(IfToken::ETag(ETag::from_str(s)?))
            }
            _ => {
                let tok = self.word()?;
                if tok == b"Not" {
                    Ok(IfToken::Not)
                } else {
                    let s = String::from_utf8(tok.to_vec()).map_err(map_invalid)?;
                    Ok(IfToken::Word(s))
                }
            }
        }
    }
}

impl Header for If {
    fn name() -> &'static HeaderName {
        &IF
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        // one big state machine.
        let mut if_lists = If(Vec::new());
        let mut cur_list = IfList::new();

        let mut state = IfState::Start;
        let mut lexer = IfLexer::new(one(values)?.as_bytes());

        loop {
            let tok = lexer.next_token()?;
            state = match state {
                IfState::Start => match tok {
                    IfToken::ListOpen => IfState::List,
                    IfToken::Pointy(url) => {
                        let u = url::Url::parse(&url).map_err(map_invalid)?;
                        cur_list.resource_tag = Some(u);
                        IfState::RTag
                    }
                    IfToken::End => {
                        if !if_lists.0.is_empty() {
                            break;
                        }
                        IfState::Bad
                    }
                    _ => IfState::Bad,
                },
                IfState::RTag => match tok {
                    IfToken::ListOpen => IfState::List,
                    _ => IfState::Bad,
                },
                IfState::List | IfState::Not => {
                    let not = state == IfState::Not;
                    match tok {
                        IfToken::Not => {
                            if not {
                                IfState::Bad
                            } else {
                                IfState::Not
                            }
                        }
                        IfToken::Pointy(stok) | IfToken::Word(stok) => {
                            // a state token must look like a URI; at least
                            // require one ':' in there.
                            if !stok.contains(':') {
                                IfState::Bad
                            } else {
                                cur_list.add(not, IfItem::StateToken(stok));
                                IfState::List
                            }
                        }
                        IfToken::ETag(etag) => {
                            cur_list.add(not, IfItem::ETag(etag));
                            IfState::List
                        }
                        IfToken::ListClose => {
                            if cur_list.conditions.is_empty() {
                                IfState::Bad
                            } else {
                                if_lists.0.push(cur_list);
                                cur_list = IfList::new();
                                IfState::Start
                            }
                        }
                        _ => IfState::Bad,
                    }
                }
                IfState::Bad => return Err(invalid()),
            };
        }
        Ok(if_lists)
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let value = "[If header]";
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one<H: Header>(val: &'static str) -> Result<H, headers::Error> {
        let hdrval = HeaderValue::from_static(val);
        let mut iter = std::iter::once(&hdrval);
        H::decode(&mut iter)
    }

    #[test]
    fn if_header() {
        // Some implementations (golang net/x/webdav) accept a plain word
        // as a state token, not just a Coded-URL. We do too.
        let val = r#"  <http://x.yz/> ([W/"etag"] Not <DAV:nope> ) (Not<urn:x>[W/"bla"] plain:word:123) "#;
        let hdr: If = decode_one(val).unwrap();
        assert_eq!(hdr.0.len(), 2);
        assert!(hdr.0[0].resource_tag.is_some());
        assert_eq!(hdr.0[1].conditions.len(), 3);
        assert!(hdr.0[1].conditions[0].not);
        assert!(decode_one::<If>("(<urn:x>").is_err());
        assert!(decode_one::<If>("()").is_err());
    }

    #[test]
    fn etag_header() {
        let t1 = ETag::from_str(r#"W/"12345""#).unwrap();
        let t2 = ETag::from_str(r#"W/"12345""#).unwrap();
        let t3 = ETag::from_str(r#""12346""#).unwrap();
        let t4 = ETag::from_str(r#""12346""#).unwrap();
        assert!(t1 != t2);
        assert!(t2 != t3);
        assert!(t3 == t4);
    }

    #[test]
    fn schedule_tag_match_header() {
        let s: ScheduleTagMatch = decode_one(r#""abc123""#).unwrap();
        assert_eq!(s.0, ETag::from_str(r#""abc123""#).unwrap());
        assert!(decode_one::<ScheduleTagMatch>("abc123").is_err());
    }

    #[test]
    fn depth_header() {
        assert_eq!(decode_one::<Depth>("0").unwrap(), Depth::Zero);
        assert_eq!(decode_one::<Depth>("infinity").unwrap(), Depth::Infinity);
        assert!(decode_one::<Depth>("2").is_err());
    }

    #[test]
    fn overwrite_header() {
        assert_eq!(decode_one::<Overwrite>("T").unwrap(), Overwrite(true));
        assert_eq!(decode_one::<Overwrite>("F").unwrap(), Overwrite(false));
        assert!(decode_one::<Overwrite>("yes").is_err());
    }

    #[test]
    fn destination_header() {
        let d: Destination = decode_one("/dav/a/b").unwrap();
        assert_eq!(d.0, "/dav/a/b");
        let d: Destination = decode_one("http://example.com/dav/a%20b?x=1").unwrap();
        assert_eq!(d.0, "/dav/a%20b");
        assert!(decode_one::<Destination>("ftp://example.com/x").is_err());
    }

    #[test]
    fn prefer_header() {
        let p: Prefer = decode_one("return-minimal, respond-async").unwrap();
        assert!(p.minimal);
        assert!(!p.representation);
        let p: Prefer = decode_one("return=representation").unwrap();
        assert!(p.representation);
    }
}
