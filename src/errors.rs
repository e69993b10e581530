use std::error::Error;
use std::fmt;
use std::io;

use http::StatusCode;

use crate::ns::NsError;

pub(crate) type DavResult<T> = Result<T, DavError>;

/// Request-level failure.
///
/// A `Condition` carries the WebDAV precondition/postcondition element name
/// (RFC3744 section 7.1.1 style) that is emitted in a `<D:error>` body.
/// Everything else maps to a bare status code; unexpected internal errors
/// surface as 500 with no detail.
#[derive(Debug)]
pub(crate) enum DavError {
    XmlReadError,  // error reading xml
    XmlParseError, // error interpreting xml
    XmlWriteError, // error generating xml
    InvalidPath,   // error parsing path
    IllegalPath,   // path not valid here
    ForbiddenPath, // too many dotdots
    UnknownDavMethod,
    Status(StatusCode),
    StatusClose(StatusCode),
    Condition {
        status: StatusCode,
        tag: &'static str,
        msg: Option<String>,
    },
    NsError(NsError),
    IoError(io::Error),
}

impl Error for DavError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DavError::NsError(e) => Some(e),
            DavError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for DavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DavError::IoError(_) => write!(f, "I/O error"),
            DavError::Condition { status, tag, msg } => match msg {
                Some(m) => write!(f, "{} {}: {}", status, tag, m),
                None => write!(f, "{} {}", status, tag),
            },
            _ => write!(f, "{:?}", self),
        }
    }
}

impl From<NsError> for DavError {
    fn from(e: NsError) -> Self {
        DavError::NsError(e)
    }
}

impl From<StatusCode> for DavError {
    fn from(sc: StatusCode) -> Self {
        DavError::Status(sc)
    }
}

impl From<io::Error> for DavError {
    fn from(e: io::Error) -> Self {
        DavError::IoError(e)
    }
}

fn ioerror_to_status(ioerror: &io::Error) -> StatusCode {
    match ioerror.kind() {
        io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        io::ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        io::ErrorKind::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn nserror_to_status(e: &NsError) -> StatusCode {
    match e {
        NsError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        NsError::GeneralFailure => StatusCode::INTERNAL_SERVER_ERROR,
        NsError::Exists => StatusCode::METHOD_NOT_ALLOWED,
        NsError::NotFound => StatusCode::NOT_FOUND,
        NsError::Forbidden => StatusCode::FORBIDDEN,
        NsError::InsufficientStorage => StatusCode::INSUFFICIENT_STORAGE,
        NsError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
    }
}

impl DavError {
    /// Structured error with a protocol condition element.
    pub fn condition_msg(status: StatusCode, tag: &'static str, msg: impl Into<String>) -> DavError {
        DavError::Condition {
            status,
            tag,
            msg: Some(msg.into()),
        }
    }

    pub(crate) fn statuscode(&self) -> StatusCode {
        match self {
            DavError::XmlReadError => StatusCode::BAD_REQUEST,
            DavError::XmlParseError => StatusCode::BAD_REQUEST,
            DavError::XmlWriteError => StatusCode::INTERNAL_SERVER_ERROR,
            DavError::InvalidPath => StatusCode::BAD_REQUEST,
            DavError::IllegalPath => StatusCode::BAD_GATEWAY,
            DavError::ForbiddenPath => StatusCode::FORBIDDEN,
            DavError::UnknownDavMethod => StatusCode::METHOD_NOT_ALLOWED,
            DavError::Status(sc) => *sc,
            DavError::StatusClose(sc) => *sc,
            DavError::Condition { status, .. } => *status,
            DavError::NsError(e) => nserror_to_status(e),
            DavError::IoError(e) => ioerror_to_status(e),
        }
    }

    // An internal failure must not leak detail to the client, and the
    // namespace transaction gets rolled back before it is surfaced.
    pub(crate) fn is_internal(&self) -> bool {
        match self {
            DavError::IoError(_) => true,
            DavError::XmlWriteError => true,
            DavError::NsError(NsError::GeneralFailure) => true,
            _ => false,
        }
    }

    pub(crate) fn must_close(&self) -> bool {
        matches!(self, DavError::StatusClose(_))
    }
}
