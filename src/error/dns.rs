//! DNS transport errors and their mapping to RCODEs.
//!
//! Grounded on the teacher's `error/dns.rs`: the same "protocol errors are
//! SERVFAIL, authority errors are their own RCODE" split, generalized from a
//! single-zone exfil handler to the GSLB dispatcher's full RCODE surface
//! (spec.md §4.J, "Failure model summary").

use hickory_server::proto::op::{MessageType, OpCode, ResponseCode};

/// Errors that can occur while handling one incoming DNS request.
///
/// Every variant maps to an RCODE; `PackFailure` is the one case where the
/// dispatcher emits nothing at all (spec.md §4.J step 11, "Packer failure").
#[derive(Debug)]
pub enum DnsError {
    InvalidOpCode(OpCode),
    InvalidMessageType(MessageType),
    Refused,
    PackFailure(String),
    Io(std::io::Error),
}

impl DnsError {
    /// The RCODE this error should be reported as, when one can be sent at all.
    pub fn rcode(&self) -> Option<ResponseCode> {
        match self {
            Self::InvalidOpCode(_) | Self::InvalidMessageType(_) => Some(ResponseCode::ServFail),
            Self::Refused => Some(ResponseCode::Refused),
            Self::PackFailure(_) => None,
            Self::Io(_) => Some(ResponseCode::ServFail),
        }
    }
}

impl std::fmt::Display for DnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOpCode(op) => write!(f, "unsupported DNS OpCode: {:?}", op),
            Self::InvalidMessageType(mt) => write!(f, "unsupported DNS MessageType: {:?}", mt),
            Self::Refused => write!(f, "query refused"),
            Self::PackFailure(msg) => write!(f, "failed to pack response: {}", msg),
            Self::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for DnsError {}

impl From<std::io::Error> for DnsError {
    fn from(err: std::io::Error) -> Self {
        DnsError::Io(err)
    }
}
