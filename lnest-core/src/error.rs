#[cfg(feature = "use_backtrace")]
use backtrace::Backtrace;

use ErrorKind::*;

use crate::prelude::*;
use crate::util::status::Status;

/// Kind of handshake error
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    /// A message type the handshake does not recognize
    UnexpectedMessage(String),
    /// A message arrived in a state that does not expect it
    ProtocolViolation(String),
    /// A counterparty signature did not validate.  This is the fraud signal,
    /// the channel must not be established.
    SignatureVerificationFailed(String),
    /// The funding source cannot cover the proposed amount
    InsufficientFunds(String),
    /// The funding source returned a transaction without the expected funding output
    FundingFormat(String),
    /// The handshake did not progress before its deadline
    Timeout(String),
    /// A collaborator (funding source, transport, announcer, persister) failed
    Port(String),
}

// Explicit PartialEq which ignores backtrace.
impl PartialEq for EstablishError {
    fn eq(&self, other: &EstablishError) -> bool {
        self.kind == other.kind
    }
}

/// Handshake error
#[derive(Clone)]
pub struct EstablishError {
    /// The kind of error
    pub kind: ErrorKind,
    /// A non-resolved backtrace
    #[cfg(feature = "use_backtrace")]
    pub bt: Backtrace,
}

impl EstablishError {
    /// Resolve the backtrace for display to the user
    #[cfg(feature = "use_backtrace")]
    pub fn resolved_backtrace(&self) -> Backtrace {
        let mut mee = self.clone();
        mee.bt.resolve();
        mee.bt
    }

    /// Return a new EstablishError with the message prepended
    pub fn prepend_msg(&self, premsg: String) -> EstablishError {
        let modkind = match &self.kind {
            UnexpectedMessage(s0) => UnexpectedMessage(premsg + &s0),
            ProtocolViolation(s0) => ProtocolViolation(premsg + &s0),
            SignatureVerificationFailed(s0) => SignatureVerificationFailed(premsg + &s0),
            InsufficientFunds(s0) => InsufficientFunds(premsg + &s0),
            FundingFormat(s0) => FundingFormat(premsg + &s0),
            Timeout(s0) => Timeout(premsg + &s0),
            Port(s0) => Port(premsg + &s0),
        };
        EstablishError {
            kind: modkind,
            #[cfg(feature = "use_backtrace")]
            bt: self.bt.clone(),
        }
    }

    /// True for the signature failure that indicates a dishonest counterparty
    pub fn is_fraud(&self) -> bool {
        matches!(self.kind, SignatureVerificationFailed(_))
    }
}

impl core::fmt::Display for EstablishError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{:?}", self.kind)
    }
}

impl core::fmt::Debug for EstablishError {
    #[cfg(not(feature = "use_backtrace"))]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("EstablishError").field("kind", &self.kind).finish()
    }
    #[cfg(feature = "use_backtrace")]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("EstablishError")
            .field("kind", &self.kind)
            .field("bt", &self.resolved_backtrace())
            .finish()
    }
}

impl std::error::Error for EstablishError {}

impl Into<String> for EstablishError {
    fn into(self) -> String {
        match self.kind {
            UnexpectedMessage(s) => "unexpected message: ".to_string() + &s,
            ProtocolViolation(s) => "protocol violation: ".to_string() + &s,
            SignatureVerificationFailed(s) => "signature verification failed: ".to_string() + &s,
            InsufficientFunds(s) => "insufficient funds: ".to_string() + &s,
            FundingFormat(s) => "funding format: ".to_string() + &s,
            Timeout(s) => "timeout: ".to_string() + &s,
            Port(s) => "port failure: ".to_string() + &s,
        }
    }
}

impl From<Status> for EstablishError {
    fn from(s: Status) -> Self {
        port_error(format!("{:?}: {}", s.code(), s.message()))
    }
}

fn make(kind: ErrorKind) -> EstablishError {
    EstablishError {
        kind,
        #[cfg(feature = "use_backtrace")]
        bt: Backtrace::new_unresolved(),
    }
}

pub(crate) fn unexpected_message(msg: impl Into<String>) -> EstablishError {
    make(UnexpectedMessage(msg.into()))
}

pub(crate) fn protocol_violation(msg: impl Into<String>) -> EstablishError {
    make(ProtocolViolation(msg.into()))
}

pub(crate) fn signature_verification_failed(msg: impl Into<String>) -> EstablishError {
    make(SignatureVerificationFailed(msg.into()))
}

pub(crate) fn insufficient_funds(msg: impl Into<String>) -> EstablishError {
    make(InsufficientFunds(msg.into()))
}

pub(crate) fn funding_format_error(msg: impl Into<String>) -> EstablishError {
    make(FundingFormat(msg.into()))
}

pub(crate) fn timeout_error(msg: impl Into<String>) -> EstablishError {
    make(Timeout(msg.into()))
}

pub(crate) fn port_error(msg: impl Into<String>) -> EstablishError {
    make(Port(msg.into()))
}

/// Return a protocol violation from the current function, prefixed with
/// the function name.
#[doc(hidden)]
#[macro_export]
#[allow(unused)]
macro_rules! protocol_err {
	($($arg:tt)*) => (
        return Err($crate::error::protocol_violation(format!(
            "{}: {}",
            $crate::short_function!(),
            format!($($arg)*)
        )))
    )
}

/// Return a signature verification failure from the current function,
/// prefixed with the function name.
#[doc(hidden)]
#[macro_export]
#[allow(unused)]
macro_rules! signature_err {
	($($arg:tt)*) => (
        return Err($crate::error::signature_verification_failed(format!(
            "{}: {}",
            $crate::short_function!(),
            format!($($arg)*)
        )))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn establish_error_test() {
        assert_eq!(
            format!("{}", unexpected_message("type 9999".to_string())),
            "UnexpectedMessage(\"type 9999\")"
        );
        assert_eq!(
            Into::<String>::into(unexpected_message("type 9999".to_string())),
            "unexpected message: type 9999"
        );
        assert_eq!(
            format!("{}", protocol_violation("testing")),
            "ProtocolViolation(\"testing\")"
        );
        assert_eq!(
            Into::<String>::into(insufficient_funds("balance 0")),
            "insufficient funds: balance 0"
        );
        assert_eq!(
            Into::<String>::into(funding_format_error("testing")),
            "funding format: testing"
        );
        assert_eq!(Into::<String>::into(timeout_error("awaiting D")), "timeout: awaiting D");
    }

    #[test]
    fn prepend_msg_test() {
        let e = signature_verification_failed("escape").prepend_msg("message C: ".to_string());
        assert_eq!(e.kind, SignatureVerificationFailed("message C: escape".to_string()));
        assert!(e.is_fraud());
        assert!(!protocol_violation("x").is_fraud());
    }

    #[test]
    fn from_status_test() {
        let e: EstablishError = Status::unavailable("wallet offline").into();
        assert_eq!(e.kind, Port("Unavailable: wallet offline".to_string()));
    }
}
