//! Sender-domain gate applied before anything is persisted.

use mail_parser::MessageParser;

use crate::message::HeaderView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoFrom,
    InvalidFrom,
    MalformedAddress,
    WrongDomain,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NoFrom => "no-from",
            RejectReason::InvalidFrom => "invalid-from",
            RejectReason::MalformedAddress => "malformed-address",
            RejectReason::WrongDomain => "wrong-domain",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(RejectReason),
}

/// Decides whether a message may proceed.
///
/// With no allowed domain configured every message is accepted. Otherwise the
/// `From` address must carry exactly one `@` and its domain must equal
/// `allowed_domain`, compared case-insensitively.
pub fn check_sender(headers: &HeaderView, allowed_domain: Option<&str>) -> FilterDecision {
    let allowed_domain = match allowed_domain.map(str::trim).filter(|d| !d.is_empty()) {
        Some(domain) => domain,
        None => return FilterDecision::Accept,
    };
    let from = match headers.from.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        Some(from) => from,
        None => return FilterDecision::Reject(RejectReason::NoFrom),
    };
    let address = match sender_address(from) {
        Some(address) => address,
        None => return FilterDecision::Reject(RejectReason::InvalidFrom),
    };
    let domain = match sender_domain(&address) {
        Some(domain) => domain,
        None => return FilterDecision::Reject(RejectReason::MalformedAddress),
    };
    if domain.eq_ignore_ascii_case(allowed_domain) {
        FilterDecision::Accept
    } else {
        FilterDecision::Reject(RejectReason::WrongDomain)
    }
}

/// The mailbox address of a single-sender `From` value, as read by
/// `mail-parser`'s address grammar.
///
/// Groups, multiple mailboxes and values with no address part are `None`.
pub fn sender_address(from: &str) -> Option<String> {
    let header = format!("From: {}\n\n", from);
    let parsed = MessageParser::default().parse(header.as_bytes())?;
    match parsed.from()?.as_list()? {
        [mailbox] => mailbox
            .address()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

fn sender_domain(address: &str) -> Option<&str> {
    let mut parts = address.split('@');
    let local = parts.next()?;
    let domain = parts.next()?;
    if parts.next().is_some() || local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain)
}
