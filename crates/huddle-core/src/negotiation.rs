//! Negotiation message kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Kind of connection-negotiation message relayed between peers.
///
/// All three kinds share the same routing; only the label differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationKind {
    /// Session description offer
    Offer,

    /// Session description answer
    Answer,

    /// Network-path (ICE) candidate
    Candidate,
}

impl NegotiationKind {
    /// All kinds, in negotiation order.
    pub const ALL: [NegotiationKind; 3] = [Self::Offer, Self::Answer, Self::Candidate];

    /// Returns the wire label (also the outbound event type).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
        }
    }
}

impl fmt::Display for NegotiationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NegotiationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(Self::Offer),
            "answer" => Ok(Self::Answer),
            "candidate" => Ok(Self::Candidate),
            other => Err(DomainError::UnknownNegotiationKind(other.to_string())),
        }
    }
}
