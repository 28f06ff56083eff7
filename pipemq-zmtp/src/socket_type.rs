//! Socket types as declared in the `Socket-Type` handshake property.

use std::fmt;
use std::str::FromStr;

/// ZeroMQ socket types known to the ZMTP 3.1 compatibility table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    Pair,
    Pub,
    Sub,
    Req,
    Rep,
    Dealer,
    Router,
    Pull,
    Push,
    XPub,
    XSub,
}

impl SocketType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::Req => "REQ",
            Self::Rep => "REP",
            Self::Dealer => "DEALER",
            Self::Router => "ROUTER",
            Self::Pull => "PULL",
            Self::Push => "PUSH",
            Self::XPub => "XPUB",
            Self::XSub => "XSUB",
        }
    }

    /// Check if this socket type may talk to the given peer type.
    #[must_use]
    pub const fn is_compatible(&self, peer: SocketType) -> bool {
        matches!(
            (self, peer),
            (Self::Pair, Self::Pair)
                | (Self::Pub | Self::XPub, Self::Sub | Self::XSub)
                | (Self::Sub | Self::XSub, Self::Pub | Self::XPub)
                | (Self::Req, Self::Rep | Self::Router)
                | (Self::Rep, Self::Req | Self::Dealer)
                | (Self::Dealer, Self::Rep | Self::Dealer | Self::Router)
                | (Self::Router, Self::Req | Self::Dealer | Self::Router)
                | (Self::Push, Self::Pull)
                | (Self::Pull, Self::Push)
        )
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocketType {
    type Err = UnknownSocketType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PAIR" => Self::Pair,
            "PUB" => Self::Pub,
            "SUB" => Self::Sub,
            "REQ" => Self::Req,
            "REP" => Self::Rep,
            "DEALER" => Self::Dealer,
            "ROUTER" => Self::Router,
            "PULL" => Self::Pull,
            "PUSH" => Self::Push,
            "XPUB" => Self::XPub,
            "XSUB" => Self::XSub,
            other => return Err(UnknownSocketType(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown socket type: {0}")]
pub struct UnknownSocketType(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pull_compatibility() {
        assert!(SocketType::Push.is_compatible(SocketType::Pull));
        assert!(SocketType::Pull.is_compatible(SocketType::Push));
        assert!(!SocketType::Push.is_compatible(SocketType::Push));
        assert!(!SocketType::Pull.is_compatible(SocketType::Dealer));
    }

    #[test]
    fn test_parse_round_trip() {
        for ty in [SocketType::Push, SocketType::Pull, SocketType::Router, SocketType::XSub] {
            assert_eq!(ty.as_str().parse::<SocketType>().unwrap(), ty);
        }
        assert!("push".parse::<SocketType>().is_err());
    }
}
