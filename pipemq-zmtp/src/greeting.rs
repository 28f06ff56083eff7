use crate::codec::ZmtpError;

/// ZMTP Greeting is always exactly 64 bytes
pub const GREETING_SIZE: usize = 64;

/// Version advertised in local greetings.
pub const VERSION_MAJOR: u8 = 3;
pub const VERSION_MINOR: u8 = 1;

const SIGNATURE_HEAD: u8 = 0xFF;
const SIGNATURE_TAIL: u8 = 0x7F;
const MECHANISM_RANGE: std::ops::Range<usize> = 12..32;
const SERVER_FLAG: usize = 33;

/// Greeting exchanged once per connection before any frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub major: u8,
    pub minor: u8,
    mechanism: String,
    pub as_server: bool,
}

impl Greeting {
    /// Local greeting for `mechanism`, advertising ZMTP 3.1.
    pub fn new(mechanism: &str, as_server: bool) -> Result<Self, ZmtpError> {
        Self::with_version(VERSION_MAJOR, VERSION_MINOR, mechanism, as_server)
    }

    pub fn with_version(
        major: u8,
        minor: u8,
        mechanism: &str,
        as_server: bool,
    ) -> Result<Self, ZmtpError> {
        if mechanism.len() > MECHANISM_RANGE.len() {
            return Err(ZmtpError::InvalidGreeting("mechanism name longer than 20 bytes"));
        }
        if !mechanism.bytes().all(|b| b.is_ascii() && b != 0) {
            return Err(ZmtpError::InvalidGreeting("mechanism name is not ASCII"));
        }
        Ok(Self {
            major,
            minor,
            mechanism: mechanism.to_string(),
            as_server,
        })
    }

    #[must_use]
    pub fn mechanism(&self) -> &str {
        &self.mechanism
    }

    /// Encode the 64-byte greeting.
    ///
    /// Layout:
    /// ```text
    /// [0]      0xFF
    /// [1..9]   Padding
    /// [9]      0x7F
    /// [10]     Major version
    /// [11]     Minor version
    /// [12..32] Mechanism (ASCII, NUL-padded)
    /// [32]     Padding
    /// [33]     As-Server flag
    /// [34..64] Padding
    /// ```
    #[must_use]
    pub fn encode(&self) -> [u8; GREETING_SIZE] {
        let mut g = [0u8; GREETING_SIZE];
        g[0] = SIGNATURE_HEAD;
        g[9] = SIGNATURE_TAIL;
        g[10] = self.major;
        g[11] = self.minor;
        g[MECHANISM_RANGE.start..MECHANISM_RANGE.start + self.mechanism.len()]
            .copy_from_slice(self.mechanism.as_bytes());
        g[SERVER_FLAG] = u8::from(self.as_server);
        g
    }

    /// Parse a 64-byte greeting. Version compatibility is left to the caller.
    pub fn parse(src: &[u8]) -> Result<Self, ZmtpError> {
        if src.len() < GREETING_SIZE {
            return Err(ZmtpError::InvalidGreeting("short greeting"));
        }
        if src[0] != SIGNATURE_HEAD || src[9] != SIGNATURE_TAIL {
            return Err(ZmtpError::InvalidGreeting("bad signature"));
        }

        let raw = &src[MECHANISM_RANGE];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let mechanism = std::str::from_utf8(&raw[..end])
            .ok()
            .filter(|m| m.is_ascii())
            .ok_or(ZmtpError::InvalidGreeting("mechanism name is not ASCII"))?;

        Ok(Self {
            major: src[10],
            minor: src[11],
            mechanism: mechanism.to_string(),
            as_server: src[SERVER_FLAG] == 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let long = "X".repeat(20);
        for (mechanism, as_server) in
            [("", false), ("NULL", false), ("PLAIN", true), (long.as_str(), true)]
        {
            let greeting = Greeting::with_version(3, 0, mechanism, as_server).unwrap();
            let parsed = Greeting::parse(&greeting.encode()).unwrap();
            assert_eq!(parsed, greeting);
        }
    }

    #[test]
    fn test_layout() {
        let g = Greeting::new("NULL", true).unwrap().encode();
        assert_eq!(g[0], 0xFF);
        assert_eq!(&g[1..9], &[0u8; 8]);
        assert_eq!(g[9], 0x7F);
        assert_eq!((g[10], g[11]), (3, 1));
        assert_eq!(&g[12..16], b"NULL");
        assert!(g[16..32].iter().all(|&b| b == 0));
        assert_eq!(g[32], 0);
        assert_eq!(g[33], 1);
        assert!(g[34..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bad_signature() {
        let mut g = Greeting::new("NULL", false).unwrap().encode();
        g[9] = 0;
        assert!(matches!(Greeting::parse(&g), Err(ZmtpError::InvalidGreeting(_))));
    }

    #[test]
    fn test_mechanism_validation() {
        assert!(Greeting::new(&"A".repeat(21), false).is_err());
        assert!(Greeting::new("NÜLL", false).is_err());
    }

    #[test]
    fn test_short_input() {
        assert!(Greeting::parse(&[0xFF; 10]).is_err());
    }
}
