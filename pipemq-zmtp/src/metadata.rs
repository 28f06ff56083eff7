//! Handshake metadata: the property list carried by `READY` and `INITIATE`.
//!
//! Wire form is a sequence of `[name-len u8][name][value-len u32 BE][value]`.
//! Property names compare ASCII case-insensitively.

use crate::codec::ZmtpError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Well-known property announcing the sender's socket type.
pub const SOCKET_TYPE: &str = "Socket-Type";
/// Well-known property carrying an optional routing identity.
pub const IDENTITY: &str = "Identity";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    properties: Vec<(String, Bytes)>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a property. Names must be 1..=255 ASCII bytes.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> Result<(), ZmtpError> {
        let name = name.into();
        let value = value.into();
        if name.is_empty() || name.len() > 255 || !name.is_ascii() {
            return Err(ZmtpError::InvalidMetadata("property name must be 1-255 ASCII bytes"));
        }
        if u32::try_from(value.len()).is_err() {
            return Err(ZmtpError::InvalidMetadata("property value too large"));
        }
        self.properties.push((name, value));
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> Result<Self, ZmtpError> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// First value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.properties
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Declared `Socket-Type`, if present and valid UTF-8.
    #[must_use]
    pub fn socket_type(&self) -> Option<&str> {
        self.get(SOCKET_TYPE)
            .and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.properties.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        for (name, value) in &self.properties {
            dst.put_u8(name.len() as u8);
            dst.put_slice(name.as_bytes());
            dst.put_u32(value.len() as u32);
            dst.put_slice(value);
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Parse a property list occupying the whole of `src`.
    pub fn parse(src: &Bytes) -> Result<Self, ZmtpError> {
        let mut b = src.clone();
        let mut properties = Vec::new();

        while b.has_remaining() {
            let name_len = b.get_u8() as usize;
            if name_len == 0 || b.remaining() < name_len {
                return Err(ZmtpError::InvalidMetadata("truncated property name"));
            }
            let name = b.split_to(name_len);
            let name = std::str::from_utf8(&name)
                .map_err(|_| ZmtpError::InvalidMetadata("property name is not ASCII"))?
                .to_string();

            if b.remaining() < 4 {
                return Err(ZmtpError::InvalidMetadata("truncated value length"));
            }
            let value_len = b.get_u32() as usize;
            if b.remaining() < value_len {
                return Err(ZmtpError::InvalidMetadata("truncated property value"));
            }
            properties.push((name, b.split_to(value_len)));
        }

        Ok(Self { properties })
    }
}
