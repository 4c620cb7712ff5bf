//! Packet and name types for the ICN forwarding engine.
//!
//! This module defines the wire-level value types — `Name`, `Interest`,
//! `Content`, `Nack` — and the TLV encoding between them and raw bytes.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Maximum length of an NDN name component.
pub const MAX_NAME_COMPONENT_LENGTH: usize = 255;
/// Maximum number of components in an NDN name.
pub const MAX_NAME_COMPONENTS: usize = 16;
/// Maximum size of an NDN packet.
pub const MAX_NDN_PACKET_SIZE: usize = 8800;

/* ---------------------------------------------------------------- *\
 * Name and NameComponent
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_COMPONENT {
            return Err(Error::NdnPacket(format!(
                "expected name component TLV type {}, got {}",
                tlv::TLV_COMPONENT,
                element.tlv_type
            )));
        }
        Ok(Self(element.value.clone()))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printable = self.0.iter().all(|&b| b.is_ascii_graphic() || b == b' ');
        if printable {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "0x")?;
            for &b in &self.0 {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

impl From<&str> for NameComponent {
    fn from(s: &str) -> Self {
        NameComponent::new(s.as_bytes().to_vec())
    }
}

/// An ordered, slash-delimited sequence of opaque byte components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn from_string(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(NameComponent::from)
            .collect();
        Self { components }
    }

    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Returns a new name with `component` appended.
    pub fn join(&self, component: impl Into<NameComponent>) -> Self {
        let mut components = self.components.clone();
        components.push(component.into());
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// The first component, if any.
    pub fn first(&self) -> Option<&NameComponent> {
        self.components.first()
    }

    /// The last component, if any.
    pub fn last(&self) -> Option<&NameComponent> {
        self.components.last()
    }

    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// Returns a name with the last `n` components removed, or an empty
    /// name if `n >= len()`.
    pub fn drop_last(&self, n: usize) -> Self {
        let keep = self.components.len().saturating_sub(n);
        self.prefix(keep)
    }

    /// `self.is_prefix_of(other)` iff `self`'s components equal `other`'s
    /// leading components.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.components.len() > other.components.len() {
            return false;
        }
        self.components
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a == b)
    }

    pub fn to_tlv(&self) -> Result<TlvElement, Error> {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        Ok(TlvElement::new(tlv::TLV_NAME, buf.freeze()))
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::NdnPacket(format!(
                "expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();
        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            components.push(NameComponent::from_tlv(&e)?);
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::from_string(s)
    }
}

/* ---------------------------------------------------------------- *\
 * Interest
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub lifetime_ms: u32,
    pub hop_limit: Option<u8>,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));
        let nonce = (now.as_millis() % u32::MAX as u128) as u32;

        Self {
            name,
            nonce,
            lifetime_ms: 4000,
            hop_limit: Some(32),
            can_be_prefix: false,
            must_be_fresh: true,
        }
    }

    pub fn with_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    pub fn wire_size(&self) -> Result<usize, Error> {
        Ok(self.name.to_tlv()?.len() + 20) // rough estimate: nonce + lifetime + selectors
    }

    fn to_tlv(&self) -> Result<TlvElement, Error> {
        let mut buf = BytesMut::new();
        self.name.to_tlv()?.encode(&mut buf);
        TlvElement::new(tlv::TLV_NONCE, self.nonce.to_be_bytes().to_vec()).encode(&mut buf);
        TlvElement::new(
            tlv::TLV_INTEREST_LIFETIME,
            self.lifetime_ms.to_be_bytes().to_vec(),
        )
        .encode(&mut buf);
        let mut flags = 0u8;
        if self.can_be_prefix {
            flags |= 0b01;
        }
        if self.must_be_fresh {
            flags |= 0b10;
        }
        let hop_limit = self.hop_limit.unwrap_or(0);
        TlvElement::new(tlv::TLV_SELECTORS, vec![flags, hop_limit]).encode(&mut buf);
        Ok(TlvElement::new(tlv::TLV_INTEREST, buf.freeze()))
    }

    fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::NdnPacket(format!(
                "expected Interest TLV type {}, got {}",
                tlv::TLV_INTEREST,
                element.tlv_type
            )));
        }
        let mut buf = element.value.clone();
        let name_tlv = TlvElement::decode(&mut buf)?;
        let name = Name::from_tlv(&name_tlv)?;

        let mut nonce = 0u32;
        let mut lifetime_ms = 4000u32;
        let mut can_be_prefix = false;
        let mut must_be_fresh = true;
        let mut hop_limit = Some(32u8);

        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            match e.tlv_type {
                t if t == tlv::TLV_NONCE => {
                    if e.value.len() == 4 {
                        let mut b = [0u8; 4];
                        b.copy_from_slice(&e.value);
                        nonce = u32::from_be_bytes(b);
                    }
                }
                t if t == tlv::TLV_INTEREST_LIFETIME => {
                    if e.value.len() == 4 {
                        let mut b = [0u8; 4];
                        b.copy_from_slice(&e.value);
                        lifetime_ms = u32::from_be_bytes(b);
                    }
                }
                t if t == tlv::TLV_SELECTORS => {
                    if e.value.len() == 2 {
                        can_be_prefix = e.value[0] & 0b01 != 0;
                        must_be_fresh = e.value[0] & 0b10 != 0;
                        hop_limit = if e.value[1] == 0 {
                            None
                        } else {
                            Some(e.value[1])
                        };
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            name,
            nonce,
            lifetime_ms,
            hop_limit,
            can_be_prefix,
            must_be_fresh,
        })
    }
}

/* ---------------------------------------------------------------- *\
 * Content
\* ---------------------------------------------------------------- */

/// Helper used only for deserialisation of `Content`.
#[derive(Deserialize)]
struct ContentHelper {
    name: Name,
    payload: Bytes,
    ttl_ms: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub name: Name,
    pub payload: Bytes,
    pub ttl_ms: u32,

    /// Creation timestamp, not serialised; regenerated on deserialisation.
    #[serde(skip_serializing)]
    pub creation_time: Instant,
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let helper = ContentHelper::deserialize(deserializer)?;
        Ok(Self {
            name: helper.name,
            payload: helper.payload,
            ttl_ms: helper.ttl_ms,
            creation_time: Instant::now(),
        })
    }
}

impl Content {
    pub fn new(name: Name, payload: impl Into<Bytes>) -> Self {
        Self {
            name,
            payload: payload.into(),
            ttl_ms: 10_000,
            creation_time: Instant::now(),
        }
    }

    pub fn with_ttl(mut self, ttl_ms: u32) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.creation_time.elapsed() > Duration::from_millis(self.ttl_ms as u64)
    }

    pub fn wire_size(&self) -> Result<usize, Error> {
        Ok(self.name.to_tlv()?.len() + self.payload.len() + 20)
    }

    fn to_tlv(&self) -> Result<TlvElement, Error> {
        let mut buf = BytesMut::new();
        self.name.to_tlv()?.encode(&mut buf);
        TlvElement::new(tlv::TLV_CONTENT, self.payload.clone()).encode(&mut buf);
        Ok(TlvElement::new(tlv::TLV_DATA, buf.freeze()))
    }

    fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_DATA {
            return Err(Error::NdnPacket(format!(
                "expected Content TLV type {}, got {}",
                tlv::TLV_DATA,
                element.tlv_type
            )));
        }
        let mut buf = element.value.clone();
        let name_tlv = TlvElement::decode(&mut buf)?;
        let name = Name::from_tlv(&name_tlv)?;

        let mut payload = Bytes::new();
        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            if e.tlv_type == tlv::TLV_CONTENT {
                payload = e.value;
            }
        }

        Ok(Self::new(name, payload))
    }
}

/* ---------------------------------------------------------------- *\
 * Nack
\* ---------------------------------------------------------------- */

/// Closed set of reasons a Nack can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NackReason {
    /// No FIB entry (or no remaining non-nacked upstream) covers the name.
    NoRoute,
    /// The application/repository has no content for this name.
    NoContent,
    /// The PIT entry for this name expired after exhausting its retransmits.
    PitTimeout,
    /// Reserved for computation errors in out-of-scope NFN subsystems.
    ComputationError,
}

impl NackReason {
    pub fn as_u8(self) -> u8 {
        match self {
            NackReason::NoRoute => 0,
            NackReason::NoContent => 1,
            NackReason::PitTimeout => 2,
            NackReason::ComputationError => 3,
        }
    }

    pub fn from_u8(v: u8) -> Result<Self, Error> {
        match v {
            0 => Ok(NackReason::NoRoute),
            1 => Ok(NackReason::NoContent),
            2 => Ok(NackReason::PitTimeout),
            3 => Ok(NackReason::ComputationError),
            other => Err(Error::NdnPacket(format!("unknown Nack reason {other}"))),
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NackReason::NoRoute => "no-route",
            NackReason::NoContent => "no-content",
            NackReason::PitTimeout => "pit-timeout",
            NackReason::ComputationError => "computation-error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nack {
    pub name: Name,
    pub reason: NackReason,
    pub originating_interest: Box<Interest>,
}

impl Nack {
    pub fn new(reason: NackReason, originating_interest: Interest) -> Self {
        Self {
            name: originating_interest.name.clone(),
            reason,
            originating_interest: Box::new(originating_interest),
        }
    }

    fn to_tlv(&self) -> Result<TlvElement, Error> {
        let mut buf = BytesMut::new();
        self.name.to_tlv()?.encode(&mut buf);
        TlvElement::new(tlv::TLV_NACK_REASON, vec![self.reason.as_u8()]).encode(&mut buf);
        self.originating_interest.to_tlv()?.encode(&mut buf);
        Ok(TlvElement::new(tlv::TLV_NACK, buf.freeze()))
    }

    fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NACK {
            return Err(Error::NdnPacket(format!(
                "expected Nack TLV type {}, got {}",
                tlv::TLV_NACK,
                element.tlv_type
            )));
        }
        let mut buf = element.value.clone();
        let name_tlv = TlvElement::decode(&mut buf)?;
        let name = Name::from_tlv(&name_tlv)?;

        let reason_tlv = TlvElement::decode(&mut buf)?;
        if reason_tlv.tlv_type != tlv::TLV_NACK_REASON || reason_tlv.value.is_empty() {
            return Err(Error::NdnPacket("malformed Nack reason TLV".into()));
        }
        let reason = NackReason::from_u8(reason_tlv.value[0])?;

        let interest_tlv = TlvElement::decode(&mut buf)?;
        let originating_interest = Interest::from_tlv(&interest_tlv)?;

        Ok(Self {
            name,
            reason,
            originating_interest: Box::new(originating_interest),
        })
    }
}

/* ---------------------------------------------------------------- *\
 * Packet (tagged dispatch, never subtype polymorphism)
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    Interest(Interest),
    Content(Content),
    Nack(Nack),
}

impl Packet {
    pub fn name(&self) -> &Name {
        match self {
            Packet::Interest(i) => &i.name,
            Packet::Content(c) => &c.name,
            Packet::Nack(n) => &n.name,
        }
    }

    /// Encodes this packet to its NDN-TLV wire representation.
    pub fn encode(&self) -> Result<Bytes, Error> {
        let element = match self {
            Packet::Interest(i) => i.to_tlv()?,
            Packet::Content(c) => c.to_tlv()?,
            Packet::Nack(n) => n.to_tlv()?,
        };
        let mut buf = BytesMut::with_capacity(element.len());
        element.encode(&mut buf);
        Ok(buf.freeze())
    }

    /// Decodes a packet from its NDN-TLV wire representation.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let element = TlvElement::decode(&mut buf)?;
        match element.tlv_type {
            t if t == tlv::TLV_INTEREST => Ok(Packet::Interest(Interest::from_tlv(&element)?)),
            t if t == tlv::TLV_DATA => Ok(Packet::Content(Content::from_tlv(&element)?)),
            t if t == tlv::TLV_NACK => Ok(Packet::Nack(Nack::from_tlv(&element)?)),
            other => Err(Error::NdnPacket(format!("unknown top-level TLV type {other}"))),
        }
    }
}

impl From<Interest> for Packet {
    fn from(i: Interest) -> Self {
        Packet::Interest(i)
    }
}

impl From<Content> for Packet {
    fn from(c: Content) -> Self {
        Packet::Content(c)
    }
}

impl From<Nack> for Packet {
    fn from(n: Nack) -> Self {
        Packet::Nack(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_from_string_round_trips_through_display() {
        let name = Name::from_string("/test/data/object");
        assert_eq!(name.to_string(), "/test/data/object");
        assert_eq!(name.len(), 3);
    }

    #[test]
    fn empty_name_displays_as_root() {
        assert_eq!(Name::new().to_string(), "/");
    }

    #[test]
    fn is_prefix_of_matches_leading_components() {
        let prefix = Name::from_string("/test/data");
        let full = Name::from_string("/test/data/object");
        assert!(prefix.is_prefix_of(&full));
        assert!(!full.is_prefix_of(&prefix));
    }

    #[test]
    fn drop_last_strips_trailing_components() {
        let name = Name::from_string("/sid/abcd/reconnect/3");
        assert_eq!(name.drop_last(2).to_string(), "/sid/abcd");
    }

    #[test]
    fn interest_round_trips_through_tlv() {
        let interest = Interest::new(Name::from_string("/test/data/object"))
            .with_lifetime(2000)
            .with_can_be_prefix(true);
        let packet: Packet = interest.clone().into();
        let bytes = packet.encode().unwrap();
        let decoded = Packet::decode(&bytes).unwrap();
        match decoded {
            Packet::Interest(got) => {
                assert_eq!(got.name, interest.name);
                assert_eq!(got.lifetime_ms, 2000);
                assert!(got.can_be_prefix);
            }
            _ => panic!("expected Interest"),
        }
    }

    #[test]
    fn content_round_trips_through_tlv() {
        let content = Content::new(Name::from_string("/test/data/object"), "HelloWorld");
        let packet: Packet = content.clone().into();
        let bytes = packet.encode().unwrap();
        let decoded = Packet::decode(&bytes).unwrap();
        match decoded {
            Packet::Content(got) => {
                assert_eq!(got.name, content.name);
                assert_eq!(got.payload, content.payload);
            }
            _ => panic!("expected Content"),
        }
    }

    #[test]
    fn nack_round_trips_through_tlv() {
        let interest = Interest::new(Name::from_string("/nowhere"));
        let nack = Nack::new(NackReason::NoRoute, interest);
        let packet: Packet = nack.clone().into();
        let bytes = packet.encode().unwrap();
        let decoded = Packet::decode(&bytes).unwrap();
        match decoded {
            Packet::Nack(got) => {
                assert_eq!(got.reason, NackReason::NoRoute);
                assert_eq!(got.name.to_string(), "/nowhere");
            }
            _ => panic!("expected Nack"),
        }
    }
}
