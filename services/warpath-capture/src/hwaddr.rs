//! Hardware address indexing
//!
//! Devices are keyed by a 24-bit fold of their 48-bit address: the OUI half
//! XOR the NIC half. Distinct addresses can share a key; the index keeps
//! whichever address was stored last.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

/// 48-bit hardware (MAC) address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HwAddr(pub [u8; 6]);

impl HwAddr {
    /// Recover an address from its big-endian packed form (low 48 bits)
    pub fn from_packed(packed: u64) -> Self {
        let bytes = packed.to_be_bytes();
        let mut addr = [0u8; 6];
        addr.copy_from_slice(&bytes[2..]);
        Self(addr)
    }

    /// Locally administered bit set (typical of randomized client addresses)
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl From<[u8; 6]> for HwAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid hardware address: {0:?}")]
pub struct ParseHwAddrError(String);

impl FromStr for HwAddr {
    type Err = ParseHwAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split([':', '-']);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseHwAddrError(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseHwAddrError(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseHwAddrError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseHwAddrError(s.to_string()));
        }
        Ok(Self(octets))
    }
}

/// Fold an address into its index key: OUI XOR NIC
pub fn hash_hw_addr(addr: &HwAddr) -> u64 {
    let a = &addr.0;
    let oui = (a[0] as u64) << 16 | (a[1] as u64) << 8 | a[2] as u64;
    let nic = (a[3] as u64) << 16 | (a[4] as u64) << 8 | a[5] as u64;
    oui ^ nic
}

/// Concurrent map from address hash to the last address stored under it
#[derive(Debug, Default)]
pub struct HwAddrIndex {
    entries: RwLock<HashMap<u64, HwAddr>>,
}

impl HwAddrIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry at the address's hash
    pub fn set(&self, addr: HwAddr) {
        let hash = hash_hw_addr(&addr);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hash, addr);
    }

    /// Look up by the hash of `addr`.
    ///
    /// Returns the hash and whatever address currently occupies that slot,
    /// which differs from `addr` when two addresses collide.
    pub fn get(&self, addr: &HwAddr) -> (u64, Option<HwAddr>) {
        let hash = hash_hw_addr(addr);
        let stored = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&hash)
            .copied();
        (hash, stored)
    }

    /// Remove the entry at the address's hash
    pub fn del(&self, addr: &HwAddr) {
        let hash = hash_hw_addr(addr);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&hash);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
