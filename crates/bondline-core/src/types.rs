//! Identity and amount types shared across Bondline crates

use crate::error::{BondlineError, Result};
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Currency or token quantity in base units (18 decimals)
pub type Amount = U256;

/// Account identity (20 bytes, EVM style)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The null identity; never a valid creator or beneficiary
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Deterministic address derived from a human label (BLAKE3, first 20 bytes)
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash.as_bytes()[..20]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Convert to `0x`-prefixed hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without `0x`
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)
            .map_err(|e| BondlineError::InvalidParameter(format!("address {s}: {e}")))?;
        if bytes.len() != 20 {
            return Err(BondlineError::InvalidParameter(format!(
                "address {s}: expected 20 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Address {
    type Err = BondlineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

// Hex strings so addresses can key JSON maps
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// TokenId - identifier of a launched token
///
/// TokenId = BLAKE3(creator || symbol || launch sequence)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TokenId([u8; 32]);

impl TokenId {
    pub fn new(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    pub fn derive(creator: &Address, symbol: &str, sequence: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(creator.as_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(&sequence.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = hex::decode(&raw).map_err(serde::de::Error::custom)?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("token id must be 32 bytes"))?;
        Ok(Self(hash))
    }
}

/// Parse a base-unit amount.
///
/// Accepts plain decimals (`1000000`), underscore groups (`1_000_000`) and
/// integer scientific notation (`5e17`, `25e16`).
pub fn parse_amount(input: &str) -> Result<Amount> {
    let cleaned: String = input.trim().chars().filter(|c| *c != '_').collect();
    let invalid = || BondlineError::InvalidParameter(format!("amount: {input}"));

    if cleaned.is_empty() {
        return Err(invalid());
    }

    match cleaned.split_once(|c: char| c == 'e' || c == 'E') {
        Some((mantissa, exponent)) => {
            let mantissa = U256::from_dec_str(mantissa).map_err(|_| invalid())?;
            let exponent: usize = exponent.parse().map_err(|_| invalid())?;
            if exponent > 77 {
                return Err(invalid());
            }
            mantissa
                .checked_mul(U256::exp10(exponent))
                .ok_or(BondlineError::ArithmeticOverflow)
        }
        None => U256::from_dec_str(&cleaned).map_err(|_| invalid()),
    }
}

/// Serde adapter for amounts written as decimal strings in config files.
/// TOML integers stop at `i64`, far below realistic base-unit amounts.
pub mod amount_str {
    use super::parse_amount;
    use primitive_types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_amount(&raw).map_err(serde::de::Error::custom)
    }
}

/// Render a base-unit amount as a decimal with 18 fractional digits
pub fn format_units(amount: Amount) -> String {
    let scale = U256::exp10(18);
    let whole = amount / scale;
    let frac = (amount % scale).low_u64();
    format!("{whole}.{frac:018}")
}
