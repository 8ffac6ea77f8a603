//! Domain primitives: chain-agnostic address/asset identifiers, basis
//! points, and arbitrary-precision token amounts.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{Error, Result};

/// A hex-encoded on-chain address, lowercase-normalized with a `0x` prefix.
///
/// Construction always goes through [`Address::parse`], which validates the
/// payload is well-formed hex of even length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self> {
        let body = raw.strip_prefix("0x").unwrap_or(raw);
        if body.is_empty() || body.len() % 2 != 0 {
            return Err(Error::type_error(format!(
                "address {raw:?} must have an even number of hex digits"
            )));
        }
        if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::type_error(format!(
                "address {raw:?} contains non-hex characters"
            )));
        }
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Address::parse(&raw).map_err(DeError::custom)
    }
}

/// A chain identifier (EVM chain id, or an internal id for non-EVM venues).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An asset symbol or canonical tag, e.g. `"USDC"` or `"ETH"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        AssetId::new(s)
    }
}

/// Basis points (1 bp = 0.01%), used for fees, slippage tolerances, and
/// rebalance thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BasisPoints(pub i64);

impl BasisPoints {
    pub fn new(bp: i64) -> Self {
        Self(bp)
    }

    pub fn to_fraction(self) -> f64 {
        self.0 as f64 / 10_000.0
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bp", self.0)
    }
}

/// An arbitrary-precision non-negative integer token amount, stored as
/// little-endian base-10 digits.
///
/// Token amounts routinely exceed `u64`/`u128` range once expressed in base
/// units (18-decimal ERC-20s), but Grimoire never performs on-chain-width
/// fixed arithmetic (no broadcast, no gas accounting) — a minimal decimal
/// bignum with add/sub/scale-by-basis-points is all §4.D's arithmetic rules
/// require.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount(Vec<u8>);

impl Amount {
    pub fn zero() -> Self {
        Self(vec![0])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&d| d == 0)
    }

    fn normalize(mut digits: Vec<u8>) -> Vec<u8> {
        while digits.len() > 1 && *digits.last().unwrap() == 0 {
            digits.pop();
        }
        digits
    }

    pub fn checked_add(&self, other: &Amount) -> Amount {
        let mut result = Vec::with_capacity(self.0.len().max(other.0.len()) + 1);
        let mut carry = 0u8;
        for i in 0..self.0.len().max(other.0.len()) {
            let a = *self.0.get(i).unwrap_or(&0);
            let b = *other.0.get(i).unwrap_or(&0);
            let sum = a + b + carry;
            result.push(sum % 10);
            carry = sum / 10;
        }
        if carry > 0 {
            result.push(carry);
        }
        Amount(Self::normalize(result))
    }

    /// Returns `None` if `other > self` (amounts never go negative).
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.cmp(other) == Ordering::Less {
            return None;
        }
        let mut result = Vec::with_capacity(self.0.len());
        let mut borrow = 0i8;
        for i in 0..self.0.len() {
            let a = self.0[i] as i8;
            let b = *other.0.get(i).unwrap_or(&0) as i8;
            let mut diff = a - b - borrow;
            if diff < 0 {
                diff += 10;
                borrow = 1;
            } else {
                borrow = 0;
            }
            result.push(diff as u8);
        }
        Some(Amount(Self::normalize(result)))
    }

    fn mul_small(&self, scalar: u64) -> Amount {
        if scalar == 0 || self.is_zero() {
            return Amount::zero();
        }
        let mut result = Vec::with_capacity(self.0.len() + 20);
        let mut carry: u128 = 0;
        for &d in &self.0 {
            let val = d as u128 * scalar as u128 + carry;
            result.push((val % 10) as u8);
            carry = val / 10;
        }
        while carry > 0 {
            result.push((carry % 10) as u8);
            carry /= 10;
        }
        Amount(Self::normalize(result))
    }

    /// Scales by `bp / 10_000`, truncating any fractional remainder.
    pub fn mul_bp(&self, bp: BasisPoints) -> Amount {
        if bp.0 <= 0 || self.is_zero() {
            return Amount::zero();
        }
        self.mul_small(bp.0 as u64).div_pow10(4)
    }

    fn div_pow10(&self, exp: u32) -> Amount {
        if self.0.len() <= exp as usize {
            return Amount::zero();
        }
        let digits = self.0[exp as usize..].to_vec();
        Amount(Self::normalize(digits))
    }

    pub fn cmp(&self, other: &Amount) -> Ordering {
        if self.0.len() != other.0.len() {
            return self.0.len().cmp(&other.0.len());
        }
        for i in (0..self.0.len()).rev() {
            if self.0[i] != other.0[i] {
                return self.0[i].cmp(&other.0[i]);
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        Amount::cmp(self, other)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::type_error(format!("invalid amount literal {s:?}")));
        }
        let digits: Vec<u8> = s.bytes().rev().map(|b| b - b'0').collect();
        Ok(Amount(Self::normalize(digits)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &d in self.0.iter().rev() {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Amount::from_str(&raw).map_err(DeError::custom)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount::from_str(&value.to_string()).expect("u64 digits are always valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_lowercases_and_validates() {
        let a = Address::parse("0xABCDEF12").unwrap();
        assert_eq!(a.as_str(), "0xabcdef12");
        assert!(Address::parse("0xabc").is_err());
        assert!(Address::parse("0xghij").is_err());
    }

    #[test]
    fn basis_points_to_fraction() {
        assert_eq!(BasisPoints::new(150).to_fraction(), 0.015);
    }

    #[test]
    fn amount_add_and_sub_round_trip() {
        let a: Amount = "999999999999999999".parse().unwrap();
        let one = Amount::from(1u64);
        let sum = a.checked_add(&one);
        assert_eq!(sum.to_string(), "1000000000000000000");
        let back = sum.checked_sub(&one).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn amount_sub_underflow_is_none() {
        let small = Amount::from(1u64);
        let big = Amount::from(2u64);
        assert!(small.checked_sub(&big).is_none());
    }

    #[test]
    fn amount_mul_bp_truncates() {
        let amount = Amount::from(10_000u64);
        let fee = amount.mul_bp(BasisPoints::new(150));
        assert_eq!(fee.to_string(), "150");

        let tiny = Amount::from(3u64);
        let result = tiny.mul_bp(BasisPoints::new(1));
        assert_eq!(result, Amount::zero());
    }

    #[test]
    fn amount_ordering_ignores_leading_zero_width() {
        let a = Amount::from(5u64);
        let b = Amount::from(50u64);
        assert!(a < b);
    }
}
