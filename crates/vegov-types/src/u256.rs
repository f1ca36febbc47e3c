use crate::error::TypesError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// 256-bit unsigned integer for token amounts, voting weights and
/// fixed-point accumulators.
///
/// Four little-endian u64 limbs. Arithmetic is checked only: every
/// operation that can overflow returns `Option`, so accounting code has to
/// decide what an overflow means.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct U256([u64; 4]);

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

const WAD: u128 = 1_000_000_000_000_000_000;

impl U256 {
    pub const ZERO: Self = Self([0; 4]);
    pub const ONE: Self = Self([1, 0, 0, 0]);
    pub const MAX: Self = Self([u64::MAX; 4]);

    /// One whole token in base units (10^18)
    pub const UNIT: Self = Self::from_u128(WAD);

    pub const fn from_u64(val: u64) -> Self {
        Self([val, 0, 0, 0])
    }

    pub const fn from_u128(val: u128) -> Self {
        Self([val as u64, (val >> 64) as u64, 0, 0])
    }

    /// `n` whole tokens expressed in base units.
    pub const fn units(n: u64) -> Self {
        Self::from_u128(n as u128 * WAD)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }

    pub fn checked_add(&self, rhs: &Self) -> Option<Self> {
        let mut out = [0u64; 4];
        let mut carry = 0u128;
        for (i, limb) in out.iter_mut().enumerate() {
            let sum = self.0[i] as u128 + rhs.0[i] as u128 + carry;
            *limb = sum as u64;
            carry = sum >> 64;
        }
        (carry == 0).then_some(Self(out))
    }

    pub fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        (self >= rhs).then(|| self.wrapping_sub(rhs))
    }

    pub fn saturating_sub(&self, rhs: &Self) -> Self {
        self.checked_sub(rhs).unwrap_or(Self::ZERO)
    }

    /// Schoolbook multiplication; any bit past 2^256 is an overflow.
    pub fn checked_mul(&self, rhs: &Self) -> Option<Self> {
        let mut wide = [0u64; 8];
        for i in 0..4 {
            if self.0[i] == 0 {
                continue;
            }
            let mut carry = 0u128;
            for j in 0..4 {
                // a * b + c + d <= 2^128 - 1 for 64-bit a, b, c, d
                let t = self.0[i] as u128 * rhs.0[j] as u128 + wide[i + j] as u128 + carry;
                wide[i + j] = t as u64;
                carry = t >> 64;
            }
            wide[i + 4] = carry as u64;
        }
        if wide[4..].iter().any(|&l| l != 0) {
            return None;
        }
        Some(Self([wide[0], wide[1], wide[2], wide[3]]))
    }

    /// Floor division; `None` on a zero divisor.
    pub fn checked_div(&self, rhs: &Self) -> Option<Self> {
        self.div_rem(rhs).map(|(q, _)| q)
    }

    /// `self * mul / div`, floor. `None` if the product overflows or `div` is zero.
    pub fn checked_mul_div(&self, mul: &Self, div: &Self) -> Option<Self> {
        self.checked_mul(mul)?.checked_div(div)
    }

    /// Quotient and remainder.
    pub fn div_rem(&self, rhs: &Self) -> Option<(Self, Self)> {
        if rhs.is_zero() {
            return None;
        }
        if self < rhs {
            return Some((Self::ZERO, *self));
        }
        if let (Some(a), Some(b)) = (self.as_u128(), rhs.as_u128()) {
            return Some((Self::from_u128(a / b), Self::from_u128(a % b)));
        }

        // Binary long division over the significant bits of `self`.
        let mut quotient = Self::ZERO;
        let mut remainder = Self::ZERO;
        for i in (0..self.bit_len()).rev() {
            let overflowed = remainder.bit(255);
            remainder = remainder.shl1();
            remainder.0[0] |= self.bit(i) as u64;
            if overflowed || remainder >= *rhs {
                remainder = remainder.wrapping_sub(rhs);
                quotient.0[(i / 64) as usize] |= 1 << (i % 64);
            }
        }
        Some((quotient, remainder))
    }

    pub fn bit(&self, pos: u32) -> bool {
        pos < 256 && (self.0[(pos / 64) as usize] >> (pos % 64)) & 1 == 1
    }

    /// Index of the highest set bit plus one; 0 for zero.
    pub fn bit_len(&self) -> u32 {
        match self.0.iter().rposition(|&l| l != 0) {
            Some(i) => 64 * (i as u32 + 1) - self.0[i].leading_zeros(),
            None => 0,
        }
    }

    fn as_u128(&self) -> Option<u128> {
        (self.0[2] == 0 && self.0[3] == 0).then(|| (self.0[1] as u128) << 64 | self.0[0] as u128)
    }

    fn wrapping_sub(&self, rhs: &Self) -> Self {
        let mut out = [0u64; 4];
        let mut borrow = false;
        for (i, limb) in out.iter_mut().enumerate() {
            let (d, b1) = self.0[i].overflowing_sub(rhs.0[i]);
            let (d, b2) = d.overflowing_sub(borrow as u64);
            *limb = d;
            borrow = b1 || b2;
        }
        Self(out)
    }

    fn shl1(&self) -> Self {
        let l = &self.0;
        Self([
            l[0] << 1,
            l[1] << 1 | l[0] >> 63,
            l[2] << 1 | l[1] >> 63,
            l[3] << 1 | l[2] >> 63,
        ])
    }

    /// Parse a base-10 string of ASCII digits.
    pub fn from_decimal_str(s: &str) -> Result<Self, TypesError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypesError::InvalidU256String(s.to_string()));
        }
        let ten = Self::from_u64(10);
        s.bytes().try_fold(Self::ZERO, |acc, b| {
            acc.checked_mul(&ten)
                .and_then(|v| v.checked_add(&Self::from_u64((b - b'0') as u64)))
                .ok_or(TypesError::U256Overflow)
        })
    }
}

impl From<u64> for U256 {
    fn from(val: u64) -> Self {
        Self::from_u64(val)
    }
}

impl From<u128> for U256 {
    fn from(val: u128) -> Self {
        Self::from_u128(val)
    }
}

impl TryFrom<U256> for u64 {
    type Error = TypesError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        match value.0 {
            [low, 0, 0, 0] => Ok(low),
            _ => Err(TypesError::U256Overflow),
        }
    }
}

impl TryFrom<U256> for u128 {
    type Error = TypesError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        value.as_u128().ok_or(TypesError::U256Overflow)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Peel off 19 decimal digits at a time.
        const CHUNK: u64 = 10_000_000_000_000_000_000;
        let chunk = Self::from_u64(CHUNK);

        let mut parts = Vec::new();
        let mut n = *self;
        loop {
            let (q, r) = n.div_rem(&chunk).ok_or(fmt::Error)?;
            parts.push(r.0[0]);
            if q.is_zero() {
                break;
            }
            n = q;
        }

        let mut out = String::new();
        for (i, part) in parts.iter().rev().enumerate() {
            if i == 0 {
                out.push_str(&part.to_string());
            } else {
                out.push_str(&format!("{:019}", part));
            }
        }
        f.pad(&out)
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self)
    }
}

impl FromStr for U256 {
    type Err = TypesError;

    /// Decimal, or hex with a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) else {
            return Self::from_decimal_str(s);
        };
        if digits.is_empty() || digits.len() > 64 {
            return Err(TypesError::InvalidU256String(s.to_string()));
        }
        let padded = format!("{:0>64}", digits);
        let bytes = hex::decode(padded)?;
        let mut limbs = [0u64; 4];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            limbs[3 - i] = u64::from_be_bytes(buf);
        }
        Ok(Self(limbs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_constants() {
        assert!(U256::ZERO.is_zero());
        assert_eq!(U256::ONE, U256::from(1u64));
        assert_eq!(U256::MAX.bit_len(), 256);
        assert_eq!(U256::units(1), U256::UNIT);
        assert_eq!(U256::units(500), U256::from(500_000_000_000_000_000_000u128));
    }

    #[test]
    fn test_ordering_uses_high_limbs_first() {
        assert!(U256([0, 0, 0, 1]) > U256([u64::MAX, u64::MAX, u64::MAX, 0]));
        assert!(U256::from(3u64) < U256::from(4u64));
    }

    #[test]
    fn test_add_sub_bounds() {
        assert_eq!(U256::from(100u64).checked_add(&U256::from(200u64)), Some(U256::from(300u64)));
        assert!(U256::MAX.checked_add(&U256::ONE).is_none());
        assert_eq!(U256::from(300u64).checked_sub(&U256::from(200u64)), Some(U256::from(100u64)));
        assert!(U256::from(100u64).checked_sub(&U256::from(200u64)).is_none());
        assert_eq!(U256::ONE.saturating_sub(&U256::from(2u64)), U256::ZERO);
    }

    #[test]
    fn test_mul_detects_high_limb_overflow() {
        let two_pow_128 = U256([0, 0, 1, 0]);
        assert!(two_pow_128.checked_mul(&two_pow_128).is_none());

        let two_pow_127 = U256([0, 1 << 63, 0, 0]);
        assert_eq!(two_pow_127.checked_mul(&U256::from(2u64)), Some(two_pow_128));

        assert!(U256::MAX.checked_mul(&U256::from(2u64)).is_none());
        assert_eq!(U256::MAX.checked_mul(&U256::ONE), Some(U256::MAX));
        assert_eq!(U256::MAX.checked_mul(&U256::ZERO), Some(U256::ZERO));
    }

    #[test]
    fn test_div_wide_operands() {
        let big = U256([0, 0, 0, 1 << 63]);
        let (q, r) = big.div_rem(&U256([0, 0, 1, 0])).unwrap();
        assert_eq!(q, U256([0, 1 << 63, 0, 0]));
        assert_eq!(r, U256::ZERO);

        let (q, r) = U256::MAX.div_rem(&big).unwrap();
        assert_eq!(q, U256::ONE);
        assert_eq!(r, U256([u64::MAX, u64::MAX, u64::MAX, (1 << 63) - 1]));

        assert!(U256::from(100u64).checked_div(&U256::ZERO).is_none());
    }

    #[test]
    fn test_mul_div_floors() {
        let share = U256::units(100)
            .checked_mul_div(&U256::ONE, &U256::from(3u64))
            .unwrap();
        assert_eq!(share, U256::from(33_333_333_333_333_333_333u128));
    }

    #[test]
    fn test_decimal_display() {
        assert_eq!(U256::ZERO.to_string(), "0");
        assert_eq!(U256::from(12345u64).to_string(), "12345");
        assert_eq!(U256::from(10_000_000_000_000_000_000u128).to_string(), "10000000000000000000");
        assert_eq!(
            U256::MAX.to_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!(U256::from_str("0").unwrap(), U256::ZERO);
        assert_eq!(U256::from_str("12345").unwrap(), U256::from(12345u64));
        assert_eq!(U256::from_str("0xFF").unwrap(), U256::from(255u64));
        assert_eq!(U256::from_str("0x1ff").unwrap(), U256::from(511u64));
        assert!(U256::from_str("").is_err());
        assert!(U256::from_str("0x").is_err());
        assert!(U256::from_str("12a").is_err());
        assert!(U256::from_str("-1").is_err());
        assert_eq!(
            U256::from_str(
                "115792089237316195423570985008687907853269984665640564039457584007913129639936"
            ),
            Err(TypesError::U256Overflow)
        );
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(u64::try_from(U256::from(7u64)), Ok(7));
        assert!(u64::try_from(U256::from(u64::MAX as u128 + 1)).is_err());
        assert_eq!(u128::try_from(U256::from(u128::MAX)), Ok(u128::MAX));
        assert!(u128::try_from(U256::MAX).is_err());
    }

    proptest! {
        #[test]
        fn prop_mul_div_matches_u128(a in any::<u64>(), b in any::<u64>(), c in 1u64..) {
            let expected = (a as u128) * (b as u128) / (c as u128);
            let got = U256::from(a).checked_mul_div(&U256::from(b), &U256::from(c)).unwrap();
            prop_assert_eq!(got, U256::from(expected));
        }

        #[test]
        fn prop_wide_div_rem_recombines(hi in any::<u64>(), lo in any::<u64>(), d in 1u64..) {
            let n = U256([lo, 7, 3, hi]);
            let divisor = U256([d, 0, 1, 0]);
            let (q, r) = n.div_rem(&divisor).unwrap();
            prop_assert!(r < divisor);
            let back = q.checked_mul(&divisor).unwrap().checked_add(&r).unwrap();
            prop_assert_eq!(back, n);
        }

        #[test]
        fn prop_display_parse_roundtrip(limbs in any::<[u64; 4]>()) {
            let n = U256(limbs);
            prop_assert_eq!(U256::from_str(&n.to_string()).unwrap(), n);
        }
    }
}
