use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 20-byte account identity, shown as Bech32m with the `ve` prefix.
///
/// Holders, posters and stakers are addresses; so are the ledger accounts of
/// the escrow, the bribe market and each liquidity gauge, which are derived
/// from a label with [`Address::from_label`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    /// Bech32m human-readable prefix
    pub const HRP: &'static str = "ve";

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        <[u8; 20]>::try_from(slice)
            .map(Self)
            .map_err(|_| TypesError::InvalidAddressLength(slice.len()))
    }

    /// Deterministic address for a named account: `blake3(label)[..20]`.
    pub fn from_label(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn to_bech32(&self) -> Result<String, TypesError> {
        bech32::encode::<bech32::Bech32m>(Self::hrp(), &self.0)
            .map_err(|e| TypesError::Bech32Error(e.to_string()))
    }

    fn hrp() -> bech32::Hrp {
        bech32::Hrp::parse_unchecked(Self::HRP)
    }

    fn from_bech32(s: &str) -> Result<Self, TypesError> {
        let (hrp, data) = bech32::decode(s).map_err(|e| TypesError::Bech32Error(e.to_string()))?;
        if hrp != Self::hrp() {
            return Err(TypesError::InvalidAddressFormat(format!(
                "expected prefix '{}', got '{}'",
                Self::HRP,
                hrp
            )));
        }
        Self::from_slice(&data)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_bech32().map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TypesError;

    /// Accepts Bech32m (`ve1...`) or hex (`0x...`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(digits) => Self::from_slice(&hex::decode(digits)?),
            None if s.starts_with("ve1") => Self::from_bech32(s),
            None => Err(TypesError::InvalidAddressFormat(s.to_string())),
        }
    }
}
