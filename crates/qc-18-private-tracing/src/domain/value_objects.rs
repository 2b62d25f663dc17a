//! # Value Objects
//!
//! Immutable domain primitives for private transaction tracing.
//! Fixed-size byte types serialize as `0x`-prefixed lowercase hex, matching the
//! block-explorer trace format.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use primitive_types::U256;

// =============================================================================
// HEX HELPERS
// =============================================================================

/// Errors from parsing hex-encoded primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HexError {
    /// Input did not start with `0x`.
    #[error("missing 0x prefix")]
    MissingPrefix,

    /// Input contained a non-hex character or odd length.
    #[error("invalid hex: {0}")]
    Invalid(String),

    /// Decoded length does not match the expected width.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Decodes a `0x`-prefixed hex string.
pub fn decode_prefixed_hex(input: &str) -> Result<Vec<u8>, HexError> {
    let stripped = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or(HexError::MissingPrefix)?;
    hex::decode(stripped).map_err(|e| HexError::Invalid(e.to_string()))
}

/// Formats a U256 as a minimal hex quantity (`0x0`, `0x1f`, ...).
#[must_use]
pub fn to_hex_quantity(value: U256) -> String {
    if value.is_zero() {
        "0x0".to_string()
    } else {
        format!("0x{value:x}")
    }
}

/// Formats a u64 as a minimal hex quantity.
#[must_use]
pub fn u64_to_hex_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

fn fixed_from_str<const N: usize>(input: &str) -> Result<[u8; N], HexError> {
    let bytes = decode_prefixed_hex(input)?;
    if bytes.len() != N {
        return Err(HexError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Serializes through `Display`, deserializes through `FromStr`.
macro_rules! hex_serde {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer)?
                    .parse()
                    .map_err(de::Error::custom)
            }
        }
    };
}

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// All-zero value.
            pub const ZERO: Self = Self([0u8; $len]);

            /// Wraps raw bytes.
            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }

        impl FromStr for $name {
            type Err = HexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                fixed_from_str::<$len>(s).map(Self)
            }
        }

        hex_serde!($name);
    };
}

// =============================================================================
// FIXED-WIDTH VALUES
// =============================================================================

fixed_bytes!(
    /// A 20-byte account address.
    Address,
    20
);

fixed_bytes!(
    /// A 32-byte Keccak-256 digest: block hashes, proxy transaction hashes
    /// and private state roots.
    Hash,
    32
);

// =============================================================================
// BYTES (variable length)
// =============================================================================

/// Payloads, calldata, return data and code.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    /// Empty byte string.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Copies `slice`.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }

    /// Underlying slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Leading 4-byte function selector, if present.
    #[must_use]
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.0.get(..4).and_then(|s| <[u8; 4]>::try_from(s).ok())
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get(..4) {
            Some(head) if self.0.len() > 8 => {
                write!(f, "0x{}..({} bytes)", hex::encode(head), self.0.len())
            }
            _ => fmt::Display::fmt(self, f),
        }
    }
}

impl FromStr for Bytes {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_prefixed_hex(s).map(Self)
    }
}

hex_serde!(Bytes);

// =============================================================================
// PRIVACY IDENTIFIERS
// =============================================================================

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// Opaque privacy group identifier, base64 in most deployments. Scopes
    /// every confidential state and metadata lookup.
    PrivacyGroupId
);

opaque_id!(
    /// Enclave public key of a privacy participant.
    PrivacyUserId
);

// =============================================================================
// TESTS
// =============================================================================
