use ethereum_types::U256;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An element of a prime scalar field, represented by its 256-bit
/// unsigned-integer image.
///
/// This store never performs field arithmetic on `Fr` values; it only
/// needs to compare them (as the underlying `uint256`) and to encode
/// them as stable bytes, so no modular reduction is implemented here.
/// The proving system that owns the actual field is responsible for
/// handing the store values that are already field elements.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fr(U256);

impl Fr {
    /// The additive identity, used as the default root before a tree
    /// has ever been committed.
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    /// The 32-byte big-endian encoding of the field element.
    pub fn to_be_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }

    /// Reconstruct an `Fr` from its 32-byte big-endian encoding.
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Self {
        Self(U256::from_big_endian(bytes))
    }
}

impl fmt::Debug for Fr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fr(0x{:x})", self.0)
    }
}

impl From<U256> for Fr {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<Fr> for U256 {
    fn from(value: Fr) -> Self {
        value.0
    }
}

impl From<u64> for Fr {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

// Serialized as raw bytes so the msgpack encoding is compact and
// doesn't depend on `ethereum-types`' own (hex-string) serde support.
impl Serialize for Fr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_be_bytes())
    }
}

impl<'de> Deserialize<'de> for Fr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = serde_bytes_vec(deserializer)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("Fr must encode as exactly 32 bytes"))?;
        Ok(Self::from_be_bytes(&array))
    }
}

fn serde_bytes_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    struct BytesVisitor;

    impl<'de> serde::de::Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("32 bytes")
        }

        fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }
    }

    deserializer.deserialize_bytes(BytesVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_uint256() {
        assert!(Fr::from(1u64) < Fr::from(2u64));
        assert!(Fr::zero() < Fr::from(1u64));
    }

    #[test]
    fn roundtrips_through_bytes() {
        let fr = Fr::from(U256::from(0xdead_beef_u64));
        assert_eq!(Fr::from_be_bytes(&fr.to_be_bytes()), fr);
    }

    #[test]
    fn roundtrips_through_codec() {
        let fr = Fr::from(U256::from(12345u64));
        let encoded = crate::codec::encode(&fr).unwrap();
        let decoded: Fr = crate::codec::decode(&encoded).unwrap();
        assert_eq!(decoded, fr);
    }
}
