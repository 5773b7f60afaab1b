//! Binary codec for the store's two record shapes (`IndexList`,
//! `TreeMeta`) and for `IndexedLeaf<L>`.
//!
//! Records are encoded as MessagePack maps (field-name tagged, not
//! positional) via `rmp-serde`'s struct-map mode, so a field appended
//! to a struct later remains backward-readable by an older decoder.

use rmp_serde::{encode::Error as EncodeError, Serializer};
use serde::{de::DeserializeOwned, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("failed to encode record: {0}")]
    Encode(#[from] EncodeError),

    #[error("failed to decode record: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    value.serialize(&mut Serializer::new(&mut buf).with_struct_map())?;
    Ok(buf)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fr, IndexList, TreeMeta};

    #[test]
    fn decoding_garbage_is_a_codec_error() {
        let garbage = [0xffu8; 4];
        let result: Result<TreeMeta, _> = decode(&garbage);
        assert!(result.is_err());
    }

    #[test]
    fn index_list_roundtrips() {
        let list = IndexList::new(vec![1, 2, 3]).unwrap();
        let bytes = encode(&list).unwrap();
        let decoded: IndexList = decode(&bytes).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn tree_meta_roundtrips() {
        let meta = TreeMeta {
            name: "accts".to_string(),
            depth: 20,
            size: 7,
            root: Fr::from(0xdeadu64),
        };
        let bytes = encode(&meta).unwrap();
        let decoded: TreeMeta = decode(&bytes).unwrap();
        assert_eq!(decoded.name, meta.name);
        assert_eq!(decoded.depth, meta.depth);
        assert_eq!(decoded.size, meta.size);
        assert_eq!(decoded.root, meta.root);
    }
}
