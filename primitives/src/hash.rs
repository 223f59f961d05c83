use {
  crate::codec::{Decode, Encode, Error, Reader},
  multihash::{Hasher, Sha2_256},
  serde::{Deserialize, Serialize},
  std::{
    fmt::{Debug, Display},
    str::FromStr,
  },
};

/// 32-byte double SHA-256 digest.
///
/// Used for transaction and block identities, signature hashes,
/// merkle trees and the delegate shuffle seed chain.
#[derive(
  Copy,
  Clone,
  Default,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
pub struct Hash256([u8; 32]);

impl Hash256 {
  pub const fn zero() -> Self {
    Self([0u8; 32])
  }

  pub const fn from_bytes(bytes: [u8; 32]) -> Self {
    Self(bytes)
  }

  /// Double SHA-256 of arbitrary bytes.
  pub fn digest(data: &[u8]) -> Self {
    let mut first = Sha2_256::default();
    first.update(data);
    let mut second = Sha2_256::default();
    second.update(first.finalize());
    let mut out = [0u8; 32];
    out.copy_from_slice(second.finalize());
    Self(out)
  }

  /// Hash of the canonical consensus encoding of a value.
  pub fn of(value: &impl Encode) -> Self {
    Self::digest(&value.to_bytes())
  }

  pub fn is_zero(&self) -> bool {
    self.0 == [0u8; 32]
  }

  pub fn as_bytes(&self) -> &[u8; 32] {
    &self.0
  }

  /// Reads the `index`-th little endian 64-bit word of the digest.
  pub fn word(&self, index: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&self.0[index * 8..index * 8 + 8]);
    u64::from_le_bytes(word)
  }
}

impl AsRef<[u8]> for Hash256 {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}

impl Display for Hash256 {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", hex::encode(self.0))
  }
}

impl Debug for Hash256 {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "hash({})", hex::encode(self.0))
  }
}

impl FromStr for Hash256 {
  type Err = hex::FromHexError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(s, &mut bytes)?;
    Ok(Self(bytes))
  }
}

impl Encode for Hash256 {
  fn encode(&self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.0);
  }
}

impl Decode for Hash256 {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
    Ok(Self(reader.array()?))
  }
}

/// Computes the merkle root over a list of leaf hashes.
///
/// Odd levels duplicate their last element. An empty list has
/// the zero hash as its root.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
  if leaves.is_empty() {
    return Hash256::zero();
  }

  let mut level = leaves.to_vec();
  while level.len() > 1 {
    level = level
      .chunks(2)
      .map(|pair| {
        let left = pair[0];
        let right = pair.get(1).copied().unwrap_or(left);
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(left.as_bytes());
        buf.extend_from_slice(right.as_bytes());
        Hash256::digest(&buf)
      })
      .collect();
  }
  level[0]
}
