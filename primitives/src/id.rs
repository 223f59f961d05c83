use {
  crate::{
    codec::{
      varint_len,
      write_bytes,
      write_compact_size,
      write_varint,
      Decode,
      Encode,
      Error,
      Reader,
    },
    Hash256,
  },
  serde::{de, Deserialize, Deserializer, Serialize, Serializer},
  std::{
    fmt::{Debug, Display},
    str::FromStr,
  },
};

pub const NICKID_MAX_LEN: usize = 32;

/// Compact account identifier assigned on first registration.
///
/// It is the (block height, in-block transaction index) pair of the
/// transaction that registered the account. `(0, 0)` is the empty
/// sentinel of an account that was never registered.
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
pub struct RegId {
  height: u32,
  index: u16,
}

impl RegId {
  pub const fn new(height: u32, index: u16) -> Self {
    Self { height, index }
  }

  pub const fn empty() -> Self {
    Self::new(0, 0)
  }

  pub fn is_empty(&self) -> bool {
    self.height == 0 && self.index == 0
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn index(&self) -> u16 {
    self.index
  }

  /// Raw consensus bytes: VARINT(height) followed by VARINT(index).
  pub fn raw(&self) -> Vec<u8> {
    self.to_bytes()
  }

  /// Length of the raw encoding, always within `2..=8`.
  pub fn raw_len(&self) -> usize {
    varint_len(self.height as u64) + varint_len(self.index as u64)
  }

  /// Twelve hex characters: height (4 bytes LE) then index (2 bytes LE).
  pub fn to_compact_hex(&self) -> String {
    let mut bytes = [0u8; 6];
    bytes[..4].copy_from_slice(&self.height.to_le_bytes());
    bytes[4..].copy_from_slice(&self.index.to_le_bytes());
    hex::encode(bytes)
  }

  fn from_compact_hex(s: &str) -> Result<Self, Error> {
    let mut bytes = [0u8; 6];
    hex::decode_to_slice(s, &mut bytes)
      .map_err(|e| Error::Invalid("regid", e.to_string()))?;
    let mut height = [0u8; 4];
    height.copy_from_slice(&bytes[..4]);
    let mut index = [0u8; 2];
    index.copy_from_slice(&bytes[4..]);
    Ok(Self::new(u32::from_le_bytes(height), u16::from_le_bytes(index)))
  }

  fn from_simple_str(s: &str) -> Option<Self> {
    let (height, index) = s.split_once('-')?;
    let well_formed = |part: &str| {
      (1..=10).contains(&part.len())
        && part.bytes().all(|b| b.is_ascii_digit())
    };
    if !well_formed(height) || !well_formed(index) {
      return None;
    }
    Some(Self::new(height.parse().ok()?, index.parse().ok()?))
  }
}

impl Display for RegId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.is_empty() {
      return Ok(());
    }
    write!(f, "{}-{}", self.height, self.index)
  }
}

impl Debug for RegId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "regid({}-{})", self.height, self.index)
  }
}

impl FromStr for RegId {
  type Err = Error;

  /// Accepts both `"{height}-{index}"` and the 12-hex compact form.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Some(regid) = Self::from_simple_str(s) {
      return Ok(regid);
    }
    if s.len() == 12 {
      return Self::from_compact_hex(s);
    }
    Err(Error::Invalid("regid", s.to_owned()))
  }
}

impl Encode for RegId {
  fn encode(&self, out: &mut Vec<u8>) {
    write_varint(out, self.height as u64);
    write_varint(out, self.index as u64);
  }
}

impl Decode for RegId {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
    let height = reader.varint_u32()?;
    let index = u16::try_from(reader.varint()?)
      .map_err(|_| Error::VarIntOverflow)?;
    Ok(Self::new(height, index))
  }
}

/// 20-byte account key identifier derived from a public key.
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
pub struct KeyId([u8; 20]);

impl KeyId {
  pub const fn from_bytes(bytes: [u8; 20]) -> Self {
    Self(bytes)
  }

  /// Leading 20 bytes of the double SHA-256 of `data`.
  pub fn derive(data: &[u8]) -> Self {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&Hash256::digest(data).as_bytes()[..20]);
    Self(bytes)
  }

  /// Key id of a contract account, derived from its raw RegId.
  pub fn for_contract(regid: &RegId) -> Self {
    Self::derive(&regid.raw())
  }

  pub fn is_empty(&self) -> bool {
    self.0 == [0u8; 20]
  }

  pub fn as_bytes(&self) -> &[u8; 20] {
    &self.0
  }
}

impl Display for KeyId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", bs58::encode(self.0).into_string())
  }
}

impl Debug for KeyId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "keyid({})", bs58::encode(self.0).into_string())
  }
}

impl FromStr for KeyId {
  type Err = bs58::decode::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut bytes = [0u8; 20];
    let len = bs58::decode(s).into(&mut bytes)?;
    if len != 20 {
      return Err(bs58::decode::Error::BufferTooSmall);
    }
    Ok(Self(bytes))
  }
}

impl Encode for KeyId {
  fn encode(&self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.0);
  }
}

impl Decode for KeyId {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
    Ok(Self(reader.array()?))
  }
}

/// Compressed secp256k1 public key.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PubKey([u8; 33]);

impl PubKey {
  pub const LEN: usize = 33;

  /// Accepts only points that are valid on the curve.
  pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
    let key = secp256k1::PublicKey::from_slice(bytes)
      .map_err(|e| Error::Invalid("public key", e.to_string()))?;
    Ok(Self(key.serialize()))
  }

  pub fn from_secret(secret: &secp256k1::SecretKey) -> Self {
    let secp = secp256k1::Secp256k1::signing_only();
    Self(secp256k1::PublicKey::from_secret_key(&secp, secret).serialize())
  }

  pub fn key_id(&self) -> KeyId {
    KeyId::derive(&self.0)
  }

  pub fn as_bytes(&self) -> &[u8; 33] {
    &self.0
  }

  /// Verifies a DER encoded ECDSA signature over `hash`.
  pub fn verify(&self, hash: &Hash256, signature: &[u8]) -> bool {
    let secp = secp256k1::Secp256k1::verification_only();
    let Ok(key) = secp256k1::PublicKey::from_slice(&self.0) else {
      return false;
    };
    let Ok(signature) = secp256k1::ecdsa::Signature::from_der(signature)
    else {
      return false;
    };
    let Ok(message) =
      secp256k1::Message::from_digest_slice(hash.as_bytes())
    else {
      return false;
    };
    secp.verify_ecdsa(&message, &signature, &key).is_ok()
  }
}

/// Produces a DER encoded ECDSA signature over `hash`.
pub fn sign(secret: &secp256k1::SecretKey, hash: &Hash256) -> Vec<u8> {
  let secp = secp256k1::Secp256k1::signing_only();
  let message = secp256k1::Message::from_digest(*hash.as_bytes());
  secp
    .sign_ecdsa(&message, secret)
    .serialize_der()
    .to_vec()
}

impl Display for PubKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", hex::encode(self.0))
  }
}

impl Debug for PubKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "pubkey({})", hex::encode(self.0))
  }
}

impl FromStr for PubKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let bytes =
      hex::decode(s).map_err(|e| Error::Invalid("public key", e.to_string()))?;
    Self::from_slice(&bytes)
  }
}

impl Serialize for PubKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for PubKey {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    String::deserialize(deserializer)?
      .parse()
      .map_err(de::Error::custom)
  }
}

/// Encodes an optional key the way accounts store it: a
/// compact-size length of 0 (absent) or 33, then the key bytes.
pub(crate) fn write_optional_pubkey(out: &mut Vec<u8>, key: &Option<PubKey>) {
  match key {
    Some(key) => write_bytes(out, key.as_bytes()),
    None => write_compact_size(out, 0),
  }
}

pub(crate) fn read_optional_pubkey(
  reader: &mut Reader<'_>,
) -> Result<Option<PubKey>, Error> {
  let bytes = reader.bytes(PubKey::LEN)?;
  match bytes.len() {
    0 => Ok(None),
    _ => PubKey::from_slice(&bytes).map(Some),
  }
}

/// Human readable account alias of at most 32 bytes.
#[derive(
  Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NickId(String);

impl NickId {
  pub fn new(nick: impl Into<String>) -> Result<Self, Error> {
    let nick = nick.into();
    if nick.len() > NICKID_MAX_LEN {
      return Err(Error::TooLong(nick.len() as u64, NICKID_MAX_LEN));
    }
    Ok(Self(nick))
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Display for NickId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl Debug for NickId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "nickid({})", self.0)
  }
}

impl Encode for NickId {
  fn encode(&self, out: &mut Vec<u8>) {
    write_bytes(out, self.0.as_bytes());
  }
}

impl Decode for NickId {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
    let bytes = reader.bytes(NICKID_MAX_LEN)?;
    String::from_utf8(bytes)
      .map(Self)
      .map_err(|e| Error::Invalid("nickid", e.to_string()))
  }
}

/// Any of the ways a transaction may refer to an account.
#[derive(
  Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum UserId {
  Null,
  RegId(RegId),
  KeyId(KeyId),
  PubKey(PubKey),
  NickId(NickId),
}

impl UserId {
  pub const TAG_NULL: u64 = 0;
  pub const TAG_REGID_MIN: u64 = 2;
  pub const TAG_REGID_MAX: u64 = 10;
  pub const TAG_KEYID: u64 = 20;
  pub const TAG_PUBKEY: u64 = 33;
  pub const TAG_NICKID: u64 = 100;

  pub fn is_null(&self) -> bool {
    matches!(self, UserId::Null)
  }

  pub fn kind(&self) -> &'static str {
    match self {
      UserId::Null => "null",
      UserId::RegId(_) => "regid",
      UserId::KeyId(_) => "keyid",
      UserId::PubKey(_) => "pubkey",
      UserId::NickId(_) => "nickid",
    }
  }

  pub fn as_regid(&self) -> Option<&RegId> {
    match self {
      UserId::RegId(regid) => Some(regid),
      _ => None,
    }
  }

  pub fn as_pubkey(&self) -> Option<&PubKey> {
    match self {
      UserId::PubKey(key) => Some(key),
      _ => None,
    }
  }
}

impl Default for UserId {
  fn default() -> Self {
    UserId::Null
  }
}

impl From<RegId> for UserId {
  fn from(regid: RegId) -> Self {
    UserId::RegId(regid)
  }
}

impl From<KeyId> for UserId {
  fn from(keyid: KeyId) -> Self {
    UserId::KeyId(keyid)
  }
}

impl From<PubKey> for UserId {
  fn from(key: PubKey) -> Self {
    UserId::PubKey(key)
  }
}

impl From<NickId> for UserId {
  fn from(nick: NickId) -> Self {
    UserId::NickId(nick)
  }
}

impl Display for UserId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      UserId::Null => f.write_str("null"),
      UserId::RegId(regid) => write!(f, "{regid}"),
      UserId::KeyId(keyid) => write!(f, "{keyid}"),
      UserId::PubKey(key) => write!(f, "{key}"),
      UserId::NickId(nick) => write!(f, "{nick}"),
    }
  }
}

impl Debug for UserId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      UserId::Null => f.write_str("userid(null)"),
      UserId::RegId(regid) => write!(f, "{regid:?}"),
      UserId::KeyId(keyid) => write!(f, "{keyid:?}"),
      UserId::PubKey(key) => write!(f, "{key:?}"),
      UserId::NickId(nick) => write!(f, "{nick:?}"),
    }
  }
}

impl Encode for UserId {
  fn encode(&self, out: &mut Vec<u8>) {
    match self {
      UserId::Null => write_compact_size(out, Self::TAG_NULL),
      UserId::RegId(regid) => {
        write_compact_size(out, regid.raw_len() as u64);
        regid.encode(out);
      }
      UserId::KeyId(keyid) => {
        write_compact_size(out, Self::TAG_KEYID);
        keyid.encode(out);
      }
      UserId::PubKey(key) => {
        write_compact_size(out, Self::TAG_PUBKEY);
        out.extend_from_slice(key.as_bytes());
      }
      UserId::NickId(nick) => {
        write_compact_size(out, Self::TAG_NICKID);
        nick.encode(out);
      }
    }
  }
}

impl Decode for UserId {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
    match reader.compact_size()? {
      Self::TAG_NULL => Ok(UserId::Null),
      tag @ Self::TAG_REGID_MIN..=Self::TAG_REGID_MAX => {
        let regid = RegId::from_bytes(reader.take(tag as usize)?)?;
        Ok(UserId::RegId(regid))
      }
      Self::TAG_KEYID => Ok(UserId::KeyId(KeyId::decode(reader)?)),
      Self::TAG_PUBKEY => {
        Ok(UserId::PubKey(PubKey::from_slice(reader.take(PubKey::LEN)?)?))
      }
      Self::TAG_NICKID => Ok(UserId::NickId(NickId::decode(reader)?)),
      tag => Err(Error::UnknownUserIdTag(tag)),
    }
  }
}
