use thiserror::Error;

/// Consensus serialization errors.
///
/// Every node must produce and accept byte-identical encodings of
/// accounts, transactions and blocks, so decoding is strict: unknown
/// tags, non-canonical lengths and trailing bytes are all rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("Unexpected end of input while reading {0}")]
  UnexpectedEof(&'static str),

  #[error("VARINT value does not fit in 64 bits")]
  VarIntOverflow,

  #[error("Non-canonical compact size encoding")]
  NonCanonicalSize,

  #[error("Length {0} exceeds the limit of {1} bytes")]
  TooLong(u64, usize),

  #[error("Unknown user id tag {0}")]
  UnknownUserIdTag(u64),

  #[error("Unknown transaction type {0}")]
  UnknownTxType(u8),

  #[error("Invalid {0}: {1}")]
  Invalid(&'static str, String),

  #[error("{0} trailing bytes after decoding")]
  TrailingBytes(usize),
}

/// Types that have a canonical consensus byte encoding.
pub trait Encode {
  fn encode(&self, out: &mut Vec<u8>);

  fn to_bytes(&self) -> Vec<u8> {
    let mut out = Vec::new();
    self.encode(&mut out);
    out
  }

  fn encoded_len(&self) -> usize {
    self.to_bytes().len()
  }
}

/// Types that can be read back from their canonical consensus encoding.
pub trait Decode: Sized {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, Error>;

  /// Decodes a value that must span the entire input.
  fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
    let mut reader = Reader::new(bytes);
    let value = Self::decode(&mut reader)?;
    reader.finish()?;
    Ok(value)
  }
}

/// Writes a Bitcoin-style base-128 VARINT.
///
/// Each continuation group carries an implicit +1 bias so that every
/// value has exactly one encoding.
pub fn write_varint(out: &mut Vec<u8>, mut n: u64) {
  let mut tmp = [0u8; 10];
  let mut len = 0;
  loop {
    tmp[len] = (n & 0x7f) as u8 | if len > 0 { 0x80 } else { 0x00 };
    if n <= 0x7f {
      break;
    }
    n = (n >> 7) - 1;
    len += 1;
  }
  out.extend(tmp[..=len].iter().rev());
}

/// Number of bytes `write_varint` emits for `n`.
pub fn varint_len(mut n: u64) -> usize {
  let mut len = 1;
  while n > 0x7f {
    n = (n >> 7) - 1;
    len += 1;
  }
  len
}

pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
  if n < 253 {
    out.push(n as u8);
  } else if n <= u16::MAX as u64 {
    out.push(253);
    out.extend_from_slice(&(n as u16).to_le_bytes());
  } else if n <= u32::MAX as u64 {
    out.push(254);
    out.extend_from_slice(&(n as u32).to_le_bytes());
  } else {
    out.push(255);
    out.extend_from_slice(&n.to_le_bytes());
  }
}

/// Writes a compact-size length prefix followed by the raw bytes.
pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
  write_compact_size(out, bytes.len() as u64);
  out.extend_from_slice(bytes);
}

/// Writes a compact-size element count followed by each element.
pub fn write_seq<T: Encode>(out: &mut Vec<u8>, items: &[T]) {
  write_compact_size(out, items.len() as u64);
  for item in items {
    item.encode(out);
  }
}

/// Cursor over an input buffer used by [`Decode`] implementations.
pub struct Reader<'a> {
  bytes: &'a [u8],
}

impl<'a> Reader<'a> {
  pub fn new(bytes: &'a [u8]) -> Self {
    Self { bytes }
  }

  pub fn remaining(&self) -> usize {
    self.bytes.len()
  }

  pub fn byte(&mut self) -> Result<u8, Error> {
    let (first, rest) = self
      .bytes
      .split_first()
      .ok_or(Error::UnexpectedEof("byte"))?;
    self.bytes = rest;
    Ok(*first)
  }

  pub fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
    if self.bytes.len() < len {
      return Err(Error::UnexpectedEof("byte slice"));
    }
    let (head, rest) = self.bytes.split_at(len);
    self.bytes = rest;
    Ok(head)
  }

  pub fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
    let mut out = [0u8; N];
    out.copy_from_slice(self.take(N)?);
    Ok(out)
  }

  pub fn u32_le(&mut self) -> Result<u32, Error> {
    Ok(u32::from_le_bytes(self.array()?))
  }

  pub fn varint(&mut self) -> Result<u64, Error> {
    let mut n: u64 = 0;
    loop {
      let byte = self.byte()?;
      if n > (u64::MAX >> 7) {
        return Err(Error::VarIntOverflow);
      }
      n = (n << 7) | (byte & 0x7f) as u64;
      if byte & 0x80 != 0 {
        n = n.checked_add(1).ok_or(Error::VarIntOverflow)?;
      } else {
        return Ok(n);
      }
    }
  }

  /// Reads a VARINT that must fit in 32 bits.
  pub fn varint_u32(&mut self) -> Result<u32, Error> {
    u32::try_from(self.varint()?).map_err(|_| Error::VarIntOverflow)
  }

  pub fn compact_size(&mut self) -> Result<u64, Error> {
    let value = match self.byte()? {
      n @ 0..=252 => return Ok(n as u64),
      253 => {
        let v = u16::from_le_bytes(self.array()?) as u64;
        (v >= 253, v)
      }
      254 => {
        let v = u32::from_le_bytes(self.array()?) as u64;
        (v > u16::MAX as u64, v)
      }
      255 => {
        let v = u64::from_le_bytes(self.array()?);
        (v > u32::MAX as u64, v)
      }
    };
    match value {
      (true, v) => Ok(v),
      (false, _) => Err(Error::NonCanonicalSize),
    }
  }

  /// Reads a compact-size prefixed byte vector of at most `limit` bytes.
  pub fn bytes(&mut self, limit: usize) -> Result<Vec<u8>, Error> {
    let len = self.compact_size()?;
    if len > limit as u64 {
      return Err(Error::TooLong(len, limit));
    }
    Ok(self.take(len as usize)?.to_vec())
  }

  /// Reads a compact-size prefixed sequence of at most `limit` elements.
  pub fn seq<T: Decode>(&mut self, limit: usize) -> Result<Vec<T>, Error> {
    let len = self.compact_size()?;
    if len > limit as u64 {
      return Err(Error::TooLong(len, limit));
    }
    (0..len).map(|_| T::decode(self)).collect()
  }

  pub fn finish(self) -> Result<(), Error> {
    match self.bytes.len() {
      0 => Ok(()),
      n => Err(Error::TrailingBytes(n)),
    }
  }
}
