use {
  crate::{
    codec::{self, write_bytes, write_seq, write_varint, Decode, Encode, Reader},
    hash::merkle_root,
    id::sign,
    params::{MAX_BLOCK_SIGNATURE_SIZE, MAX_BLOCK_SIZE},
    BlockRewardTx,
    Hash256,
    Transaction,
  },
  once_cell::sync::OnceCell,
  secp256k1::SecretKey,
  serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
  pub version: u32,
  pub prev_hash: Hash256,
  pub merkle_root: Hash256,
  /// Seconds since the unix epoch.
  pub time: u32,
  pub nonce: u32,
  pub height: u32,
  /// Total fuel burned by all transactions in the block.
  pub fuel: u64,
  pub fuel_rate: u64,
  pub signature: Vec<u8>,
}

impl BlockHeader {
  /// Digest signed by the producer. It is also the block identity.
  pub fn signature_hash(&self) -> Hash256 {
    let mut out = Vec::new();
    self.encode_unsigned(&mut out);
    Hash256::digest(&out)
  }

  fn encode_unsigned(&self, out: &mut Vec<u8>) {
    write_varint(out, self.version as u64);
    self.prev_hash.encode(out);
    self.merkle_root.encode(out);
    out.extend_from_slice(&self.time.to_le_bytes());
    out.extend_from_slice(&self.nonce.to_le_bytes());
    write_varint(out, self.height as u64);
    write_varint(out, self.fuel);
    write_varint(out, self.fuel_rate);
  }
}

impl Encode for BlockHeader {
  fn encode(&self, out: &mut Vec<u8>) {
    self.encode_unsigned(out);
    write_bytes(out, &self.signature);
  }
}

impl Decode for BlockHeader {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, codec::Error> {
    Ok(Self {
      version: reader.varint_u32()?,
      prev_hash: Hash256::decode(reader)?,
      merkle_root: Hash256::decode(reader)?,
      time: reader.u32_le()?,
      nonce: reader.u32_le()?,
      height: reader.varint_u32()?,
      fuel: reader.varint()?,
      fuel_rate: reader.varint()?,
      signature: reader.bytes(MAX_BLOCK_SIGNATURE_SIZE)?,
    })
  }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Block {
  header: BlockHeader,
  transactions: Vec<Transaction>,

  #[serde(skip)]
  hash_cache: OnceCell<Hash256>,
}

impl Block {
  pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
    Self {
      header,
      transactions,
      hash_cache: OnceCell::new(),
    }
  }

  pub fn header(&self) -> &BlockHeader {
    &self.header
  }

  /// Mutable access to the header. Drops the cached block hash.
  pub fn header_mut(&mut self) -> &mut BlockHeader {
    self.hash_cache = OnceCell::new();
    &mut self.header
  }

  pub fn transactions(&self) -> &[Transaction] {
    &self.transactions
  }

  /// Mutable access to the transaction list. The merkle root in the
  /// header is not updated.
  pub fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
    &mut self.transactions
  }

  pub fn height(&self) -> u32 {
    self.header.height
  }

  pub fn time(&self) -> u32 {
    self.header.time
  }

  pub fn hash(&self) -> &Hash256 {
    self
      .hash_cache
      .get_or_init(|| self.header.signature_hash())
  }

  /// Merkle root recomputed from the transaction list.
  pub fn compute_merkle_root(&self) -> Hash256 {
    let leaves: Vec<_> = self.transactions.iter().map(|tx| tx.hash()).collect();
    merkle_root(&leaves)
  }

  /// The leading reward transaction, if the block has one.
  pub fn reward_tx(&self) -> Option<&BlockRewardTx> {
    match self.transactions.first() {
      Some(Transaction::BlockReward(tx)) => Some(tx),
      _ => None,
    }
  }

  pub fn sign(&mut self, secret: &SecretKey) {
    let signature = sign(secret, &self.header.signature_hash());
    self.header.signature = signature;
  }
}

impl PartialEq for Block {
  fn eq(&self, other: &Self) -> bool {
    self.header == other.header && self.transactions == other.transactions
  }
}

impl Eq for Block {}

impl std::fmt::Debug for Block {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Block")
      .field("height", &self.header.height)
      .field("hash", &self.hash().to_string())
      .field("prev", &self.header.prev_hash.to_string())
      .field("time", &self.header.time)
      .field("fuel", &self.header.fuel)
      .field("fuel_rate", &self.header.fuel_rate)
      .field("transactions", &self.transactions.len())
      .finish()
  }
}

impl Encode for Block {
  fn encode(&self, out: &mut Vec<u8>) {
    self.header.encode(out);
    write_seq(out, &self.transactions);
  }
}

impl Decode for Block {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, codec::Error> {
    let header = BlockHeader::decode(reader)?;
    let transactions = reader.seq(MAX_BLOCK_SIZE / 16)?;
    Ok(Self::new(header, transactions))
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    crate::{PubKey, RegId},
  };

  fn sample() -> Block {
    let reward = Transaction::BlockReward(BlockRewardTx {
      version: 1,
      valid_height: 5,
      uid: RegId::new(0, 1).into(),
      reward: 0,
    });
    let mut block = Block::new(
      BlockHeader {
        version: 1,
        prev_hash: Hash256::digest(b"parent"),
        height: 5,
        time: 1_700_000_000,
        fuel_rate: 100,
        ..Default::default()
      },
      vec![reward],
    );
    let root = block.compute_merkle_root();
    block.header_mut().merkle_root = root;
    block
  }

  #[test]
  fn hash_ignores_signature() {
    let secret = SecretKey::new(&mut rand::thread_rng());
    let mut block = sample();
    let unsigned = *block.hash();
    block.sign(&secret);

    assert_eq!(*block.hash(), unsigned);
    assert!(PubKey::from_secret(&secret)
      .verify(&block.header().signature_hash(), &block.header().signature));
  }

  #[test]
  fn header_mut_invalidates_hash() {
    let mut block = sample();
    let before = *block.hash();
    block.header_mut().nonce = 7;
    assert_ne!(*block.hash(), before);
  }

  #[test]
  fn block_encoding_roundtrip() -> anyhow::Result<()> {
    let secret = SecretKey::new(&mut rand::thread_rng());
    let mut block = sample();
    block.sign(&secret);
    let decoded = Block::from_bytes(&block.to_bytes())?;
    assert_eq!(decoded, block);
    assert_eq!(decoded.hash(), block.hash());
    assert!(decoded.reward_tx().is_some());
    Ok(())
  }

  #[test]
  fn local_storage_roundtrip() -> anyhow::Result<()> {
    let block = sample();
    let bytes = rmp_serde::to_vec(&block)?;
    let decoded: Block = rmp_serde::from_slice(&bytes)?;
    assert_eq!(decoded, block);
    Ok(())
  }
}
