use {
  dpos_ledger::Corruption,
  dpos_primitives::{Hash256, RegId, UserId},
  thiserror::Error,
};

/// Reasons a candidate block is rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("Block builds on {found}, the tip is {expected}")]
  PrevMismatch { expected: Hash256, found: Hash256 },

  #[error("Block height {found} does not follow the tip height {tip}")]
  Height { tip: u32, found: u32 },

  #[error("Block time {time} is not after the previous block time {prev}")]
  TimeTooEarly { time: u32, prev: u32 },

  #[error("Unsupported block version {0}")]
  Version(u32),

  #[error("Block of {0} bytes exceeds the size limit")]
  TooLarge(usize),

  #[error("Nonce {nonce} exceeds the maximum of {max}")]
  Nonce { nonce: u32, max: u32 },

  #[error("Merkle root {found} differs from the computed {expected}")]
  MerkleRoot { expected: Hash256, found: Hash256 },

  #[error("Fuel rate {found} differs from the expected {expected}")]
  FuelRate { expected: u64, found: u64 },

  #[error("The delegate vote index is empty")]
  NoDelegates,

  #[error("Delegate {0} already produced a block in this slot")]
  DuplicateSlotProducer(RegId),

  #[error("The slot belongs to {expected}, the block is produced by {found}")]
  WrongDelegate { expected: RegId, found: UserId },

  #[error("First transaction of the block is not a block reward")]
  MissingReward,

  #[error("Reward valid height {found} differs from the block height {height}")]
  RewardHeight { height: u32, found: u32 },

  #[error("Block signature size {0} is out of range")]
  SignatureSize(usize),

  #[error("Block signature verification failed")]
  BadSignature,

  #[error("Transaction {index} rejected: {source}")]
  Transaction {
    index: usize,
    #[source]
    source: dpos_ledger::Error,
  },

  #[error("Block run steps {0} exceed the per block limit")]
  RunStepExceeded(u64),

  #[error("Header fuel {found} differs from the replayed fuel {expected}")]
  FuelMismatch { expected: u64, found: u64 },

  #[error("Fees of {fees} cannot cover the burned fuel of {fuel}")]
  FeesBelowFuel { fees: u64, fuel: u64 },

  #[error("Reward {found} differs from fees minus fuel {expected}")]
  RewardMismatch { expected: u64, found: u64 },

  #[error("The genesis block cannot be disconnected")]
  DisconnectGenesis,

  #[error(transparent)]
  Corruption(#[from] Corruption),
}
