use {
  crate::runtime,
  dpos_primitives::{AccountError, Hash256, KeyId, RegId, UserId},
  thiserror::Error,
};

/// Severity class of a rejected transaction.
///
/// Validation failures are malformed or unauthorized transactions that
/// no future state can make valid. Execution failures depend on the
/// current state, such as insufficient funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  Execution,
}

/// Reasons a transaction is rejected by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("Transaction {0} was already executed")]
  DuplicateTx(Hash256),

  #[error("Unsupported transaction version {0}")]
  Version(u32),

  #[error("Valid height {valid} is outside the window around {current}")]
  InvalidHeight { valid: u32, current: u32 },

  #[error("Fee {fee} is below the minimum of {min}")]
  FeeTooLow { fee: u64, min: u64 },

  #[error("Value {0} is outside of the valid money range")]
  MoneyRange(u64),

  #[error("Signature size {0} is out of range")]
  SignatureSize(usize),

  #[error("Signature verification failed")]
  BadSignature,

  #[error("{field} must be a {expected}, found {found}")]
  UnexpectedUserId {
    field: &'static str,
    expected: &'static str,
    found: &'static str,
  },

  #[error("Account {0} does not exist")]
  AccountNotFound(UserId),

  #[error("Account {0} is not registered")]
  NotRegistered(UserId),

  #[error("RegId {0} is not mature yet")]
  ImmatureRegId(RegId),

  #[error("Account {0} is already registered")]
  AlreadyRegistered(KeyId),

  #[error("{field} of {len} bytes exceeds the limit of {max}")]
  TooLarge {
    field: &'static str,
    len: usize,
    max: usize,
  },

  #[error("Contract script is empty")]
  EmptyScript,

  #[error("Fee {fee} cannot cover the fuel of {fuel}")]
  FeeBelowFuel { fee: u64, fuel: u64 },

  #[error("Fee leaves no run step budget at fuel rate {0}")]
  NoFuelBudget(u64),

  #[error("Account {0} has no deployed contract")]
  NotAContract(RegId),

  #[error("Vote list must hold between 1 and {max} entries, found {found}")]
  VoteCount { found: usize, max: u32 },

  #[error("Candidate {0} appears more than once in the vote list")]
  DuplicateCandidate(UserId),

  #[error("Vote amount must be positive")]
  ZeroVote,

  #[error("Transaction position {0} is past the last assignable regid")]
  TxIndexOutOfRange(u32),

  #[error("Block reward transaction may only appear first in a block")]
  MisplacedReward,

  #[error("Block reward {reward} does not match the expected {expected}")]
  RewardMismatch { reward: u64, expected: u64 },

  #[error(transparent)]
  Account(#[from] AccountError),

  #[error("Contract execution failed: {0}")]
  Runtime(#[from] runtime::Error),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Account(_) | Error::Runtime(_) => ErrorKind::Execution,
      Error::AccountNotFound(_) | Error::NotAContract(_) => {
        ErrorKind::Execution
      }
      Error::RewardMismatch { .. } => ErrorKind::Execution,
      _ => ErrorKind::Validation,
    }
  }
}

/// Ledger inconsistencies that no transaction can cause.
///
/// Seeing one of those means the persisted state is damaged and the
/// node must stop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Corruption {
  #[error("Undo log references missing account {0}")]
  MissingAccount(KeyId),

  #[error("Undo log rejected: {0}")]
  Log(#[from] AccountError),

  #[error("Transaction {0} is missing from the transaction index")]
  MissingTx(Hash256),

  #[error("Undo record of {found} applied to transaction {expected}")]
  TxMismatch { expected: Hash256, found: Hash256 },

  #[error("Undo record of block {found} applied to block {expected}")]
  BlockMismatch { expected: Hash256, found: Hash256 },

  #[error("Undo record holds {found} transactions, the block has {expected}")]
  BlockUndoMismatch { expected: usize, found: usize },

  #[error(
    "Vote index stores {indexed} votes for {regid} but the account has {live}"
  )]
  VoteIndexMismatch { regid: RegId, indexed: u64, live: u64 },

  #[error("Vote index references unknown regid {0}")]
  DanglingVoteIndex(RegId),
}
