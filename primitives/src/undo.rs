use {
  crate::{AccountLog, Hash256, RegId},
  serde::{Deserialize, Serialize},
};

/// Address of an entry in the auxiliary contract store.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
pub enum DbKey {
  Script(RegId),
  ContractData(RegId, Vec<u8>),
}

/// Value an auxiliary store entry held before a transaction wrote it.
/// `None` means the entry did not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbOpLog {
  pub key: DbKey,
  pub previous: Option<Vec<u8>>,
}

/// Everything needed to reverse one executed transaction.
///
/// Both logs are in mutation order and are replayed back to front.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxUndo {
  pub tx_hash: Hash256,
  pub account_logs: Vec<AccountLog>,
  pub db_logs: Vec<DbOpLog>,
}

impl TxUndo {
  pub fn new(tx_hash: Hash256) -> Self {
    Self {
      tx_hash,
      ..Default::default()
    }
  }
}

/// Undo records of all transactions of a block, in block order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUndo {
  pub block_hash: Hash256,
  pub txs: Vec<TxUndo>,
}
