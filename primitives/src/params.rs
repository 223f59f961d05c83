use {
  crate::TxType,
  serde::{Deserialize, Serialize},
  std::time::Duration,
};

/// Smallest unit count of one whole coin.
pub const COIN: u64 = 100_000_000;

/// Upper bound of any base or stable coin balance or amount.
pub const MAX_MONEY: u64 = 210_000_000 * COIN;

/// Upper bound of any fund coin balance or amount.
pub const FUND_MAX_MONEY: u64 = MAX_MONEY / 10;

pub const MAX_BLOCK_RUN_STEP: u64 = 12_000_000;
pub const INIT_FUEL_RATE: u64 = 100;
pub const MIN_FUEL_RATE: u64 = 1;

pub const MAX_BLOCK_SIGNATURE_SIZE: usize = 100;
pub const MAX_BLOCK_SIZE: usize = 4_000_000;
pub const MAX_TX_SIZE: usize = 100_000;

pub const MAX_CONTRACT_SCRIPT_SIZE: usize = 65_536;
pub const MAX_CONTRACT_ARGUMENT_SIZE: usize = 4_096;
pub const MAX_MEMO_SIZE: usize = 100;

/// Minimum number of blocks on top of a registration before the
/// registered RegId counts as mature.
pub const REGID_MATURE_PERIOD: u32 = 100;

pub const MIN_TX_FEE: u64 = 10_000;

pub const INIT_TX_VERSION: u32 = 1;
pub const INIT_BLOCK_VERSION: u32 = 1;

/// Consensus parameters that differ between networks.
///
/// The defaults match the main network. Test networks shrink the
/// delegate set and the block spacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
  /// Number of top voted accounts eligible to produce blocks.
  pub delegates: u32,

  /// Maximum number of distinct candidates a single account may vote for.
  pub max_vote_candidates: u32,

  /// Duration of one producer slot.
  pub block_spacing: Duration,

  /// Transactions are only valid within half of this many blocks
  /// around their declared valid height.
  pub tx_cache_height: u32,

  /// Trailing window of blocks used to adapt the fuel rate.
  pub burn_window: u32,

  /// Largest nonce a block header may carry.
  pub max_nonce: u32,
}

impl Default for Params {
  fn default() -> Self {
    Self {
      delegates: 11,
      max_vote_candidates: 22,
      block_spacing: Duration::from_secs(10),
      tx_cache_height: 500,
      burn_window: 50,
      max_nonce: 1000,
    }
  }
}

impl Params {
  pub fn block_spacing_secs(&self) -> u64 {
    self.block_spacing.as_secs().max(1)
  }

  /// Protocol minimum fee of a transaction type.
  pub fn min_fee(&self, tx_type: TxType) -> u64 {
    match tx_type {
      TxType::BlockReward => 0,
      TxType::AccountRegister => MIN_TX_FEE,
      TxType::BcoinTransfer => MIN_TX_FEE,
      TxType::ContractInvoke => 10 * MIN_TX_FEE,
      TxType::ContractDeploy => COIN,
      TxType::DelegateVote => MIN_TX_FEE,
    }
  }
}
