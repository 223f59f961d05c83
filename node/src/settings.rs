use {
  clap::Parser,
  dpos_primitives::{params::COIN, Params, PubKey, SecretKey},
  humantime::Duration,
  std::path::PathBuf,
};

/// DPoS Ledger Node
///
/// A single ledger node that follows the delegate schedule and, when
/// given a delegate key, produces blocks in its own slots. Raw
/// transactions are read hex encoded from stdin, one per line.
#[derive(Debug, Parser)]
pub struct SystemSettings {
  /// Directory of the persistent chain database. Without it the node
  /// keeps everything in memory.
  #[clap(long, short, value_name = "PATH")]
  data_dir: Option<PathBuf>,

  /// Hex encoded secp256k1 secret key of the delegate this node
  /// produces blocks for
  #[clap(long, short, value_name = "HEX")]
  secret: Option<String>,

  /// Public keys of the genesis accounts, in RegId order. Defaults to
  /// the key of the producer secret.
  #[clap(long = "genesis-key", value_name = "HEX")]
  genesis_keys: Vec<PubKey>,

  /// Whole coins credited to every genesis account
  #[clap(long, default_value = "1000000", value_name = "COINS")]
  genesis_balance: u64,

  /// Whole coins every genesis account votes for itself
  #[clap(long, default_value = "100000", value_name = "COINS")]
  genesis_votes: u64,

  /// Unix timestamp of the genesis block
  #[clap(long, default_value = "1700000000", value_name = "SECONDS")]
  genesis_time: u32,

  /// Number of top voted accounts producing blocks
  #[clap(long, default_value = "11", value_name = "COUNT")]
  delegates: u32,

  /// Length of one producer slot
  #[clap(long, short = 't', default_value = "10s", value_name = "DURATION")]
  block_spacing: Duration,

  /// Interval between chain status reports
  #[clap(long, default_value = "30s", value_name = "DURATION")]
  status_interval: Duration,

  /// Maximum number of pending transactions
  #[clap(long, default_value = "10000", value_name = "COUNT")]
  mempool_limit: usize,

  /// Disconnects this many blocks from the tip of the stored chain
  /// before starting
  #[clap(long, default_value = "0", value_name = "BLOCKS")]
  rollback: u32,
}

impl SystemSettings {
  pub fn data_dir(&self) -> Option<&PathBuf> {
    self.data_dir.as_ref()
  }

  pub fn secret(&self) -> anyhow::Result<Option<SecretKey>> {
    self
      .secret
      .as_deref()
      .map(|s| -> anyhow::Result<SecretKey> {
        Ok(SecretKey::from_slice(&hex::decode(s)?)?)
      })
      .transpose()
  }

  pub fn genesis_keys(&self) -> anyhow::Result<Vec<PubKey>> {
    if !self.genesis_keys.is_empty() {
      return Ok(self.genesis_keys.clone());
    }
    match self.secret()? {
      Some(secret) => Ok(vec![PubKey::from_secret(&secret)]),
      None => Err(anyhow::anyhow!(
        "either a genesis key or a producer secret is required"
      )),
    }
  }

  pub fn genesis_balance(&self) -> u64 {
    self.genesis_balance.saturating_mul(COIN)
  }

  pub fn genesis_votes(&self) -> u64 {
    self.genesis_votes.saturating_mul(COIN)
  }

  pub fn genesis_time(&self) -> u32 {
    self.genesis_time
  }

  pub fn params(&self) -> Params {
    Params {
      delegates: self.delegates,
      block_spacing: self.block_spacing.into(),
      ..Default::default()
    }
  }

  pub fn status_interval(&self) -> std::time::Duration {
    self.status_interval.into()
  }

  pub fn mempool_limit(&self) -> usize {
    self.mempool_limit
  }

  pub fn rollback(&self) -> u32 {
    self.rollback
  }
}
