use {
  crate::{
    mempool::{self, Mempool},
    settings::SystemSettings,
    storage::{self, ChainChange, OnDiskStateStore},
  },
  dpos_consensus::{
    create_new_block,
    genesis_block,
    schedule::slot_delegate,
    Chain,
    Error,
  },
  dpos_ledger::{
    genesis_state,
    Corruption,
    GenesisAccount,
    InMemoryStateStore,
    NullRuntime,
    Overlay,
    State,
    StateDiff,
  },
  dpos_primitives::{
    Block,
    Hash256,
    KeyId,
    NickId,
    RegId,
    SecretKey,
    Transaction,
  },
  tracing::{error, info, warn},
};

/// A damaged ledger cannot be trusted for anything, not even for an
/// orderly shutdown.
fn fatal(e: &Corruption) -> ! {
  error!("ledger corruption: {e}");
  std::process::abort()
}

/// Where the ledger state lives.
pub enum Ledger {
  Memory(InMemoryStateStore),
  Disk(OnDiskStateStore),
}

impl Ledger {
  fn view(&self) -> &dyn State {
    match self {
      Self::Memory(state) => state,
      Self::Disk(state) => state,
    }
  }

  /// Applies `diff` together with the chain movement it belongs to. On
  /// disk both are written in one transaction.
  fn commit(&mut self, diff: StateDiff, change: ChainChange<'_>) {
    match self {
      Self::Memory(state) => state.apply(diff),
      Self::Disk(state) => state.commit(&diff, change),
    }
  }
}

/// Rebuilds the active chain from disk and checks that the stored state
/// belongs to its tip.
fn restore(
  store: &OnDiskStateStore,
  settings: &SystemSettings,
) -> anyhow::Result<Chain> {
  let (blocks, undos) = store.load();
  let chain = Chain::restore(blocks, undos, settings.params())
    .ok_or_else(|| {
      anyhow::anyhow!("stored blocks and undo records do not line up")
    })?;
  if store.tip().as_ref() != Some(chain.tip().hash()) {
    anyhow::bail!(
      "ledger state does not match the stored chain tip {} at height {}",
      chain.tip().hash(),
      chain.height()
    );
  }
  Ok(chain)
}

/// Everything a running node owns. Shared between the producer thread
/// and the main loop behind a single lock.
pub struct Node {
  chain: Chain,
  ledger: Ledger,
  mempool: Mempool,
  runtime: NullRuntime,
}

impl Node {
  /// Opens the persistent chain in the configured data directory or
  /// starts an in-memory one.
  pub fn open(settings: &SystemSettings) -> anyhow::Result<Self> {
    let ledger = match settings.data_dir() {
      Some(path) => Ledger::Disk(storage::open(path)?),
      None => Ledger::Memory(InMemoryStateStore::default()),
    };
    Self::start(ledger, settings)
  }

  /// Resumes the chain stored in `ledger`. An empty ledger is seeded
  /// with the genesis block and the genesis accounts from the settings.
  pub fn start(
    mut ledger: Ledger,
    settings: &SystemSettings,
  ) -> anyhow::Result<Self> {
    let mempool = Mempool::new(settings.mempool_limit());
    let restored = match &ledger {
      Ledger::Disk(store) if !store.is_empty() => {
        Some(restore(store, settings)?)
      }
      _ => None,
    };
    if let Some(chain) = restored {
      info!("restored chain at height {}", chain.height());
      return Ok(Self {
        chain,
        ledger,
        mempool,
        runtime: NullRuntime,
      });
    }

    let params = settings.params();
    let genesis: Vec<_> = settings
      .genesis_keys()?
      .into_iter()
      .map(|owner| GenesisAccount {
        owner,
        balance: settings.genesis_balance(),
        nick: NickId::default(),
        self_votes: settings.genesis_votes(),
      })
      .collect();
    let diff = genesis_state(&genesis, &params)?;

    let chain = Chain::new(genesis_block(settings.genesis_time()), params);
    ledger.commit(
      diff,
      ChainChange::Connect(chain.genesis(), chain.tip_undo()),
    );
    info!(
      "created genesis block {} with {} accounts",
      chain.genesis().hash(),
      genesis.len()
    );

    Ok(Self {
      chain,
      ledger,
      mempool,
      runtime: NullRuntime,
    })
  }

  pub fn chain(&self) -> &Chain {
    &self.chain
  }

  pub fn mempool_len(&self) -> usize {
    self.mempool.len()
  }

  pub fn submit(
    &mut self,
    tx: Transaction,
  ) -> Result<Hash256, mempool::Error> {
    self
      .mempool
      .accept(tx, &self.chain, self.ledger.view(), &self.runtime)
  }

  /// RegId of the account owning `key_id`, if it is registered.
  pub fn regid_of(&self, key_id: &KeyId) -> Option<RegId> {
    self
      .ledger
      .view()
      .account(key_id)
      .map(|account| account.regid)
      .filter(|regid| !regid.is_empty())
  }

  /// Delegate owning the slot at `time` for the block after the tip.
  pub fn slot_delegate(&self, time: u32) -> Option<RegId> {
    let height = self.chain.height() + 1;
    slot_delegate(self.ledger.view(), height, time, self.chain.params())
      .unwrap_or_else(|e| fatal(&e))
  }

  /// Assembles, signs and connects a block for `producer` at `time`.
  pub fn produce(
    &mut self,
    producer: RegId,
    time: u32,
    secret: &SecretKey,
  ) -> Result<Hash256, Error> {
    let mut block = create_new_block(
      &self.chain,
      self.ledger.view(),
      &self.mempool.candidates(),
      producer,
      time,
      &self.runtime,
    )?;
    block.sign(secret);
    let hash = *block.hash();
    self.connect(block)?;
    Ok(hash)
  }

  /// Connects a block on top of the tip, persists it together with its
  /// effects and evicts its transactions from the mempool.
  pub fn connect(&mut self, block: Block) -> Result<(), Error> {
    let mut overlay = Overlay::new(self.ledger.view());
    match self.chain.connect_block(block, &mut overlay, &self.runtime) {
      Ok(_) => {}
      Err(Error::Corruption(e)) => fatal(&e),
      Err(e) => return Err(e),
    }
    let diff = overlay.into_diff();

    self.ledger.commit(
      diff,
      ChainChange::Connect(self.chain.tip(), self.chain.tip_undo()),
    );
    self
      .mempool
      .refresh(&self.chain, self.ledger.view(), &self.runtime);
    Ok(())
  }

  /// Rolls back the tip. Its transactions go back to the mempool when
  /// they still apply.
  pub fn disconnect_tip(&mut self) -> Result<Block, Error> {
    let mut overlay = Overlay::new(self.ledger.view());
    let block = match self.chain.disconnect_tip(&mut overlay) {
      Ok(block) => block,
      Err(Error::Corruption(e)) => fatal(&e),
      Err(e) => return Err(e),
    };
    let diff = overlay.into_diff();

    self.ledger.commit(
      diff,
      ChainChange::Disconnect {
        height: block.height(),
        tip: self.chain.tip().hash(),
      },
    );
    self
      .mempool
      .refresh(&self.chain, self.ledger.view(), &self.runtime);
    for tx in block.transactions().iter().skip(1) {
      if let Err(e) = self.submit(tx.clone()) {
        warn!("dropping {} from disconnected block: {e}", tx.hash());
      }
    }
    Ok(block)
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    clap::Parser,
    dpos_primitives::{
      params::{COIN, INIT_TX_VERSION},
      Account,
      BcoinTransferTx,
      PubKey,
    },
  };

  const GENESIS_TIME: u32 = 1_700_000_000;

  fn settings(secret: &SecretKey) -> anyhow::Result<SystemSettings> {
    Ok(SystemSettings::try_parse_from([
      "dpos-node",
      "--secret",
      &hex::encode(secret.secret_bytes()),
      "--genesis-time",
      &GENESIS_TIME.to_string(),
    ])?)
  }

  fn open(secret: &SecretKey) -> anyhow::Result<Node> {
    Node::open(&settings(secret)?)
  }

  fn on_disk(db: &sled::Db) -> anyhow::Result<Ledger> {
    Ok(Ledger::Disk(OnDiskStateStore::open(db)?))
  }

  fn payment(secret: &SecretKey, amount: u64) -> Transaction {
    let mut tx = Transaction::BcoinTransfer(BcoinTransferTx {
      version: INIT_TX_VERSION,
      valid_height: 1,
      uid: RegId::new(0, 1).into(),
      to_uid: KeyId::derive(b"merchant").into(),
      fee: 10_000,
      amount,
      memo: vec![],
      signature: vec![],
    });
    tx.sign(secret);
    tx
  }

  #[test]
  fn genesis_key_defaults_to_producer() -> anyhow::Result<()> {
    let secret = SecretKey::new(&mut rand::thread_rng());
    let node = open(&secret)?;
    let key_id = PubKey::from_secret(&secret).key_id();

    assert_eq!(node.chain().height(), 0);
    assert_eq!(node.regid_of(&key_id), Some(RegId::new(0, 1)));
    assert_eq!(node.slot_delegate(GENESIS_TIME + 10), Some(RegId::new(0, 1)));
    Ok(())
  }

  #[test]
  fn disconnected_transactions_return_to_mempool() -> anyhow::Result<()> {
    let secret = SecretKey::new(&mut rand::thread_rng());
    let mut node = open(&secret)?;
    let tx = payment(&secret, 3 * COIN);
    node.submit(tx.clone())?;

    node.produce(RegId::new(0, 1), GENESIS_TIME + 10, &secret)?;
    assert_eq!(node.chain().height(), 1);
    assert_eq!(node.chain().tip().transactions()[1], tx);
    assert_eq!(node.mempool_len(), 0);
    assert!(matches!(
      node.submit(tx.clone()),
      Err(mempool::Error::Duplicate(_))
    ));

    let block = node.disconnect_tip()?;
    assert_eq!(block.height(), 1);
    assert_eq!(node.chain().height(), 0);
    assert_eq!(node.mempool_len(), 1);
    assert!(matches!(node.disconnect_tip(), Err(Error::DisconnectGenesis)));
    Ok(())
  }

  #[test]
  fn disk_ledger_resumes_at_tip() -> anyhow::Result<()> {
    let db = sled::Config::new().temporary(true).open()?;
    let secret = SecretKey::new(&mut rand::thread_rng());
    let settings = settings(&secret)?;
    let key_id = PubKey::from_secret(&secret).key_id();

    let mut node = Node::start(on_disk(&db)?, &settings)?;
    node.submit(payment(&secret, 3 * COIN))?;
    let tip = node.produce(RegId::new(0, 1), GENESIS_TIME + 10, &secret)?;
    let producer = node.ledger.view().account(&key_id);
    assert!(producer.is_some());
    drop(node);

    let mut node = Node::start(on_disk(&db)?, &settings)?;
    assert_eq!(node.chain().height(), 1);
    assert_eq!(node.chain().tip().hash(), &tip);
    assert_eq!(node.ledger.view().account(&key_id), producer);

    node.disconnect_tip()?;
    drop(node);
    let node = Node::start(on_disk(&db)?, &settings)?;
    assert_eq!(node.chain().height(), 0);
    assert_eq!(node.mempool_len(), 0);
    Ok(())
  }

  #[test]
  fn state_ahead_of_stored_chain_is_refused() -> anyhow::Result<()> {
    let db = sled::Config::new().temporary(true).open()?;
    let secret = SecretKey::new(&mut rand::thread_rng());
    let settings = settings(&secret)?;

    let mut node = Node::start(on_disk(&db)?, &settings)?;
    node.produce(RegId::new(0, 1), GENESIS_TIME + 10, &secret)?;
    drop(node);

    // effects of a block that never made it into the block tree
    let mut store = OnDiskStateStore::open(&db)?;
    let mut overlay = Overlay::new(&store);
    let mut stray = Account::new(KeyId::derive(b"stray"));
    stray.bcoins = 5 * COIN;
    overlay.set_account(stray);
    let diff = overlay.into_diff();
    store.apply(diff);

    assert!(Node::start(Ledger::Disk(store), &settings).is_err());
    Ok(())
  }
}
