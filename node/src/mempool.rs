use {
  dpos_consensus::Chain,
  dpos_ledger::{
    check_tx,
    execute_tx,
    ContractRuntime,
    Overlay,
    State,
    StateDiff,
    TxContext,
  },
  dpos_primitives::{Hash256, Transaction},
  std::collections::HashSet,
  thiserror::Error,
  tracing::debug,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("Transaction {0} is already pending or confirmed")]
  Duplicate(Hash256),

  #[error("Block rewards are created by producers only")]
  BlockReward,

  #[error("Mempool is full with {0} transactions")]
  Full(usize),

  #[error(transparent)]
  Rejected(#[from] dpos_ledger::Error),
}

/// A pending transaction with the fuel it burned when it was accepted.
struct Entry {
  tx: Transaction,
  fuel: u64,
}

/// Transactions waiting for a block.
///
/// Every accepted transaction was checked and executed on top of the
/// tip and all transactions accepted before it, so the pool never holds
/// two conflicting spends.
pub struct Mempool {
  txs: Vec<Entry>,
  hashes: HashSet<Hash256>,
  pending: StateDiff,
  limit: usize,
}

impl Mempool {
  pub fn new(limit: usize) -> Self {
    Self {
      txs: Vec::new(),
      hashes: HashSet::new(),
      pending: StateDiff::default(),
      limit,
    }
  }

  pub fn len(&self) -> usize {
    self.txs.len()
  }

  pub fn accept(
    &mut self,
    tx: Transaction,
    chain: &Chain,
    state: &dyn State,
    runtime: &dyn ContractRuntime,
  ) -> Result<Hash256, Error> {
    let hash = tx.hash();
    if self.hashes.contains(&hash) || state.tx_position(&hash).is_some() {
      return Err(Error::Duplicate(hash));
    }
    if tx.is_block_reward() {
      return Err(Error::BlockReward);
    }
    if self.txs.len() >= self.limit {
      return Err(Error::Full(self.txs.len()));
    }

    let ctx = TxContext {
      height: chain.height() + 1,
      index: self.txs.len() as u32 + 1,
      time: chain.tip().time(),
      fuel_rate: chain.next_fuel_rate(),
      params: chain.params(),
      runtime,
    };

    let pending = std::mem::take(&mut self.pending);
    let mut view = Overlay::with_diff(state, pending);
    let result = check_tx(&tx, &view, &ctx)
      .and_then(|_| execute_tx(&tx, &mut view, &ctx));
    self.pending = view.into_diff();
    let executed = result?;

    self.hashes.insert(hash);
    self.txs.push(Entry {
      tx,
      fuel: executed.fuel,
    });
    Ok(hash)
  }

  /// Pending transactions, best fee per kilobyte net of fuel first.
  pub fn candidates(&self) -> Vec<Transaction> {
    let mut entries: Vec<&Entry> = self.txs.iter().collect();
    entries.sort_by_key(|e| std::cmp::Reverse(e.tx.fee_per_kb(e.fuel)));
    entries.into_iter().map(|e| e.tx.clone()).collect()
  }

  /// Re-validates the pool against a new tip. Confirmed transactions and
  /// those that no longer apply are dropped.
  pub fn refresh(
    &mut self,
    chain: &Chain,
    state: &dyn State,
    runtime: &dyn ContractRuntime,
  ) {
    let txs = std::mem::take(&mut self.txs);
    self.hashes.clear();
    self.pending = StateDiff::default();

    for Entry { tx, .. } in txs {
      if let Err(e) = self.accept(tx, chain, state, runtime) {
        debug!("evicted from mempool: {e}");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    dpos_consensus::genesis_block,
    dpos_ledger::{
      genesis_state,
      GenesisAccount,
      InMemoryStateStore,
      NullRuntime,
    },
    dpos_primitives::{
      params::{COIN, INIT_TX_VERSION},
      BcoinTransferTx,
      ContractDeployTx,
      KeyId,
      NickId,
      Params,
      PubKey,
      RegId,
      SecretKey,
    },
  };

  struct Setup {
    chain: Chain,
    store: InMemoryStateStore,
    secret: SecretKey,
  }

  fn setup() -> anyhow::Result<Setup> {
    let secret = SecretKey::new(&mut rand::thread_rng());
    let params = Params::default();
    let genesis = [GenesisAccount {
      owner: PubKey::from_secret(&secret),
      balance: 10 * COIN,
      nick: NickId::default(),
      self_votes: 0,
    }];
    let mut store = InMemoryStateStore::default();
    store.apply(genesis_state(&genesis, &params)?);
    Ok(Setup {
      chain: Chain::new(genesis_block(1_700_000_000), params),
      store,
      secret,
    })
  }

  fn transfer(secret: &SecretKey, amount: u64, fee: u64) -> Transaction {
    let mut tx = Transaction::BcoinTransfer(BcoinTransferTx {
      version: INIT_TX_VERSION,
      valid_height: 1,
      uid: RegId::new(0, 1).into(),
      to_uid: KeyId::derive(b"recipient").into(),
      fee,
      amount,
      memo: vec![],
      signature: vec![],
    });
    tx.sign(secret);
    tx
  }

  #[test]
  fn conflicting_spends_are_refused() -> anyhow::Result<()> {
    let Setup {
      chain,
      store,
      secret,
    } = setup()?;
    let mut pool = Mempool::new(10);

    let first = transfer(&secret, 6 * COIN, 10_000);
    let second = transfer(&secret, 6 * COIN, 20_000);
    pool.accept(first.clone(), &chain, &store, &NullRuntime)?;
    assert!(matches!(
      pool.accept(second, &chain, &store, &NullRuntime),
      Err(Error::Rejected(dpos_ledger::Error::Account(_)))
    ));
    assert_eq!(
      pool.accept(first.clone(), &chain, &store, &NullRuntime),
      Err(Error::Duplicate(first.hash()))
    );
    assert_eq!(pool.len(), 1);
    Ok(())
  }

  #[test]
  fn candidates_are_ordered_and_limited() -> anyhow::Result<()> {
    let Setup {
      chain,
      store,
      secret,
    } = setup()?;
    let mut pool = Mempool::new(2);

    let cheap = transfer(&secret, COIN, 10_000);
    let generous = transfer(&secret, COIN, 50_000);
    pool.accept(cheap.clone(), &chain, &store, &NullRuntime)?;
    pool.accept(generous.clone(), &chain, &store, &NullRuntime)?;
    assert_eq!(pool.candidates(), vec![generous, cheap]);

    let third = transfer(&secret, 2 * COIN, 10_000);
    assert_eq!(
      pool.accept(third, &chain, &store, &NullRuntime),
      Err(Error::Full(2))
    );
    Ok(())
  }

  #[test]
  fn burned_fuel_lowers_priority() -> anyhow::Result<()> {
    let Setup {
      chain,
      store,
      secret,
    } = setup()?;
    let mut pool = Mempool::new(10);

    // pays far more in total but almost all of it is deploy fuel
    let mut deploy = Transaction::ContractDeploy(ContractDeployTx {
      version: INIT_TX_VERSION,
      valid_height: 1,
      uid: RegId::new(0, 1).into(),
      script: b"code".to_vec(),
      fee: COIN + 10_000,
      signature: vec![],
    });
    deploy.sign(&secret);
    let payment = transfer(&secret, COIN, 20_000);

    pool.accept(deploy.clone(), &chain, &store, &NullRuntime)?;
    pool.accept(payment.clone(), &chain, &store, &NullRuntime)?;
    assert!(deploy.fee_per_kb(0) > payment.fee_per_kb(0));
    assert_eq!(pool.candidates(), vec![payment, deploy]);
    Ok(())
  }

  #[test]
  fn refresh_drops_what_no_longer_applies() -> anyhow::Result<()> {
    let Setup {
      chain,
      mut store,
      secret,
    } = setup()?;
    let mut pool = Mempool::new(10);
    for fee in [10_000, 20_000] {
      let tx = transfer(&secret, 4 * COIN, fee);
      pool.accept(tx, &chain, &store, &NullRuntime)?;
    }

    // the account is drained behind the pool's back
    let mut overlay = Overlay::new(&store);
    let mut account = overlay
      .account_by_uid(&RegId::new(0, 1).into())
      .ok_or_else(|| anyhow::anyhow!("genesis account"))?;
    account.bcoins = 5 * COIN;
    overlay.set_account(account);
    let diff = overlay.into_diff();
    store.apply(diff);

    pool.refresh(&chain, &store, &NullRuntime);
    assert_eq!(pool.len(), 1);
    Ok(())
  }
}
