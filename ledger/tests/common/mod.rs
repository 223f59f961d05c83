#![allow(dead_code)]

use {
  dpos_ledger::{
    check_tx,
    execute_tx,
    genesis_state,
    undo_execute_tx,
    ContractRuntime,
    Corruption,
    Error,
    Executed,
    GenesisAccount,
    InMemoryStateStore,
    NullRuntime,
    Overlay,
    State,
    TxContext,
  },
  dpos_primitives::{
    params::{INIT_FUEL_RATE, INIT_TX_VERSION},
    Account,
    BcoinTransferTx,
    CandidateVote,
    ContractDeployTx,
    ContractInvokeTx,
    DelegateVoteTx,
    KeyId,
    NickId,
    Params,
    PubKey,
    RegId,
    SecretKey,
    Transaction,
    TxUndo,
    UserId,
  },
};

pub struct Wallet {
  pub secret: SecretKey,
  pub pubkey: PubKey,
}

impl Wallet {
  pub fn random() -> Self {
    let secret = SecretKey::new(&mut rand::thread_rng());
    Self {
      pubkey: PubKey::from_secret(&secret),
      secret,
    }
  }

  pub fn key_id(&self) -> KeyId {
    self.pubkey.key_id()
  }

  pub fn sign(&self, mut tx: Transaction) -> Transaction {
    tx.sign(&self.secret);
    tx
  }
}

/// RegId of the `i`-th genesis account.
pub fn genesis_regid(i: usize) -> RegId {
  RegId::new(0, i as u16 + 1)
}

/// A ledger seeded with genesis accounts, one per `(balance, self_votes)`.
pub struct Fixture {
  pub store: InMemoryStateStore,
  pub params: Params,
  pub wallets: Vec<Wallet>,
  pub runtime: Box<dyn ContractRuntime>,
  pub fuel_rate: u64,
}

impl Fixture {
  pub fn new(accounts: &[(u64, u64)]) -> Self {
    let params = Params::default();
    let wallets: Vec<_> = accounts.iter().map(|_| Wallet::random()).collect();
    let genesis: Vec<_> = accounts
      .iter()
      .zip(&wallets)
      .map(|((balance, self_votes), wallet)| GenesisAccount {
        owner: wallet.pubkey,
        balance: *balance,
        nick: NickId::default(),
        self_votes: *self_votes,
      })
      .collect();

    let mut store = InMemoryStateStore::default();
    store.apply(genesis_state(&genesis, &params).unwrap());

    Self {
      store,
      params,
      wallets,
      runtime: Box::new(NullRuntime),
      fuel_rate: INIT_FUEL_RATE,
    }
  }

  pub fn with_runtime(
    mut self,
    runtime: impl ContractRuntime + 'static,
  ) -> Self {
    self.runtime = Box::new(runtime);
    self
  }

  pub fn ctx(&self, height: u32, index: u32) -> TxContext<'_> {
    TxContext {
      height,
      index,
      time: 1_700_000_000,
      fuel_rate: self.fuel_rate,
      params: &self.params,
      runtime: self.runtime.as_ref(),
    }
  }

  pub fn check(
    &self,
    tx: &Transaction,
    height: u32,
    index: u32,
  ) -> Result<(), Error> {
    check_tx(tx, &self.store, &self.ctx(height, index))
  }

  /// Checks and executes a transaction, committing it on success.
  pub fn run(
    &mut self,
    tx: &Transaction,
    height: u32,
    index: u32,
  ) -> Result<Executed, Error> {
    let ctx = TxContext {
      height,
      index,
      time: 1_700_000_000,
      fuel_rate: self.fuel_rate,
      params: &self.params,
      runtime: self.runtime.as_ref(),
    };
    check_tx(tx, &self.store, &ctx)?;
    let mut overlay = Overlay::new(&self.store);
    let executed = execute_tx(tx, &mut overlay, &ctx)?;
    let diff = overlay.into_diff();
    self.store.apply(diff);
    Ok(executed)
  }

  pub fn undo(
    &mut self,
    tx: &Transaction,
    undo: &TxUndo,
  ) -> Result<(), Corruption> {
    let mut overlay = Overlay::new(&self.store);
    undo_execute_tx(tx, undo, &mut overlay)?;
    let diff = overlay.into_diff();
    self.store.apply(diff);
    Ok(())
  }

  pub fn account(&self, uid: impl Into<UserId>) -> Account {
    let uid = uid.into();
    self
      .store
      .account_by_uid(&uid)
      .unwrap_or_else(|| panic!("account {uid} not found"))
  }

  /// Every stored account, sorted for comparison.
  pub fn snapshot(&self) -> Vec<Account> {
    let mut accounts: Vec<_> =
      self.store.accounts().map(|(_, a)| a.clone()).collect();
    accounts.sort_by_key(|a| a.key_id);
    accounts
  }
}

pub fn transfer(
  from: &Wallet,
  uid: impl Into<UserId>,
  to: impl Into<UserId>,
  amount: u64,
  fee: u64,
  valid_height: u32,
) -> Transaction {
  from.sign(Transaction::BcoinTransfer(BcoinTransferTx {
    version: INIT_TX_VERSION,
    valid_height,
    uid: uid.into(),
    to_uid: to.into(),
    fee,
    amount,
    memo: vec![],
    signature: vec![],
  }))
}

pub fn vote(
  from: &Wallet,
  uid: impl Into<UserId>,
  votes: Vec<CandidateVote>,
  fee: u64,
  valid_height: u32,
) -> Transaction {
  from.sign(Transaction::DelegateVote(DelegateVoteTx {
    version: INIT_TX_VERSION,
    valid_height,
    uid: uid.into(),
    votes,
    fee,
    signature: vec![],
  }))
}

pub fn deploy(
  from: &Wallet,
  uid: impl Into<UserId>,
  script: &[u8],
  fee: u64,
  valid_height: u32,
) -> Transaction {
  from.sign(Transaction::ContractDeploy(ContractDeployTx {
    version: INIT_TX_VERSION,
    valid_height,
    uid: uid.into(),
    script: script.to_vec(),
    fee,
    signature: vec![],
  }))
}

pub fn invoke(
  from: &Wallet,
  uid: impl Into<UserId>,
  app: RegId,
  amount: u64,
  arguments: &[u8],
  fee: u64,
  valid_height: u32,
) -> Transaction {
  from.sign(Transaction::ContractInvoke(ContractInvokeTx {
    version: INIT_TX_VERSION,
    valid_height,
    uid: uid.into(),
    app_uid: app.into(),
    fee,
    amount,
    arguments: arguments.to_vec(),
    signature: vec![],
  }))
}
