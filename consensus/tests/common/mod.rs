#![allow(dead_code)]

use {
  dpos_consensus::{
    create_new_block,
    genesis_block,
    slot_delegate,
    Chain,
    Error,
  },
  dpos_ledger::{
    genesis_state,
    GenesisAccount,
    InMemoryStateStore,
    NullRuntime,
    State,
  },
  dpos_primitives::{
    params::{COIN, INIT_TX_VERSION},
    Account,
    BcoinTransferTx,
    Block,
    KeyId,
    NickId,
    Params,
    PubKey,
    RegId,
    SecretKey,
    Transaction,
    UserId,
  },
  std::time::Duration,
};

pub const GENESIS_TIME: u32 = 1_700_000_000;
pub const FEE: u64 = 10_000;

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
}

/// RegId of the `i`-th genesis account.
pub fn genesis_regid(i: usize) -> RegId {
  RegId::new(0, i as u16 + 1)
}

pub fn params() -> Params {
  Params {
    delegates: 3,
    block_spacing: Duration::from_secs(10),
    ..Default::default()
  }
}

/// A chain at genesis with three delegates voted in by themselves and
/// one ordinary funded account at genesis index 3.
pub struct Network {
  pub chain: Chain,
  pub store: InMemoryStateStore,
  pub wallets: Vec<Wallet>,
  pub runtime: NullRuntime,
}

impl Network {
  pub fn new() -> Self {
    Self::with_params(params())
  }

  pub fn with_params(params: Params) -> Self {
    let self_votes = [4 * COIN, 3 * COIN, 2 * COIN, 0];
    let wallets: Vec<_> =
      self_votes.iter().map(|_| Wallet::random()).collect();
    let genesis: Vec<_> = wallets
      .iter()
      .zip(self_votes)
      .map(|(wallet, self_votes)| GenesisAccount {
        owner: wallet.pubkey,
        balance: 10 * COIN,
        nick: NickId::default(),
        self_votes,
      })
      .collect();

    let mut store = InMemoryStateStore::default();
    store.apply(genesis_state(&genesis, &params).unwrap());

    Self {
      chain: Chain::new(genesis_block(GENESIS_TIME), params),
      store,
      wallets,
      runtime: NullRuntime,
    }
  }

  /// Start of the `n`-th slot after the one holding the tip.
  pub fn slot_time(&self, n: u32) -> u32 {
    let spacing = self.chain.params().block_spacing_secs() as u32;
    let tip = self.chain.tip().time();
    tip - tip % spacing + n * spacing
  }

  pub fn producer_at(&self, height: u32, time: u32) -> RegId {
    slot_delegate(&self.store, height, time, self.chain.params())
      .unwrap()
      .expect("delegates are voted in")
  }

  pub fn wallet_of(&self, regid: RegId) -> &Wallet {
    &self.wallets[regid.index() as usize - 1]
  }

  /// Assembles and signs the next block as the delegate owning `time`.
  pub fn produce(&self, time: u32, candidates: &[Transaction]) -> Block {
    let producer = self.producer_at(self.chain.height() + 1, time);
    self.produce_as(producer, time, candidates)
  }

  pub fn produce_as(
    &self,
    producer: RegId,
    time: u32,
    candidates: &[Transaction],
  ) -> Block {
    let mut block = create_new_block(
      &self.chain,
      &self.store,
      candidates,
      producer,
      time,
      &self.runtime,
    )
    .unwrap();
    block.sign(&self.wallet_of(producer).secret);
    block
  }

  /// Produces and connects a block in the next slot.
  pub fn advance(&mut self, candidates: &[Transaction]) -> Result<(), Error> {
    let block = self.produce(self.slot_time(1), candidates);
    self.connect(block)
  }

  pub fn connect(&mut self, block: Block) -> Result<(), Error> {
    self
      .chain
      .connect_block(block, &mut self.store, &self.runtime)
      .map(|_| ())
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

/// Recomputes the merkle root after the transaction list was edited
/// and signs the header again.
pub fn reseal(block: &mut Block, secret: &SecretKey) {
  let root = block.compute_merkle_root();
  block.header_mut().merkle_root = root;
  block.sign(secret);
}

pub fn transfer(
  from: &Wallet,
  uid: impl Into<UserId>,
  to: impl Into<UserId>,
  amount: u64,
  fee: u64,
  valid_height: u32,
) -> Transaction {
  let mut tx = Transaction::BcoinTransfer(BcoinTransferTx {
    version: INIT_TX_VERSION,
    valid_height,
    uid: uid.into(),
    to_uid: to.into(),
    fee,
    amount,
    memo: vec![],
    signature: vec![],
  });
  tx.sign(&from.secret);
  tx
}
