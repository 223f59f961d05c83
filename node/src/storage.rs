use {
  dpos_ledger::{State, StateDiff, TxPosition, VoteKey},
  dpos_primitives::{
    codec::{Decode, Encode},
    Account,
    Block,
    BlockUndo,
    DbKey,
    Hash256,
    KeyId,
    NickId,
    RegId,
  },
  rmp_serde::{from_slice, to_vec},
  serde::{de::DeserializeOwned, Serialize},
  sled::{
    transaction::ConflictableTransactionResult,
    Batch,
    Transactional,
  },
  std::{fmt::Display, path::Path},
  tracing::error,
};

const TIP_KEY: &[u8] = b"tip";

/// Storage failures leave the ledger in an unknown state, the only safe
/// reaction is to stop the process.
fn fatal(what: &str, e: impl Display) -> ! {
  error!("{what}: {e}");
  std::process::abort()
}

fn io<T>(result: Result<T, sled::Error>) -> T {
  result.unwrap_or_else(|e| fatal("database io error", e))
}

fn decode<T: Decode>(bytes: &[u8]) -> T {
  T::from_bytes(bytes).unwrap_or_else(|e| fatal("database corrupt", e))
}

fn unpack<T: DeserializeOwned>(bytes: &[u8]) -> T {
  from_slice(bytes).unwrap_or_else(|e| fatal("database corrupt", e))
}

fn pack<T: Serialize>(value: &T) -> Vec<u8> {
  to_vec(value).unwrap_or_else(|e| fatal("serialization failed", e))
}

fn key_id(bytes: &[u8]) -> KeyId {
  match <[u8; 20]>::try_from(bytes) {
    Ok(bytes) => KeyId::from_bytes(bytes),
    Err(_) => fatal("database corrupt", "malformed key id"),
  }
}

/// Vote index keys sort the same way as [`VoteKey`]: votes descending,
/// then regid ascending.
fn vote_key(key: &VoteKey) -> [u8; 14] {
  let mut out = [0u8; 14];
  out[..8].copy_from_slice(&(u64::MAX - key.votes).to_be_bytes());
  out[8..12].copy_from_slice(&key.regid.height().to_be_bytes());
  out[12..].copy_from_slice(&key.regid.index().to_be_bytes());
  out
}

fn parse_vote_key(bytes: &[u8]) -> VoteKey {
  if bytes.len() != 14 {
    fatal("database corrupt", "malformed vote index key");
  }
  let mut votes = [0u8; 8];
  let mut height = [0u8; 4];
  let mut index = [0u8; 2];
  votes.copy_from_slice(&bytes[..8]);
  height.copy_from_slice(&bytes[8..12]);
  index.copy_from_slice(&bytes[12..]);
  VoteKey {
    votes: u64::MAX - u64::from_be_bytes(votes),
    regid: RegId::new(u32::from_be_bytes(height), u16::from_be_bytes(index)),
  }
}

fn batch<K, V>(changes: impl Iterator<Item = (K, Option<V>)>) -> Batch
where
  K: AsRef<[u8]>,
  V: Into<sled::IVec>,
{
  let mut batch = Batch::default();
  for (key, value) in changes {
    match value {
      Some(value) => batch.insert(key.as_ref(), value),
      None => batch.remove(key.as_ref()),
    }
  }
  batch
}

/// How the active chain moves together with a state diff.
#[derive(Debug, Clone, Copy)]
pub enum ChainChange<'a> {
  /// A state write with no block behind it. The stored state no longer
  /// corresponds to any stored tip.
  None,

  /// The block and its undo record become the new tip.
  Connect(&'a Block, &'a BlockUndo),

  /// The block at `height` is removed and `tip` is the new tip.
  Disconnect { height: u32, tip: &'a Hash256 },
}

/// Ledger state and the active chain persisted in sled.
///
/// Accounts and blocks are stored in their consensus encoding, so the
/// on-disk bytes hash the same on every node. Local indexes and undo
/// records use rmp. The `meta` tree holds the hash of the tip the state
/// corresponds to.
pub struct OnDiskStateStore {
  accounts: sled::Tree,
  regids: sled::Tree,
  nicks: sled::Tree,
  votes: sled::Tree,
  txs: sled::Tree,
  db: sled::Tree,
  blocks: sled::Tree,
  undos: sled::Tree,
  meta: sled::Tree,
}

impl OnDiskStateStore {
  pub fn open(db: &sled::Db) -> Result<Self, sled::Error> {
    Ok(Self {
      accounts: db.open_tree("accounts")?,
      regids: db.open_tree("regids")?,
      nicks: db.open_tree("nicks")?,
      votes: db.open_tree("votes")?,
      txs: db.open_tree("txs")?,
      db: db.open_tree("contracts")?,
      blocks: db.open_tree("blocks")?,
      undos: db.open_tree("undos")?,
      meta: db.open_tree("meta")?,
    })
  }

  /// Writes `diff` and `change` in a single transaction over all trees,
  /// then flushes. Either everything lands on disk or nothing does.
  pub fn commit(&self, diff: &StateDiff, change: ChainChange<'_>) {
    let mut blocks = Batch::default();
    let mut undos = Batch::default();
    let mut meta = Batch::default();
    match change {
      ChainChange::None => meta.remove(TIP_KEY),
      ChainChange::Connect(block, undo) => {
        let height = block.height().to_be_bytes();
        blocks.insert(&height[..], block.to_bytes());
        undos.insert(&height[..], pack(undo));
        meta.insert(TIP_KEY, &block.hash().as_bytes()[..]);
      }
      ChainChange::Disconnect { height, tip } => {
        let height = height.to_be_bytes();
        blocks.remove(&height[..]);
        undos.remove(&height[..]);
        meta.insert(TIP_KEY, &tip.as_bytes()[..]);
      }
    }

    let batches = [
      batch(
        diff
          .accounts()
          .map(|(k, v)| (k.as_bytes().to_vec(), v.map(|a| a.to_bytes()))),
      ),
      batch(
        diff
          .regids()
          .map(|(k, v)| (k.to_bytes(), v.map(|id| id.as_bytes().to_vec()))),
      ),
      batch(diff.nicks().map(|(k, v)| {
        (k.as_str().to_owned(), v.map(|id| id.as_bytes().to_vec()))
      })),
      batch(diff.votes().map(|(k, v)| (vote_key(k), v.map(pack)))),
      batch(diff.txs().map(|(k, v)| (k.as_bytes().to_vec(), v.map(pack)))),
      batch(diff.db().map(|(k, v)| (pack(k), v.cloned()))),
      blocks,
      undos,
      meta,
    ];
    let trees: &[&sled::Tree] = &[
      &self.accounts,
      &self.regids,
      &self.nicks,
      &self.votes,
      &self.txs,
      &self.db,
      &self.blocks,
      &self.undos,
      &self.meta,
    ];

    let result = trees.transaction(
      |views| -> ConflictableTransactionResult<(), ()> {
        for (view, batch) in views.iter().zip(&batches) {
          view.apply_batch(batch)?;
        }
        Ok(())
      },
    );
    if let Err(e) = result {
      fatal("database transaction failed", format!("{e:?}"));
    }
    io(self.meta.flush());
  }

  /// Hash of the tip the stored state corresponds to. `None` when the
  /// state was last written without a matching chain change.
  pub fn tip(&self) -> Option<Hash256> {
    io(self.meta.get(TIP_KEY)).map(|bytes| {
      match <[u8; 32]>::try_from(&bytes[..]) {
        Ok(bytes) => Hash256::from_bytes(bytes),
        Err(_) => fatal("database corrupt", "malformed tip marker"),
      }
    })
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  /// Every stored block with its undo record, genesis first.
  pub fn load(&self) -> (Vec<Block>, Vec<BlockUndo>) {
    let blocks: Vec<Block> = self
      .blocks
      .iter()
      .map(|entry| decode(&io(entry).1))
      .collect();
    let undos: Vec<BlockUndo> = self
      .undos
      .iter()
      .map(|entry| unpack(&io(entry).1))
      .collect();
    (blocks, undos)
  }
}

impl State for OnDiskStateStore {
  fn account(&self, key_id: &KeyId) -> Option<Account> {
    io(self.accounts.get(key_id.as_bytes())).map(|bytes| decode(&bytes))
  }

  fn regid_owner(&self, regid: &RegId) -> Option<KeyId> {
    io(self.regids.get(regid.to_bytes())).map(|bytes| key_id(&bytes))
  }

  fn nick_owner(&self, nick: &NickId) -> Option<KeyId> {
    io(self.nicks.get(nick.as_str())).map(|bytes| key_id(&bytes))
  }

  fn top_votes(&self, limit: usize) -> Vec<(VoteKey, u64)> {
    self
      .votes
      .iter()
      .take(limit)
      .map(|entry| {
        let (key, value) = io(entry);
        (parse_vote_key(&key), unpack(&value))
      })
      .collect()
  }

  fn tx_position(&self, hash: &Hash256) -> Option<TxPosition> {
    io(self.txs.get(hash.as_bytes())).map(|bytes| unpack(&bytes))
  }

  fn db_value(&self, key: &DbKey) -> Option<Vec<u8>> {
    io(self.db.get(pack(key))).map(|bytes| bytes.to_vec())
  }

  fn apply(&mut self, diff: StateDiff) {
    self.commit(&diff, ChainChange::None);
  }
}

/// Opens the database at `path`.
pub fn open(path: &Path) -> anyhow::Result<OnDiskStateStore> {
  let db = sled::open(path)?;
  Ok(OnDiskStateStore::open(&db)?)
}
