use {
  dpos_primitives::{Account, DbKey, Hash256, KeyId, NickId, RegId, UserId},
  serde::{Deserialize, Serialize},
  std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
  },
};

/// Location of an executed transaction in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxPosition {
  pub height: u32,
  pub index: u32,
}

/// Key of the delegate vote index.
///
/// Ordered by received votes descending, ties broken by the candidate
/// regid ascending, so iterating the index front to back yields the
/// delegate ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteKey {
  pub votes: u64,
  pub regid: RegId,
}

impl Ord for VoteKey {
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .votes
      .cmp(&self.votes)
      .then_with(|| self.regid.cmp(&other.regid))
  }
}

impl PartialOrd for VoteKey {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl VoteKey {
  /// Index key of an account, if it belongs in the vote index.
  pub fn of(account: &Account) -> Option<Self> {
    if account.regid.is_empty() || account.received_votes == 0 {
      return None;
    }
    Some(Self {
      votes: account.received_votes,
      regid: account.regid,
    })
  }
}

/// Represents a change in ledger state.
///
/// Every table maps a key to `Some(value)` for an insert or update and
/// to `None` for a delete. Logically the entire ledger is the result of
/// applying consecutive diffs, one per executed transaction or block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDiff {
  pub(crate) accounts: BTreeMap<KeyId, Option<Account>>,
  pub(crate) regids: BTreeMap<RegId, Option<KeyId>>,
  pub(crate) nicks: BTreeMap<NickId, Option<KeyId>>,
  pub(crate) votes: BTreeMap<VoteKey, Option<u64>>,
  pub(crate) txs: BTreeMap<Hash256, Option<TxPosition>>,
  pub(crate) db: BTreeMap<DbKey, Option<Vec<u8>>>,
}

impl StateDiff {
  pub fn is_empty(&self) -> bool {
    self.accounts.is_empty()
      && self.regids.is_empty()
      && self.nicks.is_empty()
      && self.votes.is_empty()
      && self.txs.is_empty()
      && self.db.is_empty()
  }

  /// Merges a state diff with a newer diff.
  ///
  /// Applying the result is equivalent to applying both diffs
  /// consecutively on any state store.
  pub fn merge(mut self, newer: StateDiff) -> StateDiff {
    self.accounts.extend(newer.accounts);
    self.regids.extend(newer.regids);
    self.nicks.extend(newer.nicks);
    self.votes.extend(newer.votes);
    self.txs.extend(newer.txs);
    self.db.extend(newer.db);
    self
  }

  pub fn accounts(&self) -> impl Iterator<Item = (&KeyId, Option<&Account>)> {
    self.accounts.iter().map(|(k, v)| (k, v.as_ref()))
  }

  pub fn regids(&self) -> impl Iterator<Item = (&RegId, Option<&KeyId>)> {
    self.regids.iter().map(|(k, v)| (k, v.as_ref()))
  }

  pub fn nicks(&self) -> impl Iterator<Item = (&NickId, Option<&KeyId>)> {
    self.nicks.iter().map(|(k, v)| (k, v.as_ref()))
  }

  pub fn votes(&self) -> impl Iterator<Item = (&VoteKey, Option<&u64>)> {
    self.votes.iter().map(|(k, v)| (k, v.as_ref()))
  }

  pub fn txs(&self) -> impl Iterator<Item = (&Hash256, Option<&TxPosition>)> {
    self.txs.iter().map(|(k, v)| (k, v.as_ref()))
  }

  pub fn db(&self) -> impl Iterator<Item = (&DbKey, Option<&Vec<u8>>)> {
    self.db.iter().map(|(k, v)| (k, v.as_ref()))
  }

  /// Raw write into the vote index, bypassing account maintenance.
  /// Only useful for repairing or inspecting a damaged index.
  pub fn set_vote_entry(&mut self, key: VoteKey, votes: Option<u64>) {
    self.votes.insert(key, votes);
  }
}

/// Read access to ledger state plus the ability to apply diffs.
///
/// Implemented by the in-memory store, the on-disk store of the node
/// and by [`crate::Overlay`] so that overlays can be stacked.
pub trait State {
  fn account(&self, key_id: &KeyId) -> Option<Account>;
  fn regid_owner(&self, regid: &RegId) -> Option<KeyId>;
  fn nick_owner(&self, nick: &NickId) -> Option<KeyId>;

  /// The first `limit` entries of the delegate vote index in ranking
  /// order, along with the vote count stored in each entry.
  fn top_votes(&self, limit: usize) -> Vec<(VoteKey, u64)>;

  fn tx_position(&self, hash: &Hash256) -> Option<TxPosition>;
  fn db_value(&self, key: &DbKey) -> Option<Vec<u8>>;

  fn apply(&mut self, diff: StateDiff);

  /// Resolves any user identity to the key id of its account.
  fn resolve(&self, uid: &UserId) -> Option<KeyId> {
    match uid {
      UserId::Null => None,
      UserId::RegId(regid) => self.regid_owner(regid),
      UserId::KeyId(key_id) => Some(*key_id),
      UserId::PubKey(pubkey) => Some(pubkey.key_id()),
      UserId::NickId(nick) => self.nick_owner(nick),
    }
  }

  fn account_by_uid(&self, uid: &UserId) -> Option<Account> {
    self.account(&self.resolve(uid)?)
  }

  /// True when the regid is assigned and mature relative to `tip_height`.
  fn regid_is_mature(&self, regid: &RegId, tip_height: u32) -> bool {
    self.regid_owner(regid).is_some() && regid.is_mature(tip_height)
  }

  fn script(&self, app: &RegId) -> Option<Vec<u8>> {
    self.db_value(&DbKey::Script(*app))
  }
}

/// Ledger state held entirely in memory.
///
/// Used by tests and as the backing store of short lived tools.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStateStore {
  accounts: HashMap<KeyId, Account>,
  regids: HashMap<RegId, KeyId>,
  nicks: HashMap<NickId, KeyId>,
  votes: BTreeMap<VoteKey, u64>,
  txs: HashMap<Hash256, TxPosition>,
  db: BTreeMap<DbKey, Vec<u8>>,
}

impl InMemoryStateStore {
  pub fn accounts(&self) -> impl Iterator<Item = (&KeyId, &Account)> {
    self.accounts.iter()
  }

  pub fn vote_index_len(&self) -> usize {
    self.votes.len()
  }
}

fn apply_table<K: Ord + std::hash::Hash + Eq, V>(
  target: &mut HashMap<K, V>,
  changes: BTreeMap<K, Option<V>>,
) {
  for (key, value) in changes {
    match value {
      Some(value) => target.insert(key, value),
      None => target.remove(&key),
    };
  }
}

fn apply_sorted<K: Ord, V>(
  target: &mut BTreeMap<K, V>,
  changes: BTreeMap<K, Option<V>>,
) {
  for (key, value) in changes {
    match value {
      Some(value) => target.insert(key, value),
      None => target.remove(&key),
    };
  }
}

impl State for InMemoryStateStore {
  fn account(&self, key_id: &KeyId) -> Option<Account> {
    self.accounts.get(key_id).cloned()
  }

  fn regid_owner(&self, regid: &RegId) -> Option<KeyId> {
    self.regids.get(regid).copied()
  }

  fn nick_owner(&self, nick: &NickId) -> Option<KeyId> {
    self.nicks.get(nick).copied()
  }

  fn top_votes(&self, limit: usize) -> Vec<(VoteKey, u64)> {
    self
      .votes
      .iter()
      .take(limit)
      .map(|(k, v)| (*k, *v))
      .collect()
  }

  fn tx_position(&self, hash: &Hash256) -> Option<TxPosition> {
    self.txs.get(hash).copied()
  }

  fn db_value(&self, key: &DbKey) -> Option<Vec<u8>> {
    self.db.get(key).cloned()
  }

  fn apply(&mut self, diff: StateDiff) {
    apply_table(&mut self.accounts, diff.accounts);
    apply_table(&mut self.regids, diff.regids);
    apply_table(&mut self.nicks, diff.nicks);
    apply_sorted(&mut self.votes, diff.votes);
    apply_table(&mut self.txs, diff.txs);
    apply_sorted(&mut self.db, diff.db);
  }
}
