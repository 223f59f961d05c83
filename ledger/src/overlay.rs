use {
  crate::{
    state::{TxPosition, VoteKey},
    State,
    StateDiff,
  },
  dpos_primitives::{Account, DbKey, DbOpLog, Hash256, KeyId, NickId, RegId},
  std::collections::BTreeMap,
};

/// A writable view layered over another state.
///
/// Reads fall through to the base for anything the overlay has not
/// touched. Writes are buffered in a [`StateDiff`] that can be handed
/// back to the base with [`Overlay::into_diff`] and [`State::apply`],
/// or simply dropped to discard them. Overlays nest: an overlay over an
/// overlay is how per-transaction speculation is done inside a block.
///
/// Account writes keep the regid, nick and delegate vote indexes in
/// step with the account record.
pub struct Overlay<'a> {
  base: &'a dyn State,
  diff: StateDiff,
}

impl<'a> Overlay<'a> {
  pub fn new(base: &'a dyn State) -> Self {
    Self {
      base,
      diff: StateDiff::default(),
    }
  }

  /// Resumes an overlay from changes previously taken out of one built
  /// on the same base.
  pub fn with_diff(base: &'a dyn State, diff: StateDiff) -> Self {
    Self { base, diff }
  }

  pub fn diff(&self) -> &StateDiff {
    &self.diff
  }

  pub fn into_diff(self) -> StateDiff {
    self.diff
  }

  /// Stores an account and refreshes every index derived from it.
  ///
  /// Blank accounts are never stored, writing one erases the record.
  pub fn set_account(&mut self, account: Account) {
    if account.is_blank() {
      self.erase_account(&account.key_id);
      return;
    }

    if let Some(previous) = self.account(&account.key_id) {
      self.drop_indexes(&previous, Some(&account));
    }

    if !account.regid.is_empty() {
      self.diff.regids.insert(account.regid, Some(account.key_id));
    }
    if !account.nick_id.is_empty() {
      self
        .diff
        .nicks
        .insert(account.nick_id.clone(), Some(account.key_id));
    }
    if let Some(key) = VoteKey::of(&account) {
      self.diff.votes.insert(key, Some(account.received_votes));
    }
    self.diff.accounts.insert(account.key_id, Some(account));
  }

  pub fn erase_account(&mut self, key_id: &KeyId) {
    if let Some(previous) = self.account(key_id) {
      self.drop_indexes(&previous, None);
    }
    self.diff.accounts.insert(*key_id, None);
  }

  /// Removes index entries of `previous` that `next` no longer owns.
  fn drop_indexes(&mut self, previous: &Account, next: Option<&Account>) {
    if !previous.regid.is_empty()
      && next.map(|a| a.regid) != Some(previous.regid)
    {
      self.diff.regids.insert(previous.regid, None);
    }
    if !previous.nick_id.is_empty()
      && next.map(|a| &a.nick_id) != Some(&previous.nick_id)
    {
      self.diff.nicks.insert(previous.nick_id.clone(), None);
    }
    if let Some(key) = VoteKey::of(previous) {
      if next.and_then(VoteKey::of) != Some(key) {
        self.diff.votes.insert(key, None);
      }
    }
  }

  pub fn set_tx_position(&mut self, hash: Hash256, position: TxPosition) {
    self.diff.txs.insert(hash, Some(position));
  }

  pub fn erase_tx_position(&mut self, hash: &Hash256) {
    self.diff.txs.insert(*hash, None);
  }

  /// Writes an auxiliary store entry and returns the log that restores
  /// its previous value.
  pub fn set_db(&mut self, key: DbKey, value: Option<Vec<u8>>) -> DbOpLog {
    let previous = self.db_value(&key);
    self.diff.db.insert(key.clone(), value);
    DbOpLog { key, previous }
  }
}

impl<'a> State for Overlay<'a> {
  fn account(&self, key_id: &KeyId) -> Option<Account> {
    match self.diff.accounts.get(key_id) {
      Some(value) => value.clone(),
      None => self.base.account(key_id),
    }
  }

  fn regid_owner(&self, regid: &RegId) -> Option<KeyId> {
    match self.diff.regids.get(regid) {
      Some(value) => *value,
      None => self.base.regid_owner(regid),
    }
  }

  fn nick_owner(&self, nick: &NickId) -> Option<KeyId> {
    match self.diff.nicks.get(nick) {
      Some(value) => *value,
      None => self.base.nick_owner(nick),
    }
  }

  fn top_votes(&self, limit: usize) -> Vec<(VoteKey, u64)> {
    // every local change can shadow at most one base entry
    let mut merged: BTreeMap<VoteKey, u64> = self
      .base
      .top_votes(limit + self.diff.votes.len())
      .into_iter()
      .collect();

    for (key, value) in &self.diff.votes {
      match value {
        Some(votes) => merged.insert(*key, *votes),
        None => merged.remove(key),
      };
    }
    merged.into_iter().take(limit).collect()
  }

  fn tx_position(&self, hash: &Hash256) -> Option<TxPosition> {
    match self.diff.txs.get(hash) {
      Some(value) => *value,
      None => self.base.tx_position(hash),
    }
  }

  fn db_value(&self, key: &DbKey) -> Option<Vec<u8>> {
    match self.diff.db.get(key) {
      Some(value) => value.clone(),
      None => self.base.db_value(key),
    }
  }

  fn apply(&mut self, diff: StateDiff) {
    self.diff = std::mem::take(&mut self.diff).merge(diff);
  }
}
