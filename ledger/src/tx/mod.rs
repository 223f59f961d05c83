//! Per-type transaction rules.
//!
//! Every module exposes a `check` that validates the transaction against
//! a read-only view and returns the key its signature must verify with,
//! and an `execute` that applies it through a [`Journal`].

use {
  crate::{Error, State},
  dpos_primitives::{Account, PubKey, UserId},
};

pub(crate) mod contract;
pub(crate) mod register;
pub(crate) mod reward;
pub(crate) mod transfer;
pub(crate) mod vote;

/// Run steps consumed and fuel burned by one executed transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Spent {
  pub run_step: u64,
  pub fuel: u64,
}

pub(crate) fn unexpected(
  field: &'static str,
  expected: &'static str,
  found: &UserId,
) -> Error {
  Error::UnexpectedUserId {
    field,
    expected,
    found: found.kind(),
  }
}

/// Resolves the account behind a transaction sender.
///
/// A RegId sender must exist and be registered, its signature verifies
/// with the owner key. A PubKey sender signs with that key and may not
/// have an account yet.
pub(crate) fn signer(
  uid: &UserId,
  state: &dyn State,
) -> Result<(Option<Account>, PubKey), Error> {
  match uid {
    UserId::RegId(_) => {
      let account = state
        .account_by_uid(uid)
        .ok_or_else(|| Error::AccountNotFound(uid.clone()))?;
      match account.owner_pubkey {
        Some(key) if account.is_registered() => Ok((Some(account), key)),
        _ => Err(Error::NotRegistered(uid.clone())),
      }
    }
    UserId::PubKey(key) => Ok((state.account(&key.key_id()), *key)),
    other => Err(unexpected("txUid", "RegId or PubKey", other)),
  }
}

/// The sender account of a transaction, which must already exist.
pub(crate) fn existing_signer(
  uid: &UserId,
  state: &dyn State,
) -> Result<(Account, PubKey), Error> {
  match signer(uid, state)? {
    (Some(account), key) => Ok((account, key)),
    (None, _) => Err(Error::AccountNotFound(uid.clone())),
  }
}
