use {
  crate::{Error, InMemoryStateStore, Overlay, State, StateDiff},
  dpos_primitives::{
    Account,
    BalanceOp,
    CandidateVote,
    CoinType,
    NickId,
    Params,
    PubKey,
    RegId,
    VoteOp,
  },
  serde::{Deserialize, Serialize},
  tracing::info,
};

/// An account that exists from the first block on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
  pub owner: PubKey,
  pub balance: u64,
  #[serde(default)]
  pub nick: NickId,

  /// Part of the balance the account votes for itself as a delegate.
  #[serde(default)]
  pub self_votes: u64,
}

/// Builds the initial ledger state.
///
/// Account `i` of the list is registered under RegId `0-(i+1)`. Genesis
/// RegIds are mature from the start, so the initial delegates can
/// produce the first blocks.
pub fn genesis_state(
  accounts: &[GenesisAccount],
  params: &Params,
) -> Result<StateDiff, Error> {
  let empty = InMemoryStateStore::default();
  let mut overlay = Overlay::new(&empty);

  for (i, entry) in accounts.iter().enumerate() {
    let key_id = entry.owner.key_id();
    if overlay.account(&key_id).is_some() {
      return Err(Error::AlreadyRegistered(key_id));
    }

    let regid = RegId::new(0, i as u16 + 1);
    let mut account = Account::new(key_id);
    account.regid = regid;
    account.nick_id = entry.nick.clone();
    account.owner_pubkey = Some(entry.owner);
    account.operate_balance(CoinType::Base, BalanceOp::Add, entry.balance)?;

    if entry.self_votes > 0 {
      account.process_delegate_vote(
        &[CandidateVote::add(regid, entry.self_votes)],
        0,
        params.max_vote_candidates,
      )?;
      account.operate_vote(VoteOp::Add, entry.self_votes)?;
    }

    info!(
      "genesis account {regid} {key_id}: {} coins, {} votes",
      entry.balance, entry.self_votes
    );
    overlay.set_account(account);
  }

  Ok(overlay.into_diff())
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    dpos_primitives::{params::COIN, AccountError, SecretKey},
  };

  fn owner() -> PubKey {
    PubKey::from_secret(&SecretKey::new(&mut rand::thread_rng()))
  }

  #[test]
  fn genesis_registers_and_self_votes() -> anyhow::Result<()> {
    let accounts = vec![
      GenesisAccount {
        owner: owner(),
        balance: 1000 * COIN,
        nick: NickId::new("first")?,
        self_votes: 400 * COIN,
      },
      GenesisAccount {
        owner: owner(),
        balance: 10 * COIN,
        nick: NickId::default(),
        self_votes: 0,
      },
    ];

    let mut store = InMemoryStateStore::default();
    store.apply(genesis_state(&accounts, &Params::default())?);

    let first = store
      .account_by_uid(&RegId::new(0, 1).into())
      .ok_or_else(|| anyhow::anyhow!("first account missing"))?;
    assert!(first.is_registered());
    assert_eq!(first.bcoins, 600 * COIN);
    assert_eq!(first.received_votes, 400 * COIN);
    assert_eq!(first.total_bcoins()?, 1000 * COIN);
    assert!(first.regid_is_mature(0));
    assert_eq!(
      store.nick_owner(&NickId::new("first")?),
      Some(first.key_id)
    );

    let top = store.top_votes(10);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].0.regid, RegId::new(0, 1));
    Ok(())
  }

  #[test]
  fn genesis_rejects_overcommitted_votes() {
    let accounts = vec![GenesisAccount {
      owner: owner(),
      balance: 10,
      nick: NickId::default(),
      self_votes: 11,
    }];
    assert!(matches!(
      genesis_state(&accounts, &Params::default()),
      Err(Error::Account(AccountError::DelegateVoteExceedsBalance { .. }))
    ));
  }

  #[test]
  fn genesis_rejects_duplicate_owner() {
    let key = owner();
    let spec = GenesisAccount {
      owner: key,
      balance: 1,
      nick: NickId::default(),
      self_votes: 0,
    };
    assert_eq!(
      genesis_state(&[spec.clone(), spec], &Params::default()),
      Err(Error::AlreadyRegistered(key.key_id()))
    );
  }
}
