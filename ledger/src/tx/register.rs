use {
  super::{unexpected, Spent},
  crate::{execution::Journal, Error, State, TxContext},
  dpos_primitives::{
    AccountRegisterTx,
    BalanceOp,
    CoinType,
    PubKey,
    UserId,
  },
};

fn owner_key(tx: &AccountRegisterTx) -> Result<PubKey, Error> {
  match &tx.uid {
    UserId::PubKey(key) => Ok(*key),
    other => Err(unexpected("txUid", "PubKey", other)),
  }
}

fn miner_key(tx: &AccountRegisterTx) -> Result<Option<PubKey>, Error> {
  match &tx.miner_uid {
    UserId::PubKey(key) => Ok(Some(*key)),
    UserId::Null => Ok(None),
    other => Err(unexpected("minerUid", "PubKey or Null", other)),
  }
}

pub(crate) fn check(
  tx: &AccountRegisterTx,
  state: &dyn State,
) -> Result<PubKey, Error> {
  let owner = owner_key(tx)?;
  miner_key(tx)?;

  let key_id = owner.key_id();
  if let Some(account) = state.account(&key_id) {
    if account.is_registered() {
      return Err(Error::AlreadyRegistered(key_id));
    }
  }
  Ok(owner)
}

/// Binds the owner key to its account and assigns the account a RegId
/// made of the block height and the transaction index.
pub(crate) fn execute(
  tx: &AccountRegisterTx,
  journal: &mut Journal<'_>,
  ctx: &TxContext<'_>,
) -> Result<Spent, Error> {
  let owner = check(tx, journal.view())?;
  let miner = miner_key(tx)?;
  let regid = ctx.new_regid()?;

  journal.update(&owner.key_id(), |account| {
    account.operate_balance(CoinType::Base, BalanceOp::Minus, tx.fee)?;
    account.regid = regid;
    account.owner_pubkey = Some(owner);
    account.miner_pubkey = miner;
    Ok(())
  })?;
  Ok(Spent::default())
}
