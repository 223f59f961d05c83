use {
  super::{unexpected, Spent},
  crate::{execution::Journal, Error, State, TxContext},
  dpos_primitives::{BalanceOp, BlockRewardTx, CoinType, UserId},
};

pub(crate) fn check(
  tx: &BlockRewardTx,
  state: &dyn State,
  ctx: &TxContext<'_>,
) -> Result<(), Error> {
  if ctx.index != 0 {
    return Err(Error::MisplacedReward);
  }
  if !matches!(tx.uid, UserId::RegId(_)) {
    return Err(unexpected("txUid", "RegId", &tx.uid));
  }
  if state.resolve(&tx.uid).is_none() {
    return Err(Error::AccountNotFound(tx.uid.clone()));
  }
  Ok(())
}

/// Credits the block reward to the producing account.
///
/// The reward equals the fees of the block minus the fuel it burned and
/// is verified against the block by the validator, not here.
pub(crate) fn execute(
  tx: &BlockRewardTx,
  journal: &mut Journal<'_>,
  ctx: &TxContext<'_>,
) -> Result<Spent, Error> {
  check(tx, journal.view(), ctx)?;
  let key_id = journal
    .view()
    .resolve(&tx.uid)
    .ok_or_else(|| Error::AccountNotFound(tx.uid.clone()))?;

  journal.update(&key_id, |account| {
    Ok(account.operate_balance(CoinType::Base, BalanceOp::Add, tx.reward)?)
  })?;
  Ok(Spent::default())
}
