use {
  super::{existing_signer, unexpected, Spent},
  crate::{execution::Journal, Error, State, TxContext},
  dpos_primitives::{
    params::{MAX_MEMO_SIZE, MAX_MONEY},
    BalanceOp,
    BcoinTransferTx,
    CoinType,
    KeyId,
    PubKey,
    UserId,
  },
};

fn recipient(tx: &BcoinTransferTx, state: &dyn State) -> Result<KeyId, Error> {
  match &tx.to_uid {
    UserId::RegId(_) => state
      .resolve(&tx.to_uid)
      .ok_or_else(|| Error::AccountNotFound(tx.to_uid.clone())),
    UserId::KeyId(key_id) => Ok(*key_id),
    other => Err(unexpected("toUid", "RegId or KeyId", other)),
  }
}

pub(crate) fn check(
  tx: &BcoinTransferTx,
  state: &dyn State,
) -> Result<PubKey, Error> {
  if tx.amount == 0 || tx.amount > MAX_MONEY {
    return Err(Error::MoneyRange(tx.amount));
  }
  if tx.memo.len() > MAX_MEMO_SIZE {
    return Err(Error::TooLarge {
      field: "memo",
      len: tx.memo.len(),
      max: MAX_MEMO_SIZE,
    });
  }

  let (_, key) = existing_signer(&tx.uid, state)?;
  recipient(tx, state)?;
  Ok(key)
}

/// Moves base coins from the sender to the recipient and burns the fee.
///
/// A PubKey sender that has no RegId yet gets one. A KeyId recipient
/// without an account gets a fresh unregistered one.
pub(crate) fn execute(
  tx: &BcoinTransferTx,
  journal: &mut Journal<'_>,
  ctx: &TxContext<'_>,
) -> Result<Spent, Error> {
  check(tx, journal.view())?;
  let (sender, key) = existing_signer(&tx.uid, journal.view())?;
  let to = recipient(tx, journal.view())?;

  let debit = tx
    .fee
    .checked_add(tx.amount)
    .ok_or(Error::MoneyRange(u64::MAX))?;

  journal.update(&sender.key_id, |account| {
    if account.regid.is_empty() {
      account.regid = ctx.new_regid()?;
      account.owner_pubkey = Some(key);
    }
    Ok(account.operate_balance(CoinType::Base, BalanceOp::Minus, debit)?)
  })?;

  journal.update(&to, |account| {
    Ok(account.operate_balance(CoinType::Base, BalanceOp::Add, tx.amount)?)
  })?;

  Ok(Spent::default())
}
