use {
  super::{existing_signer, signer, unexpected, Spent},
  crate::{
    execution::Journal,
    fuel::{deploy_fuel, fuel_for, invoke_step_limit},
    runtime::{self, Invocation},
    Error,
    State,
    TxContext,
  },
  dpos_primitives::{
    params::{MAX_CONTRACT_ARGUMENT_SIZE, MAX_CONTRACT_SCRIPT_SIZE, MAX_MONEY},
    BalanceOp,
    CoinType,
    ContractDeployTx,
    ContractInvokeTx,
    DbKey,
    KeyId,
    PubKey,
    RegId,
    UserId,
  },
  tracing::debug,
};

pub(crate) fn check_deploy(
  tx: &ContractDeployTx,
  state: &dyn State,
  ctx: &TxContext<'_>,
) -> Result<PubKey, Error> {
  if !matches!(tx.uid, UserId::RegId(_)) {
    return Err(unexpected("txUid", "RegId", &tx.uid));
  }
  if tx.script.is_empty() {
    return Err(Error::EmptyScript);
  }
  if tx.script.len() > MAX_CONTRACT_SCRIPT_SIZE {
    return Err(Error::TooLarge {
      field: "script",
      len: tx.script.len(),
      max: MAX_CONTRACT_SCRIPT_SIZE,
    });
  }

  let fuel = deploy_fuel(tx.script.len(), ctx.fuel_rate);
  if tx.fee < fuel {
    return Err(Error::FeeBelowFuel { fee: tx.fee, fuel });
  }

  let (_, key) = existing_signer(&tx.uid, state)?;
  Ok(key)
}

/// Creates a contract account with a fresh RegId and stores its script.
///
/// The contract account has no owner key. Its key id is derived from the
/// RegId so it cannot collide with a key-backed account.
pub(crate) fn execute_deploy(
  tx: &ContractDeployTx,
  journal: &mut Journal<'_>,
  ctx: &TxContext<'_>,
) -> Result<Spent, Error> {
  check_deploy(tx, journal.view(), ctx)?;
  let (sender, _) = existing_signer(&tx.uid, journal.view())?;

  journal.update(&sender.key_id, |account| {
    Ok(account.operate_balance(CoinType::Base, BalanceOp::Minus, tx.fee)?)
  })?;

  let regid = ctx.new_regid()?;
  journal.update(&KeyId::for_contract(&regid), |account| {
    account.regid = regid;
    Ok(())
  })?;
  journal.write_db(DbKey::Script(regid), Some(tx.script.clone()));

  debug!("contract {regid} deployed by {}", tx.uid);
  Ok(Spent {
    run_step: tx.script.len() as u64,
    fuel: deploy_fuel(tx.script.len(), ctx.fuel_rate),
  })
}

fn app_regid(tx: &ContractInvokeTx) -> Result<RegId, Error> {
  match &tx.app_uid {
    UserId::RegId(regid) => Ok(*regid),
    other => Err(unexpected("appUid", "RegId", other)),
  }
}

pub(crate) fn check_invoke(
  tx: &ContractInvokeTx,
  state: &dyn State,
  ctx: &TxContext<'_>,
) -> Result<PubKey, Error> {
  let app = app_regid(tx)?;
  if tx.arguments.len() > MAX_CONTRACT_ARGUMENT_SIZE {
    return Err(Error::TooLarge {
      field: "arguments",
      len: tx.arguments.len(),
      max: MAX_CONTRACT_ARGUMENT_SIZE,
    });
  }
  if tx.amount > MAX_MONEY {
    return Err(Error::MoneyRange(tx.amount));
  }
  if invoke_step_limit(tx.fee, ctx.fuel_rate) == 0 {
    return Err(Error::NoFuelBudget(ctx.fuel_rate));
  }

  let (sender, key) = signer(&tx.uid, state)?;
  if sender.is_none() {
    return Err(Error::AccountNotFound(tx.uid.clone()));
  }

  if state.script(&app).is_none() {
    return Err(Error::NotAContract(app));
  }
  if !state.regid_is_mature(&app, ctx.height) {
    return Err(Error::ImmatureRegId(app));
  }
  Ok(key)
}

/// Pays `amount` into the contract, runs it, and applies what the
/// runtime reports.
///
/// The fee buys the run step budget. Whatever the runtime consumed is
/// burned as fuel and must not exceed the fee.
pub(crate) fn execute_invoke(
  tx: &ContractInvokeTx,
  journal: &mut Journal<'_>,
  ctx: &TxContext<'_>,
) -> Result<Spent, Error> {
  check_invoke(tx, journal.view(), ctx)?;
  let app = app_regid(tx)?;
  let (sender, key) = existing_signer(&tx.uid, journal.view())?;
  let app_key = journal
    .view()
    .regid_owner(&app)
    .ok_or(Error::NotAContract(app))?;
  let script = journal.view().script(&app).ok_or(Error::NotAContract(app))?;

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
  journal.update(&app_key, |account| {
    Ok(account.operate_balance(CoinType::Base, BalanceOp::Add, tx.amount)?)
  })?;

  let step_limit = invoke_step_limit(tx.fee, ctx.fuel_rate);
  let call = Invocation {
    app,
    caller: sender.key_id,
    amount: tx.amount,
    arguments: &tx.arguments,
    script: &script,
    step_limit,
    height: ctx.height,
  };
  let outcome = ctx.runtime.invoke(&call, journal.view())?;
  if outcome.run_step > step_limit {
    return Err(runtime::Error::OutOfSteps { limit: step_limit }.into());
  }

  for (key, value) in outcome.writes {
    journal.write_db(DbKey::ContractData(app, key), value);
  }

  for (to, amount) in &outcome.transfers {
    let to_key = journal
      .view()
      .resolve(to)
      .ok_or_else(|| Error::AccountNotFound(to.clone()))?;
    journal.update(&app_key, |account| {
      Ok(account.operate_balance(CoinType::Base, BalanceOp::Minus, *amount)?)
    })?;
    journal.update(&to_key, |account| {
      Ok(account.operate_balance(CoinType::Base, BalanceOp::Add, *amount)?)
    })?;
  }

  let fuel = fuel_for(outcome.run_step, ctx.fuel_rate);
  if tx.fee < fuel {
    return Err(Error::FeeBelowFuel { fee: tx.fee, fuel });
  }

  Ok(Spent {
    run_step: outcome.run_step,
    fuel,
  })
}
