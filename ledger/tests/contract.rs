use {
  common::{deploy, genesis_regid, invoke, Fixture},
  dpos_ledger::{
    fuel::{deploy_fuel, fuel_for},
    runtime::{self, ContractRuntime, Invocation, Outcome},
    Error,
    State,
  },
  dpos_primitives::{
    params::{COIN, MIN_TX_FEE, REGID_MATURE_PERIOD},
    DbKey,
    KeyId,
    RegId,
    UserId,
  },
};

mod common;

/// Stores the call arguments under the key "last" and refunds half of
/// the attached amount to the caller.
struct EchoRuntime;

impl ContractRuntime for EchoRuntime {
  fn invoke(
    &self,
    call: &Invocation<'_>,
    _state: &dyn State,
  ) -> Result<Outcome, runtime::Error> {
    if call.arguments == b"abort" {
      return Err(runtime::Error::Aborted("requested".into()));
    }
    Ok(Outcome {
      run_step: 250,
      writes: vec![(b"last".to_vec(), Some(call.arguments.to_vec()))],
      transfers: vec![(UserId::KeyId(call.caller), call.amount / 2)],
    })
  }
}

const SCRIPT: &[u8] = b"contract bytecode";

fn deployed() -> anyhow::Result<(Fixture, RegId)> {
  let mut fx = Fixture::new(&[(100 * COIN, 0)]).with_runtime(EchoRuntime);
  let tx = deploy(&fx.wallets[0], genesis_regid(0), SCRIPT, COIN, 10);
  let executed = fx.run(&tx, 10, 1)?;
  assert_eq!(executed.run_step, SCRIPT.len() as u64);
  assert_eq!(executed.fuel, COIN);
  Ok((fx, RegId::new(10, 1)))
}

#[test]
fn deploy_creates_contract_account() -> anyhow::Result<()> {
  let (fx, app) = deployed()?;

  assert_eq!(fx.store.script(&app), Some(SCRIPT.to_vec()));
  let contract = fx.account(app);
  assert_eq!(contract.key_id, KeyId::for_contract(&app));
  assert!(contract.owner_pubkey.is_none());
  assert_eq!(fx.account(genesis_regid(0)).bcoins, 99 * COIN);
  Ok(())
}

#[test]
fn deploy_costs_at_least_one_coin() {
  let fx = Fixture::new(&[(100 * COIN, 0)]);
  let tx = deploy(&fx.wallets[0], genesis_regid(0), SCRIPT, COIN - 1, 10);
  assert_eq!(
    fx.check(&tx, 10, 1),
    Err(Error::FeeTooLow {
      fee: COIN - 1,
      min: COIN
    })
  );
  assert_eq!(deploy_fuel(SCRIPT.len(), 100), COIN);
}

#[test]
fn invoke_applies_runtime_outcome() -> anyhow::Result<()> {
  let (mut fx, app) = deployed()?;
  let height = 11 + REGID_MATURE_PERIOD;
  let fee = 10 * MIN_TX_FEE;

  let tx = invoke(
    &fx.wallets[0],
    genesis_regid(0),
    app,
    10 * COIN,
    b"hello",
    fee,
    height,
  );
  let executed = fx.run(&tx, height, 1)?;

  assert_eq!(executed.run_step, 250);
  assert_eq!(executed.fuel, fuel_for(250, 100));
  assert_eq!(
    fx.store.db_value(&DbKey::ContractData(app, b"last".to_vec())),
    Some(b"hello".to_vec())
  );
  assert_eq!(fx.account(app).bcoins, 5 * COIN);
  assert_eq!(
    fx.account(genesis_regid(0)).bcoins,
    99 * COIN - 5 * COIN - fee
  );
  Ok(())
}

#[test]
fn invoke_undo_restores_contract_data() -> anyhow::Result<()> {
  let (mut fx, app) = deployed()?;
  let height = 11 + REGID_MATURE_PERIOD;
  let fee = 10 * MIN_TX_FEE;
  let key = DbKey::ContractData(app, b"last".to_vec());

  let sender = genesis_regid(0);
  let first = invoke(&fx.wallets[0], sender, app, 0, b"one", fee, height);
  fx.run(&first, height, 1)?;
  let before = fx.snapshot();

  let second =
    invoke(&fx.wallets[0], sender, app, 2 * COIN, b"two", fee, height);
  let undo = fx.run(&second, height, 2)?.undo;
  assert_eq!(fx.store.db_value(&key), Some(b"two".to_vec()));

  fx.undo(&second, &undo)?;
  assert_eq!(fx.store.db_value(&key), Some(b"one".to_vec()));
  assert_eq!(fx.snapshot(), before);
  Ok(())
}

#[test]
fn invoke_rejections() -> anyhow::Result<()> {
  let (mut fx, app) = deployed()?;
  let mature = 11 + REGID_MATURE_PERIOD;
  let wallet = &fx.wallets[0];
  let sender = genesis_regid(0);
  let fee = 10 * MIN_TX_FEE;

  let immature = invoke(wallet, sender, app, 0, b"x", fee, 20);
  assert_eq!(fx.check(&immature, 20, 1), Err(Error::ImmatureRegId(app)));

  let no_budget = invoke(wallet, sender, app, 0, b"x", fee, mature);
  assert!(fx.check(&no_budget, mature, 1).is_ok());
  fx.fuel_rate = fee;
  assert_eq!(
    fx.check(&no_budget, mature, 1),
    Err(Error::NoFuelBudget(fee))
  );
  fx.fuel_rate = 100;

  let not_app = invoke(wallet, sender, sender, 0, b"x", fee, mature);
  assert_eq!(fx.check(&not_app, mature, 1), Err(Error::NotAContract(sender)));

  let aborted = invoke(wallet, sender, app, 0, b"abort", fee, mature);
  let before = fx.snapshot();
  assert!(matches!(
    fx.run(&aborted, mature, 1),
    Err(Error::Runtime(runtime::Error::Aborted(_)))
  ));
  assert_eq!(fx.snapshot(), before);
  Ok(())
}
