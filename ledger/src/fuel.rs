use dpos_primitives::params::{COIN, MAX_BLOCK_RUN_STEP, MIN_TX_FEE};

/// Fuel charged for a number of run steps.
///
/// Steps are billed in started units of one hundred.
pub fn fuel_for(run_step: u64, fuel_rate: u64) -> u64 {
  let units = run_step / 100 + u64::from(run_step % 100 != 0);
  units.saturating_mul(fuel_rate)
}

/// Fuel burned by deploying a script of `script_len` bytes.
///
/// Deploying always costs at least one coin.
pub fn deploy_fuel(script_len: usize, fuel_rate: u64) -> u64 {
  fuel_for(script_len as u64, fuel_rate).max(COIN)
}

/// Run step budget bought by the part of an invoke fee above the
/// minimum transaction fee.
pub fn invoke_step_limit(fee: u64, fuel_rate: u64) -> u64 {
  let spendable = fee.saturating_sub(MIN_TX_FEE);
  (spendable / fuel_rate.max(1))
    .saturating_mul(100)
    .min(MAX_BLOCK_RUN_STEP)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fuel_rounds_steps_up() {
    assert_eq!(fuel_for(0, 100), 0);
    assert_eq!(fuel_for(1, 100), 100);
    assert_eq!(fuel_for(100, 100), 100);
    assert_eq!(fuel_for(101, 7), 14);
  }

  #[test]
  fn deploy_has_one_coin_floor() {
    assert_eq!(deploy_fuel(10, 100), COIN);
    assert_eq!(deploy_fuel(65_536, 200_000), 656 * 200_000);
  }

  #[test]
  fn invoke_budget_is_capped() {
    assert_eq!(invoke_step_limit(MIN_TX_FEE, 100), 0);
    assert_eq!(invoke_step_limit(MIN_TX_FEE + 1000, 100), 1000);
    assert_eq!(invoke_step_limit(u64::MAX / 2, 1), MAX_BLOCK_RUN_STEP);
  }
}
