use {
  dpos_primitives::{
    params::{INIT_FUEL_RATE, MAX_BLOCK_RUN_STEP, MIN_FUEL_RATE},
    Block,
    Params,
  },
  tracing::trace,
};

/// Fuel rate the block following the last entry of `history` must carry.
///
/// `history` is the chain in height order, ending with the tip. Until the
/// chain is longer than twice the burn window the initial rate applies.
/// Afterwards the average run steps of the trailing window push the
/// rate down by a tenth when blocks are under 75% full and up by a tenth
/// when they are over 85% full.
pub fn next_fuel_rate(history: &[Block], params: &Params) -> u64 {
  let tip = match history.last() {
    Some(tip) => tip,
    None => return INIT_FUEL_RATE,
  };

  let window = params.burn_window as usize;
  let tip_height = i64::from(tip.height());
  if window == 0 || 2 * window as i64 >= tip_height - 1 {
    return INIT_FUEL_RATE;
  }

  let total: u64 = history
    .iter()
    .rev()
    .take(window)
    .map(|block| {
      let header = block.header();
      header.fuel / header.fuel_rate.max(1) * 100
    })
    .sum();
  let average = total / window as u64;

  let current = tip.header().fuel_rate;
  let next = if average < MAX_BLOCK_RUN_STEP * 3 / 4 {
    current * 9 / 10
  } else if average > MAX_BLOCK_RUN_STEP * 17 / 20 {
    current * 11 / 10
  } else {
    current
  }
  .max(MIN_FUEL_RATE);

  trace!(
    "fuel rate at height {}: {current} -> {next}, average steps {average}",
    tip.height()
  );
  next
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    dpos_primitives::{BlockHeader, Hash256},
  };

  fn chain(fuel_steps: &[(u64, u64)]) -> Vec<Block> {
    fuel_steps
      .iter()
      .enumerate()
      .map(|(height, (steps, rate))| {
        Block::new(
          BlockHeader {
            height: height as u32,
            prev_hash: Hash256::digest(&height.to_le_bytes()),
            fuel: steps / 100 * rate,
            fuel_rate: *rate,
            ..Default::default()
          },
          vec![],
        )
      })
      .collect()
  }

  fn params(burn_window: u32) -> Params {
    Params {
      burn_window,
      ..Default::default()
    }
  }

  #[test]
  fn short_chains_use_the_initial_rate() {
    assert_eq!(next_fuel_rate(&[], &params(3)), INIT_FUEL_RATE);

    // tip height 7: 2 * 3 >= 6
    let blocks = chain(&[(0, 100); 8]);
    assert_eq!(next_fuel_rate(&blocks, &params(3)), INIT_FUEL_RATE);

    // tip height 8: 2 * 3 < 7
    let blocks = chain(&[(0, 100); 9]);
    assert_eq!(next_fuel_rate(&blocks, &params(3)), 90);
  }

  #[test]
  fn rate_follows_block_fullness() {
    let full = MAX_BLOCK_RUN_STEP * 9 / 10;
    let balanced = MAX_BLOCK_RUN_STEP * 8 / 10;

    let blocks = chain(&[(full, 200); 10]);
    assert_eq!(next_fuel_rate(&blocks, &params(3)), 220);

    let blocks = chain(&[(balanced, 200); 10]);
    assert_eq!(next_fuel_rate(&blocks, &params(3)), 200);

    // only the trailing window counts
    let mut steps = vec![(0, 200); 7];
    steps.extend([(full, 200); 3]);
    let blocks = chain(&steps);
    assert_eq!(next_fuel_rate(&blocks, &params(3)), 220);
  }

  #[test]
  fn rate_never_drops_below_minimum() {
    let blocks = chain(&[(0, MIN_FUEL_RATE); 10]);
    assert_eq!(next_fuel_rate(&blocks, &params(3)), MIN_FUEL_RATE);

    let blocks = chain(&[(0, 5); 10]);
    assert_eq!(next_fuel_rate(&blocks, &params(3)), 4);
  }
}
