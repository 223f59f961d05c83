use {
  crate::{Chain, Error},
  dpos_ledger::{
    check_tx,
    execute_tx,
    ContractRuntime,
    Overlay,
    State,
    TxContext,
  },
  dpos_primitives::{
    codec::Encode,
    params::{
      INIT_BLOCK_VERSION,
      INIT_TX_VERSION,
      MAX_BLOCK_RUN_STEP,
      MAX_BLOCK_SIZE,
    },
    Block,
    BlockHeader,
    BlockRewardTx,
    RegId,
    Transaction,
  },
  tracing::{debug, trace},
};

/// Fuel `tx` burns when executed alone on top of `state`. Transactions
/// that do not apply there count as burning none.
fn standalone_fuel(
  tx: &Transaction,
  state: &dyn State,
  ctx: &TxContext<'_>,
) -> u64 {
  let mut view = Overlay::new(state);
  check_tx(tx, &view, ctx)
    .and_then(|_| execute_tx(tx, &mut view, ctx))
    .map(|executed| executed.fuel)
    .unwrap_or_default()
}

/// Assembles an unsigned block on top of the chain tip for `producer`.
///
/// Candidates are tried best fee per kilobyte first, counting only the
/// part of the fee left after the fuel the transaction burns when run
/// alone on `state`. Each one is checked and executed on a speculative
/// view of `state` at the position it would take in the block.
/// Candidates that fail, would overflow the block size or would exhaust
/// the run step budget are left out. The reward pays out the collected
/// fees minus the burned fuel.
pub fn create_new_block(
  chain: &Chain,
  state: &dyn State,
  candidates: &[Transaction],
  producer: RegId,
  time: u32,
  runtime: &dyn ContractRuntime,
) -> Result<Block, Error> {
  let prev = chain.tip();
  let height = prev.height() + 1;
  let fuel_rate = chain.next_fuel_rate();

  let mut reward = BlockRewardTx {
    version: INIT_TX_VERSION,
    valid_height: height,
    uid: producer.into(),
    reward: 0,
  };

  let mut header = BlockHeader {
    version: INIT_BLOCK_VERSION,
    prev_hash: *prev.hash(),
    time,
    height,
    fuel_rate,
    ..Default::default()
  };

  let standalone = TxContext {
    height,
    index: 1,
    time,
    fuel_rate,
    params: chain.params(),
    runtime,
  };
  let mut ordered: Vec<(u64, &Transaction)> = candidates
    .iter()
    .filter(|tx| !tx.is_block_reward())
    .map(|tx| (tx.fee_per_kb(standalone_fuel(tx, state, &standalone)), tx))
    .collect();
  ordered.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));

  let placeholder = vec![Transaction::BlockReward(reward.clone())];
  let mut block_size = Block::new(header.clone(), placeholder).encoded_len();

  let mut overlay = Overlay::new(state);
  let mut included = Vec::new();
  let (mut fees, mut fuel, mut run_step) = (0u64, 0u64, 0u64);

  for (_, tx) in ordered {
    let tx_size = tx.encoded_len();
    if block_size + tx_size >= MAX_BLOCK_SIZE {
      trace!("skipping {}: block is full", tx.hash());
      continue;
    }

    let ctx = TxContext {
      height,
      index: included.len() as u32 + 1,
      time,
      fuel_rate,
      params: chain.params(),
      runtime,
    };

    let mut speculative = Overlay::new(&overlay);
    let executed = match check_tx(tx, &speculative, &ctx)
      .and_then(|_| execute_tx(tx, &mut speculative, &ctx))
    {
      Ok(executed) => executed,
      Err(e) => {
        trace!("skipping {}: {e}", tx.hash());
        continue;
      }
    };

    if run_step + executed.run_step >= MAX_BLOCK_RUN_STEP {
      trace!("skipping {}: run step budget exhausted", tx.hash());
      continue;
    }

    let diff = speculative.into_diff();
    overlay.apply(diff);

    block_size += tx_size;
    run_step += executed.run_step;
    fuel += executed.fuel;
    fees += tx.fee();
    included.push(tx.clone());
  }

  reward.reward = fees
    .checked_sub(fuel)
    .ok_or(Error::FeesBelowFuel { fees, fuel })?;
  header.fuel = fuel;

  let mut transactions = Vec::with_capacity(included.len() + 1);
  transactions.push(Transaction::BlockReward(reward));
  transactions.extend(included);

  let mut block = Block::new(header, transactions);
  let root = block.compute_merkle_root();
  block.header_mut().merkle_root = root;

  debug!(
    "assembled block at height {height} with {} transactions, fees \
     {fees}, fuel {fuel}, steps {run_step}",
    block.transactions().len()
  );
  Ok(block)
}
