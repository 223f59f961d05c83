//! Full verification of a candidate block against the chain tip.
//!
//! The checks run in a fixed order: header linkage, the producer
//! schedule, the nonce and merkle root, the same-slot guard, the reward
//! transaction and producer signature, and finally a replay of every
//! transaction on a speculative overlay.

use {
  crate::{
    schedule::{current_delegate, get_delegates, shuffle_delegates},
    Chain,
    Error,
  },
  dpos_ledger::{
    check_tx,
    execute_tx,
    ContractRuntime,
    Corruption,
    Overlay,
    State,
    StateDiff,
    TxContext,
  },
  dpos_primitives::{
    codec::Encode,
    merkle_root,
    params::{
      INIT_BLOCK_VERSION,
      MAX_BLOCK_RUN_STEP,
      MAX_BLOCK_SIGNATURE_SIZE,
      MAX_BLOCK_SIZE,
    },
    Block,
    BlockRewardTx,
    BlockUndo,
    Hash256,
    RegId,
    Transaction,
    UserId,
  },
  rayon::prelude::*,
};

/// Effects of a block that passed verification, ready to be applied.
#[derive(Debug)]
pub struct VerifiedBlock {
  pub diff: StateDiff,
  pub undo: BlockUndo,
  pub fees: u64,
  pub fuel: u64,
  pub run_step: u64,
}

/// Verifies `block` as the successor of the chain tip.
///
/// `state` must describe the ledger at the tip. It is only read, the
/// effects of the block are returned as a diff.
pub fn verify_block(
  block: &Block,
  chain: &Chain,
  state: &dyn State,
  runtime: &dyn ContractRuntime,
) -> Result<VerifiedBlock, Error> {
  check_header(block, chain)?;
  let producer = check_producer(block, chain, state)?;
  check_signature(block, &producer, state)?;
  replay(block, chain, state, runtime)
}

fn check_header(block: &Block, chain: &Chain) -> Result<(), Error> {
  let prev = chain.tip();
  let header = block.header();

  if header.prev_hash != *prev.hash() {
    return Err(Error::PrevMismatch {
      expected: *prev.hash(),
      found: header.prev_hash,
    });
  }

  if header.height != prev.height() + 1 {
    return Err(Error::Height {
      tip: prev.height(),
      found: header.height,
    });
  }

  if header.time <= prev.time() {
    return Err(Error::TimeTooEarly {
      time: header.time,
      prev: prev.time(),
    });
  }

  if header.version != INIT_BLOCK_VERSION {
    return Err(Error::Version(header.version));
  }

  let size = block.encoded_len();
  if size > MAX_BLOCK_SIZE {
    return Err(Error::TooLarge(size));
  }

  let expected = chain.next_fuel_rate();
  if header.fuel_rate != expected {
    return Err(Error::FuelRate {
      expected,
      found: header.fuel_rate,
    });
  }

  Ok(())
}

/// Establishes the delegate owning the block slot and checks that the
/// block was assembled by it.
fn check_producer(
  block: &Block,
  chain: &Chain,
  state: &dyn State,
) -> Result<RegId, Error> {
  let params = chain.params();
  let header = block.header();

  let mut delegates = get_delegates(state, params)?;
  shuffle_delegates(header.height, &mut delegates, params);
  let current = current_delegate(header.time, &delegates, params)
    .ok_or(Error::NoDelegates)?;

  if header.nonce > params.max_nonce {
    return Err(Error::Nonce {
      nonce: header.nonce,
      max: params.max_nonce,
    });
  }

  let leaves: Vec<Hash256> =
    block.transactions().par_iter().map(Transaction::hash).collect();
  let expected = merkle_root(&leaves);
  if header.merkle_root != expected {
    return Err(Error::MerkleRoot {
      expected,
      found: header.merkle_root,
    });
  }

  // a delegate gets one block per slot
  let prev = chain.tip();
  let elapsed = u64::from(header.time - prev.time());
  if prev.height() > 0
    && elapsed < params.block_spacing_secs()
    && rewarded_regid(prev.reward_tx()) == Some(current)
  {
    return Err(Error::DuplicateSlotProducer(current));
  }

  let reward = block.reward_tx().ok_or(Error::MissingReward)?;
  if rewarded_regid(Some(reward)) != Some(current) {
    return Err(Error::WrongDelegate {
      expected: current,
      found: reward.uid.clone(),
    });
  }
  if reward.valid_height != header.height {
    return Err(Error::RewardHeight {
      height: header.height,
      found: reward.valid_height,
    });
  }

  Ok(current)
}

fn rewarded_regid(reward: Option<&BlockRewardTx>) -> Option<RegId> {
  reward.and_then(|tx| tx.uid.as_regid()).copied()
}

/// The block must be signed by the owner key of the producer or, when
/// one is registered, by its dedicated miner key.
fn check_signature(
  block: &Block,
  producer: &RegId,
  state: &dyn State,
) -> Result<(), Error> {
  let signature = &block.header().signature;
  if signature.is_empty() || signature.len() > MAX_BLOCK_SIGNATURE_SIZE {
    return Err(Error::SignatureSize(signature.len()));
  }

  let account = state
    .account_by_uid(&UserId::RegId(*producer))
    .ok_or(Corruption::DanglingVoteIndex(*producer))?;

  let hash = block.header().signature_hash();
  let signed = [account.owner_pubkey, account.miner_pubkey]
    .iter()
    .flatten()
    .any(|key| key.verify(&hash, signature));

  match signed {
    true => Ok(()),
    false => Err(Error::BadSignature),
  }
}

/// Executes every transaction of the block in order and checks the
/// header totals against the outcome.
fn replay(
  block: &Block,
  chain: &Chain,
  state: &dyn State,
  runtime: &dyn ContractRuntime,
) -> Result<VerifiedBlock, Error> {
  let header = block.header();
  let mut overlay = Overlay::new(state);
  let mut undo = BlockUndo {
    block_hash: *block.hash(),
    txs: Vec::with_capacity(block.transactions().len()),
  };

  let (mut fees, mut fuel, mut run_step) = (0u64, 0u64, 0u64);
  for (index, tx) in block.transactions().iter().enumerate() {
    let ctx = TxContext {
      height: header.height,
      index: index as u32,
      time: header.time,
      fuel_rate: header.fuel_rate,
      params: chain.params(),
      runtime,
    };

    let executed = check_tx(tx, &overlay, &ctx)
      .and_then(|_| execute_tx(tx, &mut overlay, &ctx))
      .map_err(|source| Error::Transaction { index, source })?;

    run_step = run_step.saturating_add(executed.run_step);
    if run_step > MAX_BLOCK_RUN_STEP {
      return Err(Error::RunStepExceeded(run_step));
    }

    fuel = fuel.saturating_add(executed.fuel);
    fees = fees.saturating_add(tx.fee());
    undo.txs.push(executed.undo);
  }

  if fuel != header.fuel {
    return Err(Error::FuelMismatch {
      expected: fuel,
      found: header.fuel,
    });
  }

  let expected = fees
    .checked_sub(fuel)
    .ok_or(Error::FeesBelowFuel { fees, fuel })?;
  let reward = block.reward_tx().map(|tx| tx.reward).unwrap_or_default();
  if reward != expected {
    return Err(Error::RewardMismatch {
      expected,
      found: reward,
    });
  }

  Ok(VerifiedBlock {
    diff: overlay.into_diff(),
    undo,
    fees,
    fuel,
    run_step,
  })
}
