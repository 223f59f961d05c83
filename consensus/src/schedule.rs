//! Delegate selection and slot assignment.
//!
//! The top voted accounts form the delegate list. The list is shuffled
//! once per epoch of `delegates` blocks with a seed derived only from
//! the epoch number, and every slot of `block_spacing` seconds belongs
//! to one entry of the shuffled list.

use {
  dpos_ledger::{Corruption, State},
  dpos_primitives::{codec::write_bytes, Hash256, Params, RegId, UserId},
};

/// Loads the current delegates from the vote index, best ranked first.
///
/// Every index entry is cross-checked against the live account. A
/// mismatch means the ledger is damaged.
pub fn get_delegates(
  state: &dyn State,
  params: &Params,
) -> Result<Vec<RegId>, Corruption> {
  state
    .top_votes(params.delegates as usize)
    .into_iter()
    .map(|(key, indexed)| {
      let account = state
        .account_by_uid(&UserId::RegId(key.regid))
        .ok_or(Corruption::DanglingVoteIndex(key.regid))?;
      if account.received_votes != indexed || key.votes != indexed {
        return Err(Corruption::VoteIndexMismatch {
          regid: key.regid,
          indexed,
          live: account.received_votes,
        });
      }
      Ok(key.regid)
    })
    .collect()
}

/// Epoch the block at `height` belongs to.
pub fn epoch(height: u32, params: &Params) -> u64 {
  let delegates = u64::from(params.delegates.max(1));
  let height = u64::from(height);
  height / delegates + u64::from(height % delegates != 0)
}

/// Deterministically permutes the delegate list for a block height.
///
/// Each position draws one 64 bit word of the seed in turn, the seed is
/// rehashed after every four draws.
///
/// Intentionally not schedule compatible with the widespread variant of
/// this draw, which skips one position after every batch of four draws and
/// feeds each new seed through a running hash stream. Here every position
/// draws once and the next seed is the plain hash of the previous one.
/// Draws are reduced modulo the list length, not the configured delegate
/// count. Changing any of this forks the schedule.
pub fn shuffle_delegates(height: u32, list: &mut [RegId], params: &Params) {
  let len = list.len();
  if len < 2 {
    return;
  }

  let mut encoded = Vec::new();
  write_bytes(&mut encoded, epoch(height, params).to_string().as_bytes());
  let mut seed = Hash256::digest(&encoded);

  for i in 0..len {
    if i > 0 && i % 4 == 0 {
      seed = Hash256::digest(seed.as_bytes());
    }
    let j = (seed.word(i % 4) % len as u64) as usize;
    list.swap(i, j);
  }
}

/// Delegate owning the slot that contains `time`.
pub fn current_delegate(
  time: u32,
  list: &[RegId],
  params: &Params,
) -> Option<RegId> {
  if list.is_empty() {
    return None;
  }
  let slot = u64::from(time) / params.block_spacing_secs();
  Some(list[(slot % list.len() as u64) as usize])
}

/// Delegate entitled to produce the block at `height` and `time`.
pub fn slot_delegate(
  state: &dyn State,
  height: u32,
  time: u32,
  params: &Params,
) -> Result<Option<RegId>, Corruption> {
  let mut delegates = get_delegates(state, params)?;
  shuffle_delegates(height, &mut delegates, params);
  Ok(current_delegate(time, &delegates, params))
}
