use {
  super::{existing_signer, unexpected, Spent},
  crate::{execution::Journal, Error, State, TxContext},
  dpos_primitives::{
    params::MAX_MONEY,
    BalanceOp,
    CandidateVote,
    CoinType,
    DelegateVoteTx,
    KeyId,
    PubKey,
    UserId,
  },
  std::collections::BTreeSet,
};

/// Resolves every candidate to its registered account and rewrites the
/// votes to name candidates by RegId, the form stored in vote lists.
fn normalize(
  tx: &DelegateVoteTx,
  state: &dyn State,
  ctx: &TxContext<'_>,
) -> Result<Vec<(KeyId, CandidateVote)>, Error> {
  let max = ctx.params.delegates;
  if tx.votes.is_empty() || tx.votes.len() > max as usize {
    return Err(Error::VoteCount {
      found: tx.votes.len(),
      max,
    });
  }

  let mut seen = BTreeSet::new();
  let mut normalized = Vec::with_capacity(tx.votes.len());
  for vote in &tx.votes {
    if !matches!(vote.candidate, UserId::RegId(_) | UserId::PubKey(_)) {
      return Err(unexpected("candidate", "RegId or PubKey", &vote.candidate));
    }
    if vote.amount == 0 {
      return Err(Error::ZeroVote);
    }
    if vote.amount > MAX_MONEY {
      return Err(Error::MoneyRange(vote.amount));
    }

    let candidate = state
      .account_by_uid(&vote.candidate)
      .ok_or_else(|| Error::AccountNotFound(vote.candidate.clone()))?;
    if !candidate.is_registered() || candidate.regid.is_empty() {
      return Err(Error::NotRegistered(vote.candidate.clone()));
    }
    if !seen.insert(candidate.regid) {
      return Err(Error::DuplicateCandidate(vote.candidate.clone()));
    }

    normalized.push((candidate.key_id, CandidateVote {
      op: vote.op,
      candidate: candidate.regid.into(),
      amount: vote.amount,
    }));
  }
  Ok(normalized)
}

pub(crate) fn check(
  tx: &DelegateVoteTx,
  state: &dyn State,
  ctx: &TxContext<'_>,
) -> Result<PubKey, Error> {
  if !matches!(tx.uid, UserId::RegId(_)) {
    return Err(unexpected("txUid", "RegId", &tx.uid));
  }
  let (voter, key) = existing_signer(&tx.uid, state)?;
  let votes: Vec<_> = normalize(tx, state, ctx)?
    .into_iter()
    .map(|(_, vote)| vote)
    .collect();

  // dry run on a copy so over-voting is caught before execution
  let mut probe = voter;
  probe.operate_balance(CoinType::Base, BalanceOp::Minus, tx.fee)?;
  probe.process_delegate_vote(
    &votes,
    ctx.height,
    ctx.params.max_vote_candidates,
  )?;
  Ok(key)
}

/// Moves base coins between the voter's free balance and its vote list,
/// then adjusts the received votes of every candidate.
///
/// Candidate writes refresh the delegate vote index.
pub(crate) fn execute(
  tx: &DelegateVoteTx,
  journal: &mut Journal<'_>,
  ctx: &TxContext<'_>,
) -> Result<Spent, Error> {
  check(tx, journal.view(), ctx)?;
  let (voter, _) = existing_signer(&tx.uid, journal.view())?;
  let normalized = normalize(tx, journal.view(), ctx)?;
  let votes: Vec<_> = normalized.iter().map(|(_, v)| v.clone()).collect();

  journal.update(&voter.key_id, |account| {
    account.operate_balance(CoinType::Base, BalanceOp::Minus, tx.fee)?;
    Ok(account.process_delegate_vote(
      &votes,
      ctx.height,
      ctx.params.max_vote_candidates,
    )?)
  })?;

  for (key_id, vote) in &normalized {
    journal.update(key_id, |account| {
      Ok(account.operate_vote(vote.op, vote.amount)?)
    })?;
  }
  Ok(Spent::default())
}
