use {
  common::{genesis_regid, transfer, vote, Fixture, Wallet},
  dpos_ledger::{Error, State},
  dpos_primitives::{
    params::COIN,
    AccountError,
    CandidateVote,
    UserId,
  },
};

mod common;

const FEE: u64 = 10_000;

#[test]
fn vote_then_revoke() -> anyhow::Result<()> {
  let mut fx = Fixture::new(&[(1_000_000_000 + 2 * FEE, 0), (COIN, 0)]);
  let a = genesis_regid(0);
  let b = genesis_regid(1);

  let cast = vote(
    &fx.wallets[0],
    a,
    vec![CandidateVote::add(b, 300_000_000)],
    FEE,
    10,
  );
  fx.run(&cast, 10, 1)?;

  let voter = fx.account(a);
  assert_eq!(voter.bcoins, 700_000_000 + FEE);
  assert_eq!(voter.candidate_votes, vec![CandidateVote::add(
    b,
    300_000_000
  )]);
  assert_eq!(voter.last_vote_height, 10);
  assert_eq!(fx.account(b).received_votes, 300_000_000);
  assert_eq!(fx.store.top_votes(1)[0].0.regid, b);

  let revoke = vote(
    &fx.wallets[0],
    a,
    vec![CandidateVote::minus(b, 300_000_000)],
    FEE,
    11,
  );
  fx.run(&revoke, 11, 1)?;

  let voter = fx.account(a);
  assert!(voter.candidate_votes.is_empty());
  assert_eq!(voter.bcoins, 1_000_000_000);
  assert_eq!(fx.account(b).received_votes, 0);
  assert!(fx.store.top_votes(10).is_empty());
  Ok(())
}

#[test]
fn over_voting_fails_in_check_and_execute() {
  let mut fx = Fixture::new(&[(1_000_000_000, 0), (COIN, 0)]);
  let before = fx.snapshot();
  let tx = vote(
    &fx.wallets[0],
    genesis_regid(0),
    vec![CandidateVote::add(genesis_regid(1), 1_000_000_000)],
    FEE,
    10,
  );

  assert!(matches!(
    fx.check(&tx, 10, 1),
    Err(Error::Account(
      AccountError::DelegateVoteExceedsBalance { .. }
    ))
  ));
  assert!(matches!(
    fx.run(&tx, 10, 1),
    Err(Error::Account(
      AccountError::DelegateVoteExceedsBalance { .. }
    ))
  ));
  assert_eq!(fx.snapshot(), before);
}

#[test]
fn pubkey_candidates_are_stored_by_regid() -> anyhow::Result<()> {
  let mut fx = Fixture::new(&[(10 * COIN, 0), (COIN, 0)]);
  let candidate_key = fx.wallets[1].pubkey;
  let tx = vote(
    &fx.wallets[0],
    genesis_regid(0),
    vec![CandidateVote::add(candidate_key, COIN)],
    FEE,
    10,
  );
  fx.run(&tx, 10, 1)?;

  // revoking by regid finds the vote cast by pubkey
  let revoke = vote(
    &fx.wallets[0],
    genesis_regid(0),
    vec![CandidateVote::minus(genesis_regid(1), COIN / 2)],
    FEE,
    10,
  );
  fx.run(&revoke, 10, 2)?;

  let voter = fx.account(genesis_regid(0));
  assert_eq!(voter.candidate_votes, vec![CandidateVote::add(
    genesis_regid(1),
    COIN / 2
  )]);
  assert_eq!(fx.account(genesis_regid(1)).received_votes, COIN / 2);
  Ok(())
}

#[test]
fn vote_list_rules() {
  let fx = Fixture::new(&[(10 * COIN, 0), (COIN, 0)]);
  let wallet = &fx.wallets[0];
  let a = genesis_regid(0);
  let b = genesis_regid(1);

  let empty = vote(wallet, a, vec![], FEE, 10);
  assert_eq!(
    fx.check(&empty, 10, 1),
    Err(Error::VoteCount { found: 0, max: 11 })
  );

  let twice = vote(
    wallet,
    a,
    vec![
      CandidateVote::add(b, 1),
      CandidateVote::add(fx.wallets[1].pubkey, 1),
    ],
    FEE,
    10,
  );
  assert_eq!(
    fx.check(&twice, 10, 1),
    Err(Error::DuplicateCandidate(fx.wallets[1].pubkey.into()))
  );

  let zero = vote(wallet, a, vec![CandidateVote::add(b, 0)], FEE, 10);
  assert_eq!(fx.check(&zero, 10, 1), Err(Error::ZeroVote));

  let too_many = vote(
    wallet,
    a,
    (0..12).map(|_| CandidateVote::add(b, 1)).collect(),
    FEE,
    10,
  );
  assert!(matches!(
    fx.check(&too_many, 10, 1),
    Err(Error::VoteCount { found: 12, .. })
  ));

  let by_keyid = vote(
    wallet,
    UserId::KeyId(wallet.pubkey.key_id()),
    vec![CandidateVote::add(b, 1)],
    FEE,
    10,
  );
  assert!(matches!(
    fx.check(&by_keyid, 10, 1),
    Err(Error::UnexpectedUserId { field: "txUid", .. })
  ));

  let revoke_unknown =
    vote(wallet, a, vec![CandidateVote::minus(b, 1)], FEE, 10);
  assert_eq!(
    fx.check(&revoke_unknown, 10, 1),
    Err(Error::Account(AccountError::UnknownVoteCandidate(b.into())))
  );

  let check_twice = vote(wallet, a, vec![CandidateVote::add(b, 5)], FEE, 10);
  assert_eq!(fx.check(&check_twice, 10, 1), fx.check(&check_twice, 10, 1));
}

#[test]
fn unregistered_candidate_is_rejected() -> anyhow::Result<()> {
  let mut fx = Fixture::new(&[(10 * COIN, 0)]);
  let stranger = Wallet::random();
  let funding = transfer(
    &fx.wallets[0],
    genesis_regid(0),
    stranger.key_id(),
    COIN,
    FEE,
    10,
  );
  fx.run(&funding, 10, 1)?;

  let tx = vote(
    &fx.wallets[0],
    genesis_regid(0),
    vec![CandidateVote::add(stranger.pubkey, 1)],
    FEE,
    10,
  );
  assert_eq!(
    fx.check(&tx, 10, 2),
    Err(Error::NotRegistered(stranger.pubkey.into()))
  );
  Ok(())
}

#[test]
fn undo_restores_votes_and_index() -> anyhow::Result<()> {
  let mut fx = Fixture::new(&[(10 * COIN, 2 * COIN), (10 * COIN, COIN)]);
  let before = fx.snapshot();
  let ranking_before = fx.store.top_votes(10);
  assert_eq!(ranking_before[0].0.regid, genesis_regid(0));

  let tx = vote(
    &fx.wallets[0],
    genesis_regid(0),
    vec![
      CandidateVote::add(genesis_regid(1), 3 * COIN),
      CandidateVote::minus(genesis_regid(0), COIN),
    ],
    FEE,
    10,
  );
  let undo = fx.run(&tx, 10, 1)?.undo;

  let ranking = fx.store.top_votes(10);
  assert_eq!(ranking[0].0.regid, genesis_regid(1));
  assert_eq!(ranking[0].1, 4 * COIN);
  assert_eq!(fx.account(genesis_regid(0)).total_bcoins()?, 10 * COIN - FEE);

  fx.undo(&tx, &undo)?;
  assert_eq!(fx.snapshot(), before);
  assert_eq!(fx.store.top_votes(10), ranking_before);
  Ok(())
}
