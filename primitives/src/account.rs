use {
  crate::{
    codec::{self, write_seq, write_varint, Decode, Encode, Reader},
    id::{read_optional_pubkey, write_optional_pubkey},
    params::{FUND_MAX_MONEY, MAX_MONEY, REGID_MATURE_PERIOD},
    Hash256,
    KeyId,
    NickId,
    PubKey,
    RegId,
    UserId,
  },
  once_cell::sync::OnceCell,
  serde::{Deserialize, Serialize},
  thiserror::Error,
};

const MAX_ENCODED_CANDIDATES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("Account has an empty key id")]
  EmptyKeyId,

  #[error("Amount {0} is outside of the valid money range")]
  InvalidAmount(u64),

  #[error("Insufficient funds: balance {balance}, required {required}")]
  InsufficientFunds { balance: u64, required: u64 },

  #[error("Balance would exceed the maximum money supply")]
  MoneyOverflow,

  #[error("Vote at height {current} is older than last vote at {last}")]
  VoteHeightRegression { current: u32, last: u32 },

  #[error("Votes total {votes} exceeds the {available} base coins available")]
  DelegateVoteExceedsBalance { votes: u64, available: u64 },

  #[error("No existing vote for candidate {0} to revoke")]
  UnknownVoteCandidate(UserId),

  #[error("Revoking {revoke} exceeds the {voted} votes cast for {candidate}")]
  VoteRevokeExceedsCast {
    candidate: UserId,
    voted: u64,
    revoke: u64,
  },

  #[error("Account already votes for the maximum of {0} candidates")]
  TooManyCandidates(u32),

  #[error("Revoking {revoke} exceeds the {received} votes received")]
  ReceivedVotesUnderflow { received: u64, revoke: u64 },

  #[error("Undo log of {log} applied to account {account}")]
  LogMismatch { log: KeyId, account: KeyId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoinType {
  /// Base coin, the only coin that can be voted.
  Base,
  Stable,
  Fund,
}

impl CoinType {
  pub fn max_money(self) -> u64 {
    match self {
      CoinType::Base | CoinType::Stable => MAX_MONEY,
      CoinType::Fund => FUND_MAX_MONEY,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceOp {
  Add,
  Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteOp {
  Add = 1,
  Minus = 2,
}

impl VoteOp {
  pub fn balance_op(self) -> BalanceOp {
    match self {
      VoteOp::Add => BalanceOp::Add,
      VoteOp::Minus => BalanceOp::Minus,
    }
  }
}

/// A vote cast by an account toward a delegate candidate.
///
/// Inside a transaction `op` says whether the amount is added to or
/// revoked from the candidate. Inside an account's vote list entries
/// are always `Add` and hold the current total cast for the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateVote {
  pub op: VoteOp,
  pub candidate: UserId,
  pub amount: u64,
}

impl CandidateVote {
  pub fn add(candidate: impl Into<UserId>, amount: u64) -> Self {
    Self {
      op: VoteOp::Add,
      candidate: candidate.into(),
      amount,
    }
  }

  pub fn minus(candidate: impl Into<UserId>, amount: u64) -> Self {
    Self {
      op: VoteOp::Minus,
      candidate: candidate.into(),
      amount,
    }
  }
}

impl Encode for CandidateVote {
  fn encode(&self, out: &mut Vec<u8>) {
    out.push(self.op as u8);
    self.candidate.encode(out);
    write_varint(out, self.amount);
  }
}

impl Decode for CandidateVote {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, codec::Error> {
    let op = match reader.byte()? {
      1 => VoteOp::Add,
      2 => VoteOp::Minus,
      other => {
        return Err(codec::Error::Invalid("vote type", other.to_string()))
      }
    };
    Ok(Self {
      op,
      candidate: UserId::decode(reader)?,
      amount: reader.varint()?,
    })
  }
}

/// Ledger account.
///
/// Invariant: `bcoins + sum(candidate_votes.amount)` is the total base
/// coin holding of the account. Casting or revoking votes moves coins
/// between the free balance and the vote list without changing that sum.
///
/// The content hash is cached on first use. The mutating methods reset
/// it, direct field writes on an account that was already hashed do not.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Account {
  pub key_id: KeyId,
  pub regid: RegId,
  pub nick_id: NickId,
  pub owner_pubkey: Option<PubKey>,
  pub miner_pubkey: Option<PubKey>,

  /// Free base coins, not counting coins locked in votes.
  pub bcoins: u64,
  pub scoins: u64,
  pub fcoins: u64,

  /// Votes cast toward this account by others.
  pub received_votes: u64,

  /// Votes this account cast toward others, sorted descending by amount.
  pub candidate_votes: Vec<CandidateVote>,

  pub last_vote_height: u32,
  pub has_open_cdp: bool,

  #[serde(skip)]
  hash_cache: OnceCell<Hash256>,
}

impl Account {
  pub fn new(key_id: KeyId) -> Self {
    Self {
      key_id,
      ..Default::default()
    }
  }

  /// Content hash over the canonical encoding.
  pub fn hash(&self) -> Hash256 {
    *self.hash_cache.get_or_init(|| Hash256::of(self))
  }

  /// True when the owner key is present and hashes to this account's key id.
  pub fn is_registered(&self) -> bool {
    match &self.owner_pubkey {
      Some(key) => key.key_id() == self.key_id,
      None => false,
    }
  }

  /// True for an account that carries no state beyond its key id.
  pub fn is_blank(&self) -> bool {
    *self == Self::new(self.key_id)
  }

  pub fn regid_is_mature(&self, tip_height: u32) -> bool {
    self.regid.is_mature(tip_height)
  }

  pub fn balance(&self, coin: CoinType) -> u64 {
    match coin {
      CoinType::Base => self.bcoins,
      CoinType::Stable => self.scoins,
      CoinType::Fund => self.fcoins,
    }
  }

  fn balance_mut(&mut self, coin: CoinType) -> &mut u64 {
    match coin {
      CoinType::Base => &mut self.bcoins,
      CoinType::Stable => &mut self.scoins,
      CoinType::Fund => &mut self.fcoins,
    }
  }

  /// Base coins currently locked in votes.
  pub fn voted_bcoins(&self) -> Result<u64, Error> {
    sum_votes(&self.candidate_votes)
  }

  /// Free plus voted base coins.
  pub fn total_bcoins(&self) -> Result<u64, Error> {
    self
      .bcoins
      .checked_add(self.voted_bcoins()?)
      .ok_or(Error::MoneyOverflow)
  }

  /// Adds to or subtracts from one of the coin balances.
  ///
  /// A zero amount is a successful no-op. The resulting balance must stay
  /// within `[0, coin.max_money()]`.
  pub fn operate_balance(
    &mut self,
    coin: CoinType,
    op: BalanceOp,
    amount: u64,
  ) -> Result<(), Error> {
    if self.key_id.is_empty() {
      return Err(Error::EmptyKeyId);
    }
    if amount == 0 {
      return Ok(());
    }
    let max = coin.max_money();
    if amount > max {
      return Err(Error::InvalidAmount(amount));
    }

    self.hash_cache = OnceCell::new();
    let balance = self.balance_mut(coin);
    *balance = match op {
      BalanceOp::Add => balance
        .checked_add(amount)
        .filter(|sum| *sum <= max)
        .ok_or(Error::MoneyOverflow)?,
      BalanceOp::Minus => {
        balance
          .checked_sub(amount)
          .ok_or(Error::InsufficientFunds {
            balance: *balance,
            required: amount,
          })?
      }
    };
    Ok(())
  }

  /// Applies a batch of votes cast by this account.
  ///
  /// Candidates are matched by exact `UserId`, so callers normalize them
  /// to a single identity kind beforehand. The account is left untouched
  /// when any vote in the batch fails.
  pub fn process_delegate_vote(
    &mut self,
    votes: &[CandidateVote],
    current_height: u32,
    max_candidates: u32,
  ) -> Result<(), Error> {
    if current_height < self.last_vote_height {
      return Err(Error::VoteHeightRegression {
        current: current_height,
        last: self.last_vote_height,
      });
    }

    let total = self.total_bcoins()?;
    let mut list = self.candidate_votes.clone();

    for vote in votes {
      let existing = list.iter().position(|v| v.candidate == vote.candidate);
      match vote.op {
        VoteOp::Add => match existing {
          Some(i) => {
            list[i].amount = list[i]
              .amount
              .checked_add(vote.amount)
              .filter(|sum| *sum <= MAX_MONEY)
              .ok_or(Error::MoneyOverflow)?;
          }
          None => {
            if list.len() >= max_candidates as usize {
              return Err(Error::TooManyCandidates(max_candidates));
            }
            list.push(CandidateVote::add(vote.candidate.clone(), vote.amount));
          }
        },
        VoteOp::Minus => {
          let i = existing.ok_or_else(|| {
            Error::UnknownVoteCandidate(vote.candidate.clone())
          })?;
          let remaining = list[i].amount.checked_sub(vote.amount).ok_or_else(
            || Error::VoteRevokeExceedsCast {
              candidate: vote.candidate.clone(),
              voted: list[i].amount,
              revoke: vote.amount,
            },
          )?;
          if remaining == 0 {
            list.remove(i);
          } else {
            list[i].amount = remaining;
          }
        }
      }
    }

    // stable sort keeps equal amounts in insertion order
    list.sort_by(|a, b| b.amount.cmp(&a.amount));

    let voted = sum_votes(&list)?;
    let free = total.checked_sub(voted).ok_or(
      Error::DelegateVoteExceedsBalance {
        votes: voted,
        available: total,
      },
    )?;

    self.hash_cache = OnceCell::new();
    self.candidate_votes = list;
    self.bcoins = free;
    self.last_vote_height = current_height;
    Ok(())
  }

  /// Adjusts the votes received by this account as a candidate.
  pub fn operate_vote(&mut self, op: VoteOp, amount: u64) -> Result<(), Error> {
    self.hash_cache = OnceCell::new();
    self.received_votes = match op {
      VoteOp::Add => self
        .received_votes
        .checked_add(amount)
        .filter(|sum| *sum <= MAX_MONEY)
        .ok_or(Error::MoneyOverflow)?,
      VoteOp::Minus => self.received_votes.checked_sub(amount).ok_or(
        Error::ReceivedVotesUnderflow {
          received: self.received_votes,
          revoke: amount,
        },
      )?,
    };
    Ok(())
  }

  /// Restores every mutable field from a snapshot taken before a mutation.
  pub fn undo_operate_account(
    &mut self,
    log: &AccountLog,
  ) -> Result<(), Error> {
    if log.key_id != self.key_id {
      return Err(Error::LogMismatch {
        log: log.key_id,
        account: self.key_id,
      });
    }
    *self = log.clone().into();
    Ok(())
  }
}

impl Clone for Account {
  fn clone(&self) -> Self {
    Self {
      key_id: self.key_id,
      regid: self.regid,
      nick_id: self.nick_id.clone(),
      owner_pubkey: self.owner_pubkey,
      miner_pubkey: self.miner_pubkey,
      bcoins: self.bcoins,
      scoins: self.scoins,
      fcoins: self.fcoins,
      received_votes: self.received_votes,
      candidate_votes: self.candidate_votes.clone(),
      last_vote_height: self.last_vote_height,
      has_open_cdp: self.has_open_cdp,
      hash_cache: OnceCell::new(),
    }
  }
}

impl PartialEq for Account {
  fn eq(&self, other: &Self) -> bool {
    self.to_bytes() == other.to_bytes()
  }
}

impl Eq for Account {}

fn sum_votes(votes: &[CandidateVote]) -> Result<u64, Error> {
  votes.iter().try_fold(0u64, |acc, vote| {
    acc.checked_add(vote.amount).ok_or(Error::MoneyOverflow)
  })
}

impl Encode for Account {
  fn encode(&self, out: &mut Vec<u8>) {
    self.key_id.encode(out);
    self.regid.encode(out);
    self.nick_id.encode(out);
    write_optional_pubkey(out, &self.owner_pubkey);
    write_optional_pubkey(out, &self.miner_pubkey);
    write_varint(out, self.bcoins);
    write_varint(out, self.scoins);
    write_varint(out, self.fcoins);
    write_varint(out, self.received_votes);
    write_seq(out, &self.candidate_votes);
    write_varint(out, self.last_vote_height as u64);
    out.push(self.has_open_cdp as u8);
  }
}

impl Decode for Account {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, codec::Error> {
    Ok(Self {
      key_id: KeyId::decode(reader)?,
      regid: RegId::decode(reader)?,
      nick_id: NickId::decode(reader)?,
      owner_pubkey: read_optional_pubkey(reader)?,
      miner_pubkey: read_optional_pubkey(reader)?,
      bcoins: reader.varint()?,
      scoins: reader.varint()?,
      fcoins: reader.varint()?,
      received_votes: reader.varint()?,
      candidate_votes: reader.seq(MAX_ENCODED_CANDIDATES)?,
      last_vote_height: reader.varint_u32()?,
      has_open_cdp: match reader.byte()? {
        0 => false,
        1 => true,
        other => {
          return Err(codec::Error::Invalid("bool", other.to_string()))
        }
      },
      hash_cache: OnceCell::new(),
    })
  }
}

/// Snapshot of an account taken right before it is mutated.
///
/// Applying it with [`Account::undo_operate_account`] reverses exactly
/// the mutation that followed the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLog {
  pub key_id: KeyId,
  pub regid: RegId,
  pub nick_id: NickId,
  pub owner_pubkey: Option<PubKey>,
  pub miner_pubkey: Option<PubKey>,
  pub bcoins: u64,
  pub scoins: u64,
  pub fcoins: u64,
  pub received_votes: u64,
  pub candidate_votes: Vec<CandidateVote>,
  pub last_vote_height: u32,
  pub has_open_cdp: bool,
}

impl From<&Account> for AccountLog {
  fn from(account: &Account) -> Self {
    Self {
      key_id: account.key_id,
      regid: account.regid,
      nick_id: account.nick_id.clone(),
      owner_pubkey: account.owner_pubkey,
      miner_pubkey: account.miner_pubkey,
      bcoins: account.bcoins,
      scoins: account.scoins,
      fcoins: account.fcoins,
      received_votes: account.received_votes,
      candidate_votes: account.candidate_votes.clone(),
      last_vote_height: account.last_vote_height,
      has_open_cdp: account.has_open_cdp,
    }
  }
}

impl From<AccountLog> for Account {
  fn from(log: AccountLog) -> Self {
    Self {
      key_id: log.key_id,
      regid: log.regid,
      nick_id: log.nick_id,
      owner_pubkey: log.owner_pubkey,
      miner_pubkey: log.miner_pubkey,
      bcoins: log.bcoins,
      scoins: log.scoins,
      fcoins: log.fcoins,
      received_votes: log.received_votes,
      candidate_votes: log.candidate_votes,
      last_vote_height: log.last_vote_height,
      has_open_cdp: log.has_open_cdp,
      hash_cache: OnceCell::new(),
    }
  }
}

impl RegId {
  /// Genesis ids are always mature, others once more than
  /// [`REGID_MATURE_PERIOD`] blocks sit on top of the registration.
  pub fn is_mature(&self, tip_height: u32) -> bool {
    if self.is_empty() {
      return false;
    }
    self.height() == 0
      || tip_height.saturating_sub(self.height()) > REGID_MATURE_PERIOD
  }
}
