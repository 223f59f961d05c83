mod account;
mod block;
mod hash;
mod id;
mod transaction;
mod undo;

pub mod codec;
pub mod params;

pub use {
  account::{
    Account,
    AccountLog,
    BalanceOp,
    CandidateVote,
    CoinType,
    Error as AccountError,
    VoteOp,
  },
  block::{Block, BlockHeader},
  hash::{merkle_root, Hash256},
  id::{sign, KeyId, NickId, PubKey, RegId, UserId, NICKID_MAX_LEN},
  params::Params,
  secp256k1::SecretKey,
  transaction::{
    AccountRegisterTx,
    BcoinTransferTx,
    BlockRewardTx,
    ContractDeployTx,
    ContractInvokeTx,
    DelegateVoteTx,
    Transaction,
    TxType,
  },
  undo::{BlockUndo, DbKey, DbOpLog, TxUndo},
};
