use {
  crate::{
    codec::{self, write_bytes, write_seq, write_varint, Decode, Encode, Reader},
    id::sign,
    params::MAX_TX_SIZE,
    CandidateVote,
    Hash256,
    UserId,
  },
  secp256k1::SecretKey,
  serde::{Deserialize, Serialize},
};

const MAX_ENCODED_VOTES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
  BlockReward = 1,
  AccountRegister = 2,
  BcoinTransfer = 3,
  ContractInvoke = 4,
  ContractDeploy = 5,
  DelegateVote = 6,
}

impl TryFrom<u8> for TxType {
  type Error = codec::Error;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Ok(match value {
      1 => TxType::BlockReward,
      2 => TxType::AccountRegister,
      3 => TxType::BcoinTransfer,
      4 => TxType::ContractInvoke,
      5 => TxType::ContractDeploy,
      6 => TxType::DelegateVote,
      other => return Err(codec::Error::UnknownTxType(other)),
    })
  }
}

/// Credits the block producer. Always the first transaction of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRewardTx {
  pub version: u32,
  pub valid_height: u32,
  pub uid: UserId,
  pub reward: u64,
}

/// Binds a public key to a freshly assigned RegId.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRegisterTx {
  pub version: u32,
  pub valid_height: u32,
  pub uid: UserId,
  pub miner_uid: UserId,
  pub fee: u64,
  pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BcoinTransferTx {
  pub version: u32,
  pub valid_height: u32,
  pub uid: UserId,
  pub to_uid: UserId,
  pub fee: u64,
  pub amount: u64,
  pub memo: Vec<u8>,
  pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInvokeTx {
  pub version: u32,
  pub valid_height: u32,
  pub uid: UserId,
  pub app_uid: UserId,
  pub fee: u64,
  pub amount: u64,
  pub arguments: Vec<u8>,
  pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDeployTx {
  pub version: u32,
  pub valid_height: u32,
  pub uid: UserId,
  pub script: Vec<u8>,
  pub fee: u64,
  pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateVoteTx {
  pub version: u32,
  pub valid_height: u32,
  pub uid: UserId,
  pub votes: Vec<CandidateVote>,
  pub fee: u64,
  pub signature: Vec<u8>,
}

/// A ledger transaction.
///
/// The identity of a transaction is the hash of its full encoding;
/// the signature covers the same encoding minus the signature itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
  BlockReward(BlockRewardTx),
  AccountRegister(AccountRegisterTx),
  BcoinTransfer(BcoinTransferTx),
  ContractInvoke(ContractInvokeTx),
  ContractDeploy(ContractDeployTx),
  DelegateVote(DelegateVoteTx),
}

impl Transaction {
  pub fn tx_type(&self) -> TxType {
    match self {
      Transaction::BlockReward(_) => TxType::BlockReward,
      Transaction::AccountRegister(_) => TxType::AccountRegister,
      Transaction::BcoinTransfer(_) => TxType::BcoinTransfer,
      Transaction::ContractInvoke(_) => TxType::ContractInvoke,
      Transaction::ContractDeploy(_) => TxType::ContractDeploy,
      Transaction::DelegateVote(_) => TxType::DelegateVote,
    }
  }

  pub fn version(&self) -> u32 {
    match self {
      Transaction::BlockReward(tx) => tx.version,
      Transaction::AccountRegister(tx) => tx.version,
      Transaction::BcoinTransfer(tx) => tx.version,
      Transaction::ContractInvoke(tx) => tx.version,
      Transaction::ContractDeploy(tx) => tx.version,
      Transaction::DelegateVote(tx) => tx.version,
    }
  }

  pub fn valid_height(&self) -> u32 {
    match self {
      Transaction::BlockReward(tx) => tx.valid_height,
      Transaction::AccountRegister(tx) => tx.valid_height,
      Transaction::BcoinTransfer(tx) => tx.valid_height,
      Transaction::ContractInvoke(tx) => tx.valid_height,
      Transaction::ContractDeploy(tx) => tx.valid_height,
      Transaction::DelegateVote(tx) => tx.valid_height,
    }
  }

  /// The account that authorizes and pays for the transaction.
  pub fn uid(&self) -> &UserId {
    match self {
      Transaction::BlockReward(tx) => &tx.uid,
      Transaction::AccountRegister(tx) => &tx.uid,
      Transaction::BcoinTransfer(tx) => &tx.uid,
      Transaction::ContractInvoke(tx) => &tx.uid,
      Transaction::ContractDeploy(tx) => &tx.uid,
      Transaction::DelegateVote(tx) => &tx.uid,
    }
  }

  pub fn fee(&self) -> u64 {
    match self {
      Transaction::BlockReward(_) => 0,
      Transaction::AccountRegister(tx) => tx.fee,
      Transaction::BcoinTransfer(tx) => tx.fee,
      Transaction::ContractInvoke(tx) => tx.fee,
      Transaction::ContractDeploy(tx) => tx.fee,
      Transaction::DelegateVote(tx) => tx.fee,
    }
  }

  pub fn signature(&self) -> &[u8] {
    match self {
      Transaction::BlockReward(_) => &[],
      Transaction::AccountRegister(tx) => &tx.signature,
      Transaction::BcoinTransfer(tx) => &tx.signature,
      Transaction::ContractInvoke(tx) => &tx.signature,
      Transaction::ContractDeploy(tx) => &tx.signature,
      Transaction::DelegateVote(tx) => &tx.signature,
    }
  }

  fn signature_mut(&mut self) -> Option<&mut Vec<u8>> {
    match self {
      Transaction::BlockReward(_) => None,
      Transaction::AccountRegister(tx) => Some(&mut tx.signature),
      Transaction::BcoinTransfer(tx) => Some(&mut tx.signature),
      Transaction::ContractInvoke(tx) => Some(&mut tx.signature),
      Transaction::ContractDeploy(tx) => Some(&mut tx.signature),
      Transaction::DelegateVote(tx) => Some(&mut tx.signature),
    }
  }

  pub fn is_block_reward(&self) -> bool {
    matches!(self, Transaction::BlockReward(_))
  }

  /// Transaction identity.
  pub fn hash(&self) -> Hash256 {
    Hash256::of(self)
  }

  /// The digest signed by the sender.
  pub fn signature_hash(&self) -> Hash256 {
    let mut out = Vec::new();
    self.encode_fields(&mut out, false);
    Hash256::digest(&out)
  }

  /// Signs the transaction in place. Block rewards carry no signature.
  pub fn sign(&mut self, secret: &SecretKey) {
    let signature = sign(secret, &self.signature_hash());
    if let Some(slot) = self.signature_mut() {
      *slot = signature;
    }
  }

  /// Fee left after burning `fuel`, per 1000 bytes of serialized size.
  /// Orders transactions in the mempool and in produced blocks.
  pub fn fee_per_kb(&self, fuel: u64) -> u64 {
    let size = self.encoded_len().max(1) as u128;
    (self.fee().saturating_sub(fuel) as u128 * 1000 / size) as u64
  }

  fn encode_fields(&self, out: &mut Vec<u8>, with_signature: bool) {
    out.push(self.tx_type() as u8);
    write_varint(out, self.version() as u64);
    write_varint(out, self.valid_height() as u64);
    match self {
      Transaction::BlockReward(tx) => {
        tx.uid.encode(out);
        write_varint(out, tx.reward);
      }
      Transaction::AccountRegister(tx) => {
        tx.uid.encode(out);
        tx.miner_uid.encode(out);
        write_varint(out, tx.fee);
      }
      Transaction::BcoinTransfer(tx) => {
        tx.uid.encode(out);
        tx.to_uid.encode(out);
        write_varint(out, tx.fee);
        write_varint(out, tx.amount);
        write_bytes(out, &tx.memo);
      }
      Transaction::ContractInvoke(tx) => {
        tx.uid.encode(out);
        tx.app_uid.encode(out);
        write_varint(out, tx.fee);
        write_varint(out, tx.amount);
        write_bytes(out, &tx.arguments);
      }
      Transaction::ContractDeploy(tx) => {
        tx.uid.encode(out);
        write_bytes(out, &tx.script);
        write_varint(out, tx.fee);
      }
      Transaction::DelegateVote(tx) => {
        tx.uid.encode(out);
        write_seq(out, &tx.votes);
        write_varint(out, tx.fee);
      }
    }
    if with_signature && !self.is_block_reward() {
      write_bytes(out, self.signature());
    }
  }
}

impl Encode for Transaction {
  fn encode(&self, out: &mut Vec<u8>) {
    self.encode_fields(out, true);
  }
}

impl Decode for Transaction {
  fn decode(reader: &mut Reader<'_>) -> Result<Self, codec::Error> {
    let tx_type = TxType::try_from(reader.byte()?)?;
    let version = reader.varint_u32()?;
    let valid_height = reader.varint_u32()?;
    let uid = UserId::decode(reader)?;

    Ok(match tx_type {
      TxType::BlockReward => Transaction::BlockReward(BlockRewardTx {
        version,
        valid_height,
        uid,
        reward: reader.varint()?,
      }),
      TxType::AccountRegister => {
        Transaction::AccountRegister(AccountRegisterTx {
          version,
          valid_height,
          uid,
          miner_uid: UserId::decode(reader)?,
          fee: reader.varint()?,
          signature: reader.bytes(MAX_TX_SIZE)?,
        })
      }
      TxType::BcoinTransfer => Transaction::BcoinTransfer(BcoinTransferTx {
        version,
        valid_height,
        uid,
        to_uid: UserId::decode(reader)?,
        fee: reader.varint()?,
        amount: reader.varint()?,
        memo: reader.bytes(MAX_TX_SIZE)?,
        signature: reader.bytes(MAX_TX_SIZE)?,
      }),
      TxType::ContractInvoke => Transaction::ContractInvoke(ContractInvokeTx {
        version,
        valid_height,
        uid,
        app_uid: UserId::decode(reader)?,
        fee: reader.varint()?,
        amount: reader.varint()?,
        arguments: reader.bytes(MAX_TX_SIZE)?,
        signature: reader.bytes(MAX_TX_SIZE)?,
      }),
      TxType::ContractDeploy => Transaction::ContractDeploy(ContractDeployTx {
        version,
        valid_height,
        uid,
        script: reader.bytes(MAX_TX_SIZE)?,
        fee: reader.varint()?,
        signature: reader.bytes(MAX_TX_SIZE)?,
      }),
      TxType::DelegateVote => Transaction::DelegateVote(DelegateVoteTx {
        version,
        valid_height,
        uid,
        votes: reader.seq(MAX_ENCODED_VOTES)?,
        fee: reader.varint()?,
        signature: reader.bytes(MAX_TX_SIZE)?,
      }),
    })
  }
}
