use {
  crate::{
    runtime::ContractRuntime,
    state::TxPosition,
    tx::{self, Spent},
    Corruption,
    Error,
    Overlay,
    State,
    StateDiff,
  },
  dpos_primitives::{
    params::{INIT_TX_VERSION, MAX_BLOCK_SIGNATURE_SIZE, MAX_MONEY},
    Account,
    AccountLog,
    Block,
    BlockUndo,
    DbKey,
    KeyId,
    Params,
    PubKey,
    RegId,
    Transaction,
    TxType,
    TxUndo,
  },
  tracing::{debug, trace},
};

/// Where in the chain a transaction is being checked or executed.
#[derive(Clone, Copy)]
pub struct TxContext<'a> {
  /// Height of the block that will contain the transaction.
  pub height: u32,

  /// Position of the transaction inside that block.
  pub index: u32,

  /// Block timestamp, seconds since the unix epoch.
  pub time: u32,

  pub fuel_rate: u64,
  pub params: &'a Params,
  pub runtime: &'a dyn ContractRuntime,
}

impl TxContext<'_> {
  /// RegId assigned to accounts created by the transaction at this
  /// position. Positions past the 16 bit regid index cannot create one.
  pub fn new_regid(&self) -> Result<RegId, Error> {
    let index = u16::try_from(self.index)
      .map_err(|_| Error::TxIndexOutOfRange(self.index))?;
    Ok(RegId::new(self.height, index))
  }
}

/// Result of a successful [`execute_tx`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
  pub undo: TxUndo,
  pub run_step: u64,
  pub fuel: u64,
}

/// Records every mutation a transaction makes so it can be undone.
///
/// All account writes go through [`Journal::update`], which snapshots the
/// account before handing it out. Auxiliary store writes go through
/// [`Journal::write_db`].
pub(crate) struct Journal<'a> {
  view: Overlay<'a>,
  undo: TxUndo,
}

impl<'a> Journal<'a> {
  fn new(base: &'a dyn State, undo: TxUndo) -> Self {
    Self {
      view: Overlay::new(base),
      undo,
    }
  }

  pub fn view(&self) -> &Overlay<'a> {
    &self.view
  }

  /// Loads an account, creating a blank one when missing, and stores the
  /// result of `op` on it.
  pub fn update<F>(&mut self, key_id: &KeyId, op: F) -> Result<(), Error>
  where
    F: FnOnce(&mut Account) -> Result<(), Error>,
  {
    let mut account = self
      .view
      .account(key_id)
      .unwrap_or_else(|| Account::new(*key_id));
    let log = AccountLog::from(&account);
    op(&mut account)?;
    self.undo.account_logs.push(log);
    self.view.set_account(account);
    Ok(())
  }

  pub fn write_db(&mut self, key: DbKey, value: Option<Vec<u8>>) {
    let log = self.view.set_db(key, value);
    self.undo.db_logs.push(log);
  }

  fn finish(self) -> (StateDiff, TxUndo) {
    (self.view.into_diff(), self.undo)
  }
}

/// Validates a transaction against a read-only ledger view.
///
/// Never mutates state. A transaction that passes may still fail to
/// execute on a different view, for example after a conflicting spend.
pub fn check_tx(
  tx: &Transaction,
  state: &dyn State,
  ctx: &TxContext<'_>,
) -> Result<(), Error> {
  if tx.version() != INIT_TX_VERSION {
    return Err(Error::Version(tx.version()));
  }

  if !tx.is_block_reward() {
    check_valid_height(tx.valid_height(), ctx)?;
    check_fee(tx.tx_type(), tx.fee(), ctx)?;
    check_signature_size(tx.signature())?;
  }

  let signer = match tx {
    Transaction::BlockReward(tx) => {
      tx::reward::check(tx, state, ctx)?;
      None
    }
    Transaction::AccountRegister(tx) => Some(tx::register::check(tx, state)?),
    Transaction::BcoinTransfer(tx) => Some(tx::transfer::check(tx, state)?),
    Transaction::ContractInvoke(tx) => {
      Some(tx::contract::check_invoke(tx, state, ctx)?)
    }
    Transaction::ContractDeploy(tx) => {
      Some(tx::contract::check_deploy(tx, state, ctx)?)
    }
    Transaction::DelegateVote(tx) => Some(tx::vote::check(tx, state, ctx)?),
  };

  match signer {
    Some(key) => verify_signature(tx, &key),
    None => Ok(()),
  }
}

/// Applies a transaction on top of `overlay`.
///
/// Either every effect of the transaction lands in the overlay or, on
/// error, none does. The returned undo record reverses the effects with
/// [`undo_execute_tx`].
pub fn execute_tx(
  tx: &Transaction,
  overlay: &mut Overlay<'_>,
  ctx: &TxContext<'_>,
) -> Result<Executed, Error> {
  let hash = tx.hash();
  if overlay.tx_position(&hash).is_some() {
    return Err(Error::DuplicateTx(hash));
  }

  let mut journal = Journal::new(&*overlay, TxUndo::new(hash));
  let spent = match tx {
    Transaction::BlockReward(tx) => tx::reward::execute(tx, &mut journal, ctx),
    Transaction::AccountRegister(tx) => {
      tx::register::execute(tx, &mut journal, ctx)
    }
    Transaction::BcoinTransfer(tx) => {
      tx::transfer::execute(tx, &mut journal, ctx)
    }
    Transaction::ContractInvoke(tx) => {
      tx::contract::execute_invoke(tx, &mut journal, ctx)
    }
    Transaction::ContractDeploy(tx) => {
      tx::contract::execute_deploy(tx, &mut journal, ctx)
    }
    Transaction::DelegateVote(tx) => tx::vote::execute(tx, &mut journal, ctx),
  };

  let Spent { run_step, fuel } = match spent {
    Ok(spent) => spent,
    Err(e) => {
      debug!("transaction {hash} failed at height {}: {e}", ctx.height);
      return Err(e);
    }
  };

  let (diff, undo) = journal.finish();
  overlay.apply(diff);
  overlay.set_tx_position(hash, TxPosition {
    height: ctx.height,
    index: ctx.index,
  });

  trace!(
    "executed {:?} {hash} at {}:{}, steps {run_step}, fuel {fuel}",
    tx.tx_type(),
    ctx.height,
    ctx.index
  );

  Ok(Executed {
    undo,
    run_step,
    fuel,
  })
}

/// Reverses a transaction previously applied with [`execute_tx`].
///
/// Account snapshots and auxiliary store logs are replayed back to
/// front, then the transaction leaves the tx index. Any inconsistency
/// between the undo record and the ledger is reported as corruption.
pub fn undo_execute_tx(
  tx: &Transaction,
  undo: &TxUndo,
  overlay: &mut Overlay<'_>,
) -> Result<(), Corruption> {
  let hash = tx.hash();
  if undo.tx_hash != hash {
    return Err(Corruption::TxMismatch {
      expected: hash,
      found: undo.tx_hash,
    });
  }

  for log in undo.account_logs.iter().rev() {
    let account = match overlay.account(&log.key_id) {
      Some(mut account) => {
        account.undo_operate_account(log)?;
        account
      }
      // blank accounts are never stored
      None if Account::from(log.clone()).is_blank() => continue,
      None => return Err(Corruption::MissingAccount(log.key_id)),
    };
    overlay.set_account(account);
  }

  for log in undo.db_logs.iter().rev() {
    overlay.set_db(log.key.clone(), log.previous.clone());
  }

  if overlay.tx_position(&hash).is_none() {
    return Err(Corruption::MissingTx(hash));
  }
  overlay.erase_tx_position(&hash);
  Ok(())
}

/// Reverses every transaction of a block, last one first.
pub fn undo_block(
  block: &Block,
  undo: &BlockUndo,
  overlay: &mut Overlay<'_>,
) -> Result<(), Corruption> {
  if undo.block_hash != *block.hash() {
    return Err(Corruption::BlockMismatch {
      expected: *block.hash(),
      found: undo.block_hash,
    });
  }
  if undo.txs.len() != block.transactions().len() {
    return Err(Corruption::BlockUndoMismatch {
      expected: block.transactions().len(),
      found: undo.txs.len(),
    });
  }
  for (tx, tx_undo) in block.transactions().iter().zip(&undo.txs).rev() {
    undo_execute_tx(tx, tx_undo, overlay)?;
  }
  Ok(())
}

fn check_valid_height(valid: u32, ctx: &TxContext<'_>) -> Result<(), Error> {
  if valid.abs_diff(ctx.height) > ctx.params.tx_cache_height / 2 {
    return Err(Error::InvalidHeight {
      valid,
      current: ctx.height,
    });
  }
  Ok(())
}

fn check_fee(
  tx_type: TxType,
  fee: u64,
  ctx: &TxContext<'_>,
) -> Result<(), Error> {
  if fee > MAX_MONEY {
    return Err(Error::MoneyRange(fee));
  }
  let min = ctx.params.min_fee(tx_type);
  if fee < min {
    return Err(Error::FeeTooLow { fee, min });
  }
  Ok(())
}

fn check_signature_size(signature: &[u8]) -> Result<(), Error> {
  if signature.is_empty() || signature.len() > MAX_BLOCK_SIGNATURE_SIZE {
    return Err(Error::SignatureSize(signature.len()));
  }
  Ok(())
}

fn verify_signature(tx: &Transaction, key: &PubKey) -> Result<(), Error> {
  match key.verify(&tx.signature_hash(), tx.signature()) {
    true => Ok(()),
    false => Err(Error::BadSignature),
  }
}
