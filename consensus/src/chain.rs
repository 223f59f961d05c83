use {
  crate::{fuel_rate::next_fuel_rate, validator::verify_block, Error},
  dpos_ledger::{undo_block, ContractRuntime, Overlay, State},
  dpos_primitives::{
    params::{INIT_BLOCK_VERSION, INIT_FUEL_RATE},
    Block,
    BlockHeader,
    BlockUndo,
    Hash256,
    Params,
  },
  tracing::{debug, info, warn},
};

/// The first block of a network. It has no transactions, the genesis
/// accounts are seeded directly into the ledger.
pub fn genesis_block(time: u32) -> Block {
  let mut block = Block::new(
    BlockHeader {
      version: INIT_BLOCK_VERSION,
      prev_hash: Hash256::zero(),
      merkle_root: Hash256::zero(),
      time,
      nonce: 0,
      height: 0,
      fuel: 0,
      fuel_rate: INIT_FUEL_RATE,
      signature: vec![],
    },
    vec![],
  );
  let root = block.compute_merkle_root();
  block.header_mut().merkle_root = root;
  block
}

/// The active chain of blocks along with the undo records needed to
/// roll the ledger back one block at a time.
///
/// The chain does not own the ledger, every operation that changes it
/// takes the state it is applied to. Both must always describe the
/// same tip.
#[derive(Debug)]
pub struct Chain {
  blocks: Vec<Block>,
  undos: Vec<BlockUndo>,
  params: Params,
}

impl Chain {
  pub fn new(genesis: Block, params: Params) -> Self {
    let undo = BlockUndo {
      block_hash: *genesis.hash(),
      txs: vec![],
    };
    Self {
      blocks: vec![genesis],
      undos: vec![undo],
      params,
    }
  }

  /// Rebuilds a chain from persisted blocks and their undo records,
  /// genesis first. Returns `None` if the two lists do not line up.
  pub fn restore(
    blocks: Vec<Block>,
    undos: Vec<BlockUndo>,
    params: Params,
  ) -> Option<Self> {
    if blocks.is_empty() || blocks.len() != undos.len() {
      return None;
    }
    let linked = blocks
      .iter()
      .zip(&undos)
      .enumerate()
      .all(|(height, (block, undo))| {
        block.height() as usize == height
          && undo.block_hash == *block.hash()
          && (height == 0
            || block.header().prev_hash == *blocks[height - 1].hash())
      });
    linked.then(|| Self {
      blocks,
      undos,
      params,
    })
  }

  pub fn params(&self) -> &Params {
    &self.params
  }

  pub fn tip(&self) -> &Block {
    // never empty, genesis is always present
    &self.blocks[self.blocks.len() - 1]
  }

  pub fn height(&self) -> u32 {
    self.tip().height()
  }

  /// Undo record of the tip.
  pub fn tip_undo(&self) -> &BlockUndo {
    &self.undos[self.undos.len() - 1]
  }

  pub fn genesis(&self) -> &Block {
    &self.blocks[0]
  }

  pub fn block(&self, height: u32) -> Option<&Block> {
    self.blocks.get(height as usize)
  }

  pub fn undo(&self, height: u32) -> Option<&BlockUndo> {
    self.undos.get(height as usize)
  }

  pub fn blocks(&self) -> &[Block] {
    &self.blocks
  }

  /// Fuel rate the next block on top of the tip must carry.
  pub fn next_fuel_rate(&self) -> u64 {
    next_fuel_rate(&self.blocks, &self.params)
  }

  /// Verifies `block` against the tip and, on success, applies its
  /// effects to `state` and makes it the new tip.
  ///
  /// On error neither the chain nor the state change.
  pub fn connect_block(
    &mut self,
    block: Block,
    state: &mut dyn State,
    runtime: &dyn ContractRuntime,
  ) -> Result<&Block, Error> {
    let verified = match verify_block(&block, self, &*state, runtime) {
      Ok(verified) => verified,
      Err(e) => {
        debug!(
          "rejected block {} at height {}: {e}",
          block.hash(),
          block.height()
        );
        return Err(e);
      }
    };

    state.apply(verified.diff);
    info!(
      "connected block {} at height {} with {} transactions, fees {}, \
       fuel {}, steps {}",
      block.hash(),
      block.height(),
      block.transactions().len(),
      verified.fees,
      verified.fuel,
      verified.run_step
    );

    self.blocks.push(block);
    self.undos.push(verified.undo);
    Ok(self.tip())
  }

  /// Rolls the tip back, reverting its effects on `state`.
  ///
  /// Undo records that do not match the ledger indicate corruption and
  /// leave both the chain and the state untouched.
  pub fn disconnect_tip(
    &mut self,
    state: &mut dyn State,
  ) -> Result<Block, Error> {
    if self.blocks.len() == 1 {
      return Err(Error::DisconnectGenesis);
    }

    let diff = {
      let undo = &self.undos[self.undos.len() - 1];
      let mut overlay = Overlay::new(&*state);
      if let Err(e) = undo_block(self.tip(), undo, &mut overlay) {
        warn!("cannot undo block {}: {e}", self.tip().hash());
        return Err(e.into());
      }
      overlay.into_diff()
    };
    state.apply(diff);

    self.undos.pop();
    let block = self.blocks.pop().ok_or(Error::DisconnectGenesis)?;
    info!(
      "disconnected block {} at height {}",
      block.hash(),
      block.height()
    );
    Ok(block)
  }
}
