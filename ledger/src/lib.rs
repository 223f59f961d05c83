mod error;
mod execution;
mod genesis;
mod overlay;
mod state;
mod tx;

pub mod fuel;
pub mod runtime;

pub use {
  error::{Corruption, Error, ErrorKind},
  execution::{
    check_tx,
    execute_tx,
    undo_block,
    undo_execute_tx,
    Executed,
    TxContext,
  },
  genesis::{genesis_state, GenesisAccount},
  overlay::Overlay,
  runtime::{ContractRuntime, NullRuntime},
  state::{InMemoryStateStore, State, StateDiff, TxPosition, VoteKey},
};
