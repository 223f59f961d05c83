mod chain;
mod error;
mod fuel_rate;
mod producer;
mod validator;

pub mod schedule;

pub use {
  chain::{genesis_block, Chain},
  error::Error,
  fuel_rate::next_fuel_rate,
  producer::create_new_block,
  schedule::{
    current_delegate,
    get_delegates,
    shuffle_delegates,
    slot_delegate,
  },
  validator::{verify_block, VerifiedBlock},
};
