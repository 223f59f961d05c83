use {
  crate::State,
  dpos_primitives::{KeyId, RegId, UserId},
  thiserror::Error,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("Run step budget of {limit} exhausted")]
  OutOfSteps { limit: u64 },

  #[error("Contract aborted: {0}")]
  Aborted(String),
}

/// A single contract call handed to the runtime.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
  pub app: RegId,
  pub caller: KeyId,
  /// Base coins sent along with the call, already credited to the app.
  pub amount: u64,
  pub arguments: &'a [u8],
  pub script: &'a [u8],
  pub step_limit: u64,
  pub height: u32,
}

/// Effects of a successful contract call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
  pub run_step: u64,

  /// Writes to the contract's own data, `None` deletes the key.
  pub writes: Vec<(Vec<u8>, Option<Vec<u8>>)>,

  /// Base coins paid out of the contract account.
  pub transfers: Vec<(UserId, u64)>,
}

/// The contract virtual machine.
///
/// The ledger only meters and applies what the runtime reports. A
/// runtime must be deterministic: the same invocation against the same
/// state always yields the same outcome.
pub trait ContractRuntime: Send + Sync {
  fn invoke(
    &self,
    call: &Invocation<'_>,
    state: &dyn State,
  ) -> Result<Outcome, Error>;
}

/// Runtime that accepts every call without touching state.
///
/// One run step is charged per byte of script and arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRuntime;

impl ContractRuntime for NullRuntime {
  fn invoke(
    &self,
    call: &Invocation<'_>,
    _state: &dyn State,
  ) -> Result<Outcome, Error> {
    let run_step = (call.script.len() + call.arguments.len()) as u64;
    if run_step > call.step_limit {
      return Err(Error::OutOfSteps {
        limit: call.step_limit,
      });
    }
    Ok(Outcome {
      run_step,
      ..Default::default()
    })
  }
}
