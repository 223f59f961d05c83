use {
  crate::node::Node,
  dpos_primitives::{Hash256, KeyId, PubKey, SecretKey},
  parking_lot::Mutex,
  std::{
    io,
    sync::{
      atomic::{AtomicBool, Ordering},
      Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, SystemTime, UNIX_EPOCH},
  },
  tracing::{debug, info, warn},
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn unix_now() -> u32 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs() as u32)
    .unwrap_or_default()
}

/// Produces blocks for one delegate key whenever its slot comes up.
pub struct Producer {
  secret: SecretKey,
  key_id: KeyId,
  tip: Option<Hash256>,
  last_slot: Option<u64>,
}

impl Producer {
  pub fn new(secret: SecretKey) -> Self {
    Self {
      key_id: PubKey::from_secret(&secret).key_id(),
      secret,
      tip: None,
      last_slot: None,
    }
  }

  /// One polling step. Produces at most one block per slot and only when
  /// the slot at `now` belongs to this delegate and lies after the tip.
  pub fn tick(&mut self, node: &mut Node, now: u32) -> Option<Hash256> {
    let tip = *node.chain().tip().hash();
    if self.tip != Some(tip) {
      if self.tip.is_some() {
        debug!("tip moved to {tip}, waiting for the next slot");
      }
      self.tip = Some(tip);
    }

    let spacing = node.chain().params().block_spacing_secs();
    let slot = now as u64 / spacing;
    if self.last_slot == Some(slot) || now <= node.chain().tip().time() {
      return None;
    }

    let regid = node.regid_of(&self.key_id)?;
    if node.slot_delegate(now) != Some(regid) {
      return None;
    }
    self.last_slot = Some(slot);

    match node.produce(regid, now, &self.secret) {
      Ok(hash) => {
        info!(
          "produced block {hash} at height {} as {regid}",
          node.chain().height()
        );
        self.tip = Some(hash);
        Some(hash)
      }
      Err(e) => {
        warn!("block production in slot {slot} failed: {e}");
        None
      }
    }
  }
}

/// Runs the producer on its own thread until `stop` is raised.
///
/// The node lock is only held for a single polling step, so the chain can
/// advance between steps. Every step starts from the current tip.
pub fn spawn(
  node: Arc<Mutex<Node>>,
  secret: SecretKey,
  stop: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
  thread::Builder::new()
    .name("producer".into())
    .spawn(move || {
      let mut producer = Producer::new(secret);
      info!("producing blocks for {}", producer.key_id);
      while !stop.load(Ordering::Relaxed) {
        producer.tick(&mut node.lock(), unix_now());
        thread::sleep(POLL_INTERVAL);
      }
      debug!("producer stopped");
    })
}
