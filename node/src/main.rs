use {
  crate::{node::Node, settings::SystemSettings},
  clap::Parser,
  dpos_primitives::{codec::Decode, Transaction},
  parking_lot::Mutex,
  std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    time::{interval, MissedTickBehavior},
  },
  tracing::{info, subscriber::set_global_default, warn},
  tracing_subscriber::{EnvFilter, FmtSubscriber},
};

mod mempool;
mod node;
mod producer;
mod settings;
mod storage;

fn submit_line(node: &mut Node, line: &str) -> anyhow::Result<()> {
  let tx = Transaction::from_bytes(&hex::decode(line.trim())?)?;
  let hash = node.submit(tx)?;
  info!("accepted transaction {hash}");
  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // configure logging, RUST_LOG overrides the default level
  set_global_default(
    FmtSubscriber::builder()
      .with_env_filter(
        EnvFilter::try_from_default_env()
          .unwrap_or_else(|_| EnvFilter::new("info")),
      )
      .finish(),
  )?;

  // gather CLI parameters
  let settings = SystemSettings::parse();
  info!("startup params: {:?}", settings.params());
  info!("data directory: {:?}", settings.data_dir());

  let mut node = Node::open(&settings)?;
  for _ in 0..settings.rollback() {
    let block = node.disconnect_tip()?;
    info!("disconnected block {} at {}", block.hash(), block.height());
  }
  let node = Arc::new(Mutex::new(node));
  let stop = Arc::new(AtomicBool::new(false));
  let producer = match settings.secret()? {
    Some(secret) => {
      Some(producer::spawn(Arc::clone(&node), secret, Arc::clone(&stop))?)
    }
    None => {
      info!("no producer secret given, following the chain only");
      None
    }
  };

  let mut status = interval(settings.status_interval());
  status.set_missed_tick_behavior(MissedTickBehavior::Skip);

  let mut lines = BufReader::new(stdin()).lines();
  let mut stdin_open = true;

  let shutdown = tokio::signal::ctrl_c();
  tokio::pin!(shutdown);

  loop {
    tokio::select! {
      _ = status.tick() => {
        let node = node.lock();
        info!(
          "height {} tip {} mempool {}",
          node.chain().height(),
          node.chain().tip().hash(),
          node.mempool_len()
        );
      }
      line = lines.next_line(), if stdin_open => {
        match line? {
          Some(line) if line.trim().is_empty() => {}
          Some(line) => {
            if let Err(e) = submit_line(&mut node.lock(), &line) {
              warn!("rejected transaction: {e}");
            }
          }
          None => stdin_open = false,
        }
      }
      _ = &mut shutdown => {
        info!("shutting down at height {}", node.lock().chain().height());
        break;
      }
    }
  }

  stop.store(true, Ordering::Relaxed);
  if let Some(handle) = producer {
    if handle.join().is_err() {
      warn!("producer thread panicked");
    }
  }
  Ok(())
}
