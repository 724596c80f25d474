use judge_core::config::AppConfig;
use judge_core::worker_registry::WorkerRegistry;

/// Administrative worker-registry CLI:
///   worker-ctl list
///   worker-ctl cleanup
///   worker-ctl cleanup-stale
///   worker-ctl info <worker_name>
#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt::init();

  let config = AppConfig::from_env()?;
  let registry = WorkerRegistry::new(&config.redis_url(), config.redis_prefix.clone())?;

  let args: Vec<String> = std::env::args().collect();
  let command = args.get(1).map(String::as_str).unwrap_or("");

  match command {
    "list" => {
      let workers = registry.list_workers(config.worker_stale_seconds).await?;
      if workers.is_empty() {
        println!("No workers found");
      } else {
        println!("Found {} worker(s):", workers.len());
        for w in workers {
          let status = if w.is_stale { "STALE" } else { "ACTIVE" };
          println!("  - {} ({status})", w.name);
        }
      }
    }
    "cleanup" => {
      let cleaned = registry.cleanup_all().await?;
      println!("Cleaned up {cleaned} worker(s)");
    }
    "cleanup-stale" => {
      let cleaned = registry.reap_stale(config.worker_stale_seconds).await?;
      println!("Cleaned up {cleaned} stale worker(s)");
    }
    "info" => {
      let name = args.get(2).expect("usage: worker-ctl info <worker_name>");
      let workers = registry.list_workers(config.worker_stale_seconds).await?;
      match workers.into_iter().find(|w| &w.name == name) {
        Some(w) => {
          println!("Worker: {}", w.name);
          println!("  Active: {}", !w.is_stale);
          println!("  Heartbeat: {}", w.heartbeat);
        }
        None => println!("Worker '{name}' not found"),
      }
    }
    _ => {
      println!("Usage:");
      println!("  worker-ctl list");
      println!("  worker-ctl cleanup");
      println!("  worker-ctl cleanup-stale");
      println!("  worker-ctl info <worker_name>");
      std::process::exit(1);
    }
  }

  Ok(())
}
