//! ARCA City
//!
//! Headless driver for the city simulation: runs frames, logs events as
//! JSONL, prints ASCII frames, and manages the local agent registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use parking_lot::RwLock;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use city_chat::{
    CannedDialogue, ChatService, DialogueGenerator, LlmClient, LlmDialogue, SessionConfig,
};
use city_core::{
    create_world, spawn_agents, spawn_registered, write_snapshot, CityConfig, CityError,
    CityRunner, EventLogger,
};
use city_events::{FrameStamp, SimEvent};
use city_registry::{
    cull_lowest_reputation, generate_address, submit_game_score, AgentRegistry, InMemoryRegistry,
    Ledger, LedgerWallet, SharedRegistry, TaxPolicy, TaxScheduler, CULL_THRESHOLD,
};

const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "arca_city")]
#[command(about = "Agents wandering a small city and talking to each other")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the simulation
    Run(RunArgs),
    /// Register a new agent in the local registry
    Register {
        #[arg(long, default_value = "output/registry.json")]
        registry: PathBuf,
        #[arg(long)]
        name: String,
        /// Owner address; a fresh one is generated if omitted
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 100)]
        stake: u64,
    },
    /// Submit an arcade score and update the agent's reputation
    Score {
        #[arg(long, default_value = "output/registry.json")]
        registry: PathBuf,
        #[arg(long)]
        agent: u32,
        #[arg(long)]
        score: u32,
        /// Also write the reputation event to this JSONL file
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Kill the lowest-reputation agent if it has fallen below the threshold
    Cull {
        #[arg(long, default_value = "output/registry.json")]
        registry: PathBuf,
        #[arg(long, default_value_t = CULL_THRESHOLD)]
        threshold: u8,
    },
    /// Send one chat message to an agent
    Chat {
        #[arg(long, default_value = "output/registry.json")]
        registry: PathBuf,
        #[arg(long)]
        agent: u32,
        #[arg(long)]
        message: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default configuration as TOML
    Config,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Number of frames to simulate
    #[arg(long, default_value_t = 3000)]
    frames: u64,

    /// Simulated milliseconds per frame
    #[arg(long)]
    frame_ms: Option<u64>,

    #[arg(long)]
    config: Option<PathBuf>,

    /// JSONL event log
    #[arg(long, default_value = "output/events.jsonl")]
    events: PathBuf,

    /// Final snapshot
    #[arg(long, default_value = "output/snapshot.json")]
    snapshot: PathBuf,

    /// Print an ASCII frame every N frames (0 = never)
    #[arg(long, default_value_t = 0)]
    ascii_every: u64,

    /// Pace frames to wall-clock time
    #[arg(long)]
    realtime: bool,

    /// Spawn the live agents of this registry instead of the default population
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Collect tax from registry agents every N milliseconds (0 = off)
    #[arg(long, default_value_t = 0)]
    tax_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), CityError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Register {
            registry,
            name,
            owner,
            stake,
        } => register(&registry, &name, owner, stake),
        Command::Score {
            registry,
            agent,
            score: points,
            events,
        } => submit_score(&registry, agent, points, events.as_deref()),
        Command::Cull {
            registry,
            threshold,
        } => cull(&registry, threshold),
        Command::Chat {
            registry,
            agent,
            message,
            config,
        } => chat(&registry, agent, &message, config.as_deref()).await,
        Command::Config => {
            print!("{}", CityConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CityConfig, CityError> {
    match path {
        Some(path) => Ok(CityConfig::from_file(path)?),
        None => Ok(CityConfig::default()),
    }
}

fn ensure_parent(path: &Path) -> Result<(), CityError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<(), CityError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(frame_ms) = args.frame_ms {
        config.simulation.frame_ms = frame_ms;
    }
    config.validate()?;

    let client = LlmClient::from_config(&config.llm, std::env::var(API_KEY_VAR).ok());
    if client.is_available() {
        tracing::info!(model = %config.llm.model, "Generating dialogue with the hosted model");
        simulate(args, config, LlmDialogue::new(client)).await
    } else {
        tracing::info!("{} not set, using canned dialogue", API_KEY_VAR);
        simulate(args, config, CannedDialogue).await
    }
}

async fn simulate<G: DialogueGenerator>(
    args: RunArgs,
    config: CityConfig,
    generator: G,
) -> Result<(), CityError> {
    ensure_parent(&args.events)?;
    ensure_parent(&args.snapshot)?;

    tracing::info!(
        seed = config.simulation.seed,
        frames = args.frames,
        frame_ms = config.simulation.frame_ms,
        "Starting simulation"
    );

    let logger = EventLogger::new(&args.events)?;
    let mut world = create_world(&config, logger);

    let mut tax = None;
    match &args.registry {
        Some(path) => {
            let registry = InMemoryRegistry::load_or_default(path)?;
            spawn_registered(&mut world, registry.records());
            if args.tax_interval_ms > 0 {
                tax = Some(TaxRun::start(path, registry, args.tax_interval_ms));
            }
        }
        None => {
            spawn_agents(&mut world, &config.spawn);
        }
    }

    let mut runner = CityRunner::from_world(world, generator);
    let started = Instant::now();

    let mut ticker = args.realtime.then(|| {
        let mut ticker = tokio::time::interval(Duration::from_millis(config.simulation.frame_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    for frame in 1..=args.frames {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }
        runner.step();
        // let dialogue and tax tasks make progress between frames
        tokio::task::yield_now().await;

        if let Some(tax) = tax.as_mut() {
            tax.refresh_if_due();
        }

        if args.ascii_every > 0 && frame % args.ascii_every == 0 {
            println!("{}", runner.clock().stamp());
            print!("{}", runner.render().to_ascii());
        }
    }

    // apply any dialogue still in flight before the final snapshot
    runner.settle().await;
    runner.step();

    let snapshot = runner.snapshot();
    write_snapshot(&snapshot, &args.snapshot)?;

    if let Some(tax) = tax {
        tax.finish();
    }

    tracing::info!(
        frames = snapshot.stamp.frame,
        conversations = snapshot.conversations.len(),
        interacting = snapshot.interacting_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Simulation complete"
    );
    Ok(())
}

/// Tax collection for a registry-driven run.
///
/// The registry file is re-read every collection interval so agents culled
/// by another `arca_city cull` stop paying and newly registered ones start.
struct TaxRun {
    path: PathBuf,
    registry: SharedRegistry,
    ledger: Arc<Ledger>,
    scheduler: TaxScheduler,
    interval: Duration,
    last_sync: Instant,
}

impl TaxRun {
    fn start(path: &Path, registry: InMemoryRegistry, interval_ms: u64) -> Self {
        let mut rng = SmallRng::from_entropy();
        let ledger = Ledger::shared();
        let interval = Duration::from_millis(interval_ms);
        let policy = TaxPolicy {
            amount: 1,
            interval,
            treasury: generate_address(&mut rng),
        };

        let registry: SharedRegistry = Arc::new(RwLock::new(registry));
        let scheduler =
            TaxScheduler::new(policy, Arc::clone(&ledger)).watching(Arc::clone(&registry));
        let mut run = Self {
            path: path.to_path_buf(),
            registry,
            ledger,
            scheduler,
            interval,
            last_sync: Instant::now(),
        };
        run.sync();
        tracing::info!(
            agents = run.scheduler.running().len(),
            treasury = %run.scheduler.policy().treasury,
            "Tax collection started"
        );
        run
    }

    fn refresh_if_due(&mut self) {
        if self.last_sync.elapsed() < self.interval {
            return;
        }
        self.last_sync = Instant::now();
        match InMemoryRegistry::load(&self.path) {
            Ok(latest) => {
                *self.registry.write() = latest;
                self.sync();
            }
            Err(e) => tracing::warn!(error = %e, "Could not reload registry"),
        }
    }

    /// Fund and start newly live agents, stop dead ones
    fn sync(&mut self) {
        let before = self.scheduler.running();
        let registry = self.registry.read();
        self.scheduler.sync_with(&*registry);

        for id in self.scheduler.running() {
            if before.contains(&id) {
                continue;
            }
            if let Ok(record) = registry.agent(id) {
                if let Err(e) = self.ledger.mint(&record.address, record.stake) {
                    tracing::warn!(agent_id = id, error = %e, "Could not fund agent wallet");
                }
            }
        }
    }

    fn finish(mut self) {
        self.scheduler.stop_all();
        let registry = self.registry.read();
        for record in registry.records() {
            tracing::info!(
                agent_id = record.id,
                alive = record.alive,
                balance = self.ledger.balance(&record.address),
                "Agent wallet"
            );
        }
        tracing::info!(
            treasury = %self.scheduler.policy().treasury,
            collected = self.scheduler.treasury_balance(),
            "Tax collection finished"
        );
    }
}

fn register(
    path: &Path,
    name: &str,
    owner: Option<String>,
    stake: u64,
) -> Result<(), CityError> {
    let mut rng = SmallRng::from_entropy();
    let mut registry = InMemoryRegistry::load_or_default(path)?;
    let owner = owner.unwrap_or_else(|| generate_address(&mut rng));
    let address = generate_address(&mut rng);

    let id = registry.create_agent(name, &owner, &address, stake)?;
    ensure_parent(path)?;
    registry.save(path)?;

    println!("Registered agent {} ({}) with wallet {}", id, name, address);
    Ok(())
}

fn submit_score(
    path: &Path,
    agent: u32,
    score: u32,
    events: Option<&Path>,
) -> Result<(), CityError> {
    let mut registry = InMemoryRegistry::load(path)?;
    let change = submit_game_score(&mut registry, agent, score)?;
    registry.save(path)?;

    if let Some(events) = events {
        ensure_parent(events)?;
        let mut logger = EventLogger::new(events)?;
        logger.log(&SimEvent::new(
            city_events::generate_event_id(1),
            FrameStamp::new(0, 0),
            change.to_event(),
        ))?;
        logger.flush()?;
    }

    println!(
        "Agent {} reputation {} -> {} (score {})",
        agent, change.previous, change.current, score
    );
    Ok(())
}

fn cull(path: &Path, threshold: u8) -> Result<(), CityError> {
    let mut registry = InMemoryRegistry::load(path)?;
    match cull_lowest_reputation(&mut registry, threshold)? {
        Some(id) => {
            registry.save(path)?;
            println!("Agent {} was removed from the city", id);
        }
        None => println!("No agent below reputation {}", threshold),
    }
    Ok(())
}

async fn chat(
    path: &Path,
    agent: u32,
    message: &str,
    config: Option<&Path>,
) -> Result<(), CityError> {
    let config = load_config(config)?;
    let registry = InMemoryRegistry::load(path)?;
    let record = registry.agent(agent)?;

    let ledger = Ledger::shared();
    ledger.mint(&record.address, record.stake)?;
    let wallet = LedgerWallet::new(record.address.clone(), ledger);

    let client = LlmClient::from_config(&config.llm, std::env::var(API_KEY_VAR).ok());
    let mut service = ChatService::new(client, SessionConfig::default());

    match service.handle_message(&record.name, &wallet, message).await {
        Ok(response) => {
            println!("{}: {}", record.name, response.message);
            println!("{}", serde_json::to_string_pretty(&response.outcome)?);
        }
        Err(e) => {
            tracing::warn!(agent_id = agent, error = %e, "Chat failed");
            println!("{} is not answering right now.", record.name);
        }
    }
    Ok(())
}
