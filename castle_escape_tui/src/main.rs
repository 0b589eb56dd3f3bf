use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use castle_escape_core::{
    GRID_SIZE, GuardId,
    agent::{Agent, FightWhenPossible, GreedyAgent, RandomWalker},
    config::{EstimationConfig, EvaluationConfig, TrainingConfig},
    environment::CastleEscape,
    evaluation::evaluate_policy,
    monte_carlo,
    observer::NoopObserver,
    q_learning::{QLearningTrainer, QTable, SavedQTable, TrainingMetadata},
};
use clap::{Parser, Subcommand, ValueEnum};
use rand::{SeedableRng, rngs::StdRng};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod ui;

#[derive(Parser, Debug)]
#[command(version, about = "Escape the castle: simulate, estimate and learn", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate the odds of beating each guard by Monte Carlo simulation
    Estimate {
        /// JSON file with base settings
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(short, long)]
        episodes: Option<usize>,
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Learn a Q-table and save it
    Train {
        /// JSON file with base settings
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(short, long)]
        episodes: Option<usize>,
        /// Discount factor
        #[arg(long)]
        gamma: Option<f64>,
        /// Initial exploration rate
        #[arg(long)]
        epsilon: Option<f64>,
        /// Per-episode exploration decay
        #[arg(long)]
        decay_rate: Option<f64>,
        #[arg(short, long)]
        seed: Option<u64>,
        /// Where to write the trained table
        #[arg(short, long, value_name = "FILE", default_value = "q_table.json")]
        output: PathBuf,
    },
    /// Measure how well a policy escapes
    Evaluate {
        /// JSON file with base settings
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Trained table for the greedy policy
        #[arg(short, long, value_name = "FILE")]
        table: Option<PathBuf>,
        /// Policy to evaluate (greedy when a table is given, fight otherwise)
        #[arg(short, long, value_enum)]
        policy: Option<Policy>,
        #[arg(short, long)]
        episodes: Option<usize>,
        #[arg(short, long)]
        seed: Option<u64>,
        /// Abandon episodes after this many steps
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Watch a policy play one episode in the terminal
    Play {
        /// Trained table for the greedy policy
        #[arg(short, long, value_name = "FILE")]
        table: Option<PathBuf>,
        /// Policy to watch (greedy when a table is given, fight otherwise)
        #[arg(short, long, value_enum)]
        policy: Option<Policy>,
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        /// Stop the replay after this many steps
        #[arg(long, default_value_t = 200)]
        max_steps: usize,
        /// Milliseconds between steps
        #[arg(long, default_value_t = 250)]
        tick_ms: u64,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    Greedy,
    Fight,
    Random,
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("castle_escape_core=info,castle_escape_tui=info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    match args.command {
        Command::Estimate {
            config,
            episodes,
            seed,
        } => {
            init_logging()?;
            let mut config = match config {
                Some(path) => EstimationConfig::from_json_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => EstimationConfig::default(),
            };
            config.episodes = episodes.unwrap_or(config.episodes);
            config.seed = seed.unwrap_or(config.seed);
            estimate(&config)
        }
        Command::Train {
            config,
            episodes,
            gamma,
            epsilon,
            decay_rate,
            seed,
            output,
        } => {
            init_logging()?;
            let mut config = match config {
                Some(path) => TrainingConfig::from_json_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => TrainingConfig::default(),
            };
            config.episodes = episodes.unwrap_or(config.episodes);
            config.gamma = gamma.unwrap_or(config.gamma);
            config.epsilon = epsilon.unwrap_or(config.epsilon);
            config.decay_rate = decay_rate.unwrap_or(config.decay_rate);
            config.seed = seed.unwrap_or(config.seed);
            train(config, &output)
        }
        Command::Evaluate {
            config,
            table,
            policy,
            episodes,
            seed,
            max_steps,
        } => {
            init_logging()?;
            let mut config = match config {
                Some(path) => EvaluationConfig::from_json_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => EvaluationConfig::default(),
            };
            config.episodes = episodes.unwrap_or(config.episodes);
            config.seed = seed.unwrap_or(config.seed);
            config.max_steps = max_steps.unwrap_or(config.max_steps);
            config.validate()?;
            let table = table.as_deref().map(load_table).transpose()?;
            let mut agent = build_agent(policy, table.as_ref())?;
            evaluate(agent.as_mut(), &config)
        }
        Command::Play {
            table,
            policy,
            seed,
            max_steps,
            tick_ms,
        } => {
            // The terminal belongs to the replay, so logging stays off.
            let table = table.as_deref().map(load_table).transpose()?;
            let agent = build_agent(policy, table.as_ref())?;
            let mut app = ui::App::new(agent, seed, max_steps);
            ui::run(&mut app, tick_ms)
        }
    }
}

fn load_table(path: &Path) -> Result<QTable> {
    let saved = SavedQTable::load_from_file(path)
        .with_context(|| format!("loading Q-table from {}", path.display()))?;
    Ok(saved.into_table())
}

fn build_agent<'a>(
    policy: Option<Policy>,
    table: Option<&'a QTable>,
) -> Result<Box<dyn Agent + 'a>> {
    let policy = policy.unwrap_or(if table.is_some() {
        Policy::Greedy
    } else {
        Policy::Fight
    });
    Ok(match policy {
        Policy::Greedy => {
            let table = table.context("the greedy policy needs a trained table (--table)")?;
            Box::new(GreedyAgent::new(table))
        }
        Policy::Fight => Box::new(FightWhenPossible),
        Policy::Random => Box::new(RandomWalker),
    })
}

fn estimate(config: &EstimationConfig) -> Result<()> {
    let mut env = CastleEscape::new();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let estimate = monte_carlo::estimate(&mut env, config.episodes, &mut rng);

    println!("guard  fights      wins   P(victory)");
    for guard in GuardId::ALL {
        let probability = estimate
            .probability(guard)
            .map_or_else(|| "-".to_string(), |p| format!("{p:.4}"));
        println!(
            "{:<5} {:>7} {:>9}   {}",
            guard,
            estimate.fights[guard.index()],
            estimate.wins[guard.index()],
            probability
        );
    }
    Ok(())
}

fn train(config: TrainingConfig, output: &Path) -> Result<()> {
    let mut trainer = QLearningTrainer::new(config.clone())?;
    let mut env = CastleEscape::new();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let report = trainer.train(&mut env, &mut rng, &mut NoopObserver);

    let saved = SavedQTable::new(trainer.into_table(), TrainingMetadata { config, report });
    saved
        .save_to_file(output)
        .with_context(|| format!("saving Q-table to {}", output.display()))?;
    info!(path = %output.display(), states = report.states, "saved Q-table");

    println!(
        "trained {} episodes: {} goals, {} defeats, {} states, final epsilon {:.4}",
        report.episodes, report.goals, report.defeats, report.states, report.final_epsilon
    );
    Ok(())
}

fn evaluate(agent: &mut dyn Agent, config: &EvaluationConfig) -> Result<()> {
    let mut env = CastleEscape::new();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let report = evaluate_policy(&mut env, agent, config, &mut rng);

    println!("policy:       {}", report.policy);
    println!("episodes:     {}", report.episodes);
    println!("mean reward:  {:.2}", report.mean_reward);
    println!("mean steps:   {:.2}", report.mean_steps);
    println!("goal rate:    {:.4}", report.goal_rate());
    println!("defeat rate:  {:.4}", report.defeat_rate());
    println!("truncated:    {}", report.truncated);
    println!("room visits:");
    for row in 0..GRID_SIZE {
        let cells: Vec<String> = report
            .visits
            .row(row)
            .iter()
            .map(|count| format!("{count:>8}"))
            .collect();
        println!("{}", cells.join(""));
    }
    Ok(())
}
