use cwlearn::agents::{FIXED_POLICY, PolicyRegistry};
use cwlearn::metrics::RunSummary;
use cwlearn::reward::{RewardKind, RewardPolicy, RewardWeights};
use cwlearn::simulation::{ExperimentConfig, Scenario, run_experiment};
use cwlearn::warmup::WarmupConfig;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(author, version, about = "Bandit-driven contention window tuning for ns-3 WiFi scenarios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one experiment
    Run(RunArgs),

    /// Repeat an experiment for each cheater count
    Sweep {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,6,7,8,9,10")]
        cheaters_list: Vec<u32>,
        /// Prefix of the generated CSV names
        #[arg(long, default_value = "SEED4_COLISION")]
        prefix: String,
    },

    List,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[arg(long, default_value = "scenario_mgr_multi_agent")]
    scenario: String,
    #[arg(short, long, default_value = "UCB")]
    agent: String,
    #[arg(long, default_value = ".")]
    ns3_path: PathBuf,
    #[arg(long, default_value_t = 4)]
    seed: u64,
    #[arg(long, default_value_t = cwlearn::simulation::config::MEMPOOL_KEY)]
    mempool_key: i32,
    /// Shared memory pool size in bytes (scenario default when omitted)
    #[arg(long)]
    mem_size: Option<usize>,
    #[arg(long)]
    quiet: bool,

    // scenario
    #[arg(long, default_value_t = 10)]
    cheaters: u32,
    #[arg(long, default_value_t = 1)]
    agent_number: u32,
    #[arg(long, default_value_t = 100)]
    data_rate: u32,
    #[arg(long, default_value_t = 100)]
    max_queue_size: u32,
    #[arg(long, default_value_t = 0.5)]
    inter_packet_interval: f64,
    #[arg(long, default_value_t = 11)]
    mcs: u32,
    #[arg(long, default_value = "thr.txt")]
    thr_path: String,

    // ns-3
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    ampdu: bool,
    #[arg(long, default_value_t = 20)]
    channel_width: u32,
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    cw: i32,
    #[arg(long, default_value_t = 10.0)]
    distance: f64,
    #[arg(long, default_value = "flowmon.xml")]
    flowmon_path: String,
    #[arg(long, default_value_t = 5.0)]
    fuzz_time: f64,
    #[arg(long, default_value_t = 0.5)]
    interaction_time: f64,
    #[arg(long)]
    n_wifi: Option<u32>,
    #[arg(long, default_value_t = 1500)]
    packet_size: u32,
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    rts_cts: bool,
    #[arg(long)]
    simulation_time: Option<f64>,
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long)]
    csv_log_path: Option<String>,

    // reward
    /// weighted or collision (scenario default when omitted)
    #[arg(long)]
    reward: Option<String>,
    #[arg(long, default_value_t = 0.0)]
    massive: f64,
    #[arg(long, default_value_t = 1.0)]
    throughput: f64,
    #[arg(long, default_value_t = 0.0)]
    urllc: f64,
    #[arg(long, default_value_t = 0.0)]
    collision: f64,

    // warm-up
    #[arg(long)]
    use_warmup: bool,
    #[arg(long, default_value_t = 50.0)]
    max_warmup: f64,

    // hyperparameters
    #[arg(long)]
    epsilon: Option<f64>,
    #[arg(long)]
    ucb_c: Option<f64>,
    #[arg(long)]
    ts_alpha: Option<f64>,
    #[arg(long)]
    ts_beta: Option<f64>,
    #[arg(long)]
    ts_mu: Option<f64>,
    #[arg(long)]
    ts_lam: Option<f64>,
}

impl RunArgs {
    fn to_config(&self) -> Result<ExperimentConfig> {
        let scenario = match self.scenario.parse::<Scenario>()? {
            Scenario::Centralized { .. } => Scenario::Centralized {
                data_rate: self.data_rate,
                max_queue_size: self.max_queue_size,
                agent_number: self.agent_number,
            },
            Scenario::MultiAgent { .. } => Scenario::MultiAgent {
                data_rate: self.data_rate,
                max_queue_size: self.max_queue_size,
                cheater_number: self.cheaters,
            },
            Scenario::Adhoc { .. } => Scenario::Adhoc {
                inter_packet_interval: self.inter_packet_interval,
                mcs: self.mcs,
                thr_path: self.thr_path.clone(),
            },
        };

        let mut config = ExperimentConfig::for_scenario(scenario)
            .with_agent(self.agent.clone())
            .with_seed(self.seed)
            .with_warmup(WarmupConfig {
                enabled: self.use_warmup,
                max_time: self.max_warmup,
                ..WarmupConfig::default()
            });

        let wifi = &mut config.wifi;
        wifi.ampdu = self.ampdu;
        wifi.channel_width = self.channel_width;
        wifi.cw = self.cw;
        wifi.distance = self.distance;
        wifi.flowmon_path = self.flowmon_path.clone();
        wifi.fuzz_time = self.fuzz_time;
        wifi.interaction_time = self.interaction_time;
        wifi.packet_size = self.packet_size;
        wifi.rts_cts = self.rts_cts;
        if let Some(n_wifi) = self.n_wifi {
            wifi.n_wifi = n_wifi;
        }
        if let Some(time) = self.simulation_time {
            wifi.simulation_time = time;
        }

        let default_csv = format!("{}_{}_{}.csv", config.scenario.program(), self.agent, self.data_rate);
        let csv_path = self.csv_path.clone().unwrap_or(default_csv);
        let csv_log_path = self.csv_log_path.clone().unwrap_or_else(|| format!("log_{}", csv_path));
        config = config.with_csv_paths(csv_path, csv_log_path);

        if let Some(kind) = &self.reward {
            config.reward = match kind.parse::<RewardKind>()? {
                RewardKind::Weighted => RewardPolicy::Weighted(RewardWeights {
                    fairness: self.massive,
                    throughput: self.throughput,
                    latency: self.urllc,
                    collision: self.collision,
                }),
                RewardKind::Collision => RewardPolicy::CollisionOnly,
            };
        } else if let RewardPolicy::Weighted(_) = config.reward {
            config.reward = RewardPolicy::Weighted(RewardWeights {
                fairness: self.massive,
                throughput: self.throughput,
                latency: self.urllc,
                collision: self.collision,
            });
        }

        let params = &mut config.agent_params;
        if let Some(e) = self.epsilon {
            params.egreedy.e = e;
        }
        if let Some(c) = self.ucb_c {
            params.ucb.c = c;
        }
        if let Some(alpha) = self.ts_alpha {
            params.thompson.alpha = alpha;
        }
        if let Some(beta) = self.ts_beta {
            params.thompson.beta = beta;
        }
        if let Some(mu) = self.ts_mu {
            params.thompson.mu = mu;
        }
        if let Some(lam) = self.ts_lam {
            params.thompson.lam = lam;
        }

        if let Some(size) = self.mem_size {
            config.mem_size = size;
        }
        config.mempool_key = self.mempool_key;
        config.ns3_path = self.ns3_path.clone();
        config.show_output = !self.quiet;
        config.name = config.wifi.csv_path.trim_end_matches(".csv").to_string();

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let program_start = Instant::now();

    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current step and cleaning up");
            token.cancel();
        }
    });

    match cli.command {
        Commands::Run(args) => {
            let config = args.to_config()?;
            let summary = run_experiment(config, cancel).await?;
            report(&summary);
        }

        Commands::Sweep {
            run,
            cheaters_list,
            prefix,
        } => {
            sweep(run, cheaters_list, prefix, cancel, program_start).await?;
        }

        Commands::List => {
            println!("\nAvailable agents");

            for name in PolicyRegistry::global().list() {
                println!("  - {}", name);
            }
            println!("  - {} (simulator default, no learning)", FIXED_POLICY);

            println!("\nUsage: cwlearn run --agent <name> --ns3-path <ns-3 directory>");
            println!("Example: cwlearn run --agent ucb --cheaters 5\n");
        }
    }

    let total_time = program_start.elapsed();
    info!("Total runtime: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

async fn sweep(
    run: RunArgs,
    cheaters_list: Vec<u32>,
    prefix: String,
    cancel: CancellationToken,
    global_start: Instant,
) -> Result<()> {
    if run.scenario.parse::<Scenario>()?.program() != "scenario_mgr_multi_agent" {
        anyhow::bail!("Sweeps vary the cheater count and need scenario_mgr_multi_agent");
    }

    info!("Sweep over cheater counts: {:?}", cheaters_list);

    let pb = ProgressBar::new(cheaters_list.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.orange/yellow} {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );

    let mut summaries = Vec::new();
    for cheaters in cheaters_list {
        let n_wifi = run.n_wifi.unwrap_or(10);
        let name = format!(
            "{}_{}_cheatersn{}_{}_{}.csv",
            prefix, n_wifi, cheaters, run.agent, run.data_rate
        );

        let mut args = run.clone();
        args.cheaters = cheaters;
        args.csv_path = Some(name.clone());
        args.csv_log_path = Some(name);
        let config = args.to_config()?;

        pb.set_message(format!("{} cheaters", cheaters));
        let elapsed = global_start.elapsed();
        info!("[{}] Running with {} cheater(s)", format_time(elapsed), cheaters);

        let summary = run_experiment(config, cancel.clone()).await?;
        report(&summary);
        summaries.push(summary);
        pb.inc(1);

        if cancel.is_cancelled() {
            warn!("Sweep cancelled");
            break;
        }
    }
    pb.finish_with_message("Sweep complete");

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let sweep_path = format!("sweep_{}.json", timestamp);
    std::fs::write(&sweep_path, serde_json::to_string_pretty(&summaries)?)?;
    info!("Sweep summary saved to: {}", sweep_path);

    Ok(())
}

fn report(summary: &RunSummary) {
    info!(
        "{}: {} steps, simulated {:.2}s, exit code {:?}",
        summary.name, summary.steps, summary.last_time, summary.exit_code
    );
    for agent in &summary.agents {
        info!(
            "  agent {}: mean reward {:.3}, last CW {:?}, warm-up end {:?}",
            agent.agent, agent.mean_reward, agent.last_cw, agent.warmup_end
        );
    }
}

fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
