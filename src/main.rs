use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mnist_mlp::{
    Activation, Dataset, Network, SweepGrid, TrainConfig, evaluate, run_sweep, train,
};

#[derive(Debug, Parser)]
#[command(
    name = "mnist-mlp",
    version,
    about = "Train a fully-connected network on MNIST CSV data"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train one network and optionally save its parameters.
    Train(TrainArgs),
    /// Grid-search hidden widths, learning rate, and batch size.
    Sweep(SweepArgs),
    /// Report the accuracy of a saved network on a CSV file.
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Args)]
struct DataArgs {
    /// Training CSV (`label,pixel...` per row, no header).
    #[arg(long, default_value = "data/mnist_train.csv")]
    train: PathBuf,
    /// Test CSV in the same format.
    #[arg(long, default_value = "data/mnist_test.csv")]
    test: PathBuf,
}

#[derive(Debug, Args)]
struct TrainArgs {
    #[command(flatten)]
    data: DataArgs,
    /// JSON training config; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Comma-separated layer sizes, e.g. 784,32,16,10.
    #[arg(long, value_delimiter = ',')]
    layers: Option<Vec<usize>>,
    #[arg(long)]
    activation: Option<Activation>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long)]
    epochs: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Where to write the trained parameters.
    #[arg(long, default_value = "network_parameters.json")]
    save: PathBuf,
}

#[derive(Debug, Args)]
struct SweepArgs {
    #[command(flatten)]
    data: DataArgs,
    #[arg(long, default_value = "results/output.csv")]
    output: PathBuf,
    #[arg(long, default_value_t = 12)]
    epochs: usize,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Args)]
struct EvaluateArgs {
    #[arg(long, default_value = "network_parameters.json")]
    model: PathBuf,
    #[arg(long, default_value = "data/mnist_test.csv")]
    data: PathBuf,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => run_train(args),
        Command::Sweep(args) => run_sweep_cmd(args),
        Command::Evaluate(args) => run_evaluate(args),
    }
}

fn load_datasets(data: &DataArgs) -> Result<(Dataset, Dataset)> {
    let train_set = Dataset::from_csv_path(&data.train)
        .with_context(|| format!("loading training data from {}", data.train.display()))?;
    let test_set = Dataset::from_csv_path(&data.test)
        .with_context(|| format!("loading test data from {}", data.test.display()))?;
    if train_set.is_empty() {
        bail!("training data {} has no usable rows", data.train.display());
    }
    Ok((train_set, test_set))
}

fn build_config(args: &TrainArgs) -> Result<TrainConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => TrainConfig::default(),
    };

    if let Some(layers) = &args.layers {
        cfg.layer_sizes = layers.clone();
    }
    if let Some(activation) = args.activation {
        cfg.activation = activation;
    }
    if let Some(lr) = args.learning_rate {
        cfg.learning_rate = lr;
    }
    if let Some(epochs) = args.epochs {
        cfg.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        cfg.batch_size = batch_size;
    }
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn run_train(args: TrainArgs) -> Result<()> {
    let cfg = build_config(&args)?;
    let (train_set, test_set) = load_datasets(&args.data)?;

    let (net, report) = train(&cfg, &train_set, Some(&test_set))?;
    if let Some(acc) = report.final_test_accuracy() {
        info!(test_accuracy = format_args!("{acc:.2}%"), "final");
    }

    net.save_json(&args.save)
        .with_context(|| format!("saving parameters to {}", args.save.display()))?;
    info!(path = %args.save.display(), "parameters saved");
    Ok(())
}

fn run_sweep_cmd(args: SweepArgs) -> Result<()> {
    let (train_set, test_set) = load_datasets(&args.data)?;

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let grid = SweepGrid {
        epochs: args.epochs,
        seed: args.seed,
        ..SweepGrid::default()
    };
    let results = run_sweep(&grid, &train_set, &test_set, BufWriter::new(file))?;
    info!(trials = results.len(), path = %args.output.display(), "sweep results saved");
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let net = Network::load_json(&args.model)
        .with_context(|| format!("loading parameters from {}", args.model.display()))?;
    let data = Dataset::from_csv_path(&args.data)
        .with_context(|| format!("loading data from {}", args.data.display()))?;

    let acc = evaluate(&net, &data)?;
    println!("accuracy: {acc:.2}% ({} samples)", data.len());
    Ok(())
}
