//! WGAN-GP on CIFAR-10
//!
//! Main entry point providing CLI interface for:
//! - Training the WGAN-GP model
//! - Generating sample images from a checkpoint
//! - Writing a default configuration file

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_wgan_gp_cifar::{
    data::{to_display_range, DataLoader, ImageDataset, SampleSource},
    training::{image_grid, FileSink, Trainer},
    utils::{find_latest_checkpoint, load_checkpoint, load_checkpoint_meta, Config},
};

/// WGAN-GP image generator for CIFAR-10
#[derive(Parser)]
#[command(name = "wgan_gp_cifar")]
#[command(author = "WGAN-GP Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Train a Wasserstein GAN with gradient penalty on CIFAR-10")]
struct Cli {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the WGAN-GP model
    Train {
        /// Directory with the CIFAR-10 binary batches (overrides config)
        #[arg(short, long)]
        dataset: Option<String>,

        /// Number of generator iterations (overrides config)
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Resume from a checkpoint directory, or "latest"
        #[arg(long)]
        resume: Option<String>,
    },

    /// Generate sample images from a checkpoint
    Generate {
        /// Path to a checkpoint directory
        #[arg(short, long)]
        model: String,

        /// Number of images to generate
        #[arg(short, long, default_value = "16")]
        num_samples: i64,

        /// Output PNG path
        #[arg(short, long, default_value = "samples.png")]
        output: String,

        /// Walk the latent space between two random points instead
        #[arg(long)]
        interpolate: bool,

        /// Number of interpolation steps
        #[arg(long, default_value = "10")]
        steps: i64,
    },

    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.json")]
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Train {
            dataset,
            iterations,
            resume,
        } => {
            train_model(&cli.config, dataset, iterations, resume)?;
        }
        Commands::Generate {
            model,
            num_samples,
            output,
            interpolate,
            steps,
        } => {
            let count = if interpolate { steps } else { num_samples };
            generate_samples(&cli.config, &model, count, &output, interpolate)?;
        }
        Commands::Init { output } => {
            init_config(&output)?;
        }
    }

    Ok(())
}

/// Train the WGAN-GP model
fn train_model(
    config_path: &str,
    dataset: Option<String>,
    iterations: Option<usize>,
    resume: Option<String>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    if let Some(dir) = dataset {
        config.data.dataset_dir = dir;
    }
    if let Some(n) = iterations {
        config.training.iterations = n;
    }
    config.validate()?;

    if let Some(seed) = config.training.seed {
        tch::manual_seed(seed);
    }

    let device = config.get_device();
    info!("Using device: {:?}", device);

    // Load data
    let dataset = ImageDataset::load_cifar10(&config.data.dataset_dir)?;
    let expected = (
        config.model.channels as usize,
        config.model.image_size as usize,
        config.model.image_size as usize,
    );
    if dataset.image_shape() != expected {
        anyhow::bail!(
            "Dataset images have shape {:?}, model expects {:?}",
            dataset.image_shape(),
            expected
        );
    }
    let (train, test) = dataset.into_partitions();

    let batch_size = config.data.batch_size;
    let seed = config.data.shuffle_seed;
    let mut source = SampleSource::new(DataLoader::new(train, batch_size, seed), device)?;

    // Shuffled each pass, so the images left out of an evaluation vary
    let mut held_out = DataLoader::new(test, batch_size, seed.map(|s| s.wrapping_add(1)));
    if held_out.num_batches() == 0 {
        anyhow::bail!(
            "Held-out set has fewer images than one batch of {}",
            batch_size
        );
    }

    // Create model
    let mut model = config.build_model(device);
    let training_config = config.training_config();
    let critic_iters = training_config.critic_iters;
    let mut trainer = Trainer::new(training_config);

    // Resume from checkpoint if specified
    if let Some(checkpoint) = resume {
        let checkpoint = if checkpoint == "latest" {
            find_latest_checkpoint(&config.training.checkpoint_dir).ok_or_else(|| {
                anyhow::anyhow!("No checkpoint found in {}", config.training.checkpoint_dir)
            })?
        } else {
            checkpoint
        };
        let (iteration, metrics) = load_checkpoint(&mut model, &checkpoint, critic_iters)?;
        info!("Resumed from iteration {}", iteration);
        trainer.resume_from(iteration, metrics);
    }

    let mut sink = FileSink::new(&config.training.output_dir)?;
    info!("Writing scalars and samples to {}", config.training.output_dir);

    let metrics = trainer.train(&mut model, &mut source, &mut held_out, &mut sink)?;

    info!(
        "Training complete. Final D_cost: {:.4}, G_cost: {:.4}, held-out: {:.4}",
        metrics.latest_critic_cost().unwrap_or(0.0),
        metrics.latest_gen_cost().unwrap_or(0.0),
        metrics.latest_held_out_cost().unwrap_or(0.0)
    );

    Ok(())
}

/// Generate sample images from a checkpoint
fn generate_samples(
    config_path: &str,
    model_path: &str,
    count: i64,
    output_path: &str,
    interpolate: bool,
) -> Result<()> {
    if count <= 0 {
        anyhow::bail!("Number of images must be > 0");
    }

    let config = Config::load_or_default(config_path)?;
    let device = config.get_device();

    let meta = load_checkpoint_meta(model_path)?;
    let mut model = meta.build_model(device);
    load_checkpoint(&mut model, model_path, config.training.critic_iters)?;
    info!("Loaded model from {} (iteration {})", model_path, meta.iteration);

    let samples = if interpolate {
        info!("Interpolating between two latent points in {} steps", count);
        let ends = model.sample_noise(2);
        model.interpolate(&ends.get(0), &ends.get(1), count)
    } else {
        info!("Generating {} images", count);
        model.generate(count)
    };

    if let Some(parent) = std::path::Path::new(output_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let grid = image_grid(&to_display_range(&samples));
    tch::vision::image::save(&grid, output_path)?;
    info!("Saved images to {}", output_path);

    Ok(())
}

/// Initialize default configuration file
fn init_config(output_path: &str) -> Result<()> {
    let config = Config::default();
    config.save(output_path)?;

    info!("Created default configuration at {}", output_path);
    Ok(())
}
