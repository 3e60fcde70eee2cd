use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;

use vire_rs::adk::model::openai::OpenAIModel;
use vire_rs::adk::model::Model;
use vire_rs::vire::evaluation::{evaluate_dataset, load_dataset};
use vire_rs::vire::workflow::config::{ConfigLoader, VireConfig};
use vire_rs::vire::workflow::engine::WorkflowEngine;
use vire_rs::vire::workflow::state::BranchAnswer;
use vire_rs::vire::workflow::voting::VoteAggregator;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one question about an image
    Ask {
        /// The question to answer
        #[arg(short, long)]
        question: String,

        /// Image URL or local path
        #[arg(short, long)]
        image: String,

        /// Thread id for checkpoints (generated when omitted)
        #[arg(short, long, default_value = "")]
        thread: String,

        /// Path to a YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Weighted vote over given analyst answers, without any model call
    Vote {
        #[arg(long)]
        junior: String,

        #[arg(long)]
        senior: String,

        #[arg(long)]
        manager: String,
    },
    /// Run every sample of a YAML dataset and report accuracy
    Eval {
        /// Path to the dataset (`[{question, image, answer}]`)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Path to a YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn live_model(
    config: &VireConfig,
) -> Result<Arc<dyn Model>, Box<dyn std::error::Error + Send + Sync>> {
    let mut model = OpenAIModel::new(config.model.model_name.clone())?
        .with_temperature(config.model.temperature);
    if let Some(base_url) = &config.model.base_url {
        model = model.with_base_url(base_url.clone());
    }
    log::info!("Using model: {}", model.model_name());
    Ok(Arc::new(model))
}

async fn build_engine(
    config_path: Option<PathBuf>,
) -> Result<WorkflowEngine, Box<dyn std::error::Error + Send + Sync>> {
    let config = ConfigLoader::new().load(config_path.as_deref())?;
    let model = live_model(&config)?;
    Ok(WorkflowEngine::from_config(&config, model).await)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Ask {
            question,
            image,
            thread,
            config,
        } => {
            let engine = build_engine(config).await?;

            println!("Image: {}", image);
            println!("Question: {}", question);
            println!("{}", "-".repeat(50));

            let outcome = engine.run_workflow(&question, &image, &thread).await?;

            println!("Caption: {}", outcome.caption);
            for report in &outcome.branches {
                match &report.failure {
                    Some(failure) => println!("{}: <failed: {}>", report.analyst, failure),
                    None => println!("{}: {}", report.analyst, report.answer.trim()),
                }
            }
            println!("Vote breakdown: {:?}", outcome.vote_breakdown);
            if let Some(diagnostic) = &outcome.voting.diagnostic {
                println!("Diagnostic: {}", diagnostic);
            }
            println!("Final answer: {}", outcome.final_answer);
            println!("Thread: {}", outcome.thread_id);
        }
        Commands::Vote {
            junior,
            senior,
            manager,
        } => {
            let record = VoteAggregator::standard().aggregate(&[
                BranchAnswer::new("Junior", junior),
                BranchAnswer::new("Senior", senior),
                BranchAnswer::new("Manager", manager),
            ]);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Eval { dataset, config } => {
            let samples = load_dataset(&dataset)?;
            let engine = build_engine(config).await?;

            let report = evaluate_dataset(&engine, &samples).await?;
            for (i, result) in report.results.iter().enumerate() {
                println!(
                    "{}. [{}] {} -> '{}' (expected '{}')",
                    i + 1,
                    if result.correct { "ok" } else { "miss" },
                    result.question,
                    result.prediction,
                    result.reference
                );
            }
            println!(
                "Accuracy: {:.4} ({}/{})",
                report.accuracy.accuracy, report.accuracy.correct, report.accuracy.total
            );
        }
    }

    Ok(())
}
