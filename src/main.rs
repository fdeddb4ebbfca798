//! leadscout CLI: research and classify a single lead.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use leadscout::{
    Classifier, ClassifierPipeline, FileBlackboardStore, FirecrawlClient, IcpContext,
    LeadIdentity, LlmConfig, OpenAiClient, Profiler, ProfilerPipeline, Researcher, SerperClient,
    Settings,
};

#[derive(Parser, Debug)]
#[command(
    name = "leadscout",
    version,
    about = "Research a lead on the web and classify it against an ideal customer profile"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the research -> classify loop for one lead.
    Classify {
        /// Lead username (also keys the blackboard cache).
        #[arg(long)]
        username: String,

        /// Lead display name.
        #[arg(long)]
        name: String,

        /// Primary URL, usually the lead's profile page.
        #[arg(long)]
        url: String,
    },

    /// Generate a profile for a previously classified lead.
    Profile {
        #[arg(long)]
        username: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        url: String,

        /// Skip the post-profile classification refresh.
        #[arg(long)]
        no_refresh: bool,
    },
}

fn build_researcher(settings: &Settings) -> Result<Researcher> {
    let llm: Arc<dyn leadscout::LlmClient> = Arc::new(
        OpenAiClient::from_env(settings.model.as_str())
            .context("LLM client configuration failed")?,
    );
    let search = Arc::new(SerperClient::from_env().context("SERPER_API_KEY not set")?);
    let scrape = Arc::new(
        FirecrawlClient::from_env(settings.scrape_max_chars)
            .context("FIRECRAWL_API_KEY not set")?
            .with_cache(settings.cache_dir.join("firecrawl"))?,
    );
    Ok(
        Researcher::new(llm, search, scrape, LlmConfig::new(settings.model.as_str()))
            .with_max_tool_calls(settings.max_tool_calls)
            .with_max_search_results(settings.max_search_results),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let icp = IcpContext::default();
    let llm: Arc<dyn leadscout::LlmClient> = Arc::new(
        OpenAiClient::from_env(settings.model.as_str())
            .context("LLM client configuration failed")?,
    );
    let store = Arc::new(FileBlackboardStore::new(settings.cache_dir.clone()));
    let classifier = Arc::new(Classifier::new(
        Arc::clone(&llm),
        icp.clone(),
        LlmConfig::new(settings.model.as_str()),
    ));

    match cli.command {
        Command::Classify { username, name, url } => {
            let lead = LeadIdentity::new(username, name, url);
            let pipeline = ClassifierPipeline::new(
                Arc::new(build_researcher(&settings)?),
                classifier,
            )
            .with_max_rounds(settings.max_investigation_rounds)
            .with_store(store);

            info!(username = %lead.username, "Starting classification run");
            let outcome = pipeline.run(&lead).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Profile {
            username,
            name,
            url,
            no_refresh,
        } => {
            let lead = LeadIdentity::new(username, name, url);
            let profiler = Arc::new(Profiler::new(
                Arc::clone(&llm),
                icp,
                LlmConfig::new(settings.model.as_str()),
            ));
            let mut pipeline = ProfilerPipeline::new(
                Arc::new(build_researcher(&settings)?),
                profiler,
                classifier,
                store,
            )
            .with_max_rounds(settings.max_profile_rounds);
            if no_refresh {
                pipeline = pipeline.without_classification_refresh();
            }

            info!(username = %lead.username, "Starting profiling run");
            let outcome = pipeline.run(&lead).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
