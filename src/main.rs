use clap::Parser;
use log::{info, warn};

use timetable_gateway::config::{Args, Config, ProviderKind};
use timetable_gateway::provider::{DisabledProvider, OpenAiProvider};
use timetable_gateway::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(&args)?;
    info!("Loaded configuration: {:?}", config);

    match config.provider {
        ProviderKind::OpenAi => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or("TIMETABLE_OPENAI_API_KEY is not set")?;
            let provider = OpenAiProvider::new(&config, api_key)?;
            server::run_server(AppState { provider, config }).await?;
        }
        ProviderKind::Disabled => {
            warn!("AI generation is disabled; generate requests will return no timetables");
            server::run_server(AppState {
                provider: DisabledProvider,
                config,
            })
            .await?;
        }
    }

    Ok(())
}
