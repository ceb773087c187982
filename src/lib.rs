pub mod cli;
pub mod client;
pub mod config;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;
pub mod tools;

use cli::{ Args, ChatArgs, Command, ServeArgs };
use config::upstream::llm_config_from_args;
use log::info;
use relay::Relay;
use server::Server;
use std::error::Error;
use std::sync::Arc;
use tools::ToolRegistry;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve) => run_server(serve).await,
        Command::Chat(chat) => run_chat(chat).await,
    }
}

pub async fn run_server(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Service URL Index: {}", args.service_url_index);
    if let Some(base_url) = &args.chat_base_url {
        info!("Chat Base URL: {}", base_url);
    }
    info!("Chat Model: {}", args.chat_model);
    info!("Max Steps: {}", args.max_steps);
    info!("Max Duration: {}s", args.max_duration_secs);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let llm_config = llm_config_from_args(&args)?;
    let chat_client = llm::chat::new_client(&llm_config)?;
    let tools = ToolRegistry::default();
    info!("Tools: {}", tools.names().join(", "));

    let relay = Arc::new(Relay::new(chat_client, tools, args.max_steps));
    let addr = args.server_addr.clone();
    info!("Starting relay for model {} on: {}", relay.model(), addr);
    let server = Server::new(addr, relay, args);
    server.run().await?;

    Ok(())
}

pub async fn run_chat(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    client::terminal::run(args).await
}
