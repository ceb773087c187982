use clap::{ Args as ClapArgs, Parser, Subcommand };

use crate::config::upstream::DEFAULT_SERVICE_INDEX;
use crate::llm::DEFAULT_CHAT_MODEL;
use crate::relay::DEFAULT_MAX_STEPS;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the relay endpoint (POST /api/chat).
    Serve(ServeArgs),
    /// Chat in the terminal through a running relay.
    Chat(ChatArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    // --- Upstream Model Args ---
    /// Index into the built-in list of model endpoints.
    #[arg(long, env = "SERVICE_URL_INDEX", default_value_t = DEFAULT_SERVICE_INDEX)]
    pub service_url_index: usize,

    /// Base URL of an OpenAI-compatible API (e.g., https://api.openai.com/v1). Overrides the index.
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// API Key for the model endpoint.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion.
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    /// Maximum model steps (tool round trips) per request.
    #[arg(long, env = "MAX_STEPS", default_value_t = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,

    /// Timeout in seconds for each upstream request, streaming included. 0 disables it.
    #[arg(long, env = "MAX_DURATION_SECS", default_value = "30")]
    pub max_duration_secs: u64,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ChatArgs {
    /// Relay endpoint to send conversations to.
    #[arg(long, env = "RELAY_URL", default_value = "http://127.0.0.1:3000/api/chat")]
    pub relay_url: String,

    /// Question to submit automatically on start.
    #[arg(long, env = "QUESTION")]
    pub question: Option<String>,
}
