use clap::Parser;

#[derive(Parser)]
#[command(name = "llmgate")]
pub(crate) struct Cli {
    /// Path to the JSON config file with providers and routing rules.
    #[arg(long, default_value = "config.json")]
    pub(crate) config: String,
    #[arg(long, default_value = "127.0.0.1")]
    pub(crate) host: String,
    #[arg(long, default_value_t = 3456)]
    pub(crate) port: u16,
}
