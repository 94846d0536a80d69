use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "Issues and rotates session-bound access/refresh token pairs")]
pub struct Cli {
    /// Path to a settings file; defaults to settings/dev.toml or settings/release.toml.
    #[arg(long)]
    pub settings: Option<String>,
}
