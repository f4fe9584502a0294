use anyhow::Result;
use hnchat::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
