//! Binary entry point for the `starhold` server process.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    starhold::init().await
}
