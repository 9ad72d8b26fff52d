#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tantrata_server::run().await
}
