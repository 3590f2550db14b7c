#[tokio::main]
async fn main() -> anyhow::Result<()> {
    relay_controller::app::run().await
}
