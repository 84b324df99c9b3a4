#[tokio::main]
async fn main() -> std::io::Result<()> {
    authority_server::run_with_config().await
}
