#[tokio::main]
async fn main() -> std::io::Result<()> {
    telecare::init_tracing();
    telecare::serve().await
}
