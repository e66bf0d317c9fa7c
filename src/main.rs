#[tokio::main]
async fn main() {
    labsight_lib::init_tracing();

    if let Err(e) = labsight_lib::run().await {
        tracing::error!("Labsight failed to start: {e}");
        std::process::exit(1);
    }
}
