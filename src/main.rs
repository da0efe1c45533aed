use trapper_sender::app;

#[tokio::main]
async fn main() {
    let code = app::main().await;
    std::process::exit(code);
}
