#[tokio::main]
async fn main() {
    if let Err(e) = appleid_cli::run().await {
        eprintln!("{}", e.report());
        std::process::exit(1);
    }
}
