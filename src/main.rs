use vod_sync_lib::{cli::parse_args, commands};

#[tokio::main]
async fn main() {
    let cli = parse_args();
    let code = commands::run(cli).await;
    std::process::exit(code);
}
