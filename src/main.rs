use std::env;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        if let Err(e) = pot_sim::api::run_http_server(port).await {
            log::error!("Server error: {e}");
            std::process::exit(1);
        }
        return;
    }

    match pot_sim::api::run_cli(raw_args) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("{e}");
            eprintln!(
                "Usage: cargo run -- serve [port] | cargo run -- [--mode pot|roulette] [flags]"
            );
            std::process::exit(1);
        }
    }
}
