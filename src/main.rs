mod cli;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let invocation = match cli::run() {
        cli::RunOutcome::Run(invocation) => invocation,
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    };
    init_tracing(&invocation.log_level);

    let code = cli::execute(invocation).await;
    std::process::exit(code);
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
