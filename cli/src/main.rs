use clap::Parser;
use countertool_cli::Cli;
use countertool_cli::run_main;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let outcome = run_main(cli).await;
    std::process::exit(outcome.exit_code());
}
