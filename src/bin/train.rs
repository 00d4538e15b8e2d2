use clap::Parser;
use stack_surrogate::cli::{run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = TrainArgs::parse();
    run_train(&args)?;
    log::info!("Done");
    Ok(())
}
