mod app;
mod args;
mod export;

use app::App;
use args::TrustcalArgs;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = TrustcalArgs::parse();

    let app = App::new(args)?;
    app.run()?;

    Ok(())
}
