use std::error::Error;

use food_classify::{run, CmdArgs};
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args = CmdArgs::from_args();

    run(&args).await?;

    Ok(())
}
