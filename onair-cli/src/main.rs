//! # Onair
//!
//! Live audio broadcast server: streams a track to HTTP listeners and mixes
//! sound effects into it on operator command.

use log::error;

mod cli;
mod logging;
mod runner;
mod server;

fn main() {
    dotenv::dotenv().ok();
    let args = cli::args::build_cli().get_matches();
    let logs = logging::init(args.get_one::<String>("log-level").map(String::as_str));

    let code = match runner::run(&args, logs) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err.to_string().to_lowercase());
            -1
        }
    };

    std::process::exit(code)
}
