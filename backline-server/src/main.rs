use std::env;

use backline_core::{Backline, PgDatabase};
use backline_server::run_server;
use colored::Colorize;
use log::{error, info};

mod logging;

#[tokio::main]
async fn main() {
    logging::init_logger();

    let Ok(database_url) = env::var("BACKLINE_DATABASE_URL") else {
        error!("{}", "BACKLINE_DATABASE_URL is not set.".bold().red());
        error!("Set it to a Postgres connection string and try again.");
        return;
    };

    info!("Connecting to database...");

    match PgDatabase::new(&database_url).await {
        Ok(database) => {
            info!("Initialized successfully.");
            run_server(Backline::new(database)).await;
        }
        Err(error) => {
            error!(
                "{} Read the error below to troubleshoot the issue.",
                "Backline failed to start!".bold().red()
            );
            error!("{}", error);
            error!(
                "{}",
                "Hint: make sure the Postgres instance is running and reachable, then try again."
                    .italic()
                    .bright_black()
            );
        }
    }
}
