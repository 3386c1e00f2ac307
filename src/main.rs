use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use tutorstream::configuration::config::Config;
use tutorstream::controller::controller_handler::Controller;

#[derive(Parser)]
#[command(name = "tutorstream")]
#[command(version)]
#[command(about = "Tutoring conversation backend with retrieval and streamed answers")]
struct Args {
    /// TOML configuration file
    config_file: PathBuf,

    /// Overrides `server.port`
    #[arg(long, env = "TUTORSTREAM_PORT")]
    port: Option<u16>,

    /// Overrides `server.bind_address`
    #[arg(long, env = "TUTORSTREAM_BIND_ADDRESS")]
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() {
    // RUST_LOG refines the default info level
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration from {}", args.config_file.display());
    let mut config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind_address) = args.bind_address {
        config.server.bind_address = bind_address;
    }

    let mut controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
