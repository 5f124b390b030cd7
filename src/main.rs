use clap::Parser;
use log::error;
use sniffrot::cli::Args;
use sniffrot::{SniffError, get_available_devices};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.list_devices {
        match get_available_devices() {
            Ok(devices) => {
                for device in devices {
                    println!("{}", device);
                }
            }
            Err(e) => {
                eprintln!("Cannot list devices: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let options = match args.into_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = sniffrot::run(options) {
        match &e {
            SniffError::DeviceOpen { .. } => println!("{}", e),
            _ => error!("{}", e),
        }
        std::process::exit(1);
    }
}
