use clap::Parser;
use field_guard::error::Error;
use field_guard::{cli, Args};

fn main() {
    let args = Args::parse();

    match cli::run(&args) {
        Ok(()) => std::process::exit(exitcode::OK),
        Err(Error::Config(err)) => {
            eprintln!("Configuration Error: {err}");
            std::process::exit(exitcode::CONFIG);
        }
        Err(Error::Io(err)) => {
            eprintln!("{err}");
            std::process::exit(exitcode::IOERR);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(exitcode::DATAERR);
        }
    }
}
