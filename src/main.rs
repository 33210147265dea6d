use human_panic::{metadata, setup_panic};
use opinmod::cli::run_cli;
use opinmod::log;

fn main() {
    setup_panic!(metadata!().support("Contact the author: henning.thiesen@hs-flensburg.de"));

    if let Err(err) = run_cli() {
        if log::is_logger_initialised() {
            ::log::error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        // Terminate program, signalling an error
        std::process::exit(1);
    }
}
