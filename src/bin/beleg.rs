use std::process;

use beleg::{
    cli::{output, run, Cli},
    init,
};
use clap::Parser;

fn main() {
    init();

    if let Err(err) = run(Cli::parse()) {
        output::error(err);
        process::exit(1);
    }
}
