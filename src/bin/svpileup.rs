// Copyright 2026 svpileup developers.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::process::exit;

use structopt::StructOpt;
use svpileup::cli::{run, Svpileup};

pub fn main() {
    let opt = Svpileup::from_args();

    // setup logger
    fern::Dispatch::new()
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply()
        .unwrap();

    exit(match run(opt) {
        Err(e) => {
            println!("Error: {}", e);
            1
        }
        _ => 0,
    })
}
