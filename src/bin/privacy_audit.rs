// Bitcoin Dev Kit
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use std::process;

use log::{error, info};
use structopt::StructOpt;

use privacy_audit::cli::{self, ScanOpt};
use privacy_audit::Error;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opt = ScanOpt::from_args();
    let report = match cli::run(&opt) {
        Ok(report) => report,
        Err(Error::NoWalletOrDescriptor) => {
            error!("{}", Error::NoWalletOrDescriptor);
            process::exit(2);
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    info!(
        "{} findings, {} warnings",
        report.summary.findings, report.summary.warnings
    );
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Can't serialize the report: {}", e);
            process::exit(1);
        }
    }
}
