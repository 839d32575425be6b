// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use std::process::ExitCode;

use cmd::{Cli, run};
use diagnostics::*;

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    init_diagnostics();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    match run(cli, &mut stdout.lock()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log_error!("Report failed: {error}", error: format!("{e:#}"));
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
