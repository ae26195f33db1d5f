/*
 * This file is part of fwtap.
 *
 * Copyright (C) 2025 fwtap contributors
 *
 * fwtap is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * fwtap is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with fwtap. If not, see <https://www.gnu.org/licenses/>.
 */

use std::process::ExitCode;

use anyhow::anyhow;
use clap::Parser;
use tracing::{debug, warn};

use ft_core::{config_path, load_config, CancelToken, FwtapError};
use fwtap::cli::Cli;
use fwtap::commands::{self, Context};
use fwtap::logger;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // FwtapError displays already carry their cause
            eprintln!("Error: {}", e);
            if let Some(hint) = e.downcast_ref::<FwtapError>().and_then(FwtapError::hint) {
                eprintln!();
                eprintln!("{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    logger::init_logging(cli.verbose, cli.log_file.as_deref())
        .map_err(|e| anyhow!("failed to open log file: {}", e))?;

    let path = cli.config.clone().unwrap_or_else(config_path);
    let config = load_config(&path)?;
    debug!(path = %path.display(), "Using config");

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, stopping...");
        handler_token.cancel();
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    commands::run(&cli.command, &Context { config, cancel })?;
    Ok(())
}
