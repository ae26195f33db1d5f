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

//! Command Line Interface

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fwtap")]
#[command(version)]
#[command(about = "fwtap - Chip identification and modem partition extraction")]
#[command(long_about = "fwtap - Chip identification and modem partition extraction

Checks application-processor chips against a table of known boot ROM
vulnerabilities, detects devices in DFU mode, and copies the modem
partition off a rooted Android device over adb for offline analysis.

EXAMPLES:
    fwtap chips                        List vulnerable chips
    fwtap chips --all --json           Full chip table as JSON
    fwtap detect --wait 30             Wait up to 30s for a DFU device
    fwtap identify --cpid 0x8010       Check a chip without a device attached
    fwtap devices                      List devices attached over adb
    fwtap info -s R58M12ABCDE          Modem and security properties
    fwtap dump modem.bin               Locate and copy the modem partition
    fwtap dump radio.bin -p /dev/block/by-name/radio
    fwtap analyze modem.bin --json     Header and string summary

ENVIRONMENT VARIABLES:
    FWTAP_LOG=debug        Log filter (overrides -v)
    FWTAP_CONFIG=PATH      Config file location

FILES:
    ~/.config/fwtap/config.json        adb path, timeouts, partition candidates")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: ~/.config/fwtap/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List known chips (vulnerable ones by default)
    Chips {
        /// Include patched chips
        #[arg(long)]
        all: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check for a device in DFU mode
    Detect {
        /// Keep polling for up to SECS seconds
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },

    /// Identify a chip and unlock its payload
    Identify {
        /// Chip id in hex; read from the attached DFU device when omitted
        #[arg(long, value_name = "HEX", value_parser = parse_cpid_arg)]
        cpid: Option<u16>,
        /// 64 hex character key
        #[arg(short, long)]
        key: Option<String>,
        /// Encrypted payload to unlock
        #[arg(long, value_name = "FILE")]
        payload: Option<PathBuf>,
    },

    /// List devices attached over adb
    Devices,

    /// Show modem and security properties of a device
    Info {
        /// Device serial (auto-selected when only one is attached)
        #[arg(short, long)]
        serial: Option<String>,
    },

    /// Copy the modem partition to a local file
    Dump {
        /// Output file
        output: PathBuf,
        /// Partition path on the device (skips discovery)
        #[arg(short, long)]
        partition: Option<String>,
        /// Device serial (auto-selected when only one is attached)
        #[arg(short, long)]
        serial: Option<String>,
    },

    /// Decode the header of a dump and scan it for strings
    Analyze {
        /// Dump file
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_cpid_arg(s: &str) -> Result<u16, String> {
    ft_core::parse_cpid(s).ok_or_else(|| format!("'{}' is not a hex CPID (e.g. 0x8010)", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_identify() {
        let cli = Cli::try_parse_from(["fwtap", "identify", "--cpid", "0x8010", "-k", "ab"]).unwrap();
        match cli.command {
            Commands::Identify { cpid, key, payload } => {
                assert_eq!(cpid, Some(0x8010));
                assert_eq!(key.as_deref(), Some("ab"));
                assert!(payload.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_cpid() {
        assert!(Cli::try_parse_from(["fwtap", "identify", "--cpid", "zzzz"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fwtap", "dump", "out.bin", "-p", "/dev/block/sda12", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Dump { output, partition, serial } => {
                assert_eq!(output, PathBuf::from("out.bin"));
                assert_eq!(partition.as_deref(), Some("/dev/block/sda12"));
                assert!(serial.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["fwtap"]).is_err());
    }
}
