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

//! fwtap - Chip identification and modem partition extraction
//!
//! Command-line front end over `ft-core`: argument parsing, logging setup,
//! terminal progress and the subcommand handlers.

pub mod cli;
pub mod commands;
pub mod logger;
pub mod progress;
