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

//! Terminal progress for a running dump

use ft_core::{ExtractProgress, SizeSource, Stage};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "[{elapsed_precise}] [{wide_bar}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const ESTIMATE_TEMPLATE: &str = "[{elapsed_precise}] [{wide_bar}] {bytes}/~{total_bytes} ({bytes_per_sec})";

/// Byte-count progress bar
pub struct DumpProgress {
    bar: ProgressBar,
}

impl DumpProgress {
    pub fn new() -> Self {
        Self { bar: ProgressBar::hidden() }
    }

    pub fn finish(&self) {
        self.bar.finish();
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl Default for DumpProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractProgress for DumpProgress {
    fn stage(&mut self, stage: Stage) {
        match stage {
            Stage::PrivilegeCheck => eprintln!("[*] Checking root access..."),
            Stage::SizeDiscovery => eprintln!("[*] Reading partition size..."),
            Stage::Copy => eprintln!("[*] Copying partition..."),
            Stage::Verify => {
                self.bar.finish();
                eprintln!("[*] Verifying output...");
            }
        }
    }

    fn size_known(&mut self, expected: u64, source: SizeSource) {
        let template = match source {
            SizeSource::Discovered => BAR_TEMPLATE,
            SizeSource::Estimated => ESTIMATE_TEMPLATE,
        };
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        self.bar = ProgressBar::new(expected);
        self.bar.set_style(style);
    }

    fn bytes(&mut self, written: u64) {
        // an estimate can be too small; grow rather than pin at 100%
        if self.bar.length().is_some_and(|len| written > len) {
            self.bar.set_length(written);
        }
        self.bar.set_position(written);
    }
}
