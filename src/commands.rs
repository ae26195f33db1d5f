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

//! Subcommand handlers

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use ft_core::registry::{records, vulnerable_records};
use ft_core::{
    analyze, assess, identify, list_bridge_devices, locate_or_err, require_vulnerable,
    select_serial, AdbBridge, AnalysisReport, CancelToken, CapabilityGate, CapabilityRecord, Config,
    DfuIdentity, Extractor, FwtapError, IdentifyOutcome, ModemInfo, PlatformEnumerator, Result,
    SecurityInfo, UnlinkedCipher, UsbDeviceEntry,
};
use tracing::{debug, info};

use crate::cli::Commands;
use crate::progress::DumpProgress;

const DETECT_POLL: Duration = Duration::from_secs(1);

/// Shared state for one invocation
pub struct Context {
    pub config: Config,
    pub cancel: CancelToken,
}

pub fn run(command: &Commands, ctx: &Context) -> Result<()> {
    debug!(?command, "Running command");
    match command {
        Commands::Chips { all, json } => cmd_chips(*all, *json),
        Commands::Detect { wait } => cmd_detect(ctx, *wait),
        Commands::Identify { cpid, key, payload } => {
            cmd_identify(ctx, *cpid, key.as_deref(), payload.as_deref())
        }
        Commands::Devices => cmd_devices(ctx),
        Commands::Info { serial } => cmd_info(ctx, serial.as_deref()),
        Commands::Dump { output, partition, serial } => {
            cmd_dump(ctx, output, partition.as_deref(), serial.as_deref())
        }
        Commands::Analyze { file, json } => cmd_analyze(file, *json),
    }
}

// ============================================================================
// Chips
// ============================================================================

pub fn format_chip_line(record: &CapabilityRecord, show_status: bool) -> String {
    let mut line = format!("    {:<20} CPID: 0x{:04X}  iOS: {}", record.name, record.cpid, record.ios_range);
    if show_status {
        line.push_str(if record.vulnerable { "  [vulnerable]" } else { "  [patched]" });
    }
    line
}

fn cmd_chips(all: bool, json: bool) -> Result<()> {
    let selected: Vec<&CapabilityRecord> = if all {
        records().iter().collect()
    } else {
        vulnerable_records().collect()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }

    if all {
        println!("[*] Known chips:\n");
    } else {
        println!("[*] Supported chips (boot ROM vulnerable):\n");
    }
    for record in selected {
        println!("{}", format_chip_line(record, all));
    }
    println!();
    Ok(())
}

// ============================================================================
// Detect / Identify
// ============================================================================

fn wait_for_dfu(ctx: &Context, wait: Option<u64>) -> Result<Option<UsbDeviceEntry>> {
    let enumerator = PlatformEnumerator::from_config(&ctx.config);
    let signature = ctx.config.dfu_signature();
    let deadline = wait.map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        if let Some(device) = ft_core::find_device(&enumerator, signature) {
            return Ok(Some(device));
        }
        match deadline {
            Some(deadline) if Instant::now() < deadline => {
                ctx.cancel.check()?;
                thread::sleep(DETECT_POLL);
            }
            _ => return Ok(None),
        }
    }
}

fn print_identity(device: &UsbDeviceEntry) -> Option<DfuIdentity> {
    let identity = device.serial.as_deref().and_then(DfuIdentity::parse);
    match &identity {
        Some(id) => {
            println!("    CPID: 0x{:04X}", id.cpid);
            if let Some(cprv) = id.cprv {
                println!("    CPRV: 0x{:02X}", cprv);
            }
            if let Some(ecid) = id.ecid {
                println!("    ECID: 0x{:016X}", ecid);
            }
            if let Some(srtg) = &id.srtg {
                println!("    SRTG: {}", srtg);
            }
        }
        None => println!("    (device serial does not expose a CPID)"),
    }
    identity
}

fn cmd_detect(ctx: &Context, wait: Option<u64>) -> Result<()> {
    println!("[*] Checking for DFU device ({})...", ctx.config.dfu_signature());
    match wait_for_dfu(ctx, wait)? {
        Some(device) => {
            println!("[+] Device in DFU mode found at {}", device.location);
            if let Some(id) = print_identity(&device) {
                println!("[*] {}", assess(id.cpid).message());
            }
        }
        None => println!("[-] No DFU device found"),
    }
    Ok(())
}

fn cmd_identify(ctx: &Context, cpid: Option<u16>, key: Option<&str>, payload: Option<&Path>) -> Result<()> {
    let cpid = match cpid {
        Some(cpid) => cpid,
        None => {
            println!("[*] Checking for device in DFU mode...");
            let signature = ctx.config.dfu_signature();
            let device = wait_for_dfu(ctx, None)?.ok_or(FwtapError::DeviceNotPresent {
                vendor_id: signature.vendor_id,
                product_id: signature.product_id,
            })?;
            println!("[+] Device in DFU mode detected!");
            // A serial without a CPID identifies nothing; 0 is never a known chip
            print_identity(&device).map(|id| id.cpid).unwrap_or(0)
        }
    };

    // Unknown and patched chips stop here, before the key or payload is read
    let record = require_vulnerable(cpid)?;
    println!("[+] Device: {} (CPID: 0x{:04X})", record.name, record.cpid);
    println!("[+] Vulnerable: YES");
    println!("[+] iOS Range: {}", record.ios_range);

    let gate = CapabilityGate::from_input(key)?;
    let payload = match payload {
        Some(path) => fs::read(path).map_err(|e| FwtapError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?,
        None => Vec::new(),
    };

    match identify(cpid, &gate, &UnlinkedCipher, &payload)? {
        IdentifyOutcome::CredentialRequired(_) => Err(FwtapError::CredentialRequired),
        IdentifyOutcome::PayloadReady { record, payload } => {
            info!(chip = record.name, bytes = payload.0.len(), "Payload unlocked");
            println!("[+] Payload unlocked ({} bytes)", payload.0.len());
            Ok(())
        }
    }
}

// ============================================================================
// Device access
// ============================================================================

fn connect(ctx: &Context, serial: Option<&str>) -> Result<AdbBridge> {
    let bridge = AdbBridge::new(&ctx.config, None, ctx.cancel.clone());
    let version = bridge.check_available()?;
    debug!(%version, "adb available");
    let devices = list_bridge_devices(&bridge)?;
    let serial = select_serial(&devices, serial)?;
    Ok(bridge.with_serial(Some(serial)))
}

fn cmd_devices(ctx: &Context) -> Result<()> {
    let bridge = AdbBridge::new(&ctx.config, None, ctx.cancel.clone());
    let devices = list_bridge_devices(&bridge)?;
    if devices.is_empty() {
        println!("No devices attached");
        return Ok(());
    }
    println!("{:<24} {:<14} {:<18} {}", "SERIAL", "STATE", "MODEL", "PRODUCT");
    for d in &devices {
        println!(
            "{:<24} {:<14} {:<18} {}",
            d.serial,
            d.state,
            d.model.as_deref().unwrap_or("-"),
            d.product.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Boxed key/value table, values truncated to fit
pub fn render_box(title: &str, rows: &[(&str, Option<&str>)]) -> String {
    const LABEL: usize = 18;
    const VALUE: usize = 36;
    let width = LABEL + VALUE + 3;
    let mut out = String::new();
    let _ = writeln!(out, "╔{}╗", "═".repeat(width));
    let _ = writeln!(out, "║ {:<w$}║", title, w = width - 1);
    let _ = writeln!(out, "╠{}╣", "═".repeat(width));
    for (label, value) in rows {
        let value = truncate(value.unwrap_or("N/A"), VALUE);
        let _ = writeln!(out, "║ {:<lw$}: {:<vw$}║", label, value, lw = LABEL, vw = VALUE);
    }
    let _ = write!(out, "╚{}╝", "═".repeat(width));
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head)
}

fn cmd_info(ctx: &Context, serial: Option<&str>) -> Result<()> {
    let bridge = connect(ctx, serial)?;
    let modem = ModemInfo::collect(&bridge);
    let security = SecurityInfo::collect(&bridge);
    println!("{}", render_box("Baseband Information", &modem.rows()));
    println!();
    println!("{}", render_box("Security Information", &security.rows()));
    Ok(())
}

fn cmd_dump(ctx: &Context, output: &Path, partition: Option<&str>, serial: Option<&str>) -> Result<()> {
    let bridge = connect(ctx, serial)?;
    if let Some(serial) = bridge.serial() {
        println!("[*] Using device {}", serial);
    }

    let source = match partition {
        Some(path) => path.to_string(),
        None => {
            println!("[*] Locating modem partition...");
            locate_or_err(&bridge, &ctx.config.partition_candidates)?
        }
    };
    println!("[+] Partition: {}", source);

    let mut progress = DumpProgress::new();
    let result = Extractor::new(&bridge, &bridge, ctx.config.fallback_partition_size)
        .with_cancel(ctx.cancel.clone())
        .extract(&source, output, &mut progress);

    match result {
        Ok(report) => {
            progress.finish();
            println!("[+] Dump complete: {} ({} bytes)", report.destination.display(), report.bytes_written);
            println!("[+] SHA-256: {}", report.sha256);
            Ok(())
        }
        Err(e) => {
            progress.abandon();
            Err(e)
        }
    }
}

// ============================================================================
// Analyze
// ============================================================================

pub fn render_analysis(report: &AnalysisReport) -> String {
    let h = &report.header;
    let mut out = String::new();
    let _ = writeln!(out, "[*] File size: {} bytes", report.file_size);
    let _ = writeln!(out, "[*] Header:");
    let _ = writeln!(out, "    Magic:       0x{:08X}", h.magic);
    let _ = writeln!(out, "    Version:     {}", h.version);
    let _ = writeln!(out, "    Size:        {}", h.size);
    let _ = writeln!(out, "    Entry Point: 0x{:08X}", h.entry_point);
    let _ = writeln!(out, "    Build ID:    {}", h.build_id());
    let _ = writeln!(out, "\n[*] Strings:");
    for (i, run) in report.first_strings.iter().enumerate() {
        let _ = writeln!(out, "    [{}] 0x{:08X}  {}", i + 1, run.offset, run.text);
    }
    let _ = write!(out, "    ... {} strings found", report.string_count);
    out
}

fn cmd_analyze(file: &Path, json: bool) -> Result<()> {
    let report = analyze(file)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("[*] Analyzing {}", file.display());
        println!("{}", render_analysis(&report));
    }
    Ok(())
}
