// Copyright (c) 2017-2021 Fabian Schuiki

//! A trace generator that runs a small synthetic model and writes its
//! waveforms, to exercise the trace writer end to end.

#![deny(missing_docs)]

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use anyhow::{anyhow, Context, Result};
use clap::Arg;
use std::sync::{Arc, Mutex};
use vcdtrace::{Code, TraceWriter, Vcd};

fn main() -> Result<()> {
    // Configure the logger.
    env_logger::init_from_env("VCDTRACE_LOG");

    // Parse the command line arguments.
    let matches = app_from_crate!()
        .about("Generates a waveform trace of a synthetic model.")
        .arg(
            Arg::with_name("OUTPUT")
                .help("The trace file to write")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("cycles")
                .short("n")
                .long("cycles")
                .takes_value(true)
                .default_value("100")
                .help("Number of clock cycles to simulate"),
        )
        .arg(
            Arg::with_name("period")
                .short("p")
                .long("period")
                .takes_value(true)
                .default_value("10")
                .help("Clock period in nanoseconds"),
        )
        .arg(
            Arg::with_name("timescale")
                .short("t")
                .long("timescale")
                .takes_value(true)
                .default_value("1ns")
                .help("Time resolution of the trace"),
        )
        .arg(
            Arg::with_name("rollover-mb")
                .long("rollover-mb")
                .takes_value(true)
                .help("Start a new file after this many megabytes"),
        )
        .arg(
            Arg::with_name("evcd")
                .long("evcd")
                .help("Write extended VCD"),
        )
        .get_matches();

    let output = matches.value_of("OUTPUT").unwrap();
    let cycles: u64 = parse_arg(&matches, "cycles")?;
    let period: f64 = parse_arg(&matches, "period")?;

    // Configure the writer.
    let mut writer = TraceWriter::new();
    writer.set_time_unit("1ns");
    writer.set_time_resolution(matches.value_of("timescale").unwrap());
    writer.set_evcd(matches.is_present("evcd"));
    if matches.is_present("rollover-mb") {
        writer.set_rollover_mb(parse_arg(&matches, "rollover-mb")?);
    }

    // Hook up the model.
    let model = Arc::new(Mutex::new(Model::new()));
    let (full, change) = (model.clone(), model.clone());
    writer.add_callback_fns(
        Model::declare,
        move |vcd, base| lock(&full).dump(vcd, base, true),
        move |vcd, base| lock(&change).dump(vcd, base, false),
    );

    writer.open(output);
    if !writer.is_open() {
        let (_, msg) = writer
            .last_error()
            .unwrap_or_else(|| (std::io::ErrorKind::Other, "unknown error".to_owned()));
        return Err(anyhow!("{}", msg)).with_context(|| format!("failed to open {}", output));
    }

    // Run the model, dumping on both clock edges.
    let half = period * 1e-9 / 2.0;
    for cycle in 0..cycles {
        let t = cycle as f64 * 2.0 * half;
        lock(&model).rise();
        writer.dump_seconds(t);
        lock(&model).fall();
        writer.dump_seconds(t + half);
    }
    writer.dump_seconds(cycles as f64 * 2.0 * half);
    writer.close();
    if let Some((_, msg)) = writer.last_error() {
        return Err(anyhow!("{}", msg)).with_context(|| format!("failed to write {}", output));
    }
    info!("Traced {} cycles", cycles);
    Ok(())
}

fn parse_arg<T>(matches: &clap::ArgMatches, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = matches.value_of(name).unwrap_or("");
    value
        .parse()
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("invalid value `{}` for --{}", value, name))
}

fn lock(model: &Mutex<Model>) -> std::sync::MutexGuard<Model> {
    model
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// The state of the synthetic model.
struct Model {
    clk: bool,
    count: u32,
    lfsr: u64,
    wide: [u32; 4],
    bus: u32,
    bus_drive: bool,
    phase: f64,
}

impl Model {
    fn new() -> Self {
        Model {
            clk: false,
            count: 0,
            lfsr: 0xACE1,
            wide: [1, 0, 0, 0],
            bus: 0,
            bus_drive: false,
            phase: 0.0,
        }
    }

    /// Declare the signals. Offsets from `base` must match `dump`.
    fn declare(vcd: &mut Vcd, base: Code) {
        vcd.declare_bit(base, "top.clk", None);
        vcd.declare_bus(base.offset(1), "top.core.count", None, 7, 0);
        vcd.declare_quad(base.offset(2), "top.core.lfsr", None, 47, 0);
        vcd.declare_array(base.offset(4), "top.core.wide", None, 99, 0);
        vcd.declare_tri_bus(base.offset(8), "top.io.bus", None, 7, 0);
        vcd.declare_double(base.offset(10), "top.analog.sine", None);
    }

    fn dump(&self, vcd: &mut Vcd, base: Code, full: bool) {
        let tri = if self.bus_drive { 0 } else { 0xff };
        let sine = self.phase.sin();
        if full {
            vcd.full_bit(base, self.clk);
            vcd.full_bus(base.offset(1), self.count);
            vcd.full_quad(base.offset(2), self.lfsr);
            vcd.full_array(base.offset(4), &self.wide);
            vcd.full_tri_bus(base.offset(8), self.bus, tri);
            vcd.full_double(base.offset(10), sine);
        } else {
            vcd.chg_bit(base, self.clk);
            vcd.chg_bus(base.offset(1), self.count);
            vcd.chg_quad(base.offset(2), self.lfsr);
            vcd.chg_array(base.offset(4), &self.wide);
            vcd.chg_tri_bus(base.offset(8), self.bus, tri);
            vcd.chg_double(base.offset(10), sine);
        }
    }

    fn rise(&mut self) {
        self.clk = true;
        self.count = self.count.wrapping_add(1) & 0xff;
        let bit = (self.lfsr ^ (self.lfsr >> 1) ^ (self.lfsr >> 3) ^ (self.lfsr >> 12)) & 1;
        self.lfsr = ((self.lfsr >> 1) | (bit << 47)) & 0xffff_ffff_ffff;
        let carry = self.wide[3] >> 3 & 1;
        for i in (1..4).rev() {
            self.wide[i] = (self.wide[i] << 1) | (self.wide[i - 1] >> 31);
        }
        self.wide[0] = (self.wide[0] << 1) | carry;
        self.wide[3] &= 0xf;
        self.bus_drive = self.count % 4 != 0;
        self.bus = self.count.wrapping_mul(37) & 0xff;
        self.phase += 0.1;
    }

    fn fall(&mut self) {
        self.clk = false;
    }
}
