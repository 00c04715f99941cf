// Copyright (c) 2017-2021 Fabian Schuiki

#[macro_use]
extern crate indoc;

use std::sync::{Arc, Mutex};
use vcdtrace::{Code, MemFile, MemFiles, TraceWriter, Vcd};

fn mem_writer() -> (TraceWriter, MemFiles) {
    let file = MemFile::new();
    let files = file.handle();
    let mut w = TraceWriter::with_file(file);
    w.vcd().set_date("today");
    (w, files)
}

/// Everything after the `$version` line.
fn without_version(s: &str) -> &str {
    let first = s.find('\n').unwrap();
    &s[first + 1..]
}

#[derive(Default)]
struct Cpu {
    clk: bool,
    pc: u32,
    zero: bool,
}

fn add_cpu(w: &mut TraceWriter) -> Arc<Mutex<Cpu>> {
    let cpu = Arc::new(Mutex::new(Cpu::default()));
    let (a, b) = (cpu.clone(), cpu.clone());
    w.add_callback_fns(
        |vcd, base| {
            vcd.declare_bit(base, "top.clk", None);
            vcd.declare_bus(base.offset(1), "top.cpu.pc", None, 15, 0);
            vcd.declare_bit(base.offset(2), "top.cpu.alu.z", None);
        },
        move |vcd, base| {
            let cpu = a.lock().unwrap();
            vcd.full_bit(base, cpu.clk);
            vcd.full_bus(base.offset(1), cpu.pc);
            vcd.full_bit(base.offset(2), cpu.zero);
        },
        move |vcd, base| {
            let cpu = b.lock().unwrap();
            vcd.chg_bit(base, cpu.clk);
            vcd.chg_bus(base.offset(1), cpu.pc);
            vcd.chg_bit(base.offset(2), cpu.zero);
        },
    );
    cpu
}

#[test]
fn header_and_incremental_dumps() {
    let (mut w, files) = mem_writer();
    let cpu = add_cpu(&mut w);
    w.open("cpu.vcd");
    w.dump(0);
    cpu.lock().unwrap().clk = true;
    w.dump(10);
    {
        let mut cpu = cpu.lock().unwrap();
        cpu.clk = false;
        cpu.pc = 0x1234;
    }
    w.dump(20);
    w.dump(30);
    w.close();

    let out = files.contents("cpu.vcd");
    assert!(out.starts_with("$version Generated by vcdtrace "));
    assert_eq!(
        without_version(&out),
        indoc!(
            "
            $date today $end
            $timescale 1ns $end

             $scope module top $end
              $var wire  1 ! clk $end
              $scope module cpu $end
               $var wire 16 \" pc [15:0] $end
               $scope module alu $end
                $var wire  1 # z $end
               $upscope $end
              $upscope $end
             $upscope $end
            $enddefinitions $end


            #0
            $dumpvars
            0!
            b0000000000000000 \"
            0#
            $end
            #10
            1!
            #20
            0!
            b0001001000110100 \"
            #30
            "
        )
    );
}

#[test]
fn repeated_full_dumps_are_idempotent() {
    let file = MemFile::new();
    let files = file.handle();
    let mut vcd = Vcd::new(file);
    vcd.set_date("today");
    vcd.declare_bus(Code(0), "t.v", None, 11, 0);
    vcd.open("t.vcd");

    vcd.begin_dump(0);
    vcd.full_bus(Code(0), 0xabc);
    let after_first = vcd.old_value(Code(0)).to_vec();
    vcd.full_bus(Code(0), 0xabc);
    assert_eq!(vcd.old_value(Code(0)), &after_first[..]);
    vcd.end_dump();

    vcd.begin_dump(1);
    vcd.chg_bus(Code(0), 0xabc);
    vcd.end_dump();
    vcd.close();

    let out = files.contents("t.vcd");
    assert_eq!(out.matches("b101010111100 !\n").count(), 2);
    assert!(out.ends_with("$end\n#1\n"));
}

#[test]
fn aliases_share_a_slot() {
    let (mut w, files) = mem_writer();
    w.add_callback_fns(
        |vcd, base| {
            vcd.declare_bus(base, "top.a.data", None, 7, 0);
            vcd.declare_bus(base, "top.b.data", None, 7, 0);
        },
        |vcd, base| vcd.full_bus(base, 0x5a),
        |vcd, base| vcd.chg_bus(base, 0x5a),
    );
    w.open("alias.vcd");
    w.dump(0);
    w.close();
    let out = files.contents("alias.vcd");
    assert!(out.contains("$scope module a $end\n   $var wire  8 ! data [7:0] $end"));
    assert!(out.contains("$scope module b $end\n   $var wire  8 ! data [7:0] $end"));
    assert_eq!(out.matches("b01011010 !\n").count(), 1);
    assert_eq!(w.vcd().signals().len(), 1);
}

#[test]
fn module_prefix_and_scope_escape() {
    let (mut w, files) = mem_writer();
    w.set_module("tb");
    w.set_scope_escape('/');
    w.add_callback_fns(
        |vcd, base| {
            vcd.declare_bit(base, "dut/rst_n", None);
            vcd.declare_bus(base.offset(1), "dut/mem", Some(3), 7, 0);
        },
        |vcd, base| {
            vcd.full_bit(base, true);
            vcd.full_bus(base.offset(1), 1);
        },
        |_, _| (),
    );
    w.open("esc.vcd");
    w.close();
    let out = files.contents("esc.vcd");
    assert!(out.contains(" $scope module tb $end\n  $scope module dut $end\n"));
    assert!(out.contains("$var wire  1 ! rst_n $end"));
    assert!(out.contains("$var wire  8 \" mem(3) [7:0] $end"));
}

#[test]
fn tri_state_values() {
    let file = MemFile::new();
    let files = file.handle();
    let mut vcd = Vcd::new(file);
    vcd.set_date("today");
    vcd.declare_tri_bus(Code(0), "t.pad", None, 3, 0);
    vcd.open("tri.vcd");

    vcd.begin_dump(0);
    // A set tri bit means undriven and prints as `z`.
    vcd.full_tri_bus(Code(0), 0b1100, 0b1010);
    vcd.end_dump();
    vcd.begin_dump(1);
    vcd.chg_tri_bus(Code(0), 0b1100, 0b1010);
    vcd.end_dump();
    vcd.begin_dump(2);
    vcd.chg_tri_bus(Code(0), 0b1100, 0b0000);
    vcd.end_dump();
    vcd.close();

    let out = files.contents("tri.vcd");
    assert!(out.contains("$var tri  4 ! pad [3:0] $end"));
    assert!(out.ends_with("#0\n$dumpvars\nbz1z0 !\n$end\n#1\n#2\nb1100 !\n"));
}

#[test]
fn evcd_ports_and_trailer() {
    let (mut w, files) = mem_writer();
    w.set_evcd(true);
    w.add_callback_fns(
        |vcd, base| {
            vcd.declare_tri_bit(base, "top.sda", None);
            vcd.declare_bit(base.offset(2), "top.scl", None);
        },
        |vcd, base| {
            vcd.full_tri_bit(base, false, true);
            vcd.full_bit(base.offset(2), true);
        },
        |vcd, base| {
            vcd.chg_tri_bit(base, false, false);
            vcd.chg_bit(base.offset(2), true);
        },
    );
    w.open("bus.evcd");
    w.dump(0);
    w.dump(5);
    w.close();
    let out = files.contents("bus.evcd");
    assert!(out.contains("$var port  1 ! sda $end"));
    assert!(out.contains("$var wire  1 # scl $end"));
    assert!(out.ends_with("#0\n$dumpvars\nz!\n1#\n$end\n#5\n0!\n$vcdclose #5 $end\n"));
}

#[test]
fn reals_and_unknowns() {
    let file = MemFile::new();
    let files = file.handle();
    let mut vcd = Vcd::new(file);
    vcd.set_date("today");
    vcd.declare_double(Code(0), "t.volts", None);
    vcd.declare_quad(Code(2), "t.addr", None, 39, 0);
    vcd.open("real.vcd");
    vcd.begin_dump(0);
    vcd.full_double(Code(0), 1.25);
    vcd.full_quad_x(Code(2));
    vcd.end_dump();
    vcd.begin_dump(1);
    vcd.chg_double(Code(0), -0.0);
    vcd.chg_quad(Code(2), 0);
    vcd.end_dump();
    vcd.close();

    let out = files.contents("real.vcd");
    assert!(out.contains("$var real 64 ! volts $end"));
    assert!(out.contains(&format!("#0\n$dumpvars\nr1.25 !\nb{} #\n$end\n", "x".repeat(40))));
    // The quad still holds zero, so only the real changes.
    assert!(out.ends_with("#1\nr-0 !\n"));
}

#[test]
fn time_scaling() {
    let (mut w, files) = mem_writer();
    w.set_time_unit("1ns");
    w.set_time_resolution("1ns");
    w.add_callback_fns(
        |vcd, base| vcd.declare_bit(base, "t.x", None),
        |vcd, base| vcd.full_bit(base, false),
        |_, _| (),
    );
    w.open("t.vcd");
    w.dump_seconds(0.000001);
    w.dump_seconds(0.0000015);
    w.close();
    let out = files.contents("t.vcd");
    assert!(out.contains("$timescale 1ns $end\n"));
    assert!(out.ends_with("#1000\n$dumpvars\n0!\n$end\n#1500\n"));
}

#[test]
fn invalid_resolution_falls_back_to_nanoseconds() {
    let (mut w, files) = mem_writer();
    w.set_time_resolution("7 fortnights");
    w.open("t.vcd");
    w.close();
    assert!(files.contents("t.vcd").contains("$timescale 1ns $end\n"));
}

#[test]
fn time_never_goes_backwards() {
    let (mut w, files) = mem_writer();
    let cpu = add_cpu(&mut w);
    w.open("t.vcd");
    w.dump(10);
    cpu.lock().unwrap().clk = true;
    w.dump(5);
    w.dump(10);
    cpu.lock().unwrap().clk = false;
    w.dump(12);
    w.close();
    let out = files.contents("t.vcd");
    assert!(!out.contains("#5\n"));
    assert_eq!(out.matches("#10\n").count(), 1);
    assert!(out.ends_with("$end\n1!\n#12\n0!\n"));
}

#[test]
fn wide_arrays_never_overflow_the_buffer() {
    let file = MemFile::new();
    let files = file.handle();
    let mut vcd = Vcd::with_chunk(file, 64);
    vcd.set_date("today");
    vcd.declare_array(Code(0), "t.wide", None, 9999, 0);
    vcd.declare_bit(Code(313), "t.b", None);
    vcd.open("wide.vcd");

    let mut words = vec![0u32; 313];
    for step in 0..40u32 {
        for (i, w) in words.iter_mut().enumerate() {
            *w = step.wrapping_mul(0x9e37_79b9) ^ i as u32;
        }
        vcd.begin_dump(step as u64);
        if step == 0 {
            vcd.full_array(Code(0), &words);
            vcd.full_bit(Code(313), false);
        } else {
            vcd.chg_array(Code(0), &words);
            vcd.chg_bit(Code(313), step % 2 == 1);
        }
        vcd.end_dump();
    }
    vcd.close();
    assert!(vcd.last_error().is_none());

    let out = files.contents("wide.vcd");
    let lines: Vec<_> = out.lines().filter(|l| l.starts_with('b')).collect();
    assert_eq!(lines.len(), 40);
    for line in lines {
        assert_eq!(line.len(), 1 + 10000 + 1 + 1);
    }
    assert_eq!(out.lines().filter(|l| l.starts_with('#')).count(), 40);
}
