use crate::frame::{Decoded, FrameDecoder};
use anyhow::{self as ah, Context as _};
use std::{
    io::{ErrorKind, Read as _},
    time::Duration,
};

pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD: u32 = 19_200;

pub fn run_serial(port: &Option<String>, baud: u32) -> ah::Result<()> {
    let port = port.as_deref().unwrap_or(DEFAULT_PORT);
    let mut serial = serialport::new(port, baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(Duration::from_millis(500))
        .open()
        .with_context(|| format!("Open serial port {port}"))?;

    let mut decoder = FrameDecoder::new();
    let mut buf = [0_u8; 64];
    loop {
        let count = match serial.read(&mut buf) {
            Ok(count) => count,
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                if decoder.is_synced() {
                    eprintln!("No data from firmware.");
                }
                continue;
            }
            Err(e) => return Err(e).context("Serial port read"),
        };
        for &byte in &buf[..count] {
            match decoder.feed(byte) {
                Some(Decoded::Value(value)) => println!("{value}"),
                Some(Decoded::EndOfRound) => println!(),
                None => (),
            }
        }
    }
}

// vim: ts=4 sw=4 expandtab
