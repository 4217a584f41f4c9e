#![forbid(unsafe_code)]

mod frame;
mod serial;

use crate::serial::{DEFAULT_BAUD, run_serial};
use anyhow as ah;
use clap::Parser;
use std::{thread, time::Duration};

/// Print the debug values sent by the psucontrol firmware.
#[derive(Parser, Debug)]
struct Opts {
    /// Serial port. Defaults to /dev/ttyUSB0.
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Exit on the first serial error instead of reconnecting.
    #[arg(long)]
    no_retry: bool,
}

fn main() -> ah::Result<()> {
    let opts = Opts::parse();

    loop {
        if let Err(e) = run_serial(&opts.port, opts.baud) {
            if opts.no_retry {
                return Err(e);
            }
            eprintln!("Serial error: {e:?}");
        }
        thread::sleep(Duration::from_millis(5000));
    }
}

// vim: ts=4 sw=4 expandtab
