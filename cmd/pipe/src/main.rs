//! Pipe stdin to stdout through a globalmem device
//!
//! A writer thread copies stdin into the device through one handle while
//! the main thread drains it to stdout through another. With a small
//! buffer both sides block on each other, like a shell pipe.
//!
//! # Environment Variables
//!
//! - `GLOBALMEM_SIZE=64` - Buffer capacity (decimal or 0x hex)
//! - `GLOBALMEM_WAKE_ALL=0` - Wake one waiter per transfer
//! - `GLOBALMEM_LOG_LEVEL=debug` - Log every transfer to stderr
//!
//! ```text
//! GLOBALMEM_SIZE=16 GLOBALMEM_LOG_LEVEL=debug cargo run -p globalmem-pipe < Cargo.toml
//! ```

use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use globalmem::{global, init_logging, kerror, kinfo, MemError, OpenOptions, Readiness, ReadinessLatch};

fn main() {
    init_logging();

    let device = match global() {
        Ok(device) => device,
        Err(e) => {
            kerror!("cannot create device: {}", e);
            std::process::exit(1);
        }
    };
    kinfo!("piping through {} ({} bytes)", device.name(), device.capacity());

    let mut writer = device.open(OpenOptions::new());
    let reader = device.open(OpenOptions::new());
    let stop = reader.cancellation().clone();

    // Fires when a read frees space in a full buffer; the watcher re-polls
    // on timeout otherwise
    let drained = Arc::new(ReadinessLatch::new(Readiness::WRITABLE));
    let drained_id = device.subscribe(drained.clone());

    let producer = thread::spawn(move || -> io::Result<u64> {
        let copied = io::copy(&mut io::stdin().lock(), &mut writer)?;
        kinfo!("stdin closed after {} byte(s)", copied);
        Ok(copied)
    });

    let watcher = {
        let reader_poll = device.open(OpenOptions::new().nonblocking(true));
        thread::spawn(move || {
            let result = producer.join();
            while reader_poll.poll().is_readable() {
                drained.wait(Some(Duration::from_millis(50)));
            }
            stop.cancel();
            result
        })
    };

    let mut stdout = io::stdout().lock();
    let mut buf = [0u8; 512];
    let mut total = 0u64;
    loop {
        match reader.read(&mut buf) {
            Ok(n) => {
                if let Err(e) = stdout.write_all(&buf[..n]) {
                    kerror!("stdout: {}", e);
                    break;
                }
                total += n as u64;
            }
            Err(MemError::Interrupted) => break,
            Err(e) => {
                kerror!("read failed: {}", e);
                break;
            }
        }
    }
    let _ = stdout.flush();
    device.unsubscribe(drained_id);

    match watcher.join() {
        Ok(Ok(Ok(copied))) if copied == total => {
            kinfo!("done: {} byte(s) through {}", total, device.name());
        }
        Ok(Ok(Ok(copied))) => {
            kerror!("copied {} byte(s) in but {} out", copied, total);
            std::process::exit(1);
        }
        Ok(Ok(Err(e))) => {
            kerror!("stdin: {}", e);
            std::process::exit(1);
        }
        Ok(Err(_)) | Err(_) => {
            kerror!("writer thread panicked");
            std::process::exit(1);
        }
    }
}
