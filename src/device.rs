use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;

use log::debug;
use nix::ioctl_write_ptr;
use nix::libc;
use nix::libc::c_int;

use crate::error::ProbeError;

const N_READ_TRIALS: usize = 100;
const N_WRITE_TRIALS: usize = 100;
const POLL_INTERVAL_MS: u64 = 10;

// ugen(4) control requests, _IOW('U', 113/114, int).
ioctl_write_ptr!(usb_set_short_xfer, 'U', 113, c_int);
ioctl_write_ptr!(usb_set_timeout, 'U', 114, c_int);

pub fn sleep_ms(duration: u64) {
    std::thread::sleep(std::time::Duration::from_millis(duration));
}

fn timeout_error(message: &str) -> io::Error {
    return io::Error::new(io::ErrorKind::TimedOut, message);
}

/// Opens the device node read-write and non-blocking.
pub fn open(path: &str) -> Result<File, ProbeError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| ProbeError::DeviceUnavailable {
            path: path.to_string(),
            source: e,
        })
}

/// Tells the device layer that a read returning fewer bytes than the offered
/// buffer is a completion, not a short-frame fault. Required because the ASIC
/// ID length is not known up front.
pub fn set_short_transfer(device: &impl AsRawFd, on: bool) -> Result<(), ProbeError> {
    let flag: c_int = if on { 1 } else { 0 };
    unsafe { usb_set_short_xfer(device.as_raw_fd(), &flag) }
        .map_err(ProbeError::ConfigurationFailed)?;
    Ok(())
}

pub fn set_timeout(device: &impl AsRawFd, timeout_ms: c_int) -> Result<(), ProbeError> {
    unsafe { usb_set_timeout(device.as_raw_fd(), &timeout_ms) }
        .map_err(ProbeError::ConfigurationFailed)?;
    Ok(())
}

/// Writes the whole frame to the device. The handle is non-blocking, so a
/// refused write is retried a bounded number of times before giving up.
pub fn send_frame(port: &mut impl Write, frame: &[u8]) -> Result<(), ProbeError> {
    let mut written: usize = 0;
    let mut trials: usize = 0;
    while written < frame.len() {
        match port.write(&frame[written..]) {
            Ok(0) => {
                let e = io::Error::new(io::ErrorKind::WriteZero, "device accepted no data");
                return Err(ProbeError::WriteFailed(e));
            }
            Ok(n) => {
                written += n;
                trials = 0;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock && trials < N_WRITE_TRIALS => {
                trials += 1;
                sleep_ms(POLL_INTERVAL_MS);
            }
            Err(e) => return Err(ProbeError::WriteFailed(e)),
        }
    }
    debug!("wrote {} bytes", frame.len());
    return Ok(());
}

/// Reads one response of up to `capacity` bytes. A short read is expected and
/// returned as-is. The device may not have staged its answer immediately
/// after the command, so a read that yields nothing is polled a bounded
/// number of times rather than declared failed on the spot.
pub fn read_response(port: &mut impl Read, capacity: usize) -> Result<Vec<u8>, ProbeError> {
    assert!(capacity > 0);
    let mut buf: Vec<u8> = vec![0; capacity];
    for _ in 0..N_READ_TRIALS {
        match port.read(buf.as_mut_slice()) {
            Ok(0) => sleep_ms(POLL_INTERVAL_MS),
            Ok(n) => {
                debug!("read {} bytes", n);
                buf.truncate(n);
                return Ok(buf);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => sleep_ms(POLL_INTERVAL_MS),
            Err(e) => return Err(ProbeError::ReadFailed(e)),
        }
    }
    return Err(ProbeError::ReadFailed(timeout_error(
        "no response from device",
    )));
}
