//! Talks to the omap44xx ROM bootloader over a raw USB device node.
//!
//! Booted with USB plugged in and nothing in NAND to run, the ROM answers a
//! fixed GET_ID request with an opaque ASIC ID blob, and accepts a BOOT
//! request followed by length-prefixed bootloader images. All wire values are
//! little-endian.

pub mod device;
mod error;

use std::io;
use std::io::{Read, Write};

use log::{debug, info};

pub use crate::error::ProbeError;

/// GET_ID request in the ROM's wire format.
pub const GET_ID: [u8; 4] = 0xF003_0003u32.to_le_bytes();
/// BOOT request, announcing a second stage upload.
pub const BOOT: [u8; 4] = 0xF003_0002u32.to_le_bytes();
/// Notice the second stage sends once it is ready to download more.
pub const BOOT_NOTICE: u32 = 0xAABB_CCDD;
/// The ASIC ID fits well under this; short transfers are expected.
pub const RESPONSE_CAPACITY: usize = 1024;

const REOPEN_DELAY_MS: u64 = 3000;
const UPLOAD_CHUNK_SIZE: usize = 4096;

fn to_hex(data: &[u8]) -> String {
    return data
        .iter()
        .map(|e| format!("{:02x}", e))
        .collect::<Vec<_>>()
        .join(" ");
}

/// Sends GET_ID and returns however many bytes the ROM answers with.
pub fn read_asic_id(port: &mut (impl Read + Write)) -> Result<Vec<u8>, ProbeError> {
    device::send_frame(port, &GET_ID)?;
    let id = device::read_response(port, RESPONSE_CAPACITY)?;
    debug!("ASIC ID = {}", to_hex(&id));
    return Ok(id);
}

/// Renders the ASIC ID as a header line followed by one two-digit lowercase
/// hex token per byte.
pub fn render_asic_id(id: &[u8]) -> String {
    let tokens = id.iter().map(|e| format!("{:02x} ", e)).collect::<String>();
    format!("read ASIC ID ({} bytes):\n{}\n", id.len(), tokens)
}

/// Runs the probe sequence against the device node at `path`:
/// open, allow short transfers, send GET_ID, read the response.
pub fn probe(path: &str) -> Result<Vec<u8>, ProbeError> {
    let mut dev = device::open(path)?;
    device::set_short_transfer(&dev, true)?;
    read_asic_id(&mut dev)
}

/// Streams a bootloader image to the device: a 4-byte little-endian content
/// length, then the raw image bytes. Returns the image size.
pub fn upload_image(port: &mut impl Write, path: &str) -> Result<u32, ProbeError> {
    let image_error = |e: io::Error| ProbeError::ImageUnreadable {
        path: path.to_string(),
        source: e,
    };

    let mut image = std::fs::File::open(path).map_err(image_error)?;
    let size = image.metadata().map_err(image_error)?.len();
    let size = u32::try_from(size).map_err(|_| {
        image_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} bytes does not fit the 32-bit length header", size),
        ))
    })?;
    device::send_frame(port, &size.to_le_bytes())?;

    let mut chunk = [0u8; UPLOAD_CHUNK_SIZE];
    loop {
        let n = image.read(&mut chunk).map_err(image_error)?;
        if n == 0 {
            break;
        }
        device::send_frame(port, &chunk[..n])?;
    }
    debug!("uploaded {} bytes from \"{}\"", size, path);
    Ok(size)
}

/// Reads the 4-byte ready notice announced by the second stage.
pub fn read_notice(port: &mut impl Read) -> Result<u32, ProbeError> {
    let payload = device::read_response(port, 4)?;
    if payload.len() != 4 {
        return Err(ProbeError::ReadFailed(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected a 4-byte notice, obtained {} bytes", payload.len()),
        )));
    }
    Ok(u32::from_le_bytes(payload[..4].try_into().unwrap()))
}

/// Boots the ROM: uploads the second stage, waits for it to bring its USB
/// side up on the same node, then hands it the third stage.
pub fn boot(path: &str, second_stage: &str, third_stage: &str) -> Result<(), ProbeError> {
    let mut dev = device::open(path)?;
    device::set_short_transfer(&dev, true)?;
    device::send_frame(&mut dev, &BOOT)?;
    upload_image(&mut dev, second_stage)?;
    info!("uploaded second stage \"{}\"", second_stage);
    drop(dev);

    // Reopening too quickly crashes the freshly started second stage.
    device::sleep_ms(REOPEN_DELAY_MS);

    let mut dev = device::open(path)?;
    let notice = read_notice(&mut dev)?;
    if notice != BOOT_NOTICE {
        return Err(ProbeError::UnexpectedNotice(notice));
    }
    upload_image(&mut dev, third_stage)?;
    info!("uploaded third stage \"{}\"", third_stage);
    Ok(())
}
