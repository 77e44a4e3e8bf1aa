//! Program Image Loader.
//!
//! Loads target programs into a [`FlatMemory`]. Two image formats are
//! accepted: raw binaries copied to a fixed address, and hex images where
//! `@<address>` lines set the load address and every other token is a
//! data byte in hex.

use std::fs;

use crate::common::SimError;
use crate::soc::FlatMemory;

/// Reads a whole file.
pub fn load_binary(path: &str) -> Result<Vec<u8>, SimError> {
    fs::read(path).map_err(|source| SimError::Io {
        path: path.to_string(),
        source,
    })
}

/// Copies a raw binary into memory at `addr`.
///
/// # Returns
///
/// The number of bytes loaded.
pub fn load_flat(memory: &mut FlatMemory, path: &str, addr: u64) -> Result<usize, SimError> {
    let data = load_binary(path)?;
    memory.load_bytes(addr, &data)?;
    log::info!("Loaded {} ({} bytes) @ {:#x}", path, data.len(), addr);
    Ok(data.len())
}

/// Loads a hex image file into memory.
///
/// # Returns
///
/// The number of bytes loaded.
pub fn load_hex(memory: &mut FlatMemory, path: &str) -> Result<usize, SimError> {
    let text = fs::read_to_string(path).map_err(|source| SimError::Io {
        path: path.to_string(),
        source,
    })?;
    let mut total = 0;
    for (addr, bytes) in parse_hex_image(&text)? {
        memory.load_bytes(addr, &bytes)?;
        total += bytes.len();
    }
    log::info!("Loaded {} ({} bytes)", path, total);
    Ok(total)
}

/// Parses hex image text into contiguous `(address, bytes)` chunks.
///
/// Data before the first `@` line loads at address 0. Blank lines and
/// text after `#` are ignored.
pub fn parse_hex_image(text: &str) -> Result<Vec<(u64, Vec<u8>)>, SimError> {
    let mut chunks: Vec<(u64, Vec<u8>)> = Vec::new();
    let mut current = (0u64, Vec::new());

    for (n, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if let Some(addr) = line.strip_prefix('@') {
            let addr = u64::from_str_radix(addr.trim(), 16).map_err(|_| SimError::HexParse {
                line: n + 1,
                msg: format!("bad address '{}'", addr.trim()),
            })?;
            let prev = std::mem::replace(&mut current, (addr, Vec::new()));
            if !prev.1.is_empty() {
                chunks.push(prev);
            }
            continue;
        }

        for token in line.split_whitespace() {
            let byte = u8::from_str_radix(token, 16).map_err(|_| SimError::HexParse {
                line: n + 1,
                msg: format!("bad byte '{}'", token),
            })?;
            current.1.push(byte);
        }
    }

    if !current.1.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}
