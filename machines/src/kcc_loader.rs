//! KCC and KC-TAP snapshot loaders.
//!
//! These formats persist a KC85 program as a load address, end address,
//! optional autostart address, and a flat byte payload to be written
//! directly into the machine's RAM through the normal CPU-visible memory
//! map. Loading is host-level (outside the core crate, §6 "Persisted
//! state"); failures are reported as a boolean, not a `Result`, per §7.

use kc85_core::core::{Bus, BusMaster};

use crate::kc85::Kc85System;

const KCC_HEADER_SIZE: usize = 128;
const KC_TAP_MAGIC: &[u8] = b"\xC3KC-TAPE by AF. ";
const KC_TAP_BLOCK_SIZE: usize = 129; // 1 block-number byte + 128 data bytes

/// Write a KCC-format snapshot's payload into RAM via the CPU's memory map.
///
/// Layout: 10-byte name, 6 reserved bytes, a byte giving how many of
/// load/end/exec addresses are valid (1, 2, or 3), then three little-endian
/// u16 addresses, padded to a 128-byte header, followed by the raw image.
/// Returns `false` (and writes nothing) if the file is too short or its
/// declared length overflows the image.
pub fn load_kcc(sys: &mut Kc85System, data: &[u8]) -> bool {
    if data.len() < KCC_HEADER_SIZE {
        return false;
    }
    let num_addr = data[16];
    if num_addr == 0 || num_addr > 3 {
        return false;
    }
    let load_addr = u16::from_le_bytes([data[17], data[18]]);
    let end_addr = u16::from_le_bytes([data[19], data[20]]);
    let exec_addr = if num_addr >= 3 {
        Some(u16::from_le_bytes([data[21], data[22]]))
    } else {
        None
    };

    if end_addr < load_addr {
        return false;
    }
    let len = (end_addr as usize).wrapping_sub(load_addr as usize) + 1;
    let payload = &data[KCC_HEADER_SIZE..];
    if payload.len() < len {
        return false;
    }

    write_block(sys, load_addr, &payload[..len]);
    if let Some(exec) = exec_addr {
        sys.cpu.pc = exec;
    }
    true
}

/// Load a KC-TAP snapshot: a fixed text magic header followed by 129-byte
/// blocks (a sequence number byte plus 128 payload bytes). Block 0 carries
/// the same name/address header as a KCC file; subsequent blocks are raw
/// payload continuing from the previous block's end.
pub fn load_kc_tap(sys: &mut Kc85System, data: &[u8]) -> bool {
    if data.len() < KC_TAP_MAGIC.len() || &data[..KC_TAP_MAGIC.len()] != KC_TAP_MAGIC {
        return false;
    }
    let blocks = &data[KC_TAP_MAGIC.len()..];
    if blocks.len() < KC_TAP_BLOCK_SIZE {
        return false;
    }

    let header_block = &blocks[1..KC_TAP_BLOCK_SIZE]; // skip the block-number byte
    if header_block.len() < 23 {
        return false;
    }
    let num_addr = header_block[16];
    if num_addr == 0 || num_addr > 3 {
        return false;
    }
    let load_addr = u16::from_le_bytes([header_block[17], header_block[18]]);
    let end_addr = u16::from_le_bytes([header_block[19], header_block[20]]);
    let exec_addr = if num_addr >= 3 {
        Some(u16::from_le_bytes([header_block[21], header_block[22]]))
    } else {
        None
    };
    if end_addr < load_addr {
        return false;
    }
    let total_len = (end_addr as usize).wrapping_sub(load_addr as usize) + 1;

    let mut payload = Vec::with_capacity(total_len);
    let mut offset = KC_TAP_BLOCK_SIZE;
    while payload.len() < total_len && offset + KC_TAP_BLOCK_SIZE <= blocks.len() {
        payload.extend_from_slice(&blocks[offset + 1..offset + KC_TAP_BLOCK_SIZE]);
        offset += KC_TAP_BLOCK_SIZE;
    }
    if payload.len() < total_len {
        return false;
    }

    write_block(sys, load_addr, &payload[..total_len]);
    if let Some(exec) = exec_addr {
        sys.cpu.pc = exec;
    }
    true
}

fn write_block(sys: &mut Kc85System, start: u16, data: &[u8]) {
    for (i, &byte) in data.iter().enumerate() {
        let addr = start.wrapping_add(i as u16);
        Bus::write(sys, BusMaster::Cpu(0), addr, byte);
    }
}
