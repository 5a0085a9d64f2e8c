//! Two-pass container assembly.
//!
//! Pass one sums the exact byte length of every fixed header, optional
//! chunk, and frame payload; pass two allocates once and writes everything
//! in order. Checksummed chunks get their CRC computed over FourCC plus
//! data after those bytes are in place. Frame payloads arrive fully formed
//! (PNG payloads carry their own fcTL and IDAT/fdAT chunks) and are copied
//! verbatim.

use alloc::vec::Vec;

use crate::crc32::Crc32;
use crate::error::EncodeError;
use crate::palette::Palette;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// One frame's share of the container: finished chunk bytes plus the
/// display duration the WebP path writes into ANMF.
#[derive(Debug)]
pub(crate) struct Payload {
    pub bytes: Vec<u8>,
    pub delay_ms: u32,
}

/// Canvas-level facts the assembler needs beyond the payloads themselves.
pub(crate) struct ContainerParams<'a> {
    pub width: u32,
    pub height: u32,
    /// Pixels per meter for the optional pHYs chunk.
    pub ppm: Option<u32>,
    pub palette: Option<&'a Palette>,
}

/// Append one PNG chunk: big-endian length, FourCC, data, then the CRC over
/// FourCC and data.
pub(crate) fn push_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(data);
    let mut crc = Crc32::new();
    crc.update(fourcc);
    crc.update(data);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
}

fn push_u24_le(out: &mut Vec<u8>, value: u32) {
    out.push(value as u8);
    out.push((value >> 8) as u8);
    out.push((value >> 16) as u8);
}

pub(crate) fn assemble_png(
    params: &ContainerParams<'_>,
    payloads: &[Payload],
) -> Result<Vec<u8>, EncodeError> {
    let animated = payloads.len() > 1;

    let mut total: u64 = 8 + 25 + 12; // signature, IHDR, IEND
    if params.ppm.is_some() {
        total += 21;
    }
    if let Some(palette) = params.palette {
        total += 12 + 3 * palette.len() as u64; // PLTE
        total += 12 + palette.len() as u64; // tRNS
    }
    if animated {
        total += 20; // acTL
    }
    for payload in payloads {
        total += payload.bytes.len() as u64;
    }
    if total > u32::MAX as u64 {
        return Err(EncodeError::SizeOverflow);
    }

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr = [0u8; 13];
    ihdr[..4].copy_from_slice(&params.width.to_be_bytes());
    ihdr[4..8].copy_from_slice(&params.height.to_be_bytes());
    ihdr[8] = 8; // bit depth
    ihdr[9] = if params.palette.is_some() { 3 } else { 6 };
    // compression, filter, interlace all 0
    push_chunk(&mut out, b"IHDR", &ihdr);

    if let Some(ppm) = params.ppm {
        let mut phys = [0u8; 9];
        phys[..4].copy_from_slice(&ppm.to_be_bytes());
        phys[4..8].copy_from_slice(&ppm.to_be_bytes());
        phys[8] = 1; // unit: meter
        push_chunk(&mut out, b"pHYs", &phys);
    }

    if let Some(palette) = params.palette {
        let mut plte = Vec::with_capacity(palette.len() * 3);
        let mut trns = Vec::with_capacity(palette.len());
        for &entry in palette.entries() {
            plte.push((entry >> 16) as u8);
            plte.push((entry >> 8) as u8);
            plte.push(entry as u8);
            trns.push((entry >> 24) as u8);
        }
        push_chunk(&mut out, b"PLTE", &plte);
        // tRNS must follow PLTE and precede the image data.
        push_chunk(&mut out, b"tRNS", &trns);
    }

    if animated {
        let mut actl = [0u8; 8];
        actl[..4].copy_from_slice(&(payloads.len() as u32).to_be_bytes());
        // loop count 0: repeat forever
        push_chunk(&mut out, b"acTL", &actl);
    }

    for payload in payloads {
        out.extend_from_slice(&payload.bytes);
    }

    push_chunk(&mut out, b"IEND", &[]);

    debug_assert_eq!(out.len() as u64, total);
    Ok(out)
}

pub(crate) fn assemble_webp(
    params: &ContainerParams<'_>,
    payloads: &[Payload],
) -> Result<Vec<u8>, EncodeError> {
    let animated = payloads.len() > 1;

    let mut total: u64 = 12 + 18; // RIFF header, VP8X
    if animated {
        total += 14; // ANIM
    }
    for payload in payloads {
        if animated {
            total += 24; // ANMF header wrapping the bitstream chunk
        }
        total += payload.bytes.len() as u64;
    }
    // The RIFF size field must hold total-8 in 32 bits.
    if total > u32::MAX as u64 {
        return Err(EncodeError::SizeOverflow);
    }

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((total - 8) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");

    out.extend_from_slice(b"VP8X");
    out.extend_from_slice(&10u32.to_le_bytes());
    // Packed flags: only the animation bit is used.
    out.push(if animated { 0x02 } else { 0x00 });
    out.extend_from_slice(&[0, 0, 0]); // reserved
    push_u24_le(&mut out, params.width - 1);
    push_u24_le(&mut out, params.height - 1);

    if animated {
        out.extend_from_slice(b"ANIM");
        out.extend_from_slice(&6u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // background color, ignored by viewers
        out.extend_from_slice(&0u16.to_le_bytes()); // loop count 0: forever
    }

    for payload in payloads {
        if animated {
            out.extend_from_slice(b"ANMF");
            out.extend_from_slice(&(16 + payload.bytes.len() as u32).to_le_bytes());
            push_u24_le(&mut out, 0); // x
            push_u24_le(&mut out, 0); // y
            push_u24_le(&mut out, params.width - 1);
            push_u24_le(&mut out, params.height - 1);
            push_u24_le(&mut out, payload.delay_ms.min(0xFF_FFFF));
            // Full-frame updates only, so blend and dispose bits stay 0.
            out.push(0);
        }
        out.extend_from_slice(&payload.bytes);
    }

    debug_assert_eq!(out.len() as u64, total);
    Ok(out)
}
