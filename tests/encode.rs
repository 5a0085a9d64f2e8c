//! End-to-end encodes through the public API, validated by re-parsing the
//! produced containers chunk by chunk.

use std::io::Read;

use zenanim::{
    AnimationStyle, EncodeConfig, Encoder, Fitting, Flate2Compressor, Format, Frame, ImageData,
    PhysicalResolution, SourceFormat, StillEncoder,
};

/// Backend that renders images verbatim and wraps raw pixel bytes in a
/// minimal still file of the requested format. The animated layer only ever
/// walks chunk structure, so the payloads do not need to be decodable images.
struct RawBackend;

impl StillEncoder for RawBackend {
    fn supports(&self, _format: SourceFormat) -> bool {
        true
    }

    fn render(
        &mut self,
        image: &ImageData,
        _width: u32,
        _height: u32,
        _fitting: Fitting,
    ) -> Vec<rgb::RGBA<u8>> {
        image.pixels.clone()
    }

    fn encode(
        &mut self,
        pixels: &[rgb::RGBA<u8>],
        _width: u32,
        _height: u32,
        format: SourceFormat,
        _quality: f32,
    ) -> Result<Vec<u8>, zenanim::EncodeError> {
        let mut raw = Vec::with_capacity(pixels.len() * 4);
        for px in pixels {
            raw.extend_from_slice(&[px.r, px.g, px.b, px.a]);
        }
        Ok(match format {
            SourceFormat::Png => {
                let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
                push_png_chunk(&mut out, b"IHDR", &[0; 13]);
                push_png_chunk(&mut out, b"IDAT", &raw);
                push_png_chunk(&mut out, b"IEND", &[]);
                out
            }
            _ => {
                let mut out = b"RIFF".to_vec();
                out.extend_from_slice(&((12 + raw.len()) as u32).to_le_bytes());
                out.extend_from_slice(b"WEBP");
                out.extend_from_slice(b"VP8 ");
                out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
                out.extend_from_slice(&raw);
                out
            }
        })
    }
}

fn push_png_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(data);
    let mut body = fourcc.to_vec();
    body.extend_from_slice(data);
    out.extend_from_slice(&zenanim::crc32::crc32(&body).to_be_bytes());
}

fn rgba(r: u8, g: u8, b: u8, a: u8) -> rgb::RGBA<u8> {
    rgb::RGBA { r, g, b, a }
}

fn solid_frame(width: u32, height: u32, px: rgb::RGBA<u8>) -> Frame {
    let pixels = vec![px; width as usize * height as usize];
    Frame::new(ImageData::new(width, height, pixels).unwrap())
}

/// Walk PNG chunks after the signature, verifying lengths and CRCs, and
/// return (FourCC, data) pairs.
fn png_chunks(stream: &[u8]) -> Vec<([u8; 4], Vec<u8>)> {
    assert_eq!(&stream[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    let mut chunks = Vec::new();
    let mut offset = 8;
    while offset < stream.len() {
        let len = u32::from_be_bytes(stream[offset..offset + 4].try_into().unwrap()) as usize;
        let fourcc: [u8; 4] = stream[offset + 4..offset + 8].try_into().unwrap();
        let data = stream[offset + 8..offset + 8 + len].to_vec();
        let crc =
            u32::from_be_bytes(stream[offset + 8 + len..offset + 12 + len].try_into().unwrap());
        assert_eq!(
            crc,
            zenanim::crc32::crc32(&stream[offset + 4..offset + 8 + len]),
            "bad CRC on {}",
            String::from_utf8_lossy(&fourcc)
        );
        chunks.push((fourcc, data));
        offset += 12 + len;
    }
    assert_eq!(offset, stream.len(), "trailing bytes after IEND");
    chunks
}

fn inflate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .unwrap();
    out
}

#[test]
fn lossless_apng_layout() {
    let config = EncodeConfig::new(Format::Png, 2, 2)
        .quality(1.0)
        .delay_ms(120)
        .resolution(PhysicalResolution::Ppi(72));
    let mut encoder = Encoder::new(config, RawBackend).unwrap();
    encoder.add_frame(solid_frame(2, 2, rgba(200, 0, 0, 255))).unwrap();
    encoder.add_frame(solid_frame(2, 2, rgba(0, 0, 200, 255))).unwrap();
    let out = encoder.encode().unwrap();

    let chunks = png_chunks(&out);
    let order: Vec<[u8; 4]> = chunks.iter().map(|(fourcc, _)| *fourcc).collect();
    assert_eq!(
        order,
        [*b"IHDR", *b"pHYs", *b"acTL", *b"fcTL", *b"IDAT", *b"fcTL", *b"fdAT", *b"IEND"]
    );

    let ihdr = &chunks[0].1;
    assert_eq!(&ihdr[..8], &[0, 0, 0, 2, 0, 0, 0, 2]);
    assert_eq!(ihdr[9], 6); // truecolor with alpha, no palette at quality 1

    // 72 ppi is 2835 pixels per meter.
    let phys = &chunks[1].1;
    assert_eq!(&phys[..4], &2835u32.to_be_bytes());
    assert_eq!(phys[8], 1);

    let actl = &chunks[2].1;
    assert_eq!(&actl[..4], &2u32.to_be_bytes());
    assert_eq!(&actl[4..], &0u32.to_be_bytes());

    // Sequence numbers: fcTL 0, fcTL 1, fdAT 2. Both frames cover the full
    // canvas at the configured delay, movie disposal.
    let fctl0 = &chunks[3].1;
    assert_eq!(&fctl0[..4], &0u32.to_be_bytes());
    assert_eq!(&fctl0[4..12], &[0, 0, 0, 2, 0, 0, 0, 2]);
    assert_eq!(&fctl0[12..20], &[0; 8]); // x and y offsets
    assert_eq!(&fctl0[20..24], &[0, 120, 3, 232]);
    assert_eq!(&fctl0[24..], &[0, 1]);
    let fctl1 = &chunks[5].1;
    assert_eq!(&fctl1[..4], &1u32.to_be_bytes());
    let fdat = &chunks[6].1;
    assert_eq!(&fdat[..4], &2u32.to_be_bytes());
    // Every pixel changed red to blue, so nothing recycles and the second
    // frame carries all four blue pixels.
    assert_eq!(&fdat[4..], [0u8, 0, 200, 255].repeat(4).as_slice());
}

#[test]
fn single_frame_png_is_a_plain_still() {
    let config = EncodeConfig::new(Format::Png, 3, 1).quality(1.0);
    let mut encoder = Encoder::new(config, RawBackend).unwrap();
    encoder.add_frame(solid_frame(3, 1, rgba(1, 2, 3, 255))).unwrap();
    let out = encoder.encode().unwrap();

    let chunks = png_chunks(&out);
    let order: Vec<[u8; 4]> = chunks.iter().map(|(fourcc, _)| *fourcc).collect();
    assert_eq!(order, [*b"IHDR", *b"IDAT", *b"IEND"]);
}

#[test]
fn encodes_are_deterministic() {
    let config = EncodeConfig::new(Format::Png, 4, 4).quality(0.3);
    let mut encoder =
        Encoder::new(config, RawBackend).unwrap().with_compressor(Box::new(Flate2Compressor));
    for step in 0..3u8 {
        encoder.add_frame(solid_frame(4, 4, rgba(step * 80, 10, 10, 255))).unwrap();
    }
    let first = encoder.encode().unwrap();
    let second = encoder.encode().unwrap();
    assert_eq!(first, second);
}

#[test]
fn indexed_movie_recycles_unchanged_pixels() {
    let config = EncodeConfig::new(Format::Png, 2, 2).quality(0.3);
    let mut encoder =
        Encoder::new(config, RawBackend).unwrap().with_compressor(Box::new(Flate2Compressor));
    let red = rgba(200, 0, 0, 255);
    let blue = rgba(0, 0, 200, 255);
    encoder.add_frame(solid_frame(2, 2, red)).unwrap();
    encoder
        .add_frame(Frame::new(
            ImageData::new(2, 2, vec![blue, blue, red, red]).unwrap(),
        ))
        .unwrap();
    let out = encoder.encode().unwrap();

    let chunks = png_chunks(&out);
    let ihdr = &chunks[0].1;
    assert_eq!(ihdr[9], 3); // indexed

    let plte = &chunks.iter().find(|(f, _)| f == b"PLTE").unwrap().1;
    let trns = &chunks.iter().find(|(f, _)| f == b"tRNS").unwrap().1;
    assert_eq!(plte.len(), trns.len() * 3);
    // The animated palette leads with its seeded transparent entry.
    assert_eq!(&plte[..3], &[0, 0, 0]);
    assert_eq!(trns[0], 0);
    let entry_of = |px: rgb::RGBA<u8>| {
        trns.iter()
            .enumerate()
            .position(|(i, &a)| a == px.a && plte[i * 3..i * 3 + 3] == [px.r, px.g, px.b])
            .unwrap() as u8
    };
    let (red_idx, blue_idx) = (entry_of(red), entry_of(blue));

    // Frame 0 scanlines: filter byte then two red indices per row.
    let idat = &chunks.iter().find(|(f, _)| f == b"IDAT").unwrap().1;
    assert_eq!(inflate(idat), vec![0, red_idx, red_idx, 0, red_idx, red_idx]);

    // Frame 1: top row changed to blue, bottom row recycled to transparent.
    let fdat = &chunks.iter().find(|(f, _)| f == b"fdAT").unwrap().1;
    assert_eq!(inflate(&fdat[4..]), vec![0, blue_idx, blue_idx, 0, 0, 0]);
}

#[test]
fn indexed_translucent_pixels_lock_and_stay_recycled() {
    let config = EncodeConfig::new(Format::Png, 2, 1).quality(0.3);
    let mut encoder =
        Encoder::new(config, RawBackend).unwrap().with_compressor(Box::new(Flate2Compressor));
    let glass = rgba(200, 0, 0, 128);
    let red = rgba(200, 0, 0, 255);
    let blue = rgba(0, 0, 200, 255);
    encoder
        .add_frame(Frame::new(ImageData::new(2, 1, vec![glass, blue]).unwrap()))
        .unwrap();
    // The locked pixel turns opaque; that change must not be drawn.
    encoder
        .add_frame(Frame::new(ImageData::new(2, 1, vec![red, blue]).unwrap()))
        .unwrap();
    let out = encoder.encode().unwrap();

    let chunks = png_chunks(&out);
    let plte = &chunks.iter().find(|(f, _)| f == b"PLTE").unwrap().1;
    let trns = &chunks.iter().find(|(f, _)| f == b"tRNS").unwrap().1;
    let entry_of = |px: rgb::RGBA<u8>| {
        trns.iter()
            .enumerate()
            .position(|(i, &a)| a == px.a && plte[i * 3..i * 3 + 3] == [px.r, px.g, px.b])
            .unwrap() as u8
    };
    assert_eq!(trns[0], 0); // seeded transparent entry leads the table

    // Frame 0 draws the translucent pixel as itself.
    let idat = &chunks.iter().find(|(f, _)| f == b"IDAT").unwrap().1;
    assert_eq!(inflate(idat), vec![0, entry_of(glass), entry_of(blue)]);

    // Frame 1: the locked position emits the transparent index despite the
    // new opaque color, and the unchanged pixel recycles as usual.
    let fdat = &chunks.iter().find(|(f, _)| f == b"fdAT").unwrap().1;
    assert_eq!(inflate(&fdat[4..]), vec![0, 0, 0]);
}

#[test]
fn sprite_frames_are_fully_redrawn() {
    let config = EncodeConfig::new(Format::Png, 2, 1)
        .quality(0.3)
        .style(AnimationStyle::Sprite);
    let mut encoder =
        Encoder::new(config, RawBackend).unwrap().with_compressor(Box::new(Flate2Compressor));
    let red = rgba(200, 0, 0, 255);
    encoder.add_frame(solid_frame(2, 1, red)).unwrap();
    encoder.add_frame(solid_frame(2, 1, red)).unwrap();
    let out = encoder.encode().unwrap();

    let chunks = png_chunks(&out);
    for (fourcc, data) in &chunks {
        if fourcc == b"fcTL" {
            assert_eq!(&data[24..], &[1, 0]); // dispose background, blend source
        }
    }
    // Identical frames still carry their pixels instead of recycling.
    let idat = &chunks.iter().find(|(f, _)| f == b"IDAT").unwrap().1;
    let fdat = &chunks.iter().find(|(f, _)| f == b"fdAT").unwrap().1;
    assert_eq!(inflate(idat), inflate(&fdat[4..]));
    assert_ne!(inflate(idat), vec![0, 0, 0]);
}

#[test]
fn animated_webp_layout() {
    let config = EncodeConfig::new(Format::WebP, 2, 2).quality(0.8).delay_ms(250);
    let mut encoder = Encoder::new(config, RawBackend).unwrap();
    encoder.add_frame(solid_frame(2, 2, rgba(200, 0, 0, 255))).unwrap();
    encoder.add_frame(solid_frame(2, 2, rgba(0, 200, 0, 255))).unwrap();
    let out = encoder.encode().unwrap();

    assert_eq!(&out[..4], b"RIFF");
    assert_eq!(
        u32::from_le_bytes(out[4..8].try_into().unwrap()) as usize,
        out.len() - 8
    );
    assert_eq!(&out[8..12], b"WEBP");
    assert_eq!(&out[12..16], b"VP8X");
    assert_eq!(out[20], 0x02); // animation flag
    assert_eq!(&out[24..30], &[1, 0, 0, 1, 0, 0]); // canvas minus one, u24

    assert_eq!(&out[30..34], b"ANIM");
    let anmf_count = out.windows(4).filter(|w| w == b"ANMF").count();
    assert_eq!(anmf_count, 2);
    // Each frame's VP8 chunk is carried verbatim: 16 raw RGBA bytes.
    let first = out.windows(4).position(|w| w == b"ANMF").unwrap();
    assert_eq!(
        u32::from_le_bytes(out[first + 4..first + 8].try_into().unwrap()),
        16 + 8 + 16
    );
    assert_eq!(&out[first + 20..first + 23], &[250, 0, 0]);
    assert_eq!(&out[first + 24..first + 28], b"VP8 ");
}

#[test]
fn single_frame_webp_has_no_animation_chunks() {
    let config = EncodeConfig::new(Format::WebP, 2, 2).quality(0.8);
    let mut encoder = Encoder::new(config, RawBackend).unwrap();
    encoder.add_frame(solid_frame(2, 2, rgba(200, 0, 0, 255))).unwrap();
    let out = encoder.encode().unwrap();

    assert_eq!(out[20], 0x00);
    assert!(!out.windows(4).any(|w| w == b"ANIM"));
    assert!(!out.windows(4).any(|w| w == b"ANMF"));
    assert_eq!(&out[30..34], b"VP8 ");
}

#[test]
fn driver_reports_progress_across_stages() {
    let config = EncodeConfig::new(Format::Png, 2, 2).quality(0.3);
    let mut encoder =
        Encoder::new(config, RawBackend).unwrap().with_compressor(Box::new(Flate2Compressor));
    encoder.add_frame(solid_frame(2, 2, rgba(200, 0, 0, 255))).unwrap();
    encoder.add_frame(solid_frame(2, 2, rgba(0, 0, 200, 255))).unwrap();

    let mut driver = encoder.driver().unwrap();
    let mut ticks = 0;
    let mut last = driver.progress();
    assert_eq!(last, 0.0);
    while !driver.tick().unwrap() {
        ticks += 1;
        assert!(driver.progress() > last);
        last = driver.progress();
    }
    // 2 counting ticks, 2 rendering ticks, 1 packing tick.
    assert_eq!(ticks + 1, 5);
    assert_eq!(driver.progress(), 1.0);
    assert!(!driver.output().is_empty());
}
