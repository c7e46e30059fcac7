//! Synthetic HEIF files and a deterministic stand-in HEVC decoder.
//!
//! Tiles are not real HEVC. Each tile sample holds one NAL unit whose body
//! is `width (u32) | height (u32) | y | cb | cr`; [`FlatDecoder`] turns that
//! into a flat 4:2:0 frame. A NAL body too short for that layout is rejected
//! at submit time.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use heifconv_core::decode::{ChromaFormat, DecodeError, DecodeSession, HevcDecoder, PlanarFrame};

/// NAL header of the fake coded slices.
const SLICE_HEADER: [u8; 2] = [0x26, 0x01];
/// Parameter set carried in `hvcC`; prepended to every access unit.
const PARAMETER_SET: [u8; 3] = [0x40, 0x01, 0x0C];

/// One coded image item: a flat colour of the given size.
#[derive(Debug, Clone, Copy)]
pub struct Flat {
    pub width: u32,
    pub height: u32,
    pub luma: u8,
}

impl Flat {
    pub fn new(width: u32, height: u32, luma: u8) -> Self {
        Self {
            width,
            height,
            luma,
        }
    }

    fn nal(&self) -> Vec<u8> {
        let mut nal = SLICE_HEADER.to_vec();
        nal.extend_from_slice(&self.width.to_be_bytes());
        nal.extend_from_slice(&self.height.to_be_bytes());
        nal.extend_from_slice(&[self.luma, 128, 128]);
        nal
    }
}

/// Builds a HEIF file: `ftyp`, `meta` and one `mdat` holding tile,
/// thumbnail and EXIF payloads. The grid payload lives in `idat`.
#[derive(Debug, Clone)]
pub struct HeifBuilder {
    output: Option<(u32, u32, u32, u32)>,
    tiles: Vec<Flat>,
    dimg_order: Option<Vec<usize>>,
    broken_tile: Option<usize>,
    thumbnail: Option<Flat>,
    exif: Option<Vec<u8>>,
    tile_extents: bool,
    shared_decoder_config: bool,
}

impl HeifBuilder {
    /// A grid of `columns x rows` tiles cropped to `width x height`.
    pub fn grid(width: u32, height: u32, columns: u32, rows: u32) -> Self {
        Self {
            output: Some((width, height, columns, rows)),
            tiles: Vec::new(),
            dimg_order: None,
            broken_tile: None,
            thumbnail: None,
            exif: None,
            tile_extents: true,
            shared_decoder_config: false,
        }
    }

    /// A file with coded images but no grid item.
    pub fn without_grid() -> Self {
        Self {
            output: None,
            ..Self::grid(1, 1, 1, 1)
        }
    }

    pub fn tile(mut self, tile: Flat) -> Self {
        self.tiles.push(tile);
        self
    }

    /// `count` tiles of one size, lumas 40, 90, 140, 190, 240, 40, ...
    pub fn uniform_tiles(mut self, count: usize, width: u32, height: u32) -> Self {
        for i in 0..count {
            self.tiles.push(Flat::new(width, height, tile_luma(i)));
        }
        self
    }

    /// Store `dimg` targets in this order (indices into the tile list).
    /// An empty order writes no `dimg` edge at all.
    pub fn dimg_order(mut self, order: Vec<usize>) -> Self {
        self.dimg_order = Some(order);
        self
    }

    /// Replace tile `index`'s slice with one the decoder rejects.
    pub fn broken_tile(mut self, index: usize) -> Self {
        self.broken_tile = Some(index);
        self
    }

    pub fn thumbnail(mut self, thumbnail: Flat) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    /// Attach an EXIF item with this orientation tag.
    pub fn orientation(self, tag: u16) -> Self {
        self.exif_payload(exif_item_payload(tag))
    }

    /// Attach an EXIF item with a raw payload.
    pub fn exif_payload(mut self, payload: Vec<u8>) -> Self {
        self.exif = Some(payload);
        self
    }

    /// Omit `ispe` on tiles so their decoded size is not cross-checked.
    pub fn without_tile_extents(mut self) -> Self {
        self.tile_extents = false;
        self
    }

    /// Attach `hvcC` only to the first tile in `dimg` order.
    pub fn shared_decoder_config(mut self) -> Self {
        self.shared_decoder_config = true;
        self
    }

    /// Index into the tile list of the first `dimg` target.
    fn first_tile_index(&self) -> usize {
        self.dimg_order
            .as_ref()
            .and_then(|order| order.first().copied())
            .unwrap_or(0)
    }

    pub fn build(&self) -> Vec<u8> {
        let ftyp = ftyp();
        let (probe, mdat_payload) = self.meta_and_mdat(0);
        // Offsets are fixed width, so the meta size does not depend on them
        let mdat_start = ftyp.len() + probe.len() + 8;
        let (meta, _) = self.meta_and_mdat(mdat_start as u32);

        let mut file = ftyp;
        file.extend_from_slice(&meta);
        file.extend_from_slice(&bx(b"mdat", &mdat_payload));
        file
    }

    pub fn grid_id(&self) -> u16 {
        1
    }

    pub fn tile_id(&self, index: usize) -> u16 {
        2 + index as u16
    }

    pub fn thumbnail_id(&self) -> u16 {
        2 + self.tiles.len() as u16
    }

    pub fn exif_id(&self) -> u16 {
        3 + self.tiles.len() as u16
    }

    fn meta_and_mdat(&self, mdat_start: u32) -> (Vec<u8>, Vec<u8>) {
        let mut mdat = Vec::new();
        // (item id, item type, construction method, offset, length)
        let mut items: Vec<(u16, &[u8; 4], u16, u32, u32)> = Vec::new();
        let mut idat = Vec::new();

        if let Some((width, height, columns, rows)) = self.output {
            idat = grid_payload(width, height, columns, rows);
            items.push((self.grid_id(), b"grid", 1, 0, idat.len() as u32));
        }

        for (index, tile) in self.tiles.iter().enumerate() {
            let nal = if self.broken_tile == Some(index) {
                vec![SLICE_HEADER[0], SLICE_HEADER[1], 0xBA, 0xD0]
            } else {
                tile.nal()
            };
            let sample = length_prefixed(&nal);
            items.push((
                self.tile_id(index),
                b"hvc1",
                0,
                mdat_start + mdat.len() as u32,
                sample.len() as u32,
            ));
            mdat.extend_from_slice(&sample);
        }

        if let Some(thumbnail) = &self.thumbnail {
            let sample = length_prefixed(&thumbnail.nal());
            items.push((
                self.thumbnail_id(),
                b"hvc1",
                0,
                mdat_start + mdat.len() as u32,
                sample.len() as u32,
            ));
            mdat.extend_from_slice(&sample);
        }

        if let Some(exif) = &self.exif {
            items.push((
                self.exif_id(),
                b"Exif",
                0,
                mdat_start + mdat.len() as u32,
                exif.len() as u32,
            ));
            mdat.extend_from_slice(exif);
        }

        let mut children = Vec::new();
        children.extend_from_slice(&full_box(b"hdlr", 0, &hdlr_body()));
        children.extend_from_slice(&full_box(b"pitm", 0, &self.grid_id().to_be_bytes()));
        children.extend_from_slice(&iinf(&items));
        children.extend_from_slice(&iloc(&items));
        children.extend_from_slice(&self.iref());
        children.extend_from_slice(&self.iprp());
        if !idat.is_empty() {
            children.extend_from_slice(&bx(b"idat", &idat));
        }

        (full_box(b"meta", 0, &children), mdat)
    }

    fn iref(&self) -> Vec<u8> {
        let mut refs = Vec::new();
        if self.output.is_some() {
            let order: Vec<usize> = self
                .dimg_order
                .clone()
                .unwrap_or_else(|| (0..self.tiles.len()).collect());
            let targets: Vec<u16> = order.iter().map(|&i| self.tile_id(i)).collect();
            if !targets.is_empty() {
                refs.extend_from_slice(&reference(b"dimg", self.grid_id(), &targets));
            }
        }
        if self.thumbnail.is_some() {
            refs.extend_from_slice(&reference(b"thmb", self.thumbnail_id(), &[self.grid_id()]));
        }
        if self.exif.is_some() {
            refs.extend_from_slice(&reference(b"cdsc", self.exif_id(), &[self.grid_id()]));
        }
        full_box(b"iref", 0, &refs)
    }

    fn iprp(&self) -> Vec<u8> {
        // ipco indices are 1-based: 1 = hvcC, 2 = colr, then one ispe per image item
        let mut ipco = Vec::new();
        ipco.extend_from_slice(&bx(b"hvcC", &hvcc()));
        ipco.extend_from_slice(&bx(b"colr", &nclx_full_range_bt601()));

        let mut associations: Vec<(u16, Vec<u8>)> = Vec::new();
        let mut next_index = 3u8;
        let mut ispe_for = |ipco: &mut Vec<u8>, width: u32, height: u32| {
            let mut body = width.to_be_bytes().to_vec();
            body.extend_from_slice(&height.to_be_bytes());
            ipco.extend_from_slice(&full_box(b"ispe", 0, &body));
            let index = next_index;
            next_index += 1;
            index
        };

        if let Some((width, height, _, _)) = self.output {
            let index = ispe_for(&mut ipco, width, height);
            associations.push((self.grid_id(), vec![index]));
        }
        let first_tile = self.first_tile_index();
        for (i, tile) in self.tiles.iter().enumerate() {
            let mut props = if self.shared_decoder_config && i != first_tile {
                vec![2]
            } else {
                vec![1, 2]
            };
            if self.tile_extents {
                props.push(ispe_for(&mut ipco, tile.width, tile.height));
            }
            associations.push((self.tile_id(i), props));
        }
        if let Some(thumbnail) = &self.thumbnail {
            let index = ispe_for(&mut ipco, thumbnail.width, thumbnail.height);
            associations.push((self.thumbnail_id(), vec![1, 2, index]));
        }

        let mut ipma = (associations.len() as u32).to_be_bytes().to_vec();
        for (id, props) in &associations {
            ipma.extend_from_slice(&id.to_be_bytes());
            ipma.push(props.len() as u8);
            ipma.extend_from_slice(props);
        }

        let mut iprp = bx(b"ipco", &ipco);
        iprp.extend_from_slice(&full_box(b"ipma", 0, &ipma));
        bx(b"iprp", &iprp)
    }
}

/// Luma used by `uniform_tiles` for tile `index`; cycles through five values.
pub fn tile_luma(index: usize) -> u8 {
    const LUMAS: [u8; 5] = [40, 90, 140, 190, 240];
    LUMAS[index % LUMAS.len()]
}

/// EXIF item payload: 4-byte offset, `Exif\0\0`, then a TIFF with one
/// orientation entry.
pub fn exif_item_payload(orientation: u16) -> Vec<u8> {
    let mut payload = 6u32.to_be_bytes().to_vec();
    payload.extend_from_slice(b"Exif\0\0");
    payload.extend_from_slice(b"MM\0*");
    payload.extend_from_slice(&8u32.to_be_bytes());
    payload.extend_from_slice(&1u16.to_be_bytes());
    payload.extend_from_slice(&0x0112u16.to_be_bytes());
    payload.extend_from_slice(&3u16.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(&orientation.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&0u32.to_be_bytes());
    payload
}

fn bx(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = ((content.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(box_type);
    out.extend_from_slice(content);
    out
}

fn full_box(box_type: &[u8; 4], version: u8, content: &[u8]) -> Vec<u8> {
    let mut body = vec![version, 0, 0, 0];
    body.extend_from_slice(content);
    bx(box_type, &body)
}

fn ftyp() -> Vec<u8> {
    let mut body = b"heic".to_vec();
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(b"mif1heic");
    bx(b"ftyp", &body)
}

fn hdlr_body() -> Vec<u8> {
    let mut body = 0u32.to_be_bytes().to_vec();
    body.extend_from_slice(b"pict");
    body.extend_from_slice(&[0; 12]);
    body.push(0);
    body
}

fn iinf(items: &[(u16, &[u8; 4], u16, u32, u32)]) -> Vec<u8> {
    let mut body = (items.len() as u16).to_be_bytes().to_vec();
    for (id, item_type, _, _, _) in items {
        let mut infe = id.to_be_bytes().to_vec();
        infe.extend_from_slice(&0u16.to_be_bytes());
        infe.extend_from_slice(*item_type);
        infe.push(0);
        body.extend_from_slice(&full_box(b"infe", 2, &infe));
    }
    full_box(b"iinf", 0, &body)
}

/// Version 1 `iloc`: 4-byte offsets and lengths, no base offset.
fn iloc(items: &[(u16, &[u8; 4], u16, u32, u32)]) -> Vec<u8> {
    let mut body = vec![0x44, 0x00];
    body.extend_from_slice(&(items.len() as u16).to_be_bytes());
    for (id, _, method, offset, length) in items {
        body.extend_from_slice(&id.to_be_bytes());
        body.extend_from_slice(&method.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&offset.to_be_bytes());
        body.extend_from_slice(&length.to_be_bytes());
    }
    full_box(b"iloc", 1, &body)
}

fn reference(reference_type: &[u8; 4], from: u16, to: &[u16]) -> Vec<u8> {
    let mut body = from.to_be_bytes().to_vec();
    body.extend_from_slice(&(to.len() as u16).to_be_bytes());
    for id in to {
        body.extend_from_slice(&id.to_be_bytes());
    }
    bx(reference_type, &body)
}

fn grid_payload(width: u32, height: u32, columns: u32, rows: u32) -> Vec<u8> {
    let mut payload = vec![0, 1, (rows - 1) as u8, (columns - 1) as u8];
    payload.extend_from_slice(&width.to_be_bytes());
    payload.extend_from_slice(&height.to_be_bytes());
    payload
}

fn hvcc() -> Vec<u8> {
    let mut content = vec![0u8; 23];
    content[0] = 1;
    content[1] = 1;
    content[16] = 0xFD;
    content[17] = 0xF8;
    content[21] = 0x03; // 4-byte NAL lengths
    content[22] = 1;
    content.push(0xA0);
    content.extend_from_slice(&1u16.to_be_bytes());
    content.extend_from_slice(&(PARAMETER_SET.len() as u16).to_be_bytes());
    content.extend_from_slice(&PARAMETER_SET);
    content
}

fn nclx_full_range_bt601() -> Vec<u8> {
    let mut body = b"nclx".to_vec();
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&13u16.to_be_bytes());
    body.extend_from_slice(&6u16.to_be_bytes());
    body.push(0x80);
    body
}

fn length_prefixed(nal: &[u8]) -> Vec<u8> {
    let mut sample = (nal.len() as u32).to_be_bytes().to_vec();
    sample.extend_from_slice(nal);
    sample
}

/// Decodes the fake slices written by [`HeifBuilder`] into flat frames.
#[derive(Debug, Clone, Default)]
pub struct FlatDecoder {
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl FlatDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions currently alive.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl HevcDecoder for FlatDecoder {
    fn open(&self) -> Result<Box<dyn DecodeSession>, DecodeError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FlatSession {
            live: Arc::clone(&self.live),
            frame: None,
        }))
    }

    fn name(&self) -> &str {
        "flat"
    }
}

struct FlatSession {
    live: Arc<AtomicUsize>,
    frame: Option<PlanarFrame>,
}

impl Drop for FlatSession {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DecodeSession for FlatSession {
    fn submit(&mut self, access_unit: &[u8]) -> Result<(), DecodeError> {
        const START_CODE: [u8; 4] = [0, 0, 0, 1];
        let parameters = START_CODE.len() + PARAMETER_SET.len();
        if access_unit.get(..4) != Some(&START_CODE[..])
            || access_unit.get(4..parameters) != Some(&PARAMETER_SET[..])
        {
            return Err(DecodeError::Submit("missing parameter sets".to_string()));
        }

        // One slice NAL follows the parameter set
        let slice = access_unit
            .get(parameters..)
            .and_then(|rest| rest.strip_prefix(&START_CODE[..]))
            .ok_or_else(|| DecodeError::Submit("no slice NAL".to_string()))?;
        if slice.len() != 2 + 11 || slice[..2] != SLICE_HEADER {
            return Err(DecodeError::Submit(format!("bad slice of {} bytes", slice.len())));
        }

        let body = &slice[2..];
        let width = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
        let height = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
        let (cw, ch) = ChromaFormat::Yuv420.chroma_dimensions(width, height);
        let chroma = cw as usize * ch as usize;

        self.frame = Some(PlanarFrame {
            width,
            height,
            chroma: ChromaFormat::Yuv420,
            y: vec![body[8]; width as usize * height as usize],
            cb: vec![body[9]; chroma],
            cr: vec![body[10]; chroma],
        });
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Option<PlanarFrame>, DecodeError> {
        Ok(self.frame.take())
    }
}
