//! ISOBMFF box primitives and the item tables of a HEIF `meta` box.

use super::ContainerError;

/// Item identifier as stored in `iinf`/`iloc`/`iref`.
pub type ItemId = u32;

/// Four-character code identifying a box, item type or reference type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const META: Self = Self(*b"meta");
    pub const PITM: Self = Self(*b"pitm");
    pub const ILOC: Self = Self(*b"iloc");
    pub const IINF: Self = Self(*b"iinf");
    pub const INFE: Self = Self(*b"infe");
    pub const IPRP: Self = Self(*b"iprp");
    pub const IPCO: Self = Self(*b"ipco");
    pub const IPMA: Self = Self(*b"ipma");
    pub const IREF: Self = Self(*b"iref");
    pub const IDAT: Self = Self(*b"idat");
    pub const ISPE: Self = Self(*b"ispe");
    pub const HVCC: Self = Self(*b"hvcC");
    pub const COLR: Self = Self(*b"colr");

    /// HEVC coded image item.
    pub const HVC1: Self = Self(*b"hvc1");
    /// Image grid item.
    pub const GRID: Self = Self(*b"grid");
    /// EXIF metadata item.
    pub const EXIF: Self = Self(*b"Exif");

    /// Derived image reference (grid -> tiles).
    pub const DIMG: Self = Self(*b"dimg");
    /// Thumbnail reference (thumbnail -> master).
    pub const THMB: Self = Self(*b"thmb");
    /// Content description reference (metadata -> described item).
    pub const CDSC: Self = Self(*b"cdsc");

    /// Create from the first four bytes of a slice.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let code: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self(code))
    }

    /// Printable form, `????` when not ASCII.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A box located inside a parent buffer.
#[derive(Debug)]
pub struct BmffBox<'a> {
    pub box_type: FourCC,
    /// Offset of `content` relative to the start of the buffer that was iterated.
    pub content_offset: usize,
    pub content: &'a [u8],
}

/// Iterates sibling boxes in a buffer. Stops at the first malformed header.
pub struct BoxIterator<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BoxIterator<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl<'a> Iterator for BoxIterator<'a> {
    type Item = BmffBox<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data.get(self.offset..)?;
        if data.len() < 8 {
            return None;
        }

        let size_32 = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let box_type = FourCC::from_bytes(&data[4..8])?;

        let (size, header_size) = match size_32 {
            1 => {
                let ext: [u8; 8] = data.get(8..16)?.try_into().ok()?;
                (usize::try_from(u64::from_be_bytes(ext)).ok()?, 16)
            }
            // Box extends to the end of the enclosing buffer
            0 => (data.len(), 8),
            n => (n as usize, 8),
        };

        if size < header_size || size > data.len() {
            return None;
        }

        let item = BmffBox {
            box_type,
            content_offset: self.offset + header_size,
            content: &data[header_size..size],
        };
        self.offset += size;
        Some(item)
    }
}

/// Bounds-checked big-endian reader over a box payload.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    /// `context` names the box being read, for error messages.
    pub fn new(data: &'a [u8], context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ContainerError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(ContainerError::Truncated(self.context))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ContainerError> {
        self.bytes(len).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, ContainerError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ContainerError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ContainerError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read an unsigned integer of `size` bytes (0, 1, 2, 4 or 8). Size 0 reads nothing and yields 0.
    pub fn sized(&mut self, size: usize) -> Result<u64, ContainerError> {
        let bytes = self.bytes(size)?;
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    /// `u16` when `wide` is false, `u32` otherwise.
    pub fn id(&mut self, wide: bool) -> Result<u32, ContainerError> {
        if wide {
            self.u32()
        } else {
            self.u16().map(u32::from)
        }
    }

    /// Full-box version and flags.
    pub fn version_flags(&mut self) -> Result<(u8, u32), ContainerError> {
        let v = self.u32()?;
        Ok(((v >> 24) as u8, v & 0x00FF_FFFF))
    }

    /// Null-terminated UTF-8 string; a missing terminator consumes the rest.
    pub fn cstring(&mut self) -> String {
        let rest = self.remaining();
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let s = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += (end + 1).min(rest.len());
        s
    }
}

/// Entry of the `iloc` box.
#[derive(Debug, Clone)]
pub struct ItemLocation {
    pub item_id: ItemId,
    /// 0 = file offset, 1 = idat offset, 2 = item offset
    pub construction_method: u8,
    pub base_offset: u64,
    /// (offset, length) pairs
    pub extents: Vec<(u64, u64)>,
}

/// Entry of the `iinf` box.
#[derive(Debug, Clone)]
pub struct ItemInfo {
    pub item_id: ItemId,
    pub item_type: FourCC,
    pub item_name: String,
    pub hidden: bool,
}

/// `ispe` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpatialExtents {
    pub width: u32,
    pub height: u32,
}

/// `hvcC` property: the parts needed to rebuild an Annex-B stream.
#[derive(Debug, Clone)]
pub struct HevcDecoderConfig {
    pub general_profile_idc: u8,
    pub chroma_format: u8,
    pub bit_depth_luma: u8,
    /// Size in bytes of the NAL length prefix used by item data.
    pub nal_length_size: u8,
    /// Parameter-set NAL units (VPS, SPS, PPS, SEI) in stored order.
    pub nal_units: Vec<Vec<u8>>,
}

/// `colr` property of type `nclx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NclxColor {
    pub color_primaries: u16,
    pub transfer_characteristics: u16,
    pub matrix_coefficients: u16,
    pub full_range: bool,
}

/// Entry of the `ipco` box. Indices into this list are 1-based in `ipma`.
#[derive(Debug, Clone)]
pub enum ItemProperty {
    ImageExtents(ImageSpatialExtents),
    HevcConfig(HevcDecoderConfig),
    Nclx(NclxColor),
    Unknown(FourCC),
}

/// Entry of the `ipma` box.
#[derive(Debug, Clone)]
pub struct PropertyAssociation {
    pub item_id: ItemId,
    /// 1-based property indices in association order
    pub properties: Vec<u16>,
}

/// Single reference of the `iref` box.
#[derive(Debug, Clone)]
pub struct ItemReference {
    pub reference_type: FourCC,
    pub from_item_id: ItemId,
    pub to_item_ids: Vec<ItemId>,
}
