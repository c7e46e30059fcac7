//! HEIF container parser.
//!
//! Walks the top-level `ftyp` and `meta` boxes and collects the item tables
//! the reader needs. Media data is never copied here; item payloads are
//! resolved lazily through [`ItemLocation`] offsets.

use std::ops::Range;

use super::boxes::{
    BmffBox, BoxIterator, ByteReader, FourCC, HevcDecoderConfig, ImageSpatialExtents, ItemId,
    ItemInfo, ItemLocation, ItemProperty, ItemReference, NclxColor, PropertyAssociation,
};
use super::ContainerError;
use crate::grid::GridDescriptor;

/// Brands accepted as HEIF/HEIC, either as major or compatible brand.
const HEIF_BRANDS: [FourCC; 6] = [
    FourCC(*b"heic"),
    FourCC(*b"heix"),
    FourCC(*b"hevc"),
    FourCC(*b"hevx"),
    FourCC(*b"mif1"),
    FourCC(*b"msf1"),
];

/// Item tables of the root-level `meta` box.
#[derive(Debug, Clone)]
pub struct HeifMeta {
    pub major_brand: FourCC,
    pub compatible_brands: Vec<FourCC>,
    pub primary_item_id: Option<ItemId>,
    pub item_infos: Vec<ItemInfo>,
    pub item_locations: Vec<ItemLocation>,
    /// `ipco` entries; `ipma` indices are 1-based into this list
    pub properties: Vec<ItemProperty>,
    pub associations: Vec<PropertyAssociation>,
    pub references: Vec<ItemReference>,
    /// Absolute byte range of the `idat` payload in the file
    pub idat: Option<Range<usize>>,
}

impl HeifMeta {
    fn empty(major_brand: FourCC, compatible_brands: Vec<FourCC>) -> Self {
        Self {
            major_brand,
            compatible_brands,
            primary_item_id: None,
            item_infos: Vec::new(),
            item_locations: Vec::new(),
            properties: Vec::new(),
            associations: Vec::new(),
            references: Vec::new(),
            idat: None,
        }
    }

    pub fn item_info(&self, item_id: ItemId) -> Option<&ItemInfo> {
        self.item_infos.iter().find(|i| i.item_id == item_id)
    }

    pub fn item_location(&self, item_id: ItemId) -> Option<&ItemLocation> {
        self.item_locations.iter().find(|l| l.item_id == item_id)
    }

    /// Properties associated with an item, in `ipma` order.
    pub fn item_properties(&self, item_id: ItemId) -> impl Iterator<Item = &ItemProperty> + '_ {
        self.associations
            .iter()
            .filter(move |a| a.item_id == item_id)
            .flat_map(|a| a.properties.iter())
            .filter_map(|&index| {
                let index = usize::from(index).checked_sub(1)?;
                self.properties.get(index)
            })
    }
}

/// Parse the file-level structure of a HEIF file.
pub fn parse(data: &[u8]) -> Result<HeifMeta, ContainerError> {
    let mut brands = None;
    let mut meta_box = None;

    for top in BoxIterator::new(data) {
        match top.box_type {
            FourCC::FTYP if brands.is_none() => brands = Some(parse_ftyp(top.content)?),
            FourCC::META if meta_box.is_none() => meta_box = Some(top),
            _ => {}
        }
    }

    let (major, compatible) =
        brands.ok_or_else(|| ContainerError::NotHeif("missing ftyp box".to_string()))?;

    let is_heif = HEIF_BRANDS.contains(&major) || compatible.iter().any(|b| HEIF_BRANDS.contains(b));
    if !is_heif {
        return Err(ContainerError::NotHeif(format!(
            "unrecognized brand '{major}'"
        )));
    }

    let meta_box =
        meta_box.ok_or_else(|| ContainerError::NotHeif("missing meta box".to_string()))?;

    let mut meta = HeifMeta::empty(major, compatible);
    parse_meta(&meta_box, &mut meta)?;
    Ok(meta)
}

fn parse_ftyp(content: &[u8]) -> Result<(FourCC, Vec<FourCC>), ContainerError> {
    let mut r = ByteReader::new(content, "ftyp");
    let major = FourCC::from_bytes(r.bytes(4)?).ok_or(ContainerError::Truncated("ftyp"))?;
    r.skip(4)?; // minor version

    let compatible = r.remaining().chunks_exact(4).filter_map(FourCC::from_bytes).collect();
    Ok((major, compatible))
}

fn parse_meta(meta_box: &BmffBox<'_>, meta: &mut HeifMeta) -> Result<(), ContainerError> {
    let mut r = ByteReader::new(meta_box.content, "meta");
    r.version_flags()?;
    let children = r.remaining();
    let children_base = meta_box.content_offset + r.position();

    for child in BoxIterator::new(children) {
        match child.box_type {
            FourCC::PITM => meta.primary_item_id = Some(parse_pitm(child.content)?),
            FourCC::IINF => meta.item_infos = parse_iinf(child.content)?,
            FourCC::ILOC => meta.item_locations = parse_iloc(child.content)?,
            FourCC::IREF => meta.references = parse_iref(child.content)?,
            FourCC::IPRP => parse_iprp(child.content, meta)?,
            FourCC::IDAT => {
                let start = children_base + child.content_offset;
                meta.idat = Some(start..start + child.content.len());
            }
            _ => {} // hdlr, dinf, ...
        }
    }

    Ok(())
}

fn parse_pitm(content: &[u8]) -> Result<ItemId, ContainerError> {
    let mut r = ByteReader::new(content, "pitm");
    let (version, _) = r.version_flags()?;
    r.id(version != 0)
}

fn parse_iinf(content: &[u8]) -> Result<Vec<ItemInfo>, ContainerError> {
    let mut r = ByteReader::new(content, "iinf");
    let (version, _) = r.version_flags()?;
    let entry_count = r.id(version != 0)? as usize;

    let infos = BoxIterator::new(r.remaining())
        .filter(|b| b.box_type == FourCC::INFE)
        .take(entry_count)
        .map(|b| parse_infe(b.content))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(infos)
}

fn parse_infe(content: &[u8]) -> Result<ItemInfo, ContainerError> {
    let mut r = ByteReader::new(content, "infe");
    let (version, flags) = r.version_flags()?;

    let item_id = r.id(version >= 3)?;
    r.skip(2)?; // item_protection_index

    // Item types only exist from version 2 on; older entries are never images
    let item_type = if version >= 2 {
        FourCC::from_bytes(r.bytes(4)?).ok_or(ContainerError::Truncated("infe"))?
    } else {
        FourCC(*b"    ")
    };

    let item_name = r.cstring();

    Ok(ItemInfo {
        item_id,
        item_type,
        item_name,
        hidden: flags & 1 != 0,
    })
}

fn parse_iloc(content: &[u8]) -> Result<Vec<ItemLocation>, ContainerError> {
    let mut r = ByteReader::new(content, "iloc");
    let (version, _) = r.version_flags()?;

    let sizes = r.u8()?;
    let offset_size = usize::from(sizes >> 4);
    let length_size = usize::from(sizes & 0xF);
    let sizes = r.u8()?;
    let base_offset_size = usize::from(sizes >> 4);
    let index_size = if version >= 1 { usize::from(sizes & 0xF) } else { 0 };

    let item_count = r.id(version >= 2)?;
    let mut locations = Vec::with_capacity(item_count.min(4096) as usize);

    for _ in 0..item_count {
        let item_id = r.id(version >= 2)?;
        let construction_method = if version >= 1 {
            (r.u16()? & 0xF) as u8
        } else {
            0
        };
        r.skip(2)?; // data_reference_index
        let base_offset = r.sized(base_offset_size)?;

        let extent_count = r.u16()?;
        let mut extents = Vec::with_capacity(usize::from(extent_count));
        for _ in 0..extent_count {
            r.sized(index_size)?;
            let offset = r.sized(offset_size)?;
            let length = r.sized(length_size)?;
            extents.push((offset, length));
        }

        locations.push(ItemLocation {
            item_id,
            construction_method,
            base_offset,
            extents,
        });
    }

    Ok(locations)
}

fn parse_iref(content: &[u8]) -> Result<Vec<ItemReference>, ContainerError> {
    let mut r = ByteReader::new(content, "iref");
    let (version, _) = r.version_flags()?;
    let wide = version != 0;

    let mut references = Vec::new();
    for reference in BoxIterator::new(r.remaining()) {
        let mut rr = ByteReader::new(reference.content, "iref");
        let from_item_id = rr.id(wide)?;
        let count = rr.u16()?;
        let to_item_ids = (0..count)
            .map(|_| rr.id(wide))
            .collect::<Result<Vec<_>, _>>()?;

        references.push(ItemReference {
            reference_type: reference.box_type,
            from_item_id,
            to_item_ids,
        });
    }

    Ok(references)
}

fn parse_iprp(content: &[u8], meta: &mut HeifMeta) -> Result<(), ContainerError> {
    for child in BoxIterator::new(content) {
        match child.box_type {
            FourCC::IPCO => {
                meta.properties = BoxIterator::new(child.content).map(parse_property).collect();
            }
            FourCC::IPMA => meta.associations.extend(parse_ipma(child.content)?),
            _ => {}
        }
    }
    Ok(())
}

/// Malformed properties degrade to `Unknown` so the 1-based indices stay aligned.
fn parse_property(property: BmffBox<'_>) -> ItemProperty {
    let parsed = match property.box_type {
        FourCC::ISPE => parse_ispe(property.content).map(ItemProperty::ImageExtents),
        FourCC::HVCC => parse_hvcc(property.content).map(ItemProperty::HevcConfig),
        FourCC::COLR => parse_colr(property.content),
        other => Ok(ItemProperty::Unknown(other)),
    };
    parsed.unwrap_or(ItemProperty::Unknown(property.box_type))
}

fn parse_ispe(content: &[u8]) -> Result<ImageSpatialExtents, ContainerError> {
    let mut r = ByteReader::new(content, "ispe");
    r.version_flags()?;
    Ok(ImageSpatialExtents {
        width: r.u32()?,
        height: r.u32()?,
    })
}

fn parse_hvcc(content: &[u8]) -> Result<HevcDecoderConfig, ContainerError> {
    let mut r = ByteReader::new(content, "hvcC");
    let header = r.bytes(23)?;

    let general_profile_idc = header[1] & 0x1F;
    let chroma_format = header[16] & 0x3;
    let bit_depth_luma = (header[17] & 0x7) + 8;
    let nal_length_size = (header[21] & 0x3) + 1;
    let num_arrays = header[22];

    let mut nal_units = Vec::new();
    for _ in 0..num_arrays {
        r.u8()?; // array_completeness + nal_unit_type
        let count = r.u16()?;
        for _ in 0..count {
            let len = usize::from(r.u16()?);
            nal_units.push(r.bytes(len)?.to_vec());
        }
    }

    Ok(HevcDecoderConfig {
        general_profile_idc,
        chroma_format,
        bit_depth_luma,
        nal_length_size,
        nal_units,
    })
}

fn parse_colr(content: &[u8]) -> Result<ItemProperty, ContainerError> {
    let mut r = ByteReader::new(content, "colr");
    let colour_type = FourCC::from_bytes(r.bytes(4)?).ok_or(ContainerError::Truncated("colr"))?;
    if colour_type != FourCC(*b"nclx") {
        // ICC profiles are carried through untouched by the raster stage
        return Ok(ItemProperty::Unknown(FourCC::COLR));
    }

    Ok(ItemProperty::Nclx(NclxColor {
        color_primaries: r.u16()?,
        transfer_characteristics: r.u16()?,
        matrix_coefficients: r.u16()?,
        full_range: r.u8()? >> 7 != 0,
    }))
}

fn parse_ipma(content: &[u8]) -> Result<Vec<PropertyAssociation>, ContainerError> {
    let mut r = ByteReader::new(content, "ipma");
    let (version, flags) = r.version_flags()?;
    let entry_count = r.u32()?;

    let mut associations = Vec::with_capacity(entry_count.min(4096) as usize);
    for _ in 0..entry_count {
        let item_id = r.id(version >= 1)?;
        let count = r.u8()?;
        let properties = (0..count)
            .map(|_| {
                if flags & 1 != 0 {
                    r.u16().map(|v| v & 0x7FFF)
                } else {
                    r.u8().map(|v| u16::from(v & 0x7F))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        associations.push(PropertyAssociation {
            item_id,
            properties,
        });
    }

    Ok(associations)
}

/// Parse the payload of a `grid` item (ISO/IEC 23008-12, ImageGrid).
pub fn parse_grid_payload(data: &[u8]) -> Result<GridDescriptor, String> {
    let mut r = ByteReader::new(data, "grid");
    let truncated = |e: ContainerError| e.to_string();

    let version = r.u8().map_err(truncated)?;
    if version != 0 {
        return Err(format!("unsupported grid version {version}"));
    }
    let flags = r.u8().map_err(truncated)?;
    let rows = u32::from(r.u8().map_err(truncated)?) + 1;
    let columns = u32::from(r.u8().map_err(truncated)?) + 1;

    let field_size = if flags & 1 != 0 { 4 } else { 2 };
    let output_width = r.sized(field_size).map_err(truncated)? as u32;
    let output_height = r.sized(field_size).map_err(truncated)? as u32;

    if output_width == 0 || output_height == 0 {
        return Err(format!(
            "zero output size {output_width}x{output_height}"
        ));
    }

    Ok(GridDescriptor {
        output_width,
        output_height,
        columns,
        rows,
    })
}
