//! Item-level reader over a parsed HEIF file.

use std::path::Path;

use tracing::debug;

use super::boxes::{FourCC, HevcDecoderConfig, ImageSpatialExtents, ItemId, ItemProperty, NclxColor};
use super::parser::{parse, parse_grid_payload, HeifMeta};
use super::ContainerError;
use crate::grid::GridDescriptor;

/// Identifier of a metadata context (a `meta` box) inside the file.
pub type ContextId = u32;

/// Context id of the root-level `meta` box, the only context this reader exposes.
pub const ROOT_CONTEXT: ContextId = 1;

/// Annex-B start code inserted before every NAL unit.
const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Item-level access to a coded-image container.
///
/// Every method is scoped by a [`ContextId`]; lists are returned in the order
/// stored in the container and are never re-sorted.
pub trait ContainerReader {
    /// Context id of the root-level metadata.
    fn context_id(&self) -> ContextId;

    /// Ids of all items of `item_type`, in `iinf` order.
    fn item_list_by_type(
        &self,
        context: ContextId,
        item_type: FourCC,
    ) -> Result<Vec<ItemId>, ContainerError>;

    /// Targets of `reference_type` edges leaving `from`.
    fn referenced_item_list_by_type(
        &self,
        context: ContextId,
        from: ItemId,
        reference_type: FourCC,
    ) -> Result<Vec<ItemId>, ContainerError>;

    /// Sources of `reference_type` edges pointing at `to` (reverse lookup).
    fn referenced_to_item_list_by_type(
        &self,
        context: ContextId,
        to: ItemId,
        reference_type: FourCC,
    ) -> Result<Vec<ItemId>, ContainerError>;

    /// Raw payload of an item, all extents concatenated.
    fn item_data(&self, context: ContextId, item: ItemId) -> Result<Vec<u8>, ContainerError>;

    /// Payload of a coded image item as one Annex-B access unit.
    ///
    /// Decoder parameter sets are taken from `config_source` when given
    /// (tiles after the first borrow them from the first tile), otherwise
    /// from the item itself.
    fn item_data_with_decoder_parameters(
        &self,
        context: ContextId,
        item: ItemId,
        config_source: Option<ItemId>,
    ) -> Result<Vec<u8>, ContainerError>;

    /// Geometry of a `grid` item.
    fn item_grid(&self, context: ContextId, item: ItemId) -> Result<GridDescriptor, ContainerError>;

    /// Declared `ispe` size of an item, if any.
    fn item_extents(
        &self,
        context: ContextId,
        item: ItemId,
    ) -> Result<Option<ImageSpatialExtents>, ContainerError>;

    /// `nclx` colour description of an item, if any.
    fn item_color(&self, context: ContextId, item: ItemId) -> Result<Option<NclxColor>, ContainerError>;
}

/// File-backed HEIF reader. Owns the file bytes and the parsed item tables.
#[derive(Debug, Clone)]
pub struct HeifReader {
    data: Vec<u8>,
    meta: HeifMeta,
}

impl HeifReader {
    /// Read and parse a HEIF file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        debug!(path = %path.display(), bytes = data.len(), "read container");
        Self::from_bytes(data)
    }

    /// Parse a HEIF file held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ContainerError> {
        let meta = parse(&data)?;
        debug!(
            brand = %meta.major_brand,
            items = meta.item_infos.len(),
            properties = meta.properties.len(),
            references = meta.references.len(),
            "parsed meta box"
        );
        Ok(Self { data, meta })
    }

    /// Parsed item tables.
    pub fn meta(&self) -> &HeifMeta {
        &self.meta
    }

    fn check_context(&self, context: ContextId) -> Result<(), ContainerError> {
        if context == ROOT_CONTEXT {
            Ok(())
        } else {
            Err(ContainerError::UnknownContext(context))
        }
    }

    fn check_item(&self, item: ItemId) -> Result<FourCC, ContainerError> {
        self.meta
            .item_info(item)
            .map(|info| info.item_type)
            .ok_or(ContainerError::MissingItem(item))
    }

    fn decoder_config(&self, item: ItemId) -> Result<&HevcDecoderConfig, ContainerError> {
        self.meta
            .item_properties(item)
            .find_map(|p| match p {
                ItemProperty::HevcConfig(config) => Some(config),
                _ => None,
            })
            .ok_or(ContainerError::MissingDecoderConfig(item))
    }

    /// Resolve one extent to an absolute byte range of the file.
    fn extent_range(
        &self,
        item: ItemId,
        method: u8,
        base: u64,
        offset: u64,
        length: u64,
    ) -> Result<std::ops::Range<usize>, ContainerError> {
        let source = match method {
            0 => 0..self.data.len(),
            1 => self.meta.idat.clone().ok_or(ContainerError::MissingData(item))?,
            _ => return Err(ContainerError::UnsupportedConstruction { item, method }),
        };

        let start = base
            .checked_add(offset)
            .and_then(|rel| usize::try_from(rel).ok())
            .and_then(|rel| source.start.checked_add(rel))
            .filter(|&start| start <= source.end)
            .ok_or(ContainerError::MissingData(item))?;

        // Length 0 means "up to the end of the source"
        let end = if length == 0 {
            source.end
        } else {
            usize::try_from(length)
                .ok()
                .and_then(|len| start.checked_add(len))
                .filter(|&end| end <= source.end)
                .ok_or(ContainerError::MissingData(item))?
        };

        Ok(start..end)
    }
}

impl ContainerReader for HeifReader {
    fn context_id(&self) -> ContextId {
        ROOT_CONTEXT
    }

    fn item_list_by_type(
        &self,
        context: ContextId,
        item_type: FourCC,
    ) -> Result<Vec<ItemId>, ContainerError> {
        self.check_context(context)?;
        Ok(self
            .meta
            .item_infos
            .iter()
            .filter(|info| info.item_type == item_type)
            .map(|info| info.item_id)
            .collect())
    }

    fn referenced_item_list_by_type(
        &self,
        context: ContextId,
        from: ItemId,
        reference_type: FourCC,
    ) -> Result<Vec<ItemId>, ContainerError> {
        self.check_context(context)?;
        self.check_item(from)?;
        Ok(self
            .meta
            .references
            .iter()
            .filter(|r| r.from_item_id == from && r.reference_type == reference_type)
            .flat_map(|r| r.to_item_ids.iter().copied())
            .collect())
    }

    fn referenced_to_item_list_by_type(
        &self,
        context: ContextId,
        to: ItemId,
        reference_type: FourCC,
    ) -> Result<Vec<ItemId>, ContainerError> {
        self.check_context(context)?;
        self.check_item(to)?;
        Ok(self
            .meta
            .references
            .iter()
            .filter(|r| r.reference_type == reference_type && r.to_item_ids.contains(&to))
            .map(|r| r.from_item_id)
            .collect())
    }

    fn item_data(&self, context: ContextId, item: ItemId) -> Result<Vec<u8>, ContainerError> {
        self.check_context(context)?;
        self.check_item(item)?;

        let loc = self
            .meta
            .item_location(item)
            .ok_or(ContainerError::MissingData(item))?;
        if loc.extents.is_empty() {
            return Err(ContainerError::MissingData(item));
        }

        let mut out = Vec::new();
        for &(offset, length) in &loc.extents {
            let range =
                self.extent_range(item, loc.construction_method, loc.base_offset, offset, length)?;
            out.extend_from_slice(&self.data[range]);
        }
        Ok(out)
    }

    fn item_data_with_decoder_parameters(
        &self,
        context: ContextId,
        item: ItemId,
        config_source: Option<ItemId>,
    ) -> Result<Vec<u8>, ContainerError> {
        self.check_context(context)?;
        let config = self.decoder_config(config_source.unwrap_or(item))?;
        let sample = self.item_data(context, item)?;

        let parameter_bytes: usize = config.nal_units.iter().map(|n| n.len() + 4).sum();
        let mut out = Vec::with_capacity(parameter_bytes + sample.len() + 16);
        for nal in &config.nal_units {
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(nal);
        }

        // Rewrite length-prefixed NAL units with start codes
        let length_size = usize::from(config.nal_length_size);
        let mut pos = 0;
        while pos < sample.len() {
            let header = sample
                .get(pos..pos + length_size)
                .ok_or(ContainerError::Truncated("hevc sample"))?;
            let len = header.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
            pos += length_size;

            let nal = pos
                .checked_add(len)
                .and_then(|end| sample.get(pos..end))
                .ok_or(ContainerError::Truncated("hevc sample"))?;
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(nal);
            pos += len;
        }

        Ok(out)
    }

    fn item_grid(&self, context: ContextId, item: ItemId) -> Result<GridDescriptor, ContainerError> {
        let item_type = self.check_item(item)?;
        if item_type != FourCC::GRID {
            return Err(ContainerError::InvalidGrid {
                item,
                reason: format!("item type is '{item_type}'"),
            });
        }

        let payload = self.item_data(context, item)?;
        parse_grid_payload(&payload).map_err(|reason| ContainerError::InvalidGrid { item, reason })
    }

    fn item_extents(
        &self,
        context: ContextId,
        item: ItemId,
    ) -> Result<Option<ImageSpatialExtents>, ContainerError> {
        self.check_context(context)?;
        self.check_item(item)?;
        Ok(self.meta.item_properties(item).find_map(|p| match p {
            ItemProperty::ImageExtents(ext) => Some(*ext),
            _ => None,
        }))
    }

    fn item_color(&self, context: ContextId, item: ItemId) -> Result<Option<NclxColor>, ContainerError> {
        self.check_context(context)?;
        self.check_item(item)?;
        Ok(self.meta.item_properties(item).find_map(|p| match p {
            ItemProperty::Nclx(color) => Some(*color),
            _ => None,
        }))
    }
}
