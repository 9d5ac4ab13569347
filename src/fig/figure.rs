//! `.fig` mesh codec.
//!
//! A figure is one part's geometry with up to 8 morph-target variants.
//! Vertex positions are stored in interleaved four-vertex blocks per
//! morph, normals in interleaved four-normal blocks, and texture
//! coordinates packed by the item-group law in [`super::uv`]. Triangles
//! index a deduplicated (position, normal, uv) component table.

use glam::{Vec2, Vec3};
use tracing::{debug, warn};

use super::uv::{self, item_group};
use crate::util::{Error, Reader, Result, Writer};

/// Number of morph variants a fully populated figure carries.
pub const FULL_MORPH_COUNT: usize = 8;

/// Vertices and normals are grouped in interleaved blocks of this size.
pub const BLOCK_SIZE: usize = 4;

/// Figure signature tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigSignature {
    Fig8,
    Fig6,
    Fig4,
    /// Headerless pre-release layout; the first bytes are data, not a tag.
    Legacy,
}

impl FigSignature {
    /// Classify the first four bytes of a figure record.
    pub fn detect(tag: &[u8]) -> Self {
        match tag {
            b"FIG8" => Self::Fig8,
            b"FIG6" => Self::Fig6,
            b"FIG4" => Self::Fig4,
            _ => Self::Legacy,
        }
    }

    /// Morph variant count selected by the signature. The etherlord
    /// flavor stores a single variant whatever the tag says.
    pub fn morph_count(self, etherlord: bool) -> usize {
        if etherlord {
            return 1;
        }
        match self {
            Self::Fig8 => 8,
            Self::Fig6 | Self::Legacy => 6,
            Self::Fig4 => 4,
        }
    }

    /// On-disk tag for the modern layouts.
    pub fn tag(self) -> Option<&'static [u8; 4]> {
        match self {
            Self::Fig8 => Some(b"FIG8"),
            Self::Fig6 => Some(b"FIG6"),
            Self::Fig4 => Some(b"FIG4"),
            Self::Legacy => None,
        }
    }

    fn for_morph_count(morph_count: usize) -> Result<Self> {
        match morph_count {
            8 => Ok(Self::Fig8),
            6 => Ok(Self::Fig6),
            4 => Ok(Self::Fig4),
            n => Err(Error::mismatch(format!("morph count {n} has no writable signature"))),
        }
    }
}

/// The fixed 9-field figure header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FigureHeader {
    pub vertex_count: u32,
    pub normal_count: u32,
    pub texcoord_count: u32,
    pub index_count: u32,
    pub vertex_component_count: u32,
    pub morph_component_count: u32,
    pub unknown: u32,
    pub group: u32,
    pub texture_number: u32,
}

impl FigureHeader {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            vertex_count: reader.read_u32()?,
            normal_count: reader.read_u32()?,
            texcoord_count: reader.read_u32()?,
            index_count: reader.read_u32()?,
            vertex_component_count: reader.read_u32()?,
            morph_component_count: reader.read_u32()?,
            unknown: reader.read_u32()?,
            group: reader.read_u32()?,
            texture_number: reader.read_u32()?,
        })
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_u32(self.vertex_count);
        writer.write_u32(self.normal_count);
        writer.write_u32(self.texcoord_count);
        writer.write_u32(self.index_count);
        writer.write_u32(self.vertex_component_count);
        writer.write_u32(self.morph_component_count);
        writer.write_u32(self.unknown);
        writer.write_u32(self.group);
        writer.write_u32(self.texture_number);
    }
}

/// One part's morph-target geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Figure {
    pub name: String,
    pub header: FigureHeader,
    /// Bounding data, one entry per morph variant, padded to 8 by
    /// replicating the first entry.
    pub center: Vec<Vec3>,
    pub min: Vec<Vec3>,
    pub max: Vec<Vec3>,
    pub radius: Vec<f32>,
    /// Positions per morph variant; each inner list is
    /// `vertex_count * 4` long.
    pub vertices: Vec<Vec<Vec3>>,
    /// Flat normals, `normal_count * 4` entries of (x, y, z, w).
    pub normals: Vec<[f32; 4]>,
    /// Unpacked texture coordinates.
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u16>,
    /// Deduplicated (position, normal, uv) index triples.
    pub vertex_components: Vec<[u16; 3]>,
    pub morph_components: Vec<[u16; 2]>,
    pub morph_count: usize,
}

impl Figure {
    /// Decode a figure record. The name selects the UV item group; the
    /// etherlord flag forces a single morph variant.
    pub fn decode(name: &str, data: &[u8], etherlord: bool) -> Result<Self> {
        let mut reader = Reader::new(data);
        let tag = reader.read_bytes(4)?;
        let signature = FigSignature::detect(tag);
        if signature == FigSignature::Legacy {
            // the four bytes were payload, not a tag
            reader.reset();
        }
        let morph_count = signature.morph_count(etherlord);
        debug!(name, ?signature, morph_count, "decoding figure");

        let mut fig = Self {
            name: name.to_string(),
            morph_count,
            ..Self::default()
        };
        match signature {
            FigSignature::Legacy => fig.decode_legacy(&mut reader)?,
            _ => fig.decode_modern(&mut reader)?,
        }
        fig.pad_bounding();
        if !reader.is_eof() {
            warn!(name, trailing = reader.remaining(), "figure has trailing bytes");
        }
        Ok(fig)
    }

    fn decode_modern(&mut self, reader: &mut Reader<'_>) -> Result<()> {
        self.header = FigureHeader::decode(reader)?;
        self.decode_bounding(reader)?;
        self.decode_vertices(reader, self.header.vertex_count as usize)?;
        self.decode_normals(reader, self.header.normal_count as usize)?;
        self.decode_uvs(reader, self.header.texcoord_count as usize)?;
        self.indices = reader.read_u16_vec(self.header.index_count as usize)?;
        self.decode_vertex_components(reader, self.header.vertex_component_count as usize)?;
        self.decode_morph_components(reader, self.header.morph_component_count as usize)?;
        Ok(())
    }

    /// The headerless layout: counts precede each section, a skip-only
    /// face table replaces nothing useful, and indices come last.
    fn decode_legacy(&mut self, reader: &mut Reader<'_>) -> Result<()> {
        self.header.group = reader.read_u32()?;
        self.header.texture_number = reader.read_u32()?;
        self.decode_bounding(reader)?;

        self.header.vertex_count = reader.read_u32()?;
        self.decode_vertices(reader, self.header.vertex_count as usize)?;
        self.header.normal_count = reader.read_u32()?;
        self.decode_normals(reader, self.header.normal_count as usize)?;
        self.header.texcoord_count = reader.read_u32()?;
        self.decode_uvs(reader, self.header.texcoord_count as usize)?;

        let face_count = reader.read_u32()?;
        reader.skip(face_count as usize * 52)?;

        self.header.vertex_component_count = reader.read_u32()?;
        self.decode_vertex_components(reader, self.header.vertex_component_count as usize)?;
        self.header.morph_component_count = reader.read_u32()?;
        self.decode_morph_components(reader, self.header.morph_component_count as usize)?;
        self.header.index_count = reader.read_u32()?;
        self.indices = reader.read_u16_vec(self.header.index_count as usize)?;
        Ok(())
    }

    fn decode_bounding(&mut self, reader: &mut Reader<'_>) -> Result<()> {
        for _ in 0..self.morph_count {
            self.center.push(reader.read_vec3()?);
        }
        for _ in 0..self.morph_count {
            self.min.push(reader.read_vec3()?);
        }
        for _ in 0..self.morph_count {
            self.max.push(reader.read_vec3()?);
        }
        for _ in 0..self.morph_count {
            self.radius.push(reader.read_f32()?);
        }
        Ok(())
    }

    /// De-interleave the block-major position layout: per block, per
    /// coordinate, per morph, four lanes.
    fn decode_vertices(&mut self, reader: &mut Reader<'_>, blocks: usize) -> Result<()> {
        let floats = reader.read_f32_vec(blocks * 3 * self.morph_count * BLOCK_SIZE)?;
        self.vertices = vec![vec![Vec3::ZERO; blocks * BLOCK_SIZE]; self.morph_count];
        for block in 0..blocks {
            for coord in 0..3 {
                for morph in 0..self.morph_count {
                    let at = ((block * 3 + coord) * self.morph_count + morph) * BLOCK_SIZE;
                    for lane in 0..BLOCK_SIZE {
                        self.vertices[morph][block * BLOCK_SIZE + lane][coord] = floats[at + lane];
                    }
                }
            }
        }
        Ok(())
    }

    /// De-interleave normal blocks: `[xxxx][yyyy][zzzz][wwww]` per block.
    fn decode_normals(&mut self, reader: &mut Reader<'_>, blocks: usize) -> Result<()> {
        let floats = reader.read_f32_vec(blocks * 4 * BLOCK_SIZE)?;
        self.normals = vec![[0.0; 4]; blocks * BLOCK_SIZE];
        for block in 0..blocks {
            for comp in 0..4 {
                let at = (block * 4 + comp) * BLOCK_SIZE;
                for lane in 0..BLOCK_SIZE {
                    self.normals[block * BLOCK_SIZE + lane][comp] = floats[at + lane];
                }
            }
        }
        Ok(())
    }

    fn decode_uvs(&mut self, reader: &mut Reader<'_>, count: usize) -> Result<()> {
        self.uvs = Vec::with_capacity(count);
        for _ in 0..count {
            self.uvs.push(reader.read_vec2()?);
        }
        let group = item_group(&self.name);
        uv::unpack_uv(&mut self.uvs, group.uv_convert_count, group.uv_base);
        Ok(())
    }

    fn decode_vertex_components(&mut self, reader: &mut Reader<'_>, count: usize) -> Result<()> {
        let raw = reader.read_u16_vec(count * 3)?;
        self.vertex_components = raw.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Ok(())
    }

    fn decode_morph_components(&mut self, reader: &mut Reader<'_>, count: usize) -> Result<()> {
        let raw = reader.read_u16_vec(count * 2)?;
        self.morph_components = raw.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
        Ok(())
    }

    /// Encode in the modern layout with the tag matching `morph_count`.
    /// Every count invariant is checked before a byte is produced.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let signature = FigSignature::for_morph_count(self.morph_count)?;
        self.validate_counts()?;

        let mut writer = Writer::new();
        if let Some(tag) = signature.tag() {
            writer.write_bytes(tag);
        }
        self.header.encode(&mut writer);
        for i in 0..self.morph_count {
            writer.write_vec3(self.center[i]);
        }
        for i in 0..self.morph_count {
            writer.write_vec3(self.min[i]);
        }
        for i in 0..self.morph_count {
            writer.write_vec3(self.max[i]);
        }
        for i in 0..self.morph_count {
            writer.write_f32(self.radius[i]);
        }
        self.encode_vertices(&mut writer);
        self.encode_normals(&mut writer);
        self.encode_uvs(&mut writer);
        writer.write_u16_slice(&self.indices);
        for component in &self.vertex_components {
            writer.write_u16_slice(component);
        }
        for component in &self.morph_components {
            writer.write_u16_slice(component);
        }
        Ok(writer.into_bytes())
    }

    fn validate_counts(&self) -> Result<()> {
        let header = &self.header;
        let blocks = header.vertex_count as usize;
        if self.center.len() != FULL_MORPH_COUNT
            || self.min.len() != FULL_MORPH_COUNT
            || self.max.len() != FULL_MORPH_COUNT
            || self.radius.len() != FULL_MORPH_COUNT
        {
            return Err(Error::mismatch("bounding data must hold 8 morph entries"));
        }
        if self.vertices.len() != self.morph_count {
            return Err(Error::mismatch(format!(
                "figure holds {} morph variants, header wants {}",
                self.vertices.len(),
                self.morph_count
            )));
        }
        for morph in &self.vertices {
            if morph.len() != blocks * BLOCK_SIZE {
                return Err(Error::mismatch("vertex count does not fill whole blocks"));
            }
        }
        if self.normals.len() != header.normal_count as usize * BLOCK_SIZE {
            return Err(Error::mismatch("normal count corrupted"));
        }
        if self.uvs.len() != header.texcoord_count as usize {
            return Err(Error::mismatch("texture coordinate count corrupted"));
        }
        if self.indices.len() != header.index_count as usize {
            return Err(Error::mismatch("index count corrupted"));
        }
        if self.vertex_components.len() != header.vertex_component_count as usize {
            return Err(Error::mismatch("vertex component count corrupted"));
        }
        if self.morph_components.len() != header.morph_component_count as usize {
            return Err(Error::mismatch("morph component count corrupted"));
        }
        Ok(())
    }

    fn encode_vertices(&self, writer: &mut Writer) {
        let blocks = self.header.vertex_count as usize;
        for block in 0..blocks {
            for coord in 0..3 {
                for morph in 0..self.morph_count {
                    for lane in 0..BLOCK_SIZE {
                        writer.write_f32(self.vertices[morph][block * BLOCK_SIZE + lane][coord]);
                    }
                }
            }
        }
    }

    fn encode_normals(&self, writer: &mut Writer) {
        let blocks = self.header.normal_count as usize;
        for block in 0..blocks {
            for comp in 0..4 {
                for lane in 0..BLOCK_SIZE {
                    writer.write_f32(self.normals[block * BLOCK_SIZE + lane][comp]);
                }
            }
        }
    }

    fn encode_uvs(&self, writer: &mut Writer) {
        let group = item_group(&self.name);
        let mut packed = self.uvs.clone();
        uv::pack_uv(&mut packed, group.uv_convert_count, group.uv_base);
        for uv in packed {
            writer.write_vec2(uv);
        }
    }

    /// Replicate the first bounding entry up to 8 slots.
    fn pad_bounding(&mut self) {
        while self.center.len() < FULL_MORPH_COUNT {
            self.center.push(self.center[0]);
            self.min.push(self.min[0]);
            self.max.push(self.max[0]);
            self.radius.push(self.radius[0]);
        }
    }

    /// Replicate the base morph's vertices into all 8 variants and
    /// switch the figure to the full morph count.
    pub fn fill_morphs(&mut self) -> Result<()> {
        let base = self
            .vertices
            .first()
            .cloned()
            .ok_or_else(|| Error::mismatch("figure has no base morph to replicate"))?;
        self.vertices.resize(FULL_MORPH_COUNT, base);
        self.morph_count = FULL_MORPH_COUNT;
        Ok(())
    }

    /// Regenerate the morph component table as identity pairs.
    pub fn generate_morph_components(&mut self) {
        let count = self.header.morph_component_count;
        self.morph_components = (0..count as u16).map(|i| [i, i]).collect();
    }

    /// Derive morph variant `slot` from the three preceding variants:
    /// `v[slot] = v[slot-1] + v[slot-2] - v[slot-3]`, applied to bounding
    /// data and vertices alike.
    pub fn synthesize_morph(&mut self, slot: usize) -> Result<()> {
        if slot < 3 || slot >= self.vertices.len() {
            return Err(Error::mismatch(format!(
                "morph slot {slot} cannot be synthesized from 3 predecessors"
            )));
        }
        self.center[slot] = self.center[slot - 1] + self.center[slot - 2] - self.center[slot - 3];
        self.min[slot] = self.min[slot - 1] + self.min[slot - 2] - self.min[slot - 3];
        self.max[slot] = self.max[slot - 1] + self.max[slot - 2] - self.max[slot - 3];
        self.radius[slot] = self.radius[slot - 1] + self.radius[slot - 2] - self.radius[slot - 3];
        for i in 0..self.vertices[slot].len() {
            self.vertices[slot][i] = self.vertices[slot - 1][i] + self.vertices[slot - 2][i]
                - self.vertices[slot - 3][i];
        }
        Ok(())
    }
}
