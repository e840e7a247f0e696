// qfiles.rs - BSP file format definitions, reader and writer

use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

// ==========================================================================
// BSP file format
// ==========================================================================

/// BSP magic: "IBSP" in little-endian
pub const IDBSPHEADER: i32 =
    (b'P' as i32) << 24 | (b'S' as i32) << 16 | (b'B' as i32) << 8 | b'I' as i32;
pub const BSPVERSION: i32 = 38;

// upper design bounds
pub const MAX_BSP_MODELS: usize = 1024;
pub const MAX_BSP_BRUSHES: usize = 8192;
pub const MAX_BSP_ENTSTRING: usize = 0x40000;
pub const MAX_BSP_TEXINFO: usize = 8192;
pub const MAX_BSP_PLANES: usize = 65536;
pub const MAX_BSP_NODES: usize = 65536;
pub const MAX_BSP_BRUSH_SIDES: usize = 65536;
pub const MAX_BSP_LEAFS: usize = 65536;
pub const MAX_BSP_LEAF_BRUSHES: usize = 65536;

pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_VERTEXES: usize = 2;
pub const LUMP_VISIBILITY: usize = 3;
pub const LUMP_NODES: usize = 4;
pub const LUMP_TEXINFO: usize = 5;
pub const LUMP_FACES: usize = 6;
pub const LUMP_LIGHTING: usize = 7;
pub const LUMP_LEAFS: usize = 8;
pub const LUMP_LEAF_FACES: usize = 9;
pub const LUMP_LEAF_BRUSHES: usize = 10;
pub const LUMP_EDGES: usize = 11;
pub const LUMP_SURF_EDGES: usize = 12;
pub const LUMP_MODELS: usize = 13;
pub const LUMP_BRUSHES: usize = 14;
pub const LUMP_BRUSH_SIDES: usize = 15;
pub const LUMP_POP: usize = 16;
pub const LUMP_AREAS: usize = 17;
pub const LUMP_AREA_PORTALS: usize = 18;
pub const HEADER_LUMPS: usize = 19;

/// ident + version + one (offset, length) pair per lump
pub const HEADER_SIZE: usize = 8 + HEADER_LUMPS * 8;

/// Lump decoding switches to rayon at this many records.
pub const DEFAULT_PARALLEL_LUMP_THRESHOLD: usize = 64;

pub const TEXTURE_NAME_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BspFileError {
    #[error("file is too short ({0} bytes) to hold a BSP header")]
    TooShort(usize),
    #[error("wrong ident {0:#x}, not an IBSP file")]
    BadIdent(i32),
    #[error("wrong version number ({found} should be 38)")]
    BadVersion { found: i32 },
    #[error("lump {lump} lies outside the file")]
    LumpOutOfRange { lump: &'static str },
    #[error("funny lump size ({lump})")]
    FunnyLumpSize { lump: &'static str },
    #[error("map has too many {lump} ({count} > {max})")]
    TooMany {
        lump: &'static str,
        count: usize,
        max: usize,
    },
    #[error("map with no {lump}")]
    Empty { lump: &'static str },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lump {
    pub fileofs: i32,
    pub filelen: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DModel {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub origin: [f32; 3],
    pub head_node: i32,
    pub first_face: i32,
    pub num_faces: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DPlane {
    pub normal: [f32; 3],
    pub dist: f32,
    pub plane_type: i32,
}

/// Children are sign encoded: non-negative values index nodes, negative
/// values are `-1 - leaf`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DNode {
    pub plane_num: i32,
    pub children: [i32; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_face: u16,
    pub num_faces: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DTexInfo {
    pub vecs: [[f32; 4]; 2],
    pub flags: i32,
    pub value: i32,
    pub texture: String,
    pub next_texinfo: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DLeaf {
    pub contents: i32,
    pub cluster: i16,
    pub area: i16,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_leaf_face: u16,
    pub num_leaf_faces: u16,
    pub first_leaf_brush: u16,
    pub num_leaf_brushes: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DBrushSide {
    pub plane_num: u16,
    pub texinfo: i16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DBrush {
    pub first_side: i32,
    pub num_sides: i32,
    pub contents: i32,
}

// ==========================================================================
// Byte helpers
// ==========================================================================

fn read_i32_le(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_i16_le(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_f32_le(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_vec3(data: &[u8], offset: usize) -> [f32; 3] {
    [
        read_f32_le(data, offset),
        read_f32_le(data, offset + 4),
        read_f32_le(data, offset + 8),
    ]
}

fn read_short3(data: &[u8], offset: usize) -> [i16; 3] {
    [
        read_i16_le(data, offset),
        read_i16_le(data, offset + 2),
        read_i16_le(data, offset + 4),
    ]
}

fn write_vec3(out: &mut Vec<u8>, v: &[f32; 3]) {
    for f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
}

fn write_short3(out: &mut Vec<u8>, v: &[i16; 3]) {
    for s in v {
        out.extend_from_slice(&s.to_le_bytes());
    }
}

/// A fixed-size record of a BSP lump.
pub trait LumpRecord: Sized + Send {
    const NAME: &'static str;
    const SIZE: usize;

    fn read(data: &[u8]) -> Self;
    fn write(&self, out: &mut Vec<u8>);
}

impl LumpRecord for DPlane {
    const NAME: &'static str = "planes";
    const SIZE: usize = 20;

    fn read(data: &[u8]) -> Self {
        DPlane {
            normal: read_vec3(data, 0),
            dist: read_f32_le(data, 12),
            plane_type: read_i32_le(data, 16),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        write_vec3(out, &self.normal);
        out.extend_from_slice(&self.dist.to_le_bytes());
        out.extend_from_slice(&self.plane_type.to_le_bytes());
    }
}

impl LumpRecord for DNode {
    const NAME: &'static str = "nodes";
    const SIZE: usize = 28;

    fn read(data: &[u8]) -> Self {
        DNode {
            plane_num: read_i32_le(data, 0),
            children: [read_i32_le(data, 4), read_i32_le(data, 8)],
            mins: read_short3(data, 12),
            maxs: read_short3(data, 18),
            first_face: read_u16_le(data, 24),
            num_faces: read_u16_le(data, 26),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.plane_num.to_le_bytes());
        out.extend_from_slice(&self.children[0].to_le_bytes());
        out.extend_from_slice(&self.children[1].to_le_bytes());
        write_short3(out, &self.mins);
        write_short3(out, &self.maxs);
        out.extend_from_slice(&self.first_face.to_le_bytes());
        out.extend_from_slice(&self.num_faces.to_le_bytes());
    }
}

impl LumpRecord for DTexInfo {
    const NAME: &'static str = "texinfo";
    // vecs[2][4] (32) + flags (4) + value (4) + texture[32] + nexttexinfo (4)
    const SIZE: usize = 76;

    fn read(data: &[u8]) -> Self {
        let mut vecs = [[0.0f32; 4]; 2];
        for (i, row) in vecs.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = read_f32_le(data, (i * 4 + j) * 4);
            }
        }
        let name = &data[40..40 + TEXTURE_NAME_LEN];
        let end = name.iter().position(|&b| b == 0).unwrap_or(TEXTURE_NAME_LEN);
        DTexInfo {
            vecs,
            flags: read_i32_le(data, 32),
            value: read_i32_le(data, 36),
            texture: String::from_utf8_lossy(&name[..end]).into_owned(),
            next_texinfo: read_i32_le(data, 72),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        for row in &self.vecs {
            for v in row {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.value.to_le_bytes());
        let mut name = [0u8; TEXTURE_NAME_LEN];
        let bytes = self.texture.as_bytes();
        let len = bytes.len().min(TEXTURE_NAME_LEN - 1);
        name[..len].copy_from_slice(&bytes[..len]);
        out.extend_from_slice(&name);
        out.extend_from_slice(&self.next_texinfo.to_le_bytes());
    }
}

impl LumpRecord for DLeaf {
    const NAME: &'static str = "leafs";
    const SIZE: usize = 28;

    fn read(data: &[u8]) -> Self {
        DLeaf {
            contents: read_i32_le(data, 0),
            cluster: read_i16_le(data, 4),
            area: read_i16_le(data, 6),
            mins: read_short3(data, 8),
            maxs: read_short3(data, 14),
            first_leaf_face: read_u16_le(data, 20),
            num_leaf_faces: read_u16_le(data, 22),
            first_leaf_brush: read_u16_le(data, 24),
            num_leaf_brushes: read_u16_le(data, 26),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.contents.to_le_bytes());
        out.extend_from_slice(&self.cluster.to_le_bytes());
        out.extend_from_slice(&self.area.to_le_bytes());
        write_short3(out, &self.mins);
        write_short3(out, &self.maxs);
        out.extend_from_slice(&self.first_leaf_face.to_le_bytes());
        out.extend_from_slice(&self.num_leaf_faces.to_le_bytes());
        out.extend_from_slice(&self.first_leaf_brush.to_le_bytes());
        out.extend_from_slice(&self.num_leaf_brushes.to_le_bytes());
    }
}

impl LumpRecord for u16 {
    const NAME: &'static str = "leaf brushes";
    const SIZE: usize = 2;

    fn read(data: &[u8]) -> Self {
        read_u16_le(data, 0)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl LumpRecord for DModel {
    const NAME: &'static str = "models";
    const SIZE: usize = 48;

    fn read(data: &[u8]) -> Self {
        DModel {
            mins: read_vec3(data, 0),
            maxs: read_vec3(data, 12),
            origin: read_vec3(data, 24),
            head_node: read_i32_le(data, 36),
            first_face: read_i32_le(data, 40),
            num_faces: read_i32_le(data, 44),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        write_vec3(out, &self.mins);
        write_vec3(out, &self.maxs);
        write_vec3(out, &self.origin);
        out.extend_from_slice(&self.head_node.to_le_bytes());
        out.extend_from_slice(&self.first_face.to_le_bytes());
        out.extend_from_slice(&self.num_faces.to_le_bytes());
    }
}

impl LumpRecord for DBrush {
    const NAME: &'static str = "brushes";
    const SIZE: usize = 12;

    fn read(data: &[u8]) -> Self {
        DBrush {
            first_side: read_i32_le(data, 0),
            num_sides: read_i32_le(data, 4),
            contents: read_i32_le(data, 8),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.first_side.to_le_bytes());
        out.extend_from_slice(&self.num_sides.to_le_bytes());
        out.extend_from_slice(&self.contents.to_le_bytes());
    }
}

impl LumpRecord for DBrushSide {
    const NAME: &'static str = "brush sides";
    const SIZE: usize = 4;

    fn read(data: &[u8]) -> Self {
        DBrushSide {
            plane_num: read_u16_le(data, 0),
            texinfo: read_i16_le(data, 2),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.plane_num.to_le_bytes());
        out.extend_from_slice(&self.texinfo.to_le_bytes());
    }
}

// ==========================================================================
// BspFile
// ==========================================================================

/// The lumps of an IBSP file that the collision model consumes. Rendering
/// and visibility lumps are skipped on read and written empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BspFile {
    pub entity_string: String,
    pub planes: Vec<DPlane>,
    pub nodes: Vec<DNode>,
    pub texinfo: Vec<DTexInfo>,
    pub leafs: Vec<DLeaf>,
    pub leaf_brushes: Vec<u16>,
    pub models: Vec<DModel>,
    pub brushes: Vec<DBrush>,
    pub brush_sides: Vec<DBrushSide>,
}

fn lump_bytes<'a>(data: &'a [u8], lump: &Lump, name: &'static str) -> Result<&'a [u8], BspFileError> {
    if lump.fileofs < 0 || lump.filelen < 0 {
        return Err(BspFileError::LumpOutOfRange { lump: name });
    }
    let ofs = lump.fileofs as usize;
    let len = lump.filelen as usize;
    ofs.checked_add(len)
        .and_then(|end| data.get(ofs..end))
        .ok_or(BspFileError::LumpOutOfRange { lump: name })
}

fn read_lump<T: LumpRecord>(
    data: &[u8],
    lump: &Lump,
    max: usize,
    parallel_threshold: usize,
) -> Result<Vec<T>, BspFileError> {
    let bytes = lump_bytes(data, lump, T::NAME)?;
    if bytes.len() % T::SIZE != 0 {
        return Err(BspFileError::FunnyLumpSize { lump: T::NAME });
    }

    let count = bytes.len() / T::SIZE;
    if count > max {
        return Err(BspFileError::TooMany {
            lump: T::NAME,
            count,
            max,
        });
    }

    if count >= parallel_threshold {
        Ok(bytes.par_chunks_exact(T::SIZE).map(T::read).collect())
    } else {
        Ok(bytes.chunks_exact(T::SIZE).map(T::read).collect())
    }
}

fn write_lump<T: LumpRecord>(out: &mut Vec<u8>, records: &[T]) -> Lump {
    let fileofs = out.len() as i32;
    for r in records {
        r.write(out);
    }
    Lump {
        fileofs,
        filelen: out.len() as i32 - fileofs,
    }
}

impl BspFile {
    pub fn parse(data: &[u8]) -> Result<BspFile, BspFileError> {
        Self::parse_with_threshold(data, DEFAULT_PARALLEL_LUMP_THRESHOLD)
    }

    /// Parses the file, decoding lumps with at least `parallel_threshold`
    /// records on the rayon pool.
    pub fn parse_with_threshold(data: &[u8], parallel_threshold: usize) -> Result<BspFile, BspFileError> {
        if data.len() < HEADER_SIZE {
            return Err(BspFileError::TooShort(data.len()));
        }

        let ident = read_i32_le(data, 0);
        if ident != IDBSPHEADER {
            return Err(BspFileError::BadIdent(ident));
        }
        let version = read_i32_le(data, 4);
        if version != BSPVERSION {
            return Err(BspFileError::BadVersion { found: version });
        }

        let mut lumps = [Lump::default(); HEADER_LUMPS];
        for (i, lump) in lumps.iter_mut().enumerate() {
            lump.fileofs = read_i32_le(data, 8 + i * 8);
            lump.filelen = read_i32_le(data, 12 + i * 8);
        }

        let skipped: usize = [
            LUMP_VERTEXES, LUMP_VISIBILITY, LUMP_FACES, LUMP_LIGHTING, LUMP_LEAF_FACES,
            LUMP_EDGES, LUMP_SURF_EDGES, LUMP_POP, LUMP_AREAS, LUMP_AREA_PORTALS,
        ]
        .iter()
        .map(|&l| lumps[l].filelen.max(0) as usize)
        .sum();
        debug!("skipping {} bytes of render and visibility lumps", skipped);

        let t = parallel_threshold;
        let bsp = BspFile {
            entity_string: read_entity_string(data, &lumps[LUMP_ENTITIES])?,
            planes: read_lump(data, &lumps[LUMP_PLANES], MAX_BSP_PLANES, t)?,
            nodes: read_lump(data, &lumps[LUMP_NODES], MAX_BSP_NODES, t)?,
            texinfo: read_lump(data, &lumps[LUMP_TEXINFO], MAX_BSP_TEXINFO, t)?,
            leafs: read_lump(data, &lumps[LUMP_LEAFS], MAX_BSP_LEAFS, t)?,
            leaf_brushes: read_lump(data, &lumps[LUMP_LEAF_BRUSHES], MAX_BSP_LEAF_BRUSHES, t)?,
            models: read_lump(data, &lumps[LUMP_MODELS], MAX_BSP_MODELS, t)?,
            brushes: read_lump(data, &lumps[LUMP_BRUSHES], MAX_BSP_BRUSHES, t)?,
            brush_sides: read_lump(data, &lumps[LUMP_BRUSH_SIDES], MAX_BSP_BRUSH_SIDES, t)?,
        };

        if bsp.models.is_empty() {
            return Err(BspFileError::Empty { lump: "models" });
        }
        if bsp.leafs.is_empty() {
            return Err(BspFileError::Empty { lump: "leafs" });
        }
        if bsp.planes.is_empty() {
            return Err(BspFileError::Empty { lump: "planes" });
        }

        Ok(bsp)
    }

    /// Serializes the collision lumps into an IBSP file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_SIZE];
        let mut lumps = [Lump::default(); HEADER_LUMPS];

        let ofs = out.len() as i32;
        out.extend_from_slice(self.entity_string.as_bytes());
        out.push(0);
        lumps[LUMP_ENTITIES] = Lump {
            fileofs: ofs,
            filelen: out.len() as i32 - ofs,
        };
        while out.len() % 4 != 0 {
            out.push(0);
        }

        lumps[LUMP_PLANES] = write_lump(&mut out, &self.planes);
        lumps[LUMP_NODES] = write_lump(&mut out, &self.nodes);
        lumps[LUMP_TEXINFO] = write_lump(&mut out, &self.texinfo);
        lumps[LUMP_LEAFS] = write_lump(&mut out, &self.leafs);
        lumps[LUMP_LEAF_BRUSHES] = write_lump(&mut out, &self.leaf_brushes);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        lumps[LUMP_MODELS] = write_lump(&mut out, &self.models);
        lumps[LUMP_BRUSHES] = write_lump(&mut out, &self.brushes);
        lumps[LUMP_BRUSH_SIDES] = write_lump(&mut out, &self.brush_sides);

        // skipped lumps point at the end of the file with zero length
        let end = out.len() as i32;
        for (i, lump) in lumps.iter_mut().enumerate() {
            if lump.filelen == 0 && i != LUMP_ENTITIES {
                lump.fileofs = end;
            }
        }

        out[0..4].copy_from_slice(&IDBSPHEADER.to_le_bytes());
        out[4..8].copy_from_slice(&BSPVERSION.to_le_bytes());
        for (i, lump) in lumps.iter().enumerate() {
            out[8 + i * 8..12 + i * 8].copy_from_slice(&lump.fileofs.to_le_bytes());
            out[12 + i * 8..16 + i * 8].copy_from_slice(&lump.filelen.to_le_bytes());
        }
        out
    }
}

fn read_entity_string(data: &[u8], lump: &Lump) -> Result<String, BspFileError> {
    let bytes = lump_bytes(data, lump, "entities")?;
    if bytes.len() > MAX_BSP_ENTSTRING {
        return Err(BspFileError::TooMany {
            lump: "entities",
            count: bytes.len(),
            max: MAX_BSP_ENTSTRING,
        });
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BspFile {
        BspFile {
            entity_string: "{\n\"classname\" \"worldspawn\"\n}\n".to_string(),
            planes: vec![
                DPlane { normal: [1.0, 0.0, 0.0], dist: 64.0, plane_type: 0 },
                DPlane { normal: [-1.0, 0.0, 0.0], dist: -64.0, plane_type: 3 },
            ],
            nodes: vec![DNode {
                plane_num: 0,
                children: [-1, -2],
                mins: [-128, -128, -128],
                maxs: [128, 128, 128],
                ..Default::default()
            }],
            texinfo: vec![DTexInfo {
                flags: 4,
                value: 100,
                texture: "e1u1/sky1".to_string(),
                next_texinfo: -1,
                ..Default::default()
            }],
            leafs: vec![
                DLeaf { contents: 1, cluster: -1, ..Default::default() },
                DLeaf { contents: 0, cluster: 0, num_leaf_brushes: 1, ..Default::default() },
            ],
            leaf_brushes: vec![0],
            models: vec![DModel { mins: [-1.0; 3], maxs: [1.0; 3], ..Default::default() }],
            brushes: vec![DBrush { first_side: 0, num_sides: 1, contents: 1 }],
            brush_sides: vec![DBrushSide { plane_num: 0, texinfo: 0 }],
        }
    }

    #[test]
    fn test_record_sizes_match_writers() {
        fn written<T: LumpRecord + Default>() -> usize {
            let mut out = Vec::new();
            T::default().write(&mut out);
            out.len()
        }
        assert_eq!(written::<DPlane>(), DPlane::SIZE);
        assert_eq!(written::<DNode>(), DNode::SIZE);
        assert_eq!(written::<DTexInfo>(), DTexInfo::SIZE);
        assert_eq!(written::<DLeaf>(), DLeaf::SIZE);
        assert_eq!(written::<u16>(), <u16 as LumpRecord>::SIZE);
        assert_eq!(written::<DModel>(), DModel::SIZE);
        assert_eq!(written::<DBrush>(), DBrush::SIZE);
        assert_eq!(written::<DBrushSide>(), DBrushSide::SIZE);
    }

    #[test]
    fn test_write_then_parse() {
        let bsp = sample();
        let bytes = bsp.to_bytes();
        assert_eq!(BspFile::parse(&bytes).unwrap(), bsp);
        // forcing the parallel path gives the same result
        assert_eq!(BspFile::parse_with_threshold(&bytes, 0).unwrap(), bsp);
    }

    #[test]
    fn test_bad_header() {
        assert_eq!(BspFile::parse(b"IBSP"), Err(BspFileError::TooShort(4)));

        let mut bytes = sample().to_bytes();
        bytes[4] = 46;
        assert_eq!(BspFile::parse(&bytes), Err(BspFileError::BadVersion { found: 46 }));

        bytes[0] = b'V';
        assert!(matches!(BspFile::parse(&bytes), Err(BspFileError::BadIdent(_))));
    }

    #[test]
    fn test_funny_lump_size() {
        let mut bytes = sample().to_bytes();
        let len_at = 12 + LUMP_PLANES * 8;
        bytes[len_at..len_at + 4].copy_from_slice(&21i32.to_le_bytes());
        assert_eq!(
            BspFile::parse(&bytes),
            Err(BspFileError::FunnyLumpSize { lump: "planes" })
        );
    }

    #[test]
    fn test_lump_out_of_range() {
        let mut bytes = sample().to_bytes();
        let ofs_at = 8 + LUMP_BRUSHES * 8;
        bytes[ofs_at..ofs_at + 4].copy_from_slice(&0x7fff_0000i32.to_le_bytes());
        assert_eq!(
            BspFile::parse(&bytes),
            Err(BspFileError::LumpOutOfRange { lump: "brushes" })
        );
    }

    #[test]
    fn test_no_models() {
        let mut bsp = sample();
        bsp.models.clear();
        assert_eq!(
            BspFile::parse(&bsp.to_bytes()),
            Err(BspFileError::Empty { lump: "models" })
        );
    }
}
