//! Builders for synthetic MDL, VVD and VTX files

#![allow(dead_code)]

pub const MDL_HEADER_SIZE: usize = 380;
pub const CHECKSUM: i32 = 0x0BAD_CAFE;

// MDL header field positions
pub const H_BONES: usize = 156;
pub const H_LOCAL_ANIMS: usize = 180;
pub const H_LOCAL_SEQS: usize = 188;
pub const H_TEXTURES: usize = 204;
pub const H_TEXTURE_DIRS: usize = 212;
pub const H_SKIN_REFERENCES: usize = 220;
pub const H_SKIN_FAMILIES: usize = 224;
pub const H_SKIN_OFFSET: usize = 228;
pub const H_BODY_PARTS: usize = 232;
pub const H_ATTACHMENTS: usize = 240;
pub const H_POSE_PARAMS: usize = 300;
pub const H_SURFACE_PROP: usize = 308;
pub const H_KEY_VALUES: usize = 312;
pub const H_ANIM_BLOCK_NAME: usize = 348;
pub const H_ANIM_BLOCKS: usize = 352;

// half floats
pub const HALF_ZERO: u16 = 0x0000;
pub const HALF_ONE: u16 = 0x3C00;
pub const HALF_TWO: u16 = 0x4000;
pub const HALF_THREE: u16 = 0x4200;
pub const HALF_MINUS_TWO: u16 = 0xC000;
pub const HALF_HALF: u16 = 0x3800;

/// Little-endian byte writer with back-patching
#[derive(Debug, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zeroed(len: usize) -> Self {
        Self {
            data: vec![0; len],
        }
    }

    pub fn pos(&self) -> usize {
        self.data.len()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.data.push(v);
        self
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.data.push(v as u8);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.data.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.data.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.data.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.data.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32s(&mut self, values: &[f32]) -> &mut Self {
        for v in values {
            self.f32(*v);
        }
        self
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn zeros(&mut self, count: usize) -> &mut Self {
        self.data.resize(self.data.len() + count, 0);
        self
    }

    /// Write a NUL-terminated string and return where it starts
    pub fn cstr(&mut self, s: &str) -> usize {
        let at = self.pos();
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        at
    }

    pub fn patch_i32(&mut self, at: usize, v: i32) {
        self.data[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn patch_i16(&mut self, at: usize, v: i16) {
        self.data[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    /// Patch a `(count, offset)` pair
    pub fn patch_table(&mut self, at: usize, count: usize, offset: usize, origin: usize) {
        self.patch_i32(at, count as i32);
        self.patch_i32(at + 4, offset as i32 - origin as i32);
    }

    /// Point a relative string field at a newly written string
    pub fn string_rel(&mut self, field: usize, origin: usize, s: &str) {
        let at = self.cstr(s);
        self.patch_i32(field, (at - origin) as i32);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

/// A bare MDL header
pub fn mdl_header(version: i32, checksum: i32, name: &str) -> ByteWriter {
    let mut w = ByteWriter::zeroed(MDL_HEADER_SIZE);
    w.data[0..4].copy_from_slice(b"IDST");
    w.patch_i32(4, version);
    w.patch_i32(8, checksum);
    w.data[12..12 + name.len()].copy_from_slice(name.as_bytes());
    w
}

/// Append a bone table; bone `i` rests at `(i, 0, 0)` with identity rotation
pub fn write_bones(w: &mut ByteWriter, bones: &[(&str, i32)]) {
    let start = w.pos();
    w.patch_table(H_BONES, bones.len(), start, 0);
    for (i, (_, parent)) in bones.iter().enumerate() {
        w.i32(0).i32(*parent);
        for _ in 0..6 {
            w.i32(-1);
        }
        w.f32s(&[i as f32, 0.0, 0.0]);
        w.f32s(&[0.0, 0.0, 0.0, 1.0]);
        w.f32s(&[0.0, 0.0, 0.0]);
        w.f32s(&[0.5, 0.5, 0.5]);
        w.f32s(&[0.001, 0.001, 0.001]);
        w.f32s(&[1.0, 0.0, 0.0, -(i as f32)]);
        w.f32s(&[0.0, 1.0, 0.0, 0.0]);
        w.f32s(&[0.0, 0.0, 1.0, 0.0]);
        w.f32s(&[0.0, 0.0, 0.0, 1.0]);
        w.i32(0).i32(0).i32(0).i32(0).i32(0).i32(0);
        w.zeros(32);
    }
    for (i, (name, _)) in bones.iter().enumerate() {
        let record = start + i * 216;
        w.string_rel(record, record, name);
    }
}

/// The smallest valid model: one root bone named "root"
pub fn single_bone_mdl() -> Vec<u8> {
    let mut w = mdl_header(48, CHECKSUM, "single");
    write_bones(&mut w, &[("root", -1)]);
    w.into_inner()
}

pub const SAMPLE_BONES: [(&str, i32); 4] =
    [("root", -1), ("spine", 0), ("prop", -1), ("head", 1)];

/// Append one raw-position anim record
fn raw_position_record(w: &mut ByteWriter, bone: u8, next: i16, x: u16) {
    w.u8(bone).u8(0x01).i16(next);
    w.u16(x).u16(HALF_ZERO).u16(HALF_ZERO);
}

/// Append an anim desc record with no sections and return its start
fn anim_desc_record(w: &mut ByteWriter, fps: f32, flags: u32, frames: i32) -> usize {
    let start = w.pos();
    w.i32(0).i32(0).f32(fps).i32(flags as i32).i32(frames);
    w.zeros(100 - 20);
    start
}

/// A model exercising every MDL table:
///
/// - bones `root > spine > head` and a second root `prop`
/// - animation 0 "idle": 3 frames, keyed rotation on bone 0 and raw
///   position on bone 1
/// - animation 1 "ref": no local data
/// - animation 2 "run": 5 frames in sections of 2, section 1 streamed
/// - sequence "idle" using animation 0
/// - two textures, a 2x2 skin table, one body part with one model of two meshes
pub fn sample_mdl(version: i32) -> Vec<u8> {
    let mut w = mdl_header(version, CHECKSUM, "props/crate");
    write_bones(&mut w, &SAMPLE_BONES);

    // attachment on "head"
    let attachment = w.pos();
    w.patch_table(H_ATTACHMENTS, 1, attachment, 0);
    w.i32(0).i32(0).i32(3);
    w.f32s(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 0.0, 1.0, 0.0]);
    w.zeros(32);
    w.string_rel(attachment, attachment, "eyes");

    // pose parameter
    let param = w.pos();
    w.patch_table(H_POSE_PARAMS, 1, param, 0);
    w.i32(0).i32(0).f32(-90.0).f32(90.0).f32(0.0);
    w.string_rel(param, param, "body_yaw");

    // external animation blocks
    let blocks = w.pos();
    w.patch_table(H_ANIM_BLOCKS, 2, blocks, 0);
    w.i32(0).i32(0).i32(0).i32(128);
    w.string_rel(H_ANIM_BLOCK_NAME, 0, "models/props/crate_animations.ani");

    // animation descriptions
    let anims = w.pos();
    w.patch_table(H_LOCAL_ANIMS, 3, anims, 0);
    let idle = anim_desc_record(&mut w, 30.0, 0x0001, 3);
    let reference = anim_desc_record(&mut w, 30.0, 0x0020, 1);
    let run = anim_desc_record(&mut w, 24.0, 0x0001, 5);
    w.string_rel(idle + 4, idle, "idle");
    w.string_rel(reference + 4, reference, "ref");
    w.string_rel(run + 4, run, "run");

    // idle: bone 0 keyed z rotation, bone 1 raw position
    let idle_data = w.pos();
    w.patch_i32(idle + 56, (idle_data - idle) as i32);
    w.u8(0).u8(0x08).i16(16);
    w.i16(0).i16(0).i16(6);
    w.u8(2).u8(3).i16(100).i16(200);
    w.u8(1).u8(0x01).i16(0);
    w.u16(HALF_ONE).u16(HALF_MINUS_TWO).u16(HALF_HALF);

    // run: four section slots of 2, 2, 2 and 1 frames
    w.patch_i32(run + 84, 2);
    let sections = w.pos();
    w.patch_i32(run + 80, (sections - run) as i32);
    w.zeros(4 * 8);
    let section_values = [Some(HALF_ONE), None, Some(HALF_TWO), Some(HALF_THREE)];
    for (i, value) in section_values.iter().enumerate() {
        let slot = sections + i * 8;
        match value {
            Some(x) => {
                let data = w.pos();
                w.patch_i32(slot + 4, (data - run) as i32);
                raw_position_record(&mut w, 0, 0, *x);
            }
            None => {
                w.patch_i32(slot, 1);
                w.patch_i32(slot + 4, 64);
            }
        }
    }

    // sequence
    let seq = w.pos();
    w.patch_table(H_LOCAL_SEQS, 1, seq, 0);
    w.zeros(212);
    w.patch_i32(seq + 12, 0x0001);
    w.patch_i32(seq + 16, 1);
    w.patch_i32(seq + 20, 1);
    w.patch_i32(seq + 68, 1);
    w.patch_i32(seq + 72, 1);
    w.patch_i32(seq + 76, -1);
    w.patch_i32(seq + 80, -1);
    w.string_rel(seq + 4, seq, "idle");
    w.string_rel(seq + 8, seq, "ACT_IDLE");
    let grid = w.pos();
    w.patch_i32(seq + 60, (grid - seq) as i32);
    w.i16(0);
    let weights = w.pos();
    w.patch_i32(seq + 156, (weights - seq) as i32);
    w.f32s(&[1.0, 1.0, 0.0, 1.0]);

    // textures, search directory and skin table
    let textures = w.pos();
    w.patch_table(H_TEXTURES, 2, textures, 0);
    w.zeros(2 * 64);
    w.string_rel(textures, textures, "crate_wood");
    w.string_rel(textures + 64, textures + 64, "crate_metal");
    let dirs = w.pos();
    w.patch_table(H_TEXTURE_DIRS, 1, dirs, 0);
    w.i32(0);
    w.string_rel(dirs, 0, "models/props/");
    let skins = w.pos();
    w.patch_i32(H_SKIN_REFERENCES, 2);
    w.patch_i32(H_SKIN_FAMILIES, 2);
    w.patch_i32(H_SKIN_OFFSET, skins as i32);
    w.i16(0).i16(1).i16(1).i16(0);

    // body part > model > two meshes of three vertices
    let part = w.pos();
    w.patch_table(H_BODY_PARTS, 1, part, 0);
    w.i32(0).i32(1).i32(1).i32(16);
    let model = w.pos();
    let mut name = [0u8; 64];
    name[..9].copy_from_slice(b"crate_ref");
    w.bytes(&name);
    w.i32(0).f32(24.0);
    w.i32(2).i32(148);
    w.i32(6).i32(0).i32(0);
    w.zeros(148 - 92);
    for (i, material) in [0, 1].into_iter().enumerate() {
        w.i32(material).i32(0).i32(3).i32(3 * i as i32);
        w.zeros(36 - 16);
        w.f32s(&[0.0, 0.0, i as f32]);
        w.i32(0);
        w.i32(3);
        w.zeros(7 * 4 + 32);
    }
    w.string_rel(part, part, "body");
    assert_eq!(model, part + 16);

    // header strings
    w.string_rel(H_SURFACE_PROP, 0, "wood");
    let kv = w.cstr("mdlkeyvalue { prop_data { base \"Wooden.Small\" } }");
    w.patch_i32(H_KEY_VALUES, kv as i32);
    w.patch_i32(H_KEY_VALUES + 4, 50);

    w.into_inner()
}

/// A VVD file with one LOD of `count` vertices; vertex `i` sits at `(i, 0, 0)`
pub fn sample_vvd(checksum: i32, count: usize) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.bytes(b"IDSV").i32(4).i32(checksum).i32(1);
    w.i32(count as i32);
    w.zeros(7 * 4);
    w.i32(0).i32(64).i32(64).i32(64 + 48 * count as i32);
    for i in 0..count {
        w.f32s(&[1.0, 0.0, 0.0]);
        w.i8(0).i8(0).i8(0).u8(1);
        w.f32s(&[i as f32, 0.0, 0.0]);
        w.f32s(&[0.0, 0.0, 1.0]);
        w.f32s(&[0.0, 0.0]);
    }
    for _ in 0..count {
        w.f32s(&[1.0, 0.0, 0.0, 1.0]);
    }
    w.into_inner()
}

/// A VTX file for [`sample_mdl`]: one body part, one model, one LOD, and
/// one strip group per mesh holding a single triangle
pub fn sample_vtx(checksum: i32, mesh_count: usize, topology: bool) -> Vec<u8> {
    let group_size = if topology { 33 } else { 25 };
    let strip_size = if topology { 35 } else { 27 };

    let mut w = ByteWriter::new();
    w.i32(7).i32(24).u16(53).u16(9).i32(3).i32(checksum).i32(1).i32(0);
    w.i32(1).i32(36);

    let part = w.pos();
    w.i32(1).i32(0);
    let model = w.pos();
    w.patch_i32(part + 4, (model - part) as i32);
    w.i32(1).i32(0);
    let lod = w.pos();
    w.patch_i32(model + 4, (lod - model) as i32);
    w.i32(mesh_count as i32).i32(0).f32(0.0);
    let meshes = w.pos();
    w.patch_i32(lod + 4, (meshes - lod) as i32);
    for _ in 0..mesh_count {
        w.i32(1).i32(0).u8(0);
    }

    for m in 0..mesh_count {
        let mesh = meshes + m * 9;
        let group = w.pos();
        w.patch_i32(mesh + 4, (group - mesh) as i32);
        w.zeros(group_size);
        w.data[group + 24] = 0x02;

        let vertices = w.pos();
        w.patch_table(group, 3, vertices, group);
        for v in 0..3u16 {
            w.u8(0).u8(1).u8(2).u8(1).u16(v).i8(0).i8(-1).i8(-1);
        }
        let indices = w.pos();
        w.patch_table(group + 8, 3, indices, group);
        w.u16(0).u16(1).u16(2);
        let strips = w.pos();
        w.patch_table(group + 16, 1, strips, group);
        w.i32(3).i32(0).i32(3).i32(0).i16(1).u8(0x01);
        w.zeros(strip_size - 19);
        let change = w.pos();
        w.patch_table(strips + 19, 1, change, strips);
        w.i32(0).i32(m as i32);
    }

    let lists = w.pos();
    w.patch_i32(24, lists as i32);
    w.i32(1).i32(8);
    let replacement = w.pos();
    w.i16(1).i32(0);
    w.string_rel(replacement + 2, replacement, "crate_lod1");

    w.into_inner()
}
