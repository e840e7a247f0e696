// q_shared.rs - foundational types and functions shared by the collision model

use bitflags::bitflags;

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

pub const PITCH: usize = 0;
pub const YAW: usize = 1;
pub const ROLL: usize = 2;

/// Largest coordinate a map may occupy on any axis.
pub const MAX_WORLD_COORD: f32 = 16384.0;
pub const MIN_WORLD_COORD: f32 = -16384.0;
pub const MAX_WORLD_DIST: f32 = MAX_WORLD_COORD - MIN_WORLD_COORD;

pub const MAX_TOKEN_CHARS: usize = 256;

// ============================================================
// Contents and surface flags
// ============================================================

bitflags! {
    /// Brush and leaf contents. A leaf carries the contents of the brushes
    /// that fill it; zero is empty space.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Contents: i32 {
        const SOLID         = 0x1;
        const WINDOW        = 0x2;
        const AUX           = 0x4;
        const LAVA          = 0x8;
        const SLIME         = 0x10;
        const WATER         = 0x20;
        const MIST          = 0x40;
        const AREA_PORTAL   = 0x8000;
        const PLAYER_CLIP   = 0x10000;
        const MONSTER_CLIP  = 0x20000;
        const CURRENT_0     = 0x40000;
        const CURRENT_90    = 0x80000;
        const CURRENT_180   = 0x100000;
        const CURRENT_270   = 0x200000;
        const CURRENT_UP    = 0x400000;
        const CURRENT_DOWN  = 0x800000;
        const ORIGIN        = 0x1000000;
        const MONSTER       = 0x2000000;
        const DEAD_MONSTER  = 0x4000000;
        const DETAIL        = 0x8000000;
        const TRANSLUCENT   = 0x10000000;
        const LADDER        = 0x20000000;
    }
}

pub const MASK_ALL: Contents = Contents::all();
pub const MASK_SOLID: Contents = Contents::SOLID.union(Contents::WINDOW);
pub const MASK_PLAYER_SOLID: Contents = MASK_SOLID
    .union(Contents::PLAYER_CLIP)
    .union(Contents::MONSTER);
pub const MASK_DEAD_SOLID: Contents = MASK_SOLID.union(Contents::PLAYER_CLIP);
pub const MASK_MONSTER_SOLID: Contents = MASK_SOLID
    .union(Contents::MONSTER_CLIP)
    .union(Contents::MONSTER);
pub const MASK_LIQUID: Contents = Contents::WATER
    .union(Contents::LAVA)
    .union(Contents::SLIME);
pub const MASK_CLIP_PROJECTILE: Contents = MASK_SOLID
    .union(Contents::MONSTER)
    .union(Contents::DEAD_MONSTER);

bitflags! {
    /// Texinfo surface flags carried back on trace impacts.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SurfaceFlags: i32 {
        const LIGHT    = 0x1;
        const SLICK    = 0x2;
        const SKY      = 0x4;
        const WARP     = 0x8;
        const BLEND_33 = 0x10;
        const BLEND_66 = 0x20;
        const FLOWING  = 0x40;
        const NO_DRAW  = 0x80;
        const HINT     = 0x100;
        const SKIP     = 0x200;
    }
}

/// How an entity participates in clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Solid {
    #[default]
    Not,
    Trigger,
    Projectile,
    Dead,
    Box,
    Bsp,
}

// ============================================================
// Planes
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlaneType {
    #[default]
    X = 0,
    Y = 1,
    Z = 2,
    AnyX = 3,
    AnyY = 4,
    AnyZ = 5,
}

impl PlaneType {
    /// Axial only when the normal is exactly +1 along one axis. The negated
    /// member of an axial pair is typed by its dominant axis instead, so that
    /// `p[axis] - dist` is always a valid signed distance for axial planes.
    pub fn for_normal(normal: &Vec3) -> PlaneType {
        if normal[0] == 1.0 {
            return PlaneType::X;
        }
        if normal[1] == 1.0 {
            return PlaneType::Y;
        }
        if normal[2] == 1.0 {
            return PlaneType::Z;
        }

        let ax = normal[0].abs();
        let ay = normal[1].abs();
        let az = normal[2].abs();

        if ax >= ay && ax >= az {
            PlaneType::AnyX
        } else if ay >= ax && ay >= az {
            PlaneType::AnyY
        } else {
            PlaneType::AnyZ
        }
    }

    #[inline]
    pub fn is_axial(self) -> bool {
        (self as u8) < 3
    }

    /// The axis this type is aligned with (or dominated by).
    #[inline]
    pub fn axis(self) -> usize {
        (self as usize) % 3
    }
}

/// A splitting plane. `sign_bits` records which normal components are
/// negative and selects the box corner offsets used by plane tests.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: PlaneType,
    pub sign_bits: u8,
}

impl Plane {
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self {
            normal,
            dist,
            plane_type: PlaneType::for_normal(&normal),
            sign_bits: sign_bits_for_plane(&normal),
        }
    }

    /// The back-facing partner of this plane.
    pub fn negate(&self) -> Self {
        Self::new(
            [-self.normal[0], -self.normal[1], -self.normal[2]],
            -self.dist,
        )
    }

    /// Signed distance from `p` to the plane, using the axial fast path.
    #[inline]
    pub fn distance(&self, p: &Vec3) -> f32 {
        if self.plane_type.is_axial() {
            p[self.plane_type as usize] - self.dist
        } else {
            dot_product(&self.normal, p) - self.dist
        }
    }
}

/// Bit `i` is set when `normal[i]` is negative.
#[inline]
pub fn sign_bits_for_plane(normal: &Vec3) -> u8 {
    let mut bits = 0u8;
    for (j, n) in normal.iter().enumerate() {
        if *n < 0.0 {
            bits |= 1 << j;
        }
    }
    bits
}

// ============================================================
// Box on plane side
// ============================================================

/// Tolerance for axial box/plane classification.
pub const SIDE_EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Side {
    Front = 1,
    Back = 2,
    Both = 3,
}

/// Classifies the box `emins`..`emaxs` against `p`.
pub fn box_on_plane_side(emins: &Vec3, emaxs: &Vec3, p: &Plane) -> Side {
    // fast axial cases
    if p.plane_type.is_axial() {
        let t = p.plane_type as usize;
        if p.dist - SIDE_EPSILON <= emins[t] {
            return Side::Front;
        }
        if p.dist + SIDE_EPSILON >= emaxs[t] {
            return Side::Back;
        }
        return Side::Both;
    }

    // general case
    let n = &p.normal;
    let (dist1, dist2) = match p.sign_bits {
        0 => (
            n[0] * emaxs[0] + n[1] * emaxs[1] + n[2] * emaxs[2],
            n[0] * emins[0] + n[1] * emins[1] + n[2] * emins[2],
        ),
        1 => (
            n[0] * emins[0] + n[1] * emaxs[1] + n[2] * emaxs[2],
            n[0] * emaxs[0] + n[1] * emins[1] + n[2] * emins[2],
        ),
        2 => (
            n[0] * emaxs[0] + n[1] * emins[1] + n[2] * emaxs[2],
            n[0] * emins[0] + n[1] * emaxs[1] + n[2] * emins[2],
        ),
        3 => (
            n[0] * emins[0] + n[1] * emins[1] + n[2] * emaxs[2],
            n[0] * emaxs[0] + n[1] * emaxs[1] + n[2] * emins[2],
        ),
        4 => (
            n[0] * emaxs[0] + n[1] * emaxs[1] + n[2] * emins[2],
            n[0] * emins[0] + n[1] * emins[1] + n[2] * emaxs[2],
        ),
        5 => (
            n[0] * emins[0] + n[1] * emaxs[1] + n[2] * emins[2],
            n[0] * emaxs[0] + n[1] * emins[1] + n[2] * emaxs[2],
        ),
        6 => (
            n[0] * emaxs[0] + n[1] * emins[1] + n[2] * emins[2],
            n[0] * emins[0] + n[1] * emaxs[1] + n[2] * emaxs[2],
        ),
        _ => (
            n[0] * emins[0] + n[1] * emins[1] + n[2] * emins[2],
            n[0] * emaxs[0] + n[1] * emaxs[1] + n[2] * emaxs[2],
        ),
    };

    let front = dist1 >= p.dist;
    let back = dist2 < p.dist;
    match (front, back) {
        (true, true) => Side::Both,
        (false, true) => Side::Back,
        // a box can't be neither; treat the degenerate case as front
        _ => Side::Front,
    }
}

// ============================================================
// MATHLIB - Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vector_negate(v: &Vec3) -> Vec3 {
    [-v[0], -v[1], -v[2]]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

/// veca + scale * vecb
#[inline]
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

/// Linear interpolation from `a` (frac 0) to `b` (frac 1).
#[inline]
pub fn vector_lerp(a: &Vec3, b: &Vec3, frac: f32) -> Vec3 {
    [
        a[0] + frac * (b[0] - a[0]),
        a[1] + frac * (b[1] - a[1]),
        a[2] + frac * (b[2] - a[2]),
    ]
}

#[inline]
pub fn vector_compare(v1: &Vec3, v2: &Vec3) -> bool {
    v1[0] == v2[0] && v1[1] == v2[1] && v1[2] == v2[2]
}

pub fn vector_length(v: &Vec3) -> f32 {
    dot_product(v, v).sqrt()
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

pub fn add_point_to_bounds(v: &Vec3, mins: &mut Vec3, maxs: &mut Vec3) {
    for i in 0..3 {
        if v[i] < mins[i] {
            mins[i] = v[i];
        }
        if v[i] > maxs[i] {
            maxs[i] = v[i];
        }
    }
}

/// Bounds that any added point will replace.
pub fn clear_bounds() -> (Vec3, Vec3) {
    ([f32::MAX; 3], [f32::MIN; 3])
}

#[inline]
pub fn bounds_intersect(mins_a: &Vec3, maxs_a: &Vec3, mins_b: &Vec3, maxs_b: &Vec3) -> bool {
    mins_a[0] <= maxs_b[0]
        && mins_a[1] <= maxs_b[1]
        && mins_a[2] <= maxs_b[2]
        && maxs_a[0] >= mins_b[0]
        && maxs_a[1] >= mins_b[1]
        && maxs_a[2] >= mins_b[2]
}

// ============================================================
// Angle functions
// ============================================================

/// Returns (forward, right, up) for Euler angles in degrees.
pub fn angle_vectors(angles: &Vec3) -> (Vec3, Vec3, Vec3) {
    let (sy, cy) = angles[YAW].to_radians().sin_cos();
    let (sp, cp) = angles[PITCH].to_radians().sin_cos();
    let (sr, cr) = angles[ROLL].to_radians().sin_cos();

    let forward = [cp * cy, cp * sy, -sp];
    let right = [
        -sr * sp * cy + -cr * -sy,
        -sr * sp * sy + -cr * cy,
        -sr * cp,
    ];
    let up = [
        cr * sp * cy + -sr * -sy,
        cr * sp * sy + -sr * cy,
        cr * cp,
    ];

    (forward, right, up)
}

// ============================================================
// Tokenizer
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Quoted tokens are never structural, even when they read `{` or `}`.
    pub quoted: bool,
}

/// Parse the next token out of `data`, skipping whitespace and `//`
/// comments. Returns the token and the unparsed remainder, or `None` at end
/// of input.
pub fn com_parse(data: &str) -> Option<(Token, &str)> {
    let mut rest = data;

    // skip whitespace and comments
    loop {
        rest = rest.trim_start_matches(|c: char| c <= ' ');
        if rest.is_empty() {
            return None;
        }
        if let Some(comment) = rest.strip_prefix("//") {
            rest = match comment.find('\n') {
                Some(nl) => &comment[nl + 1..],
                None => "",
            };
            continue;
        }
        break;
    }

    // handle quoted strings
    if let Some(quoted) = rest.strip_prefix('"') {
        let (text, remainder) = match quoted.find('"') {
            Some(close) => (&quoted[..close], &quoted[close + 1..]),
            None => (quoted, ""),
        };
        let token = Token {
            text: text.chars().take(MAX_TOKEN_CHARS).collect(),
            quoted: true,
        };
        return Some((token, remainder));
    }

    // parse regular word
    let end = rest.find(|c: char| c <= ' ').unwrap_or(rest.len());
    let (word, remainder) = rest.split_at(end);
    let text = if word.chars().count() >= MAX_TOKEN_CHARS {
        String::new()
    } else {
        word.to_string()
    };

    Some((Token { text, quoted: false }, remainder))
}

/// Parses three whitespace separated floats, as used by vector keys.
pub fn parse_vec3(s: &str) -> Option<Vec3> {
    let mut out = [0.0f32; 3];
    let mut parts = s.split_whitespace();
    for v in out.iter_mut() {
        *v = parts.next()?.parse().ok()?;
    }
    Some(out)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn axial(axis: usize, dist: f32) -> Plane {
        let mut normal = [0.0; 3];
        normal[axis] = 1.0;
        Plane::new(normal, dist)
    }

    #[test]
    fn test_plane_type_for_normal() {
        assert_eq!(PlaneType::for_normal(&[1.0, 0.0, 0.0]), PlaneType::X);
        assert_eq!(PlaneType::for_normal(&[0.0, 1.0, 0.0]), PlaneType::Y);
        assert_eq!(PlaneType::for_normal(&[0.0, 0.0, 1.0]), PlaneType::Z);
        // the back-facing partner of an axial plane is not axial
        assert_eq!(PlaneType::for_normal(&[0.0, 0.0, -1.0]), PlaneType::AnyZ);
        assert_eq!(PlaneType::for_normal(&[0.8, 0.6, 0.0]), PlaneType::AnyX);
        assert_eq!(PlaneType::for_normal(&[0.0, -0.6, 0.8]), PlaneType::AnyZ);
    }

    #[test]
    fn test_sign_bits() {
        assert_eq!(sign_bits_for_plane(&[1.0, 1.0, 1.0]), 0);
        assert_eq!(sign_bits_for_plane(&[-1.0, 0.0, 0.0]), 1);
        assert_eq!(sign_bits_for_plane(&[0.0, -1.0, 0.0]), 2);
        assert_eq!(sign_bits_for_plane(&[0.0, 0.0, -1.0]), 4);
        assert_eq!(sign_bits_for_plane(&[-0.5, -0.5, -0.7]), 7);
    }

    #[test]
    fn test_negate_is_exact() {
        let p = Plane::new([0.6, -0.8, 0.0], 12.5);
        let n = p.negate();
        assert_eq!(n.normal, [-0.6, 0.8, -0.0]);
        assert_eq!(n.dist, -12.5);
        assert_eq!(n.negate().dist, p.dist);
    }

    #[test]
    fn test_box_on_plane_side_axial() {
        let p = axial(0, 10.0);
        assert_eq!(box_on_plane_side(&[11.0, 0.0, 0.0], &[20.0, 1.0, 1.0], &p), Side::Front);
        assert_eq!(box_on_plane_side(&[0.0, 0.0, 0.0], &[9.0, 1.0, 1.0], &p), Side::Back);
        assert_eq!(box_on_plane_side(&[0.0, 0.0, 0.0], &[20.0, 1.0, 1.0], &p), Side::Both);
    }

    #[test]
    fn test_box_on_plane_side_epsilon() {
        let p = axial(2, 64.0);
        // touching the plane from above within SIDE_EPSILON is still in front
        assert_eq!(
            box_on_plane_side(&[0.0, 0.0, 63.9995], &[1.0, 1.0, 80.0], &p),
            Side::Front
        );
        assert_eq!(
            box_on_plane_side(&[0.0, 0.0, 0.0], &[1.0, 1.0, 64.0005], &p),
            Side::Back
        );
    }

    #[test]
    fn test_box_on_plane_side_general_all_sign_bits() {
        let s = std::f32::consts::FRAC_1_SQRT_2 * 0.8164966;
        for bits in 0..8u8 {
            let mut normal = [0.57735026f32; 3];
            for j in 0..3 {
                if bits & (1 << j) != 0 {
                    normal[j] = -normal[j];
                }
            }
            let p = Plane::new(normal, 0.0);
            assert_eq!(p.sign_bits, bits);
            assert!(!p.plane_type.is_axial());

            // a box around the origin straddles every plane through it
            assert_eq!(box_on_plane_side(&[-1.0; 3], &[1.0; 3], &p), Side::Both);

            // a box pushed far along the normal is in front, and behind when
            // pushed the other way
            let far = vector_scale(&normal, 100.0);
            let near = vector_scale(&normal, -100.0);
            let m = vector_add(&far, &[-1.0; 3]);
            let x = vector_add(&far, &[1.0; 3]);
            assert_eq!(box_on_plane_side(&m, &x, &p), Side::Front);
            let m = vector_add(&near, &[-1.0; 3]);
            let x = vector_add(&near, &[1.0; 3]);
            assert_eq!(box_on_plane_side(&m, &x, &p), Side::Back);
        }
        assert!(s > 0.0);
    }

    #[test]
    fn test_plane_distance_fast_path_matches_dot() {
        let p = axial(1, -3.0);
        let pt = [5.0, 7.0, -2.0];
        assert_eq!(p.distance(&pt), dot_product(&p.normal, &pt) - p.dist);
    }

    #[test]
    fn test_angle_vectors_identity() {
        let (f, r, u) = angle_vectors(&[0.0, 0.0, 0.0]);
        assert_eq!(f, [1.0, 0.0, 0.0]);
        assert!((r[1] + 1.0).abs() < 1e-6);
        assert_eq!(u, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_angle_vectors_yaw_90() {
        let (f, _, _) = angle_vectors(&[0.0, 90.0, 0.0]);
        assert!(f[0].abs() < 1e-6);
        assert!((f[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_vector_normalize() {
        let mut v = [3.0, 0.0, 4.0];
        assert_eq!(vector_normalize(&mut v), 5.0);
        assert!((vector_length(&v) - 1.0).abs() < 1e-6);

        let mut zero = [0.0; 3];
        assert_eq!(vector_normalize(&mut zero), 0.0);
        assert_eq!(zero, [0.0; 3]);
    }

    #[test]
    fn test_bounds_intersect() {
        assert!(bounds_intersect(&[0.0; 3], &[1.0; 3], &[1.0; 3], &[2.0; 3]));
        assert!(!bounds_intersect(&[0.0; 3], &[1.0; 3], &[1.5; 3], &[2.0; 3]));
    }

    #[test]
    fn test_com_parse_tokens() {
        let src = "{ \"classname\" \"worldspawn\" // comment\n origin 1 }";
        let (t, rest) = com_parse(src).unwrap();
        assert_eq!(t.text, "{");
        assert!(!t.quoted);
        let (t, rest) = com_parse(rest).unwrap();
        assert_eq!(t.text, "classname");
        assert!(t.quoted);
        let (t, rest) = com_parse(rest).unwrap();
        assert_eq!(t.text, "worldspawn");
        let (t, rest) = com_parse(rest).unwrap();
        assert_eq!(t.text, "origin");
        let (t, rest) = com_parse(rest).unwrap();
        assert_eq!(t.text, "1");
        let (t, rest) = com_parse(rest).unwrap();
        assert_eq!(t.text, "}");
        assert!(com_parse(rest).is_none());
    }

    #[test]
    fn test_com_parse_quoted_brace_is_not_structural() {
        let (t, _) = com_parse("\"{\"").unwrap();
        assert_eq!(t.text, "{");
        assert!(t.quoted);
    }

    #[test]
    fn test_parse_vec3() {
        assert_eq!(parse_vec3("1 -2 3.5"), Some([1.0, -2.0, 3.5]));
        assert_eq!(parse_vec3("1 2"), None);
        assert_eq!(parse_vec3("a b c"), None);
    }

    #[test]
    fn test_masks() {
        assert!(MASK_SOLID.contains(Contents::SOLID));
        assert!(MASK_PLAYER_SOLID.contains(Contents::MONSTER));
        assert!(!MASK_SOLID.intersects(Contents::WATER));
        assert_eq!(MASK_ALL.bits() & Contents::LADDER.bits(), Contents::LADDER.bits());
    }
}
