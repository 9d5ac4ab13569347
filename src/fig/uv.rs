//! Item groups and the UV packing law.
//!
//! Texture coordinates are stored packed: halved and offset toward a
//! category-specific base point. The category comes from an ordered rule
//! table matched against the object name; the first matching rule wins
//! and the last rule is a catch-all, so every name resolves to a group.

use std::sync::OnceLock;

use glam::Vec2;
use regex::Regex;
use tracing::debug;

/// Base point marking the legacy packing law (x unshifted, y offset by 1).
pub const UV_BASE_LEGACY: Vec2 = Vec2::new(-1.0, -1.0);

/// One category of objects sharing UV and morph parameters.
#[derive(Debug)]
pub struct ItemGroup {
    pub kind: &'static str,
    mask: Regex,
    /// How many times the halving/offset step is applied.
    pub uv_convert_count: u32,
    pub ei_group: u32,
    pub texture_number: u32,
    /// Morph components per bone position record, 1 or 8.
    pub morph_component_count: u32,
    pub uv_base: Vec2,
}

fn rule(
    kind: &'static str,
    pattern: &str,
    uv_convert_count: u32,
    ei_group: u32,
    texture_number: u32,
    morph_component_count: u32,
    uv_base: Vec2,
) -> ItemGroup {
    ItemGroup {
        kind,
        mask: Regex::new(pattern).expect("item group pattern is valid"),
        uv_convert_count,
        ei_group,
        texture_number,
        morph_component_count,
        uv_base,
    }
}

fn table() -> &'static [ItemGroup] {
    static TABLE: OnceLock<Vec<ItemGroup>> = OnceLock::new();
    TABLE.get_or_init(|| {
        vec![
            rule("quest, quick, material", r"init(li)?(qu|qi|tr|mt)[0-9]+", 0, 19, 8, 1, UV_BASE_LEGACY),
            rule("treasure/loot", r"inittr[0-9]+", 0, 18, 8, 1, UV_BASE_LEGACY),
            rule("shop weapons/armors", r"init(we|ar)[a-zA-Z]+[0-9]+", 0, 18, 8, 1, UV_BASE_LEGACY),
            rule("interactive game objects", r"ingm[0-9]+", 0, 22, 8, 1, Vec2::new(0.0, 1.0)),
            rule("faces", r"infa[0-9]+", 0, 22, 8, 1, Vec2::new(0.0, 1.0)),
            rule("arrows", r"quiver|arrow(s|00)", 1, 19, 2, 8, Vec2::new(0.0, 1.0)),
            rule("archery", r"(\.(crbow|bw\D+)|^crbow|^bw\D+)\d+", 1, 18, 2, 8, Vec2::new(0.0, 1.0)),
            rule("archery parts", r"(\.(crbow..part|bw..part\D+)|^crbow..part|^bw..part\D+)\d+", 1, 18, 2, 8, Vec2::new(0.0, 1.0)),
            rule("shield", r"lh2\.axe\d+", 1, 18, 2, 8, Vec2::new(1.0, 1.0)),
            rule("exshield", r"lh2\.shield\d+", 1, 18, 2, 8, Vec2::new(1.0, 1.0)),
            rule("staff left", r"lh3\.staff\D+", 1, 18, 2, 8, Vec2::new(1.0, 1.0)),
            rule("double staff left", r"lh3\.dstaff\D+", 1, 18, 2, 8, Vec2::new(1.0, 1.0)),
            rule("staff right", r"rh3\.staff\D+", 1, 18, 2, 8, Vec2::new(0.0, 1.0)),
            rule("double staff right", r"rh3\.dstaff\D+", 1, 18, 2, 8, Vec2::new(0.0, 1.0)),
            rule(
                "weapons left",
                r"(lh3\.(pike|dpike|sword|dsword|dagger|club|dclub|axe|daxe|staff|dstaff|shit1|shit2\D+)|^shit1|^shit2\D+)\d+",
                1, 18, 2, 8, Vec2::new(1.0, 1.0),
            ),
            rule(
                "weapons",
                r"(\.(pike|dpike|sword|dsword|dagger|club|dclub|axe|daxe|staff|dstaff|crbow|bw\D+)|^crbow|^bw\D+)\d+",
                1, 18, 2, 8, Vec2::new(0.0, 1.0),
            ),
            rule("helms", r"hd\.armor\d+", 1, 19, 2, 8, Vec2::new(0.0, 0.0)),
            rule("armor", r"\.armor\d+", 0, 19, 1, 8, Vec2::new(0.0, 1.0)),
            rule("units", r"un(an|mo|hu|or|sk).+", 0, 19, 1, 8, Vec2::new(0.0, 1.0)),
            // catch-all, must stay last
            rule("world objects", r".+", 0, 18, 8, 8, Vec2::new(0.0, 1.0)),
        ]
    })
}

/// Resolve the item group of an object name. Rules are tried in order and
/// the catch-all guarantees a match for any non-empty name.
pub fn item_group(name: &str) -> &'static ItemGroup {
    let group = table()
        .iter()
        .find(|item| item.mask.is_match(name))
        .unwrap_or_else(|| &table()[table().len() - 1]);
    debug!(name, group = group.kind, "resolved item group");
    group
}

/// The legacy base packs exactly like (0, 1).
fn effective_base(base: Vec2) -> Vec2 {
    if base == UV_BASE_LEGACY {
        Vec2::new(0.0, 1.0)
    } else {
        base
    }
}

/// Unpack stored UVs in place: `count` rounds of doubling and shifting
/// away from the base point.
pub fn unpack_uv(uvs: &mut [Vec2], count: u32, base: Vec2) {
    let base = effective_base(base);
    for _ in 0..count {
        for uv in uvs.iter_mut() {
            uv.x = uv.x * 2.0 - base.x;
            uv.y = uv.y * 2.0 - base.y;
        }
    }
}

/// Pack UVs in place: the exact inverse of [`unpack_uv`].
pub fn pack_uv(uvs: &mut [Vec2], count: u32, base: Vec2) {
    let base = effective_base(base);
    for _ in 0..count {
        for uv in uvs.iter_mut() {
            uv.x = base.x / 2.0 + uv.x / 2.0;
            uv.y = base.y / 2.0 + uv.y / 2.0;
        }
    }
}
