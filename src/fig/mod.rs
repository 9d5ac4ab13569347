//! Figure mesh records and the item-group UV packing law.

pub mod figure;
pub mod uv;

pub use figure::{FigSignature, Figure, FigureHeader, BLOCK_SIZE, FULL_MORPH_COUNT};
pub use uv::{item_group, pack_uv, unpack_uv, ItemGroup};
