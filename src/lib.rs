//! # eiasset
//!
//! Rust implementation of the Evil Islands / Etherlords asset formats:
//! the hashed `.res` archive container and the binary records it holds.
//!
//! Original formats developed by Nival Interactive for the games' own
//! engine. This is an independent implementation aiming to match the
//! on-disk layouts bit for bit, including the name-hash table scheme the
//! engine uses to locate entries.
//!
//! ## Modules
//!
//! - [`util`] - Byte cursor, errors, cp1251 names
//! - [`res`] - `.res` archive container (read, write, repack)
//! - [`lnk`] - part hierarchy graphs
//! - [`fig`] - figure meshes with morph targets and packed UVs
//! - [`anm`] - per-part animation curves
//! - [`xform`] - rotation convention conversions
//! - [`model`] - whole-model import/export over nested archives
//!
//! ## Example
//!
//! ```ignore
//! use eiasset::res::{Mode, ResFile};
//!
//! let mut archive = ResFile::open("Figures.res")?;
//! for name in archive.entry_names() {
//!     println!("{name}");
//! }
//! ```

pub mod anm;
pub mod fig;
pub mod lnk;
pub mod model;
pub mod res;
pub mod util;
pub mod xform;

// Re-export commonly used types
pub use res::{Mode, ResFile};
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::anm::{Animation, AnmOptions, AnmVariant};
    pub use crate::fig::{FigSignature, Figure};
    pub use crate::lnk::LinkGraph;
    pub use crate::model::{
        export_animation, export_model, import_animation, import_model, Bone, Model,
    };
    pub use crate::res::{EntryInfo, Mode, ResFile};
    pub use crate::util::{Error, Result};
    pub use crate::xform::AnimationSet;
}
