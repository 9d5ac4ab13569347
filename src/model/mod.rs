//! Whole-model assembly over the archive container.
//!
//! Two storage conventions exist. Nested: `<model>.mod` is a
//! sub-archive whose entry named `<model>` is the link data and whose
//! other entries are figures, with `<model>.bon` a sub-archive of bone
//! positions. Flat: `<model>.lnk` next to `<part>.fig` / `<part>.bon`
//! entries in the outer archive. Animations always live in
//! `<model>.anm`, a sub-archive of animation-set entries, each itself a
//! sub-archive of per-part records.

use std::io::Cursor;

use glam::Vec3;
use tracing::warn;

use crate::anm::{Animation, AnmOptions};
use crate::fig::{item_group, Figure};
use crate::lnk::LinkGraph;
use crate::res::{Mode, ResFile};
use crate::util::{Error, Reader, Result, Writer};
use crate::xform::AnimationSet;

/// One part's attachment positions, one per morph component (1 or 8).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bone {
    pub name: String,
    pub positions: Vec<Vec3>,
}

impl Bone {
    /// Decode a bone record: concatenated f32 xyz triples.
    pub fn decode(name: &str, data: &[u8]) -> Result<Self> {
        if data.len() % 12 != 0 {
            return Err(Error::mismatch(format!(
                "bone record {name:?} is {} bytes, not whole xyz triples",
                data.len()
            )));
        }
        let mut reader = Reader::new(data);
        let count = data.len() / 12;
        if count != 1 && count != 8 {
            warn!(name, count, "unusual bone position count");
        }
        let mut positions = Vec::with_capacity(count);
        for _ in 0..count {
            positions.push(reader.read_vec3()?);
        }
        Ok(Self { name: name.to_string(), positions })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.positions.len() * 12);
        for &pos in &self.positions {
            writer.write_vec3(pos);
        }
        writer.into_bytes()
    }
}

/// A model: hierarchy, part geometry, and attachment positions.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub name: String,
    pub links: LinkGraph,
    pub figures: Vec<Figure>,
    pub bones: Vec<Bone>,
}

/// Read a model from an archive, trying the nested `.mod` convention
/// first and falling back to the flat `.lnk` one.
pub fn import_model<S: std::io::Read + std::io::Seek>(
    res: &mut ResFile<S>,
    model_name: &str,
    etherlord: bool,
) -> Result<Model> {
    let names = res.entry_names();
    if names.iter().any(|n| n == &format!("{model_name}.mod")) {
        import_nested(res, model_name, etherlord)
    } else if names.iter().any(|n| n == &format!("{model_name}.lnk")) {
        import_flat(res, model_name, etherlord)
    } else {
        Err(Error::UnknownEntry(model_name.to_string()))
    }
}

fn import_nested<S: std::io::Read + std::io::Seek>(
    res: &mut ResFile<S>,
    model_name: &str,
    etherlord: bool,
) -> Result<Model> {
    let mod_data = res.read_entry(&format!("{model_name}.mod"))?;
    let mut meshes = ResFile::new(Cursor::new(mod_data), Mode::Read)?;

    let links = LinkGraph::decode(&meshes.read_entry(model_name)?)?;
    let mut figures = Vec::new();
    for entry in meshes.entry_names() {
        if entry == model_name {
            continue;
        }
        let data = meshes.read_entry(&entry)?;
        figures.push(Figure::decode(&entry, &data, etherlord)?);
    }

    // the etherlord flavor ships no bone archives
    let mut bones = Vec::new();
    if !etherlord {
        let bon_data = res.read_entry(&format!("{model_name}.bon"))?;
        let mut bone_archive = ResFile::new(Cursor::new(bon_data), Mode::Read)?;
        for entry in bone_archive.entry_names() {
            let data = bone_archive.read_entry(&entry)?;
            bones.push(Bone::decode(&entry, &data)?);
        }
    }

    Ok(Model { name: model_name.to_string(), links, figures, bones })
}

fn import_flat<S: std::io::Read + std::io::Seek>(
    res: &mut ResFile<S>,
    model_name: &str,
    etherlord: bool,
) -> Result<Model> {
    let links = LinkGraph::decode(&res.read_entry(&format!("{model_name}.lnk"))?)?;
    let names = res.entry_names();

    let mut figures = Vec::new();
    let mut bones = Vec::new();
    for part in links.part_names() {
        let fig_name = format!("{part}.fig");
        if names.contains(&fig_name) {
            let data = res.read_entry(&fig_name)?;
            figures.push(Figure::decode(&part, &data, etherlord)?);
        } else {
            warn!(part, "figure entry not found");
        }
        let bon_name = format!("{part}.bon");
        if names.contains(&bon_name) {
            let data = res.read_entry(&bon_name)?;
            bones.push(Bone::decode(&part, &data)?);
        } else {
            warn!(part, "bone entry not found");
        }
    }
    Ok(Model { name: model_name.to_string(), links, figures, bones })
}

/// Write a model into an archive. The item group of the model name
/// decides the convention: single-morph-component groups use the flat
/// layout, the rest the nested one.
pub fn export_model<S: std::io::Read + std::io::Write + std::io::Seek>(
    res: &mut ResFile<S>,
    model: &Model,
) -> Result<()> {
    if item_group(&model.name).morph_component_count == 1 {
        export_flat(res, model)
    } else {
        export_nested(res, model)
    }
}

fn export_flat<S: std::io::Read + std::io::Write + std::io::Seek>(
    res: &mut ResFile<S>,
    model: &Model,
) -> Result<()> {
    res.write_entry(&format!("{}.lnk", model.name), &model.links.encode()?)?;
    for figure in &model.figures {
        res.write_entry(&format!("{}.fig", figure.name), &figure.encode()?)?;
    }
    for bone in &model.bones {
        res.write_entry(&format!("{}.bon", bone.name), &bone.encode())?;
    }
    Ok(())
}

fn export_nested<S: std::io::Read + std::io::Write + std::io::Seek>(
    res: &mut ResFile<S>,
    model: &Model,
) -> Result<()> {
    let mut mod_cursor = Cursor::new(Vec::new());
    let mut meshes = ResFile::new(&mut mod_cursor, Mode::Write)?;
    meshes.write_entry(&model.name, &model.links.encode()?)?;
    for figure in &model.figures {
        meshes.write_entry(&figure.name, &figure.encode()?)?;
    }
    meshes.close()?;

    let mut bon_cursor = Cursor::new(Vec::new());
    let mut bone_archive = ResFile::new(&mut bon_cursor, Mode::Write)?;
    for bone in &model.bones {
        bone_archive.write_entry(&bone.name, &bone.encode())?;
    }
    bone_archive.close()?;

    res.write_entry(&format!("{}.mod", model.name), &mod_cursor.into_inner())?;
    res.write_entry(&format!("{}.bon", model.name), &bon_cursor.into_inner())?;
    Ok(())
}

/// Read one named animation set of a model.
pub fn import_animation<S: std::io::Read + std::io::Seek>(
    res: &mut ResFile<S>,
    model_name: &str,
    animation_name: &str,
    options: AnmOptions,
) -> Result<AnimationSet> {
    let anm_data = res.read_entry(&format!("{model_name}.anm"))?;
    let mut sets = ResFile::new(Cursor::new(anm_data), Mode::Read)?;
    let set_data = sets.read_entry(animation_name)?;
    let mut records = ResFile::new(Cursor::new(set_data), Mode::Read)?;

    let mut parts = Vec::new();
    for entry in records.entry_names() {
        let data = records.read_entry(&entry)?;
        parts.push(Animation::decode(&entry, &data, options)?);
    }
    Ok(AnimationSet::new(parts))
}

/// Write one named animation set, keeping the model's other sets
/// untouched.
pub fn export_animation<S: std::io::Read + std::io::Write + std::io::Seek>(
    res: &mut ResFile<S>,
    model_name: &str,
    animation_name: &str,
    set: &AnimationSet,
    options: AnmOptions,
) -> Result<()> {
    // encode the per-part records into their own sub-archive first
    let mut set_cursor = Cursor::new(Vec::new());
    let mut records = ResFile::new(&mut set_cursor, Mode::Write)?;
    for part in set.iter() {
        records.write_entry(&part.name, &part.encode(options)?)?;
    }
    records.close()?;

    // collect the existing sets so siblings survive the rewrite
    let entry_name = format!("{model_name}.anm");
    let mut sets: Vec<(String, Vec<u8>)> = Vec::new();
    match res.read_entry(&entry_name) {
        Ok(data) => {
            let mut existing = ResFile::new(Cursor::new(data), Mode::Read)?;
            for name in existing.entry_names() {
                if name != animation_name {
                    let data = existing.read_entry(&name)?;
                    sets.push((name, data));
                }
            }
        }
        Err(Error::UnknownEntry(_)) => {
            warn!(model = model_name, "no animation archive yet, creating one");
        }
        Err(e) => return Err(e),
    }
    sets.push((animation_name.to_string(), set_cursor.into_inner()));

    let mut anm_cursor = Cursor::new(Vec::new());
    let mut rebuilt = ResFile::new(&mut anm_cursor, Mode::Write)?;
    for (name, data) in sets {
        rebuilt.write_entry(&name, &data)?;
    }
    rebuilt.close()?;
    res.write_entry(&entry_name, &anm_cursor.into_inner())?;
    Ok(())
}
