//! Rotation convention conversions.
//!
//! Animation rotations exist in three conventions: the on-disk
//! parent-local one, absolute orientations, and the host scene graph's
//! parent-relative one (where the host composes parent transforms
//! itself). An [`AnimationSet`] holds the per-part records plus the
//! derived absolute rotations and converts between all three.
//!
//! Composition uses abs = parent_abs * local; the other three operations
//! are its algebraic inverses and conjugates. Parts are processed in
//! hierarchy order, so a parent's absolute rotations always exist before
//! its children ask for them.

use std::collections::HashMap;

use glam::Quat;
use tracing::warn;

use crate::anm::Animation;
use crate::lnk::LinkGraph;
use crate::util::{Error, Result};

/// A model's animation records plus derived absolute rotations.
#[derive(Debug, Clone, Default)]
pub struct AnimationSet {
    parts: Vec<Animation>,
    /// Keyed by lowercased part name; empty until one of the
    /// to-absolute conversions runs.
    absolute: HashMap<String, Vec<Quat>>,
}

impl AnimationSet {
    pub fn new(parts: Vec<Animation>) -> Self {
        Self { parts, absolute: HashMap::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Iterate the per-part records.
    pub fn iter(&self) -> impl Iterator<Item = &Animation> {
        self.parts.iter()
    }

    /// Consume the set, returning the records.
    pub fn into_parts(self) -> Vec<Animation> {
        self.parts
    }

    /// Case-insensitive part lookup.
    pub fn get(&self, name: &str) -> Option<&Animation> {
        self.index_of(name).map(|i| &self.parts[i])
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        // the same folding the absolute map is keyed by
        let folded = name.to_lowercase();
        self.parts
            .iter()
            .position(|p| p.name.to_lowercase() == folded)
    }

    /// Derived absolute rotations of a part, if computed.
    pub fn absolute_rotations(&self, name: &str) -> Option<&[Quat]> {
        self.absolute.get(&name.to_lowercase()).map(Vec::as_slice)
    }

    /// Compute absolute rotations from on-disk parent-local ones:
    /// abs = parent_abs * local, roots passing through unchanged.
    pub fn file_to_absolute(&mut self, links: &LinkGraph) -> Result<()> {
        self.compose_absolute(links, |local, parent_abs| parent_abs * local)
    }

    /// Compute absolute rotations from host parent-relative ones:
    /// abs = host * parent_abs.
    pub fn host_to_absolute(&mut self, links: &LinkGraph) -> Result<()> {
        self.compose_absolute(links, |host, parent_abs| host * parent_abs)
    }

    fn compose_absolute(
        &mut self,
        links: &LinkGraph,
        compose: impl Fn(Quat, Quat) -> Quat,
    ) -> Result<()> {
        // hierarchy order guarantees parents come first and rejects
        // rootless or multi-rooted graphs up front
        let order = links.topological_order()?;

        let mut absolute: HashMap<String, Vec<Quat>> = HashMap::new();
        for part in &order {
            let Some(anim) = self.get(part) else {
                warn!(part, "no animation for part, skipping");
                continue;
            };
            let frames = match links.parent_of(part)? {
                None => anim.rotations.clone(),
                Some(parent) => {
                    let parent_abs = absolute.get(&parent.to_lowercase()).ok_or_else(|| {
                        Error::hierarchy(format!(
                            "parent {parent:?} of {part:?} has no animation"
                        ))
                    })?;
                    check_frame_counts(part, anim.rotations.len(), parent_abs.len())?;
                    anim.rotations
                        .iter()
                        .zip(parent_abs)
                        .map(|(&q, &p)| compose(q, p))
                        .collect()
                }
            };
            absolute.insert(part.to_lowercase(), frames);
        }
        self.absolute = absolute;
        Ok(())
    }

    /// Rewrite per-part rotations to the on-disk parent-local
    /// convention: local = parent_abs^-1 * abs.
    pub fn absolute_to_file(&mut self, links: &LinkGraph) -> Result<()> {
        self.decompose_absolute(links, |abs, parent_abs| parent_abs.inverse() * abs)
    }

    /// Rewrite per-part rotations to the host convention:
    /// host = abs * parent_abs^-1.
    pub fn absolute_to_host(&mut self, links: &LinkGraph) -> Result<()> {
        self.decompose_absolute(links, |abs, parent_abs| abs * parent_abs.inverse())
    }

    fn decompose_absolute(
        &mut self,
        links: &LinkGraph,
        decompose: impl Fn(Quat, Quat) -> Quat,
    ) -> Result<()> {
        links.root()?;
        for part in links.part_names() {
            // roots keep their rotations: local == host == abs
            let Some(parent) = links.parent_of(&part)? else {
                continue;
            };
            let Some(idx) = self.index_of(&part) else {
                warn!(part, "no animation for part, skipping");
                continue;
            };
            let abs = self.absolute.get(&part.to_lowercase()).ok_or_else(|| {
                Error::mismatch(format!("absolute rotations of {part:?} not computed"))
            })?;
            let parent_abs = self.absolute.get(&parent.to_lowercase()).ok_or_else(|| {
                Error::mismatch(format!("absolute rotations of {parent:?} not computed"))
            })?;
            check_frame_counts(&part, abs.len(), parent_abs.len())?;
            let frames: Vec<Quat> = abs
                .iter()
                .zip(parent_abs)
                .map(|(&a, &p)| decompose(a, p))
                .collect();
            self.parts[idx].rotations = frames;
        }
        Ok(())
    }
}

fn check_frame_counts(part: &str, own: usize, parent: usize) -> Result<()> {
    if own != parent {
        return Err(Error::mismatch(format!(
            "part {part:?} has {own} rotation frames, its parent has {parent}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::Vec3;

    use super::*;

    fn quat_close(a: Quat, b: Quat) -> bool {
        (a - b).length() < 1e-5 || (a + b).length() < 1e-5
    }

    fn chain_links() -> LinkGraph {
        let mut links = LinkGraph::new();
        links.add("base", None);
        links.add("arm", Some("base".to_string()));
        links.add("hand", Some("arm".to_string()));
        links
    }

    fn part(name: &str, rotations: Vec<Quat>) -> Animation {
        Animation { name: name.to_string(), rotations, ..Animation::default() }
    }

    fn chain_set(frames: usize) -> AnimationSet {
        let z90 = Quat::from_rotation_z(FRAC_PI_2);
        AnimationSet::new(vec![
            part("base", vec![z90; frames]),
            part("arm", vec![z90; frames]),
            part("hand", vec![z90; frames]),
        ])
    }

    #[test]
    fn test_file_to_absolute_composes_down_the_chain() {
        let links = chain_links();
        let mut set = chain_set(2);
        set.file_to_absolute(&links).unwrap();

        let base = set.absolute_rotations("base").unwrap();
        let arm = set.absolute_rotations("arm").unwrap();
        let hand = set.absolute_rotations("hand").unwrap();
        assert!(quat_close(base[0], Quat::from_rotation_z(FRAC_PI_2)));
        assert!(quat_close(arm[0], Quat::from_rotation_z(2.0 * FRAC_PI_2)));
        assert!(quat_close(hand[0], Quat::from_rotation_z(3.0 * FRAC_PI_2)));
    }

    #[test]
    fn test_file_host_file_roundtrip() {
        let links = chain_links();
        let z90 = Quat::from_rotation_z(FRAC_PI_2);
        let x45 = Quat::from_axis_angle(Vec3::X, 0.25 * FRAC_PI_2);
        let mut set = AnimationSet::new(vec![
            part("base", vec![z90, x45]),
            part("arm", vec![x45, z90]),
            part("hand", vec![z90 * x45, x45 * z90]),
        ]);
        let original: Vec<Vec<Quat>> = set.iter().map(|p| p.rotations.clone()).collect();

        set.file_to_absolute(&links).unwrap();
        set.absolute_to_host(&links).unwrap();
        set.host_to_absolute(&links).unwrap();
        set.absolute_to_file(&links).unwrap();

        for (anim, want) in set.iter().zip(&original) {
            for (&got, &want) in anim.rotations.iter().zip(want) {
                assert!(quat_close(got, want), "{}: {got:?} != {want:?}", anim.name);
            }
        }
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let set = chain_set(1);
        assert!(set.get("BASE").is_some());
        assert!(set.get("Arm").is_some());
        assert!(set.get("leg").is_none());
    }

    #[test]
    fn test_lookup_folds_cyrillic_names() {
        let mut links = LinkGraph::new();
        links.add("тело", None);
        links.add("меч", Some("тело".to_string()));
        let z90 = Quat::from_rotation_z(FRAC_PI_2);
        let mut set = AnimationSet::new(vec![
            part("ТЕЛО", vec![z90]),
            part("Меч", vec![z90]),
        ]);
        assert!(set.get("меч").is_some());

        set.file_to_absolute(&links).unwrap();
        assert!(set.absolute_rotations("МЕЧ").is_some());
        set.absolute_to_file(&links).unwrap();
    }

    #[test]
    fn test_rejects_multi_root() {
        let mut links = chain_links();
        links.add("stray", None);
        let mut set = chain_set(1);
        assert!(matches!(
            set.file_to_absolute(&links),
            Err(Error::HierarchyError(_))
        ));
    }

    #[test]
    fn test_frame_count_mismatch() {
        let links = chain_links();
        let z90 = Quat::from_rotation_z(FRAC_PI_2);
        let mut set = AnimationSet::new(vec![
            part("base", vec![z90, z90]),
            part("arm", vec![z90]),
            part("hand", vec![z90]),
        ]);
        assert!(matches!(
            set.file_to_absolute(&links),
            Err(Error::FormatMismatch(_))
        ));
    }

    #[test]
    fn test_missing_parent_animation() {
        let links = chain_links();
        let z90 = Quat::from_rotation_z(FRAC_PI_2);
        // arm has no record, so hand's parent chain is broken
        let mut set = AnimationSet::new(vec![
            part("base", vec![z90]),
            part("hand", vec![z90]),
        ]);
        assert!(matches!(
            set.file_to_absolute(&links),
            Err(Error::HierarchyError(_))
        ));
    }

    #[test]
    fn test_decompose_requires_absolute() {
        let links = chain_links();
        let mut set = chain_set(1);
        assert!(matches!(
            set.absolute_to_host(&links),
            Err(Error::FormatMismatch(_))
        ));
    }
}
