//! `.lnk` part-hierarchy codec.
//!
//! A link file is a flat list of (child, parent) name pairs describing
//! the attachment tree of a model's parts. The in-memory form is a
//! child-to-parent map; insertion order is preserved so an encode after
//! a decode reproduces the record order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::util::{cp1251, Error, Reader, Result, Writer};

/// Child-to-parent attachment map for a model's parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkGraph {
    links: Vec<(String, Option<String>)>,
    index: HashMap<String, usize>,
}

impl LinkGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parts.
    #[inline]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True when the graph holds no parts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Insert or replace a part. `parent` of `None` marks the root.
    pub fn add(&mut self, child: impl Into<String>, parent: Option<String>) {
        let child = child.into();
        if let Some(&idx) = self.index.get(&child) {
            self.links[idx].1 = parent;
        } else {
            self.index.insert(child.clone(), self.links.len());
            self.links.push((child, parent));
        }
    }

    /// Parent of a part, `None` for the root.
    pub fn parent_of(&self, child: &str) -> Result<Option<&str>> {
        self.index
            .get(child)
            .map(|&idx| self.links[idx].1.as_deref())
            .ok_or_else(|| Error::hierarchy(format!("unknown part {child:?}")))
    }

    /// Iterate (child, parent) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.links.iter().map(|(c, p)| (c.as_str(), p.as_deref()))
    }

    /// Part names in insertion order.
    pub fn part_names(&self) -> Vec<String> {
        self.links.iter().map(|(c, _)| c.clone()).collect()
    }

    /// The single root part.
    ///
    /// Fails when the graph has no root or more than one.
    pub fn root(&self) -> Result<&str> {
        let mut roots = self.links.iter().filter(|(_, p)| p.is_none());
        let first = roots
            .next()
            .ok_or_else(|| Error::hierarchy("hierarchy has no root part"))?;
        if let Some(second) = roots.next() {
            return Err(Error::hierarchy(format!(
                "hierarchy has multiple roots: {:?} and {:?}",
                first.0, second.0
            )));
        }
        Ok(&first.0)
    }

    /// Check the graph is a single-rooted tree: exactly one root, every
    /// parent a known part, every part reachable from the root.
    pub fn validate(&self) -> Result<()> {
        self.root()?;
        for (child, parent) in self.iter() {
            if let Some(parent) = parent {
                if !self.index.contains_key(parent) {
                    return Err(Error::hierarchy(format!(
                        "part {child:?} links to unknown parent {parent:?}"
                    )));
                }
            }
        }
        let order = self.topological_order()?;
        if order.len() != self.links.len() {
            return Err(Error::hierarchy("hierarchy has parts unreachable from the root"));
        }
        Ok(())
    }

    /// Parts in parents-before-children order, breadth first from the
    /// root. Siblings come alphabetically, then stably by name length.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let root = self.root()?;

        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for (child, parent) in self.iter() {
            if let Some(parent) = parent {
                children.entry(parent).or_default().push(child);
            }
        }
        for siblings in children.values_mut() {
            siblings.sort_unstable();
            siblings.sort_by_key(|name| name.len());
        }

        let mut order = Vec::with_capacity(self.links.len());
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root]);
        seen.insert(root);
        while let Some(part) = queue.pop_front() {
            order.push(part.to_string());
            if let Some(siblings) = children.get(part) {
                for &child in siblings {
                    if seen.insert(child) {
                        queue.push_back(child);
                    }
                }
            }
        }
        Ok(order)
    }

    /// Decode a link file.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let count = reader.read_i32()?;
        if count < 0 {
            return Err(Error::malformed(format!("negative link count {count}")));
        }

        let mut graph = Self::new();
        for _ in 0..count {
            let child = read_name(&mut reader)?
                .ok_or_else(|| Error::malformed("link record with empty part name"))?;
            let parent = read_name(&mut reader)?;
            graph.add(child, parent);
        }
        Ok(graph)
    }

    /// Encode as a link file.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        writer.write_i32(self.links.len() as i32);
        for (child, parent) in self.iter() {
            write_name(&mut writer, Some(child))?;
            write_name(&mut writer, parent)?;
        }
        Ok(writer.into_bytes())
    }
}

/// Read one length-prefixed, nul-terminated name. Zero length means the
/// name is absent.
fn read_name(reader: &mut Reader<'_>) -> Result<Option<String>> {
    let len = reader.read_i32()?;
    if len < 0 {
        return Err(Error::malformed(format!("negative name length {len}")));
    }
    if len == 0 {
        return Ok(None);
    }
    let bytes = reader.read_bytes(len as usize)?;
    let trimmed = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    Ok(Some(cp1251::decode(&bytes[..trimmed])))
}

fn write_name(writer: &mut Writer, name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => {
            let encoded = cp1251::encode(name)?;
            writer.write_i32(encoded.len() as i32 + 1);
            writer.write_bytes(&encoded);
            writer.write_u8(0);
        }
        None => writer.write_i32(0),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LinkGraph {
        let mut graph = LinkGraph::new();
        graph.add("base", None);
        graph.add("larm", Some("base".to_string()));
        graph.add("rarm", Some("base".to_string()));
        graph.add("hand", Some("larm".to_string()));
        graph
    }

    #[test]
    fn test_roundtrip_preserves_order() {
        let graph = sample();
        let bytes = graph.encode().unwrap();
        let decoded = LinkGraph::decode(&bytes).unwrap();
        assert_eq!(decoded, graph);
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn test_root_and_validate() {
        let graph = sample();
        assert_eq!(graph.root().unwrap(), "base");
        graph.validate().unwrap();

        let mut two_roots = sample();
        two_roots.add("stray", None);
        assert!(matches!(two_roots.root(), Err(Error::HierarchyError(_))));

        let mut dangling = sample();
        dangling.add("foot", Some("missing".to_string()));
        assert!(matches!(dangling.validate(), Err(Error::HierarchyError(_))));
    }

    #[test]
    fn test_topological_order_bfs() {
        let mut graph = LinkGraph::new();
        graph.add("hand", Some("arm".to_string()));
        graph.add("torso", None);
        graph.add("head", Some("torso".to_string()));
        graph.add("arm", Some("torso".to_string()));
        let order = graph.topological_order().unwrap();
        // siblings alphabetical, then stable by length: arm before head
        assert_eq!(order, ["torso", "arm", "head", "hand"]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(LinkGraph::decode(&[0xFF; 2]).is_err());
        let mut w = Writer::new();
        w.write_i32(1);
        w.write_i32(0); // empty child name
        w.write_i32(0);
        assert!(LinkGraph::decode(&w.into_bytes()).is_err());
    }

    #[test]
    fn test_nul_padding_stripped() {
        let mut w = Writer::new();
        w.write_i32(1);
        w.write_i32(6);
        w.write_bytes(b"box\0\0\0");
        w.write_i32(0);
        let graph = LinkGraph::decode(&w.into_bytes()).unwrap();
        assert_eq!(graph.root().unwrap(), "box");
    }
}
