//! Parent/child links between incidences (`RELATED-TO`)
//!
//! Incidences only store the UID of their parent. Once a batch of incidences is loaded, a [`RelatedIndex`]
//! resolves these UIDs into positions in the batch, in both directions.

use std::collections::HashMap;

use crate::incidence::Incidence;

#[derive(Clone, Debug, Default)]
pub struct RelatedIndex {
    positions: HashMap<String, usize>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    dangling: Vec<usize>,
}

impl RelatedIndex {
    /// Resolves the links of a batch of incidences
    pub fn build(incidences: &[Incidence]) -> Self {
        let mut positions = HashMap::with_capacity(incidences.len());
        for (index, incidence) in incidences.iter().enumerate() {
            if positions.insert(incidence.uid().to_string(), index).is_some() {
                log::warn!("UID {} appears several times, only its last occurrence can be linked to", incidence.uid());
            }
        }

        let mut parents = vec![None; incidences.len()];
        let mut children = vec![Vec::new(); incidences.len()];
        let mut dangling = Vec::new();
        for (index, incidence) in incidences.iter().enumerate() {
            let parent_uid = match incidence.related_to() {
                Some(uid) if uid != incidence.uid() => uid,
                _ => continue,
            };
            match positions.get(parent_uid) {
                Some(&parent) => {
                    parents[index] = Some(parent);
                    children[parent].push(index);
                },
                None => dangling.push(index),
            }
        }

        Self { positions, parents, children, dangling }
    }

    pub fn position_of(&self, uid: &str) -> Option<usize> {
        self.positions.get(uid).copied()
    }

    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    pub fn children_of(&self, index: usize) -> &[usize] {
        self.children.get(index).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Incidences whose parent is not part of the batch
    pub fn dangling(&self) -> &[usize] {
        &self.dangling
    }
}
