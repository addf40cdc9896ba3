use std::collections::HashMap;

use crate::function::Function;

/// Content-addressed ids for function bitcode.
///
/// Functions whose bitcode is byte-identical (e.g. instantiations of the same
/// generic body) share an id. Ids are assigned in function order starting at 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcodeIndex {
    ids: Vec<usize>,
    unique_count: usize,
}

impl BitcodeIndex {
    pub fn new(functions: &[Function]) -> Self {
        let mut by_bytes: HashMap<&[u8], usize> = HashMap::new();
        let ids = functions
            .iter()
            .map(|function| {
                let next = by_bytes.len();
                *by_bytes.entry(function.bitcode.as_slice()).or_insert(next)
            })
            .collect();
        BitcodeIndex {
            ids,
            unique_count: by_bytes.len(),
        }
    }

    /// Bitcode id of each function, parallel to the function list.
    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    pub fn id_of(&self, function_index: usize) -> Option<usize> {
        self.ids.get(function_index).copied()
    }

    /// Number of distinct bitcode bodies.
    pub fn unique_count(&self) -> usize {
        self.unique_count
    }

    /// Indices of the functions whose bitcode has id `id`.
    pub fn functions_sharing(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.ids
            .iter()
            .enumerate()
            .filter(move |(_, function_id)| **function_id == id)
            .map(|(index, _)| index)
    }
}
