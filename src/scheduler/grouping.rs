use super::graph::ConflictGraph;
use super::heap::IndexedPriorityQueue;
use ahash::{AHashMap, AHashSet};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::collections::BTreeMap;

/// Output of [`GroupAssigner::assign`]: a partition of a batch's transaction
/// indices into parallel-safe execution groups. Group `0` is reserved for
/// transactions with no recorded conflicts at all and can always run fully
/// in parallel; groups `1..num_groups` are produced by DSATUR coloring of
/// the conflict graph and must each run sequentially relative to the
/// groups before them, while transactions within the same group may still
/// run in parallel with each other.
#[derive(Debug, Clone, Default)]
pub struct GroupResult {
    pub groups: AHashMap<u32, Vec<u32>>,
    pub tx_to_group: AHashMap<u32, u32>,
    pub num_groups: u32,
}

/// Serializes as `groups`, a dense array of arrays indexed by group id (an
/// empty array for any id with no members), `numGroups`, and a flat
/// `txToGroup` map, rather than `AHashMap`'s own (unordered, integer-keyed)
/// shape, which `ahash` does not implement `serde::Serialize` for in the
/// first place.
impl Serialize for GroupResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut groups: Vec<Vec<u32>> = vec![Vec::new(); self.num_groups as usize];
        for (&group_id, members) in &self.groups {
            if let Some(slot) = groups.get_mut(group_id as usize) {
                *slot = members.clone();
            }
        }
        let tx_to_group: BTreeMap<u32, u32> = self.tx_to_group.iter().map(|(&k, &v)| (k, v)).collect();

        let mut state = serializer.serialize_struct("GroupResult", 3)?;
        state.serialize_field("groups", &groups)?;
        state.serialize_field("numGroups", &self.num_groups)?;
        state.serialize_field("txToGroup", &tx_to_group)?;
        state.end()
    }
}

/// DSATUR (degree-of-saturation) graph coloring over a [`ConflictGraph`]: at
/// each step, picks the uncolored vertex touching the most distinct
/// neighboring groups (breaking ties on raw degree, then lowest tx index)
/// and assigns it the smallest group id none of its neighbors already hold.
pub struct GroupAssigner;

impl GroupAssigner {
    /// `independent_txs` are transactions the caller already knows have no
    /// conflicts (e.g. appeared in the batch but never touched a shared
    /// location) and are assigned to group 0 without visiting the graph.
    pub fn assign(graph: &ConflictGraph, independent_txs: &[u32]) -> GroupResult {
        let mut result = GroupResult {
            num_groups: 1,
            ..Default::default()
        };

        if !independent_txs.is_empty() {
            let mut members: Vec<u32> = independent_txs.to_vec();
            members.sort_unstable();
            for &tx_idx in &members {
                result.tx_to_group.insert(tx_idx, 0);
            }
            result.groups.insert(0, members);
        }

        if graph.is_empty() {
            return result;
        }

        let n = graph.vertices.len();
        let mut neighbor_groups: Vec<AHashSet<u32>> = vec![AHashSet::new(); n];
        let mut next_group_id: u32 = 1;

        let keys: Vec<(i64, i64, i64)> = (0..n)
            .map(|i| (0, graph.vertices[i].degree as i64, -(graph.vertices[i].tx_idx as i64)))
            .collect();
        let mut queue = IndexedPriorityQueue::new(keys);

        let mut assigned: Vec<Option<u32>> = vec![None; n];

        while let Some(i) = queue.pop_max() {
            let assigned_group = smallest_available_group(&neighbor_groups[i], next_group_id);
            if assigned_group == next_group_id {
                next_group_id += 1;
            }

            assigned[i] = Some(assigned_group);
            let tx_idx = graph.vertices[i].tx_idx;
            result.tx_to_group.insert(tx_idx, assigned_group);
            result.groups.entry(assigned_group).or_default().push(tx_idx);
            if assigned_group >= result.num_groups {
                result.num_groups = assigned_group + 1;
            }

            for &neighbor in &graph.vertices[i].neighbors {
                if assigned[neighbor].is_some() {
                    continue;
                }
                if neighbor_groups[neighbor].insert(assigned_group) {
                    let diversity = neighbor_groups[neighbor].len() as i64;
                    let degree = graph.vertices[neighbor].degree as i64;
                    let neg_index = -(graph.vertices[neighbor].tx_idx as i64);
                    queue.update_key(neighbor, (diversity, degree, neg_index));
                }
            }
        }

        for members in result.groups.values_mut() {
            members.sort_unstable();
        }

        result
    }
}

fn smallest_available_group(used: &AHashSet<u32>, next_group_id: u32) -> u32 {
    for candidate in 1..next_group_id {
        if !used.contains(&candidate) {
            return candidate;
        }
    }
    next_group_id
}
