use ahash::AHashMap;

/// One transaction's vertex in the conflict graph, arena-indexed so
/// neighbor lookups during grouping are a direct `Vec` index rather than a
/// hash lookup on every heap pop.
#[derive(Debug, Clone)]
pub(crate) struct Vertex {
    pub tx_idx: u32,
    pub neighbors: Vec<usize>,
    pub degree: u32,
    pub group: Option<u32>,
}

/// Undirected conflict graph over transactions that share at least one
/// touched location, built from the pairs [`crate::access::AccessCounter`]
/// reports. Vertices never appear for transactions with no conflicts at
/// all; those are handled separately as group 0.
pub struct ConflictGraph {
    pub(crate) vertices: Vec<Vertex>,
    index_of: AHashMap<u32, usize>,
}

impl ConflictGraph {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            index_of: AHashMap::new(),
        }
    }

    fn vertex_index(&mut self, tx_idx: u32) -> usize {
        if let Some(&i) = self.index_of.get(&tx_idx) {
            return i;
        }
        let i = self.vertices.len();
        self.vertices.push(Vertex {
            tx_idx,
            neighbors: Vec::new(),
            degree: 0,
            group: None,
        });
        self.index_of.insert(tx_idx, i);
        i
    }

    fn add_edge(&mut self, a: u32, b: u32) {
        let ia = self.vertex_index(a);
        let ib = self.vertex_index(b);
        if ia == ib || self.vertices[ia].neighbors.contains(&ib) {
            return;
        }
        self.vertices[ia].neighbors.push(ib);
        self.vertices[ib].neighbors.push(ia);
        self.vertices[ia].degree = self.vertices[ia].neighbors.len() as u32;
        self.vertices[ib].degree = self.vertices[ib].neighbors.len() as u32;
    }

    /// Build a graph from the conflicting-pair edge set
    /// [`crate::access::AccessCounter::conflicting_pairs`] produces.
    pub fn build(pairs: &[(u32, u32)]) -> Self {
        let mut graph = Self::new();
        for &(a, b) in pairs {
            graph.add_edge(a, b);
        }
        graph
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn has_conflict(&self, a: u32, b: u32) -> bool {
        let Some(&ia) = self.index_of.get(&a) else {
            return false;
        };
        let Some(&ib) = self.index_of.get(&b) else {
            return false;
        };
        self.vertices[ia].neighbors.contains(&ib)
    }

    pub fn tx_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.vertices.iter().map(|v| v.tx_idx)
    }
}

impl Default for ConflictGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_dedupes_and_mirrors_edges() {
        let graph = ConflictGraph::build(&[(0, 1), (0, 1), (1, 2)]);
        assert_eq!(graph.len(), 3);
        assert!(graph.has_conflict(0, 1));
        assert!(graph.has_conflict(1, 0));
        assert!(graph.has_conflict(1, 2));
        assert!(!graph.has_conflict(0, 2));
    }

    #[test]
    fn test_empty_graph_from_no_pairs() {
        let graph = ConflictGraph::build(&[]);
        assert!(graph.is_empty());
    }
}
