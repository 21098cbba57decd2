//! Grouping of blocks into clusters for the hierarchical solver.

use crate::data::FloorplanDb;
use crate::ids::BlockId;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;

/// Splits the blocks of a database into groups.
///
/// Every block appears in exactly one group. Implementations try to return
/// at most `max_clusters` groups but may return more when the constraints
/// they honor (such as an area cap) leave no further merge.
pub trait Clusterer: Send + Sync {
    /// Groups the blocks of `db`.
    fn cluster(&self, db: &FloorplanDb, max_clusters: usize) -> Vec<Vec<BlockId>>;
}

/// Greedy connectivity clustering.
///
/// Layer by layer, each cluster is merged with its most strongly connected
/// unmerged neighbor as long as the merged area stays under a share of the
/// total. Layers alternate their scan direction. Clusters with no remaining
/// connection are paired smallest first.
#[derive(Debug, Clone)]
pub struct NetlistClusterer {
    /// Largest cluster area as a fraction of the total block area.
    pub area_cap: f64,
    /// Keep macros out of every cluster.
    pub keep_macros: bool,
}

impl Default for NetlistClusterer {
    fn default() -> Self {
        Self {
            area_cap: 0.2,
            keep_macros: false,
        }
    }
}

impl Clusterer for NetlistClusterer {
    fn cluster(&self, db: &FloorplanDb, max_clusters: usize) -> Vec<Vec<BlockId>> {
        let mut clusters = singletons(db);
        if clusters.len() <= max_clusters {
            return clusters;
        }
        let graph = connectivity(db);
        let cap = self.area_cap * db.block_area();
        let mut forward = false;
        loop {
            let merged = self.merge_layer(db, &graph, &mut clusters, max_clusters, cap, forward);
            forward = !forward;
            if clusters.len() <= max_clusters {
                return clusters;
            }
            if !merged && !self.pair_smallest(db, &mut clusters, max_clusters, cap) {
                return clusters;
            }
        }
    }
}

impl NetlistClusterer {
    fn pinned(&self, db: &FloorplanDb, cluster: &[BlockId]) -> bool {
        self.keep_macros && cluster.iter().any(|&b| db.block(b).is_macro)
    }

    /// One layer of pairwise merging. Returns whether anything merged.
    fn merge_layer(
        &self,
        db: &FloorplanDb,
        graph: &UnGraph<(), f64>,
        clusters: &mut Vec<Vec<BlockId>>,
        max_clusters: usize,
        cap: f64,
        forward: bool,
    ) -> bool {
        let k = clusters.len();
        let mut owner = vec![0; db.block_count()];
        for (c, members) in clusters.iter().enumerate() {
            for b in members {
                owner[b.index()] = c;
            }
        }
        let areas: Vec<f64> = clusters.iter().map(|c| cluster_area(db, c)).collect();

        let order: Vec<usize> = if forward {
            (0..k).collect()
        } else {
            (0..k).rev().collect()
        };
        let mut seen = vec![false; k];
        let mut remaining = k;
        let mut next = Vec::with_capacity(k);
        let mut merged = false;

        for c in order {
            if seen[c] {
                continue;
            }
            seen[c] = true;
            let mut members = std::mem::take(&mut clusters[c]);
            if remaining <= max_clusters || self.pinned(db, &members) {
                next.push(members);
                continue;
            }

            let mut weights: BTreeMap<usize, f64> = BTreeMap::new();
            for b in &members {
                let node = NodeIndex::new(b.index());
                for edge in graph.edges(node) {
                    let other = if edge.source() == node {
                        edge.target()
                    } else {
                        edge.source()
                    };
                    let oc = owner[other.index()];
                    if oc != c && !seen[oc] {
                        *weights.entry(oc).or_default() += *edge.weight();
                    }
                }
            }
            let mut partner: Option<(usize, f64)> = None;
            for (&oc, &w) in &weights {
                if partner.map_or(true, |(_, best)| w > best) {
                    partner = Some((oc, w));
                }
            }

            match partner {
                Some((oc, _))
                    if areas[c] + areas[oc] < cap && !self.pinned(db, &clusters[oc]) =>
                {
                    seen[oc] = true;
                    members.append(&mut clusters[oc]);
                    remaining -= 1;
                    merged = true;
                    next.push(members);
                }
                _ => next.push(members),
            }
        }
        *clusters = next;
        merged
    }

    /// Merges the two smallest mergeable clusters until the count is reached.
    /// Returns whether anything merged.
    fn pair_smallest(
        &self,
        db: &FloorplanDb,
        clusters: &mut Vec<Vec<BlockId>>,
        max_clusters: usize,
        cap: f64,
    ) -> bool {
        let mut merged = false;
        while clusters.len() > max_clusters {
            let mut free: Vec<(f64, usize)> = clusters
                .iter()
                .enumerate()
                .filter(|(_, c)| !self.pinned(db, c))
                .map(|(i, c)| (cluster_area(db, c), i))
                .collect();
            free.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let [(area_a, a), (area_b, b), ..] = free[..] else {
                break;
            };
            if area_a + area_b >= cap {
                break;
            }
            let (keep, gone) = (a.min(b), a.max(b));
            let mut moved = clusters.remove(gone);
            clusters[keep].append(&mut moved);
            merged = true;
        }
        merged
    }
}

/// Grid clustering of current block locations.
///
/// Block centers are bucketed into a `g x g` grid over their bounding box,
/// with `g = floor(sqrt(max_clusters))`. Without a complete placement the
/// blocks are chunked in index order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProximityClusterer;

impl Clusterer for ProximityClusterer {
    fn cluster(&self, db: &FloorplanDb, max_clusters: usize) -> Vec<Vec<BlockId>> {
        let n = db.block_count();
        if n <= max_clusters {
            return singletons(db);
        }
        let max_clusters = max_clusters.max(1);
        let centers: Option<Vec<_>> = db
            .blocks
            .iter()
            .map(|b| b.rect().map(|r| r.center()))
            .collect();
        let Some(centers) = centers else {
            let chunk = n.div_ceil(max_clusters);
            return db
                .blocks
                .chunks(chunk)
                .map(|c| c.iter().map(|b| b.id).collect())
                .collect();
        };

        let g = ((max_clusters as f64).sqrt().floor() as usize).max(1);
        let (min_x, max_x) = bounds(centers.iter().map(|p| p.x));
        let (min_y, max_y) = bounds(centers.iter().map(|p| p.y));
        let cell_w = ((max_x - min_x) / g as f64).max(f64::MIN_POSITIVE);
        let cell_h = ((max_y - min_y) / g as f64).max(f64::MIN_POSITIVE);

        let mut buckets: BTreeMap<usize, Vec<BlockId>> = BTreeMap::new();
        for (block, p) in db.blocks.iter().zip(&centers) {
            let gx = (((p.x - min_x) / cell_w) as usize).min(g - 1);
            let gy = (((p.y - min_y) / cell_h) as usize).min(g - 1);
            buckets.entry(gy * g + gx).or_default().push(block.id);
        }
        buckets.into_values().collect()
    }
}

fn singletons(db: &FloorplanDb) -> Vec<Vec<BlockId>> {
    db.blocks.iter().map(|b| vec![b.id]).collect()
}

fn cluster_area(db: &FloorplanDb, cluster: &[BlockId]) -> f64 {
    cluster.iter().map(|&b| db.block(b).area).sum()
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Clique-model connectivity between blocks: a net with `k` distinct
/// blocks adds `weight / (k - 1)` to every pair.
pub(crate) fn connectivity(db: &FloorplanDb) -> UnGraph<(), f64> {
    let n = db.block_count();
    let mut graph = UnGraph::with_capacity(n, db.net_count());
    for _ in 0..n {
        graph.add_node(());
    }
    for net in &db.nets {
        let mut blocks: Vec<usize> = net.blocks().map(|b| b.index()).collect();
        blocks.sort_unstable();
        blocks.dedup();
        if blocks.len() < 2 {
            continue;
        }
        let w = net.weight() / (blocks.len() - 1) as f64;
        for (i, &a) in blocks.iter().enumerate() {
            for &b in &blocks[i + 1..] {
                let (a, b) = (NodeIndex::new(a), NodeIndex::new(b));
                match graph.find_edge(a, b) {
                    Some(e) => graph[e] += w,
                    None => {
                        graph.add_edge(a, b, w);
                    }
                }
            }
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Block, Net, NetPin};

    fn covers_every_block(db: &FloorplanDb, clusters: &[Vec<BlockId>]) -> bool {
        let mut all: Vec<usize> = clusters.iter().flatten().map(|b| b.index()).collect();
        all.sort_unstable();
        all == (0..db.block_count()).collect::<Vec<_>>()
    }

    /// Twelve blocks wired as six strongly connected pairs plus a weak ring.
    fn paired() -> FloorplanDb {
        let mut db = FloorplanDb::new();
        let ids: Vec<_> = (0..12)
            .map(|i| db.add_block(Block::hard(format!("b{i}"), 10.0, 10.0)))
            .collect();
        for pair in ids.chunks(2) {
            db.add_net(
                Net::new("strong", vec![NetPin::center(pair[0]), NetPin::center(pair[1])])
                    .with_weight(5),
            )
            .unwrap();
        }
        for i in 0..12 {
            db.add_net(Net::new(
                "weak",
                vec![NetPin::center(ids[i]), NetPin::center(ids[(i + 1) % 12])],
            ))
            .unwrap();
        }
        db
    }

    #[test]
    fn connectivity_accumulates_weights() {
        let mut db = FloorplanDb::new();
        let a = db.add_block(Block::hard("a", 1.0, 1.0));
        let b = db.add_block(Block::hard("b", 1.0, 1.0));
        let c = db.add_block(Block::hard("c", 1.0, 1.0));
        db.add_net(Net::new("ab", vec![NetPin::center(a), NetPin::center(b)]))
            .unwrap();
        db.add_net(Net::new(
            "abc",
            vec![NetPin::center(a), NetPin::center(b), NetPin::center(c)],
        ))
        .unwrap();
        let g = connectivity(&db);
        let ab = g.find_edge(NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        let bc = g.find_edge(NodeIndex::new(1), NodeIndex::new(2)).unwrap();
        assert_eq!(g[ab], 1.5);
        assert_eq!(g[bc], 0.5);
    }

    #[test]
    fn netlist_clustering_merges_strong_pairs() {
        let db = paired();
        let clusters = NetlistClusterer::default().cluster(&db, 6);
        assert_eq!(clusters.len(), 6);
        assert!(covers_every_block(&db, &clusters));
        for c in &clusters {
            let mut ids: Vec<usize> = c.iter().map(|b| b.index()).collect();
            ids.sort_unstable();
            assert_eq!(ids.len(), 2);
            assert_eq!(ids[0] / 2, ids[1] / 2, "split a strong pair: {ids:?}");
        }
    }

    #[test]
    fn area_cap_stops_merging() {
        let db = paired();
        // every block holds a twelfth of the area, so no pair fits under 15%
        let clusterer = NetlistClusterer {
            area_cap: 0.15,
            keep_macros: false,
        };
        let clusters = clusterer.cluster(&db, 3);
        assert_eq!(clusters.len(), 12);
    }

    #[test]
    fn unconnected_blocks_pair_up_by_size() {
        let mut db = FloorplanDb::new();
        for i in 0..6 {
            db.add_block(Block::hard(format!("b{i}"), 1.0 + i as f64, 10.0));
        }
        let clusters = NetlistClusterer {
            area_cap: 0.5,
            keep_macros: false,
        }
        .cluster(&db, 4);
        assert!(covers_every_block(&db, &clusters));
        let mut sizes: Vec<usize> = clusters.iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 1, 1, 3]);
    }

    #[test]
    fn macros_stay_alone_when_kept() {
        let mut db = paired();
        db.blocks[0].is_macro = true;
        let clusterer = NetlistClusterer {
            keep_macros: true,
            ..NetlistClusterer::default()
        };
        let clusters = clusterer.cluster(&db, 6);
        assert!(covers_every_block(&db, &clusters));
        assert!(clusters.iter().any(|c| c == &vec![BlockId::from_raw(0)]));
    }

    #[test]
    fn proximity_buckets_by_location() {
        let mut db = FloorplanDb::new();
        for (i, (x, y)) in [(0.0, 0.0), (1.0, 1.0), (90.0, 0.0), (91.0, 2.0), (0.0, 90.0)]
            .into_iter()
            .enumerate()
        {
            db.add_block(Block::hard(format!("b{i}"), 2.0, 2.0).at(x, y));
        }
        let clusters = ProximityClusterer.cluster(&db, 4);
        assert!(covers_every_block(&db, &clusters));
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0], vec![BlockId::from_raw(0), BlockId::from_raw(1)]);
    }

    #[test]
    fn proximity_without_locations_chunks_by_index() {
        let mut db = FloorplanDb::new();
        for i in 0..7 {
            db.add_block(Block::hard(format!("b{i}"), 2.0, 2.0));
        }
        let clusters = ProximityClusterer.cluster(&db, 3);
        assert_eq!(
            clusters.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
    }
}
