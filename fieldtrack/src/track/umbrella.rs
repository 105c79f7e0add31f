//! Source-level umbrella clustering.
//!
//! Works on the sources of a scene rather than on extracted features. Source
//! `i` lies under the umbrella of source `j` when `j`'s value at `i`'s center
//! is at least `i`'s amplitude, so `i` forms no peak of its own in the
//! maximum-superposed field. Clusters are the connected components of that
//! relation. Clusters of consecutive frames correspond when they share a
//! source, which gives births, merges, splits and vanishings at cluster level
//! without any feature matching.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::distribution::{Kernel, SourceSpec};
use crate::scene::Scene;

/// Sources sharing one umbrella.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmbrellaCluster {
    /// Scene index of the member with the largest amplitude, lowest index on
    /// ties.
    pub root: usize,
    /// Scene indices in ascending order.
    pub members: Vec<usize>,
}

/// Cluster sources given as `(scene index, source)` pairs.
///
/// Sources with a non-positive amplitude raise no peak and take no part.
/// Clusters come back ordered by root.
pub fn umbrella_clusters(sources: &[(usize, SourceSpec)]) -> Vec<UmbrellaCluster> {
    let peaks: Vec<&(usize, SourceSpec)> = sources
        .iter()
        .filter(|(_, s)| s.amplitude() > 0.0)
        .collect();
    let kernels: Vec<Kernel> = peaks.iter().map(|(_, s)| s.kernel()).collect();

    let mut parent: Vec<usize> = (0..peaks.len()).collect();
    for (i, (_, covered)) in peaks.iter().enumerate() {
        for (j, kernel) in kernels.iter().enumerate() {
            // A degenerate kernel evaluates to zero or NaN and covers nothing.
            if i != j && covered.amplitude() <= kernel.evaluate(covered.center()) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..peaks.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    let mut clusters = Vec::with_capacity(groups.len());
    for group in groups.into_values() {
        let Some(dominant) = group.iter().copied().max_by(|&a, &b| {
            let (ia, sa) = peaks[a];
            let (ib, sb) = peaks[b];
            sa.amplitude().total_cmp(&sb.amplitude()).then(ib.cmp(ia))
        }) else {
            continue;
        };
        let mut members: Vec<usize> = group.iter().map(|&i| peaks[i].0).collect();
        members.sort_unstable();
        clusters.push(UmbrellaCluster {
            root: peaks[dominant].0,
            members,
        });
    }
    clusters.sort_unstable_by_key(|c| c.root);
    clusters
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Which clusters of the previous frame share sources with which clusters of
/// the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correspondence {
    pub prev_roots: Vec<usize>,
    pub curr_roots: Vec<usize>,
    /// `links[i][j]` is set when previous cluster `i` and current cluster `j`
    /// share at least one source.
    pub links: Vec<Vec<bool>>,
}

impl Correspondence {
    pub fn between(prev: &[UmbrellaCluster], curr: &[UmbrellaCluster]) -> Self {
        let links = prev
            .iter()
            .map(|p| {
                curr.iter()
                    .map(|c| p.members.iter().any(|m| c.members.binary_search(m).is_ok()))
                    .collect()
            })
            .collect();
        Self {
            prev_roots: prev.iter().map(|c| c.root).collect(),
            curr_roots: curr.iter().map(|c| c.root).collect(),
            links,
        }
    }

    /// Roots of the previous clusters feeding current cluster `j`.
    pub fn sources_of(&self, j: usize) -> Vec<usize> {
        self.links
            .iter()
            .zip(&self.prev_roots)
            .filter(|(row, _)| row[j])
            .map(|(_, &root)| root)
            .collect()
    }

    /// Roots of the current clusters fed by previous cluster `i`.
    pub fn targets_of(&self, i: usize) -> Vec<usize> {
        self.links[i]
            .iter()
            .zip(&self.curr_roots)
            .filter(|(&linked, _)| linked)
            .map(|(_, &root)| root)
            .collect()
    }

    /// Cluster events implied by the links: births and merges per current
    /// cluster, then splits and vanishings per previous cluster.
    pub fn events(&self, frame: usize) -> Vec<ClusterEvent> {
        let mut events = Vec::new();
        for (j, &target) in self.curr_roots.iter().enumerate() {
            let sources = self.sources_of(j);
            match sources.len() {
                0 => events.push(ClusterEvent::Birth {
                    frame,
                    root: target,
                }),
                1 => {}
                _ => events.push(ClusterEvent::Merge {
                    frame,
                    sources,
                    target,
                }),
            }
        }
        for (i, &source) in self.prev_roots.iter().enumerate() {
            let targets = self.targets_of(i);
            match targets.len() {
                0 => events.push(ClusterEvent::Vanish {
                    frame,
                    root: source,
                }),
                1 => {}
                _ => events.push(ClusterEvent::Split {
                    frame,
                    source,
                    targets,
                }),
            }
        }
        events
    }
}

/// Cluster-level lifecycle events, identified by root source index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClusterEvent {
    Birth {
        frame: usize,
        root: usize,
    },
    Merge {
        frame: usize,
        sources: Vec<usize>,
        target: usize,
    },
    Split {
        frame: usize,
        source: usize,
        targets: Vec<usize>,
    },
    Vanish {
        frame: usize,
        root: usize,
    },
}

/// Clustering of one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterFrame {
    pub frame: usize,
    pub clusters: Vec<UmbrellaCluster>,
    /// Links to the previous observed frame; `None` on the first one.
    pub correspondence: Option<Correspondence>,
    pub events: Vec<ClusterEvent>,
}

/// Carries the previous frame's clusters from one observation to the next.
#[derive(Debug, Clone, Default)]
pub struct UmbrellaTracker {
    previous: Option<Vec<UmbrellaCluster>>,
}

impl UmbrellaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cluster `sources` for `frame` and relate them to the last observation.
    /// Every cluster of the first observation is a birth.
    pub fn observe(&mut self, frame: usize, sources: &[(usize, SourceSpec)]) -> ClusterFrame {
        let clusters = umbrella_clusters(sources);
        let (correspondence, events) = match &self.previous {
            Some(prev) => {
                let correspondence = Correspondence::between(prev, &clusters);
                let events = correspondence.events(frame);
                (Some(correspondence), events)
            }
            None => {
                let events = clusters
                    .iter()
                    .map(|c| ClusterEvent::Birth {
                        frame,
                        root: c.root,
                    })
                    .collect();
                (None, events)
            }
        };

        tracing::debug!(
            frame,
            clusters = clusters.len(),
            events = events.len(),
            "umbrella clustering"
        );
        self.previous = Some(clusters.clone());
        ClusterFrame {
            frame,
            clusters,
            correspondence,
            events,
        }
    }

    /// Observe the visible sources of `scene` at its current frame.
    pub fn observe_scene(&mut self, scene: &Scene) -> ClusterFrame {
        self.observe(scene.frame(), &scene.indexed_snapshot())
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::grid::Grid;
    use crate::scene::{Motion, PathEnd};

    fn gaussian(x: f64, amplitude: f64, variance: f64) -> SourceSpec {
        SourceSpec::gaussian(DVec2::new(x, 0.0), amplitude, variance).unwrap()
    }

    fn cluster(root: usize, members: &[usize]) -> UmbrellaCluster {
        UmbrellaCluster {
            root,
            members: members.to_vec(),
        }
    }

    #[test]
    fn distant_sources_stay_apart() {
        let clusters = umbrella_clusters(&[
            (0, gaussian(0.0, 1.0, 1.0)),
            (1, gaussian(20.0, 1.0, 1.0)),
        ]);
        assert_eq!(clusters, vec![cluster(0, &[0]), cluster(1, &[1])]);
    }

    #[test]
    fn weak_neighbour_falls_under_strong_umbrella() {
        // 1 <= 5 * exp(-1 / 8)
        let clusters = umbrella_clusters(&[
            (0, gaussian(1.0, 1.0, 1.0)),
            (1, gaussian(0.0, 5.0, 4.0)),
        ]);
        assert_eq!(clusters, vec![cluster(1, &[0, 1])]);
    }

    #[test]
    fn chains_are_transitive() {
        let clusters = umbrella_clusters(&[
            (0, gaussian(0.0, 5.0, 4.0)),
            (1, gaussian(2.0, 3.0, 4.0)),
            (2, gaussian(4.0, 1.5, 4.0)),
            (3, gaussian(30.0, 1.0, 1.0)),
        ]);
        assert_eq!(clusters, vec![cluster(0, &[0, 1, 2]), cluster(3, &[3])]);
    }

    #[test]
    fn equal_amplitudes_need_coincident_centers() {
        let apart = umbrella_clusters(&[
            (0, gaussian(0.0, 2.0, 1.0)),
            (1, gaussian(0.5, 2.0, 1.0)),
        ]);
        assert_eq!(apart.len(), 2);

        let stacked = umbrella_clusters(&[
            (5, gaussian(0.0, 2.0, 1.0)),
            (3, gaussian(0.0, 2.0, 1.0)),
        ]);
        assert_eq!(stacked, vec![cluster(3, &[3, 5])]);
    }

    #[test]
    fn dips_take_no_part() {
        let clusters = umbrella_clusters(&[
            (0, gaussian(0.0, 2.0, 1.0)),
            (1, gaussian(0.5, -1.0, 1.0)),
        ]);
        assert_eq!(clusters, vec![cluster(0, &[0])]);
        assert!(umbrella_clusters(&[]).is_empty());
    }

    #[test]
    fn correspondence_yields_merge_and_split() {
        let apart = vec![cluster(0, &[0]), cluster(1, &[1])];
        let joined = vec![cluster(0, &[0, 1])];

        let merging = Correspondence::between(&apart, &joined);
        assert_eq!(merging.links, vec![vec![true], vec![true]]);
        assert_eq!(
            merging.events(4),
            vec![ClusterEvent::Merge {
                frame: 4,
                sources: vec![0, 1],
                target: 0,
            }]
        );

        let splitting = Correspondence::between(&joined, &apart);
        assert_eq!(splitting.links, vec![vec![true, true]]);
        assert_eq!(
            splitting.events(5),
            vec![ClusterEvent::Split {
                frame: 5,
                source: 0,
                targets: vec![0, 1],
            }]
        );
    }

    #[test]
    fn unlinked_clusters_are_births_and_vanishings() {
        let prev = vec![cluster(0, &[0]), cluster(3, &[3])];
        let curr = vec![cluster(0, &[0]), cluster(2, &[2])];
        let correspondence = Correspondence::between(&prev, &curr);
        assert_eq!(correspondence.sources_of(0), vec![0]);
        assert!(correspondence.targets_of(1).is_empty());
        assert_eq!(
            correspondence.events(7),
            vec![
                ClusterEvent::Birth { frame: 7, root: 2 },
                ClusterEvent::Vanish { frame: 7, root: 3 },
            ]
        );
    }

    #[test]
    fn approaching_sources_merge_in_scene() {
        let grid = Grid::from_spacing(21, 21, 1.0).unwrap();
        let mut scene = Scene::new(grid);
        scene
            .add(
                SourceSpec::gaussian(DVec2::new(5.0, 10.0), 5.0, 4.0).unwrap(),
                Motion::Static,
            )
            .unwrap();
        scene
            .add(
                SourceSpec::gaussian(DVec2::new(15.0, 10.0), 1.0, 1.0).unwrap(),
                Motion::Path {
                    waypoints: vec![DVec2::new(6.0, 10.0)],
                    speed: 3.0,
                    end: PathEnd::Stay,
                },
            )
            .unwrap();

        let mut umbrella = UmbrellaTracker::new();
        let mut records = Vec::new();
        for _ in 0..4 {
            records.push(umbrella.observe_scene(&scene));
            scene.advance();
        }

        assert_eq!(
            records[0].events,
            vec![
                ClusterEvent::Birth { frame: 0, root: 0 },
                ClusterEvent::Birth { frame: 0, root: 1 },
            ]
        );
        assert!(records[0].correspondence.is_none());
        assert!(records[1].events.is_empty() && records[2].events.is_empty());
        assert_eq!(records[2].clusters.len(), 2);
        assert_eq!(records[3].clusters, vec![cluster(0, &[0, 1])]);
        assert_eq!(
            records[3].events,
            vec![ClusterEvent::Merge {
                frame: 3,
                sources: vec![0, 1],
                target: 0,
            }]
        );
    }
}
