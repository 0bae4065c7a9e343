use std::cmp::Ordering;

use anyhow::Result;
use log::debug;
use thiserror::Error;

use crate::{
    dataset::{DataPoint, Dataset},
    linalg::{distance_squared, Vector},
    util::BoundedSorted,
};

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        point: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// Balanced k-d tree over the points of a borrowed dataset.
#[derive(Debug, Clone)]
pub struct KdTree<'a> {
    dataset: &'a Dataset,
    nodes: Vec<Node>,
    root: usize,
    depth: usize,
}

/// One query result, borrowed from the tree's dataset.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    /// Position of the point in the backing dataset.
    pub index: usize,
    pub point: &'a DataPoint,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance_sq: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_sq
            .total_cmp(&other.distance_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl<'a> KdTree<'a> {
    pub fn build(dataset: &'a Dataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(KdTreeError::EmptyDataset.into());
        }
        if dataset.dim_x() == 0 {
            return Err(KdTreeError::ZeroDimension.into());
        }

        let mut tree = Self {
            dataset,
            nodes: Vec::with_capacity(2 * dataset.len()),
            root: 0,
            depth: 0,
        };
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        tree.root = tree.build_node(&mut indices, 0);
        debug!("built kd-tree over {} points, depth {}", dataset.len(), tree.depth);
        Ok(tree)
    }

    fn build_node(&mut self, indices: &mut [usize], depth: usize) -> usize {
        self.depth = self.depth.max(depth);
        if indices.len() == 1 {
            self.nodes.push(Node::Leaf { point: indices[0] });
            return self.nodes.len() - 1;
        }

        let axis = depth % self.dataset.dim_x();
        let points = self.dataset.points();
        let mid = indices.len() / 2;
        // Ordering by (coordinate, index) makes the split deterministic.
        indices.select_nth_unstable_by(mid, |&a, &b| {
            points[a].x[axis]
                .total_cmp(&points[b].x[axis])
                .then(a.cmp(&b))
        });
        let value = points[indices[mid]].x[axis];

        let (lower, upper) = indices.split_at_mut(mid);
        let left = self.build_node(lower, depth + 1);
        let right = self.build_node(upper, depth + 1);
        self.nodes.push(Node::Split {
            axis,
            value,
            left,
            right,
        });
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// The `k` points closest to `query`, nearest first. Points at equal
    /// distance come in dataset order.
    pub fn get_knn(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor<'a>>> {
        if k > self.len() {
            return Err(KdTreeError::TooManyNeighbors {
                requested: k,
                available: self.len(),
            }
            .into());
        }
        if query.len() != self.dataset.dim_x() {
            return Err(KdTreeError::QueryDimension {
                expected: self.dataset.dim_x(),
                found: query.len(),
            }
            .into());
        }

        let mut best = BoundedSorted::new(k);
        if k > 0 {
            self.search(self.root, query.as_slice(), &mut best);
        }

        let points = self.dataset.points();
        Ok(best
            .into_vec()
            .into_iter()
            .map(|c| Neighbor {
                index: c.index,
                point: &points[c.index],
                distance: c.distance_sq.sqrt(),
            })
            .collect())
    }

    fn search(&self, node: usize, query: &[f64], best: &mut BoundedSorted<Candidate>) {
        match self.nodes[node] {
            Node::Leaf { point } => {
                let x = self.dataset.points()[point].x.as_slice();
                best.push(Candidate {
                    distance_sq: distance_squared(query, x),
                    index: point,
                });
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search(near, query, best);
                // Equal bounds are still visited, they may hold a lower index.
                let prune = best.is_full()
                    && best
                        .worst()
                        .map(|w| diff * diff > w.distance_sq)
                        .unwrap_or(false);
                if !prune {
                    self.search(far, query, best);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum KdTreeError {
    #[error("cannot build a kd-tree over an empty dataset")]
    EmptyDataset,
    #[error("cannot build a kd-tree over zero-dimensional points")]
    ZeroDimension,
    #[error("requested {requested} neighbours but the tree holds {available} points")]
    TooManyNeighbors { requested: usize, available: usize },
    #[error("query has dimension {found}, tree expects {expected}")]
    QueryDimension { expected: usize, found: usize },
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn dataset_from(points: &[Vec<f64>]) -> Dataset {
        let mut dataset = Dataset::new();
        for (i, x) in points.iter().enumerate() {
            let point = DataPoint::new(Vector::new(x.clone()), Vector::new(vec![i as f64]));
            dataset.add(point).unwrap();
        }
        dataset
    }

    fn random_dataset(rng: &mut ChaCha8Rng, n: usize, dim: usize, grid: bool) -> Dataset {
        let points: Vec<Vec<f64>> = (0..n)
            .map(|_| {
                (0..dim)
                    .map(|_| {
                        if grid {
                            // Coarse grid so ties are common.
                            rng.gen_range(0..4) as f64
                        } else {
                            rng.gen_range(-10.0..10.0)
                        }
                    })
                    .collect()
            })
            .collect();
        dataset_from(&points)
    }

    fn brute_force(dataset: &Dataset, query: &Vector, k: usize) -> Vec<usize> {
        let mut all: Vec<(f64, usize)> = dataset
            .iter()
            .enumerate()
            .map(|(i, p)| (p.x.distance_squared(query).unwrap(), i))
            .collect();
        all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        all.into_iter().take(k).map(|(_, i)| i).collect()
    }

    #[test]
    fn test_nearest_simple() {
        let dataset = dataset_from(&[
            vec![2.0, 3.0],
            vec![5.0, 4.0],
            vec![9.0, 6.0],
            vec![4.0, 7.0],
            vec![8.0, 1.0],
            vec![7.0, 2.0],
        ]);
        let tree = KdTree::build(&dataset).unwrap();

        let result = tree.get_knn(&Vector::new(vec![9.0, 2.0]), 1).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].index, 4);
        assert_eq!(result[0].point.x, Vector::new(vec![8.0, 1.0]));
        assert!((result[0].distance - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_knn_ordered_nearest_first() {
        let dataset = dataset_from(&[vec![0.0], vec![10.0], vec![3.0], vec![-1.0], vec![6.0]]);
        let tree = KdTree::build(&dataset).unwrap();

        let result = tree.get_knn(&Vector::new(vec![2.0]), 5).unwrap();

        let order: Vec<usize> = result.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![2, 0, 3, 4, 1]);
        for w in result.windows(2) {
            assert!(w[0].distance <= w[1].distance);
        }
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let dataset = dataset_from(&[
            vec![1.0, 0.0],
            vec![-1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.0, -1.0],
            vec![1.0, 0.0],
        ]);
        let tree = KdTree::build(&dataset).unwrap();

        let result = tree.get_knn(&Vector::new(vec![0.0, 0.0]), 5).unwrap();

        let order: Vec<usize> = result.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for &(n, dim, grid) in &[(1, 1, false), (2, 3, false), (57, 2, false), (200, 5, false), (120, 3, true), (64, 20, false)] {
            let dataset = random_dataset(&mut rng, n, dim, grid);
            let tree = KdTree::build(&dataset).unwrap();
            for _ in 0..25 {
                let query = if grid {
                    Vector::new((0..dim).map(|_| rng.gen_range(0..4) as f64).collect())
                } else {
                    Vector::new((0..dim).map(|_| rng.gen_range(-12.0..12.0)).collect())
                };
                for k in [1, 3, 7, n] {
                    if k > n {
                        continue;
                    }
                    let got: Vec<usize> = tree.get_knn(&query, k).unwrap().iter().map(|n| n.index).collect();
                    assert_eq!(got, brute_force(&dataset, &query, k));
                }
            }
        }
    }

    #[test]
    fn test_balanced_depth() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let dataset = random_dataset(&mut rng, 1000, 3, false);

        let tree = KdTree::build(&dataset).unwrap();

        // ceil(log2(1000)) = 10
        assert_eq!(tree.depth(), 10);
        assert_eq!(tree.len(), 1000);
    }

    #[test]
    fn test_single_point() {
        let dataset = dataset_from(&[vec![1.0, 1.0]]);
        let tree = KdTree::build(&dataset).unwrap();

        let result = tree.get_knn(&Vector::new(vec![5.0, 5.0]), 1).unwrap();

        assert_eq!(result[0].index, 0);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_zero_neighbors() {
        let dataset = dataset_from(&[vec![1.0]]);
        let tree = KdTree::build(&dataset).unwrap();

        assert!(tree.get_knn(&Vector::new(vec![0.0]), 0).unwrap().is_empty());
    }

    #[test]
    fn test_errors() {
        let empty = Dataset::new();
        let err = KdTree::build(&empty)
            .err()
            .and_then(|e| e.downcast_ref::<KdTreeError>().copied());
        assert_eq!(err, Some(KdTreeError::EmptyDataset));

        let zero_dim = dataset_from(&[vec![]]);
        let err = KdTree::build(&zero_dim)
            .err()
            .and_then(|e| e.downcast_ref::<KdTreeError>().copied());
        assert_eq!(err, Some(KdTreeError::ZeroDimension));

        let dataset = dataset_from(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let tree = KdTree::build(&dataset).unwrap();
        let err = tree
            .get_knn(&Vector::new(vec![0.0, 0.0]), 3)
            .err()
            .and_then(|e| e.downcast_ref::<KdTreeError>().copied());
        assert_eq!(err, Some(KdTreeError::TooManyNeighbors { requested: 3, available: 2 }));
        let err = tree
            .get_knn(&Vector::new(vec![0.0]), 1)
            .err()
            .and_then(|e| e.downcast_ref::<KdTreeError>().copied());
        assert_eq!(err, Some(KdTreeError::QueryDimension { expected: 2, found: 1 }));
    }
}
