//! Gated bipartite assignment between tracks (rows) and features (columns).

use serde::{Deserialize, Serialize};

/// Solver used for frame-to-frame correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    /// Cheapest admissible pair first, each row and column used once.
    #[default]
    Greedy,
    /// Minimum total cost (Hungarian method). Leaving a row or a column
    /// unmatched costs one more than the most expensive admissible pair.
    Optimal,
}

/// Match rows to columns. `costs[r][c]` is `None` where the pair is outside
/// the gate. Returns `(row, column)` pairs sorted by row.
pub(crate) fn assign(
    costs: &[Vec<Option<f64>>],
    columns: usize,
    method: AssignmentMethod,
) -> Vec<(usize, usize)> {
    let mut pairs = match method {
        AssignmentMethod::Greedy => greedy(costs, columns),
        AssignmentMethod::Optimal => optimal(costs, columns),
    };
    pairs.sort_unstable();
    pairs
}

fn greedy(costs: &[Vec<Option<f64>>], columns: usize) -> Vec<(usize, usize)> {
    let mut candidates: Vec<(f64, usize, usize)> = costs
        .iter()
        .enumerate()
        .flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(c, cost)| cost.map(|cost| (cost, r, c)))
        })
        .collect();

    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut used_row = vec![false; costs.len()];
    let mut used_col = vec![false; columns];
    let mut resolved = Vec::new();

    for (_, r, c) in candidates {
        if !used_row[r] && !used_col[c] {
            used_row[r] = true;
            used_col[c] = true;
            resolved.push((r, c));
        }
    }
    resolved
}

fn optimal(costs: &[Vec<Option<f64>>], columns: usize) -> Vec<(usize, usize)> {
    let rows = costs.len();
    let max_cost = costs
        .iter()
        .flatten()
        .flatten()
        .copied()
        .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))));
    let Some(max_cost) = max_cost else {
        return Vec::new();
    };

    // Square problem: real block, then one dummy partner per row and per
    // column so every real vertex may stay unmatched at cost `unmatched`.
    let unmatched = max_cost + 1.0;
    let forbidden = unmatched * (rows + columns) as f64 + 1.0;
    let n = rows + columns;
    let mut matrix = vec![vec![forbidden; n]; n];
    for r in 0..rows {
        for c in 0..columns {
            if let Some(cost) = costs[r][c] {
                matrix[r][c] = cost;
            }
        }
        matrix[r][columns + r] = unmatched;
    }
    for c in 0..columns {
        matrix[rows + c][c] = unmatched;
        for r in 0..rows {
            matrix[rows + c][columns + r] = 0.0;
        }
    }

    let assignment = hungarian(&matrix);
    (0..rows)
        .filter_map(|r| {
            let c = assignment[r];
            (c < columns && costs[r][c].is_some()).then_some((r, c))
        })
        .collect()
}

/// Minimum-cost perfect assignment on a square matrix. Returns the column
/// assigned to each row.
fn hungarian(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    if n == 0 {
        return Vec::new();
    }

    // 1-based potentials; column 0 is a virtual start.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; n + 1];
    let mut owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        owner[0] = i;
        let mut j0 = 0;
        let mut min_slack = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let slack = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if slack < min_slack[j] {
                    min_slack[j] = slack;
                    way[j] = j0;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0; n];
    for j in 1..=n {
        if owner[j] != 0 {
            assignment[owner[j] - 1] = j - 1;
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn total(costs: &[Vec<Option<f64>>], columns: usize, pairs: &[(usize, usize)]) -> f64 {
        let max = costs
            .iter()
            .flatten()
            .flatten()
            .copied()
            .fold(0.0, f64::max);
        let penalty = max + 1.0;
        let matched: f64 = pairs.iter().map(|&(r, c)| costs[r][c].unwrap()).sum();
        let unmatched = (costs.len() - pairs.len()) + (columns - pairs.len());
        matched + penalty * unmatched as f64
    }

    fn brute_force(
        costs: &[Vec<Option<f64>>],
        columns: usize,
        row: usize,
        used: &mut Vec<bool>,
        pairs: &mut Vec<(usize, usize)>,
        best: &mut f64,
    ) {
        if row == costs.len() {
            *best = best.min(total(costs, columns, pairs));
            return;
        }
        brute_force(costs, columns, row + 1, used, pairs, best);
        for c in 0..columns {
            if !used[c] && costs[row][c].is_some() {
                used[c] = true;
                pairs.push((row, c));
                brute_force(costs, columns, row + 1, used, pairs, best);
                pairs.pop();
                used[c] = false;
            }
        }
    }

    #[test]
    fn greedy_takes_cheapest_pair_first() {
        let costs = vec![vec![Some(1.0), Some(2.0)], vec![Some(2.0), Some(100.0)]];
        assert_eq!(
            assign(&costs, 2, AssignmentMethod::Greedy),
            vec![(0, 0), (1, 1)]
        );
    }

    #[test]
    fn unmatched_penalty_exceeds_most_expensive_pair() {
        // Two pairs at the maximum cost (20) beat one free pair plus an
        // unmatched row and column (2 * 11).
        let costs = vec![vec![Some(0.0), Some(10.0)], vec![Some(10.0), None]];
        assert_eq!(
            assign(&costs, 2, AssignmentMethod::Optimal),
            vec![(0, 1), (1, 0)]
        );
    }

    #[test]
    fn optimal_minimises_total_cost() {
        let costs = vec![vec![Some(1.0), Some(2.0)], vec![Some(2.0), Some(100.0)]];
        assert_eq!(
            assign(&costs, 2, AssignmentMethod::Optimal),
            vec![(0, 1), (1, 0)]
        );
    }

    #[test]
    fn gated_pairs_are_never_matched() {
        let costs = vec![vec![None, Some(0.5)], vec![None, Some(0.1)], vec![None, None]];
        for method in [AssignmentMethod::Greedy, AssignmentMethod::Optimal] {
            assert_eq!(assign(&costs, 2, method), vec![(1, 1)], "{method:?}");
        }
    }

    #[test]
    fn empty_inputs() {
        for method in [AssignmentMethod::Greedy, AssignmentMethod::Optimal] {
            assert!(assign(&[], 3, method).is_empty());
            assert!(assign(&[vec![], vec![]], 0, method).is_empty());
        }
    }

    #[test]
    fn greedy_ties_break_by_row_then_column() {
        let costs = vec![vec![Some(1.0), Some(1.0)], vec![Some(1.0), Some(1.0)]];
        assert_eq!(
            assign(&costs, 2, AssignmentMethod::Greedy),
            vec![(0, 0), (1, 1)]
        );
    }

    #[test]
    fn optimal_matches_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for _ in 0..200 {
            let rows = rng.random_range(1..=4);
            let columns = rng.random_range(1..=4);
            let costs: Vec<Vec<Option<f64>>> = (0..rows)
                .map(|_| {
                    (0..columns)
                        .map(|_| rng.random_bool(0.7).then(|| rng.random_range(0.0..10.0)))
                        .collect()
                })
                .collect();

            let pairs = assign(&costs, columns, AssignmentMethod::Optimal);
            let mut best = f64::INFINITY;
            brute_force(
                &costs,
                columns,
                0,
                &mut vec![false; columns],
                &mut Vec::new(),
                &mut best,
            );
            assert!(
                (total(&costs, columns, &pairs) - best).abs() < 1e-9,
                "{costs:?}"
            );
        }
    }
}
