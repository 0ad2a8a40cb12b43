use std::time::{Duration, Instant};

use crate::model::{Assignment, CuttingModel};
use crate::types::{SolveStats, SolveStatus};

/// Search steps between two deadline checks.
const DEADLINE_POLL: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FitStrategy {
    FirstFit,
    BestFit,
    WorstFit,
}

#[derive(Debug, Clone)]
pub struct Solved {
    pub assignment: Assignment,
    pub stats: SolveStats,
}

pub struct Solver<'a> {
    model: &'a CuttingModel,
    time_limit: Duration,
}

/// A packing over pieces sorted by decreasing weight; `bars[k]` is the bar of
/// the k-th piece in that order.
#[derive(Debug, Clone)]
struct Packing {
    bars: Vec<usize>,
    count: usize,
}

impl<'a> Solver<'a> {
    pub fn new(model: &'a CuttingModel, time_limit: Duration) -> Self {
        Self { model, time_limit }
    }

    /// Every phase, the lower bound included, shares one deadline.
    pub fn solve(&self) -> Solved {
        let started = Instant::now();
        let deadline = started + self.time_limit;
        let n = self.model.len();
        let lower_bound = self.model.lower_bound();

        if n == 0 {
            return Solved {
                assignment: Assignment::from_bars(vec![]),
                stats: SolveStats {
                    status: SolveStatus::Optimal,
                    lower_bound,
                    nodes: 0,
                    elapsed_ms: 0,
                },
            };
        }

        let order = self.order_pieces();

        // Greedy phase: try multiple strategies, keep best
        let greedy = self.greedy_best(&order, deadline);
        tracing::debug!(bars = greedy.count, lower_bound, "greedy packing");

        let (best, status, nodes) = if greedy.count <= lower_bound {
            (greedy, SolveStatus::Optimal, 0)
        } else {
            // B&B phase: try to improve on greedy
            let mut search = Search::new(self.model, &order, greedy, lower_bound, deadline);
            search.run();
            let status = if search.timed_out && search.best.count > lower_bound {
                SolveStatus::Feasible
            } else {
                SolveStatus::Optimal
            };
            (search.best, status, search.nodes)
        };

        let mut bar_of = vec![0; n];
        for (k, &piece) in order.iter().enumerate() {
            bar_of[piece] = best.bars[k];
        }
        let assignment = Assignment::from_bars(bar_of);
        debug_assert_eq!(self.model.check(&assignment), Ok(()));

        Solved {
            assignment,
            stats: SolveStats {
                status,
                lower_bound,
                nodes,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        }
    }

    /// Piece indices by decreasing weight, ties in input order.
    fn order_pieces(&self) -> Vec<usize> {
        let weights = self.model.weights();
        let mut order: Vec<usize> = (0..weights.len()).collect();
        order.sort_by(|&a, &b| weights[b].cmp(&weights[a]));
        order
    }

    /// Stops trying strategies once the deadline has passed.
    fn greedy_best(&self, order: &[usize], deadline: Instant) -> Packing {
        let strategies = [
            FitStrategy::FirstFit,
            FitStrategy::BestFit,
            FitStrategy::WorstFit,
        ];

        let mut best: Option<Packing> = None;
        for &strategy in &strategies {
            let packing = self.greedy_solve(order, strategy, deadline);
            if best.as_ref().is_none_or(|b| packing.count < b.count) {
                best = Some(packing);
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        best.unwrap_or_else(|| self.one_per_bar(order.len()))
    }

    /// Packs `order` with `strategy`. Once `deadline` passes the remaining
    /// pieces go next fit, into the newest open bar or a fresh one.
    fn greedy_solve(&self, order: &[usize], strategy: FitStrategy, deadline: Instant) -> Packing {
        let weights = self.model.weights();
        let capacity = self.model.capacity();
        // Pieces arrive in decreasing weight: a bar with less room than the
        // last piece never takes another one.
        let smallest = order.last().map_or(0, |&piece| weights[piece]);
        let mut residual: Vec<u64> = Vec::new();
        // Bars still able to take `smallest`, ascending.
        let mut open: Vec<usize> = Vec::new();
        let mut bars = Vec::with_capacity(order.len());
        let mut expired = false;

        for &piece in order {
            let w = weights[piece];
            expired = expired || Instant::now() >= deadline;

            let slot = if expired {
                open.len()
                    .checked_sub(1)
                    .filter(|&k| residual[open[k]] >= w)
            } else {
                let fits = open
                    .iter()
                    .enumerate()
                    .map(|(k, &bi)| (k, bi, residual[bi]))
                    .filter(|&(_, _, r)| r >= w);
                match strategy {
                    FitStrategy::FirstFit => fits.map(|(k, _, _)| k).next(),
                    FitStrategy::BestFit => fits
                        .min_by_key(|&(_, bi, r)| (r, bi))
                        .map(|(k, _, _)| k),
                    FitStrategy::WorstFit => fits
                        .max_by_key(|&(_, bi, r)| (r, std::cmp::Reverse(bi)))
                        .map(|(k, _, _)| k),
                }
            };

            if let Some(k) = slot {
                let bi = open[k];
                residual[bi] -= w;
                bars.push(bi);
                if residual[bi] < smallest {
                    open.remove(k);
                }
            } else {
                // Open new bar; the formulator guarantees w <= capacity.
                let bi = residual.len();
                residual.push(capacity - w);
                bars.push(bi);
                if capacity - w >= smallest {
                    open.push(bi);
                }
            }
        }

        Packing {
            count: residual.len(),
            bars,
        }
    }

    fn one_per_bar(&self, n: usize) -> Packing {
        Packing {
            bars: (0..n).collect(),
            count: n,
        }
    }
}

/// Depth-first branch and bound over pieces in decreasing weight order.
///
/// The tree is walked with an explicit cursor per piece, so depth is bounded
/// by memory rather than stack.
struct Search {
    weights: Vec<u64>,
    /// `suffix[k]` is the total weight of pieces `k..`.
    suffix: Vec<u64>,
    capacity: u64,
    lower_bound: usize,
    deadline: Instant,
    residual: Vec<u64>,
    /// Sum of `residual`.
    free: u64,
    placed: Vec<usize>,
    /// First bar piece `k` may use.
    floor: Vec<usize>,
    /// Next bar to try for piece `k`; `residual.len()` means a new bar.
    cursor: Vec<usize>,
    best: Packing,
    nodes: u64,
    work: u64,
    next_poll: u64,
    timed_out: bool,
}

impl Search {
    fn new(
        model: &CuttingModel,
        order: &[usize],
        incumbent: Packing,
        lower_bound: usize,
        deadline: Instant,
    ) -> Self {
        let weights: Vec<u64> = order.iter().map(|&i| model.weights()[i]).collect();
        let mut suffix = vec![0u64; weights.len() + 1];
        for k in (0..weights.len()).rev() {
            suffix[k] = suffix[k + 1] + weights[k];
        }
        let n = weights.len();
        Self {
            placed: vec![0; n],
            floor: vec![0; n],
            cursor: vec![0; n],
            residual: Vec::with_capacity(incumbent.count),
            free: 0,
            weights,
            suffix,
            capacity: model.capacity(),
            lower_bound,
            deadline,
            best: incumbent,
            nodes: 0,
            work: 0,
            next_poll: DEADLINE_POLL,
            timed_out: false,
        }
    }

    fn run(&mut self) {
        if Instant::now() >= self.deadline {
            self.timed_out = true;
            return;
        }
        if !self.enter(0) {
            return;
        }

        let mut idx = 0;
        while !self.done() {
            match self.next_choice(idx) {
                Some(bar) => {
                    self.place(idx, bar);
                    if self.enter(idx + 1) {
                        idx += 1;
                    } else {
                        self.unplace(idx);
                    }
                }
                None if idx == 0 => return,
                None => {
                    idx -= 1;
                    self.unplace(idx);
                }
            }
        }
    }

    fn done(&self) -> bool {
        self.timed_out || self.best.count <= self.lower_bound
    }

    /// Counts `work` search steps and reports whether the deadline has passed.
    fn tick(&mut self, work: u64) -> bool {
        self.work += work;
        if self.work >= self.next_poll {
            self.next_poll = self.work + DEADLINE_POLL;
            if Instant::now() >= self.deadline {
                self.timed_out = true;
            }
        }
        self.timed_out
    }

    /// Visits the node where pieces `..idx` are placed. Returns whether piece
    /// `idx` should be branched on.
    fn enter(&mut self, idx: usize) -> bool {
        self.nodes += 1;
        if self.tick(1) {
            return false;
        }

        let open = self.residual.len();
        if idx == self.weights.len() {
            if open < self.best.count {
                self.best = Packing {
                    bars: self.placed.clone(),
                    count: open,
                };
            }
            return false;
        }

        // Pruning: remaining weight that cannot go into open bars needs new ones
        let spill = self.suffix[idx].saturating_sub(self.free);
        let needed = open + spill.div_ceil(self.capacity) as usize;
        if needed >= self.best.count {
            return false;
        }

        // Identical pieces are interchangeable: keep them in non-decreasing bar order.
        let floor = if idx > 0 && self.weights[idx - 1] == self.weights[idx] {
            self.placed[idx - 1]
        } else {
            0
        };
        self.floor[idx] = floor;
        self.cursor[idx] = floor;
        true
    }

    /// Next bar for piece `idx`, skipping bars whose residual was already tried.
    fn next_choice(&mut self, idx: usize) -> Option<usize> {
        let w = self.weights[idx];
        let floor = self.floor[idx];
        let open = self.residual.len();

        while self.cursor[idx] < open {
            let bi = self.cursor[idx];
            self.cursor[idx] += 1;
            if self.tick(1 + (bi - floor) as u64) {
                return None;
            }
            let r = self.residual[bi];
            if r >= w && !self.residual[floor..bi].contains(&r) {
                return Some(bi);
            }
        }

        // Try opening a new bar (only if it could still beat the incumbent)
        if self.cursor[idx] == open {
            self.cursor[idx] += 1;
            if open + 1 < self.best.count {
                return Some(open);
            }
        }
        None
    }

    fn place(&mut self, idx: usize, bar: usize) {
        let w = self.weights[idx];
        if bar == self.residual.len() {
            self.residual.push(self.capacity - w);
            self.free += self.capacity - w;
        } else {
            self.residual[bar] -= w;
            self.free -= w;
        }
        self.placed[idx] = bar;
    }

    fn unplace(&mut self, idx: usize) {
        let w = self.weights[idx];
        let bar = self.placed[idx];
        // Alone in its bar means this piece opened it, and deeper bars are gone.
        if self.residual[bar] + w == self.capacity {
            self.residual.pop();
            self.free -= self.capacity - w;
        } else {
            self.residual[bar] += w;
            self.free += w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StockSpec;

    fn solve(stock: StockSpec, pieces: &[f64]) -> (CuttingModel, Solved) {
        let model = CuttingModel::formulate("T", &stock, pieces).unwrap();
        let solved = Solver::new(&model, Duration::from_secs(10)).solve();
        (model, solved)
    }

    #[test]
    fn test_empty_model() {
        let (model, solved) = solve(StockSpec::new(6000.0), &[]);
        assert_eq!(model.objective(&solved.assignment), 0);
        assert_eq!(solved.stats.status, SolveStatus::Optimal);
    }

    #[test]
    fn test_exact_fit_single_bar() {
        let (model, solved) = solve(StockSpec::new(6000.0), &[2000.0, 2000.0, 2000.0]);
        assert_eq!(model.check(&solved.assignment), Ok(()));
        assert_eq!(model.objective(&solved.assignment), 1);
        assert_eq!(solved.stats.status, SolveStatus::Optimal);
    }

    #[test]
    fn test_kerf_forces_second_bar() {
        let (model, solved) = solve(StockSpec::new(3000.0).with_kerf(10.0), &[1000.0; 3]);
        assert_eq!(model.check(&solved.assignment), Ok(()));
        assert_eq!(model.objective(&solved.assignment), 2);
    }

    #[test]
    fn test_branch_and_bound_beats_decreasing_greedy() {
        // Every greedy strategy opens 4 bars here.
        // Optimum: {59, 20, 20} {51, 24, 22} {44, 42, 10}
        let pieces = [59.0, 51.0, 44.0, 42.0, 24.0, 22.0, 20.0, 20.0, 10.0];
        let (model, solved) = solve(StockSpec::new(100.0), &pieces);
        assert_eq!(model.check(&solved.assignment), Ok(()));
        assert_eq!(model.objective(&solved.assignment), 3);
        assert_eq!(solved.stats.status, SolveStatus::Optimal);
        assert!(solved.stats.nodes > 0);
    }

    #[test]
    fn test_greedy_matches_bound_skips_search() {
        let (_, solved) = solve(StockSpec::new(6000.0), &[4000.0, 4000.0]);
        assert_eq!(solved.stats.nodes, 0);
        assert_eq!(solved.stats.lower_bound, 2);
    }

    #[test]
    fn test_zero_budget_still_feasible() {
        let pieces = [59.0, 51.0, 44.0, 42.0, 24.0, 22.0, 20.0, 20.0, 10.0];
        let model = CuttingModel::formulate("T", &StockSpec::new(100.0), &pieces).unwrap();
        let solved = Solver::new(&model, Duration::ZERO).solve();
        assert_eq!(model.check(&solved.assignment), Ok(()));
        // Next fit: {59} {51, 44} {42, 24, 22} {20, 20, 10}
        assert_eq!(model.objective(&solved.assignment), 4);
        assert_eq!(solved.stats.status, SolveStatus::Feasible);
        assert_eq!(solved.stats.nodes, 0);
    }

    #[test]
    fn test_large_mixed_input_respects_time_limit() {
        let pieces: Vec<f64> = (0..30_000)
            .map(|i| 300.0 + (i * 7919 % 2500) as f64 + 0.25)
            .collect();
        let model =
            CuttingModel::formulate("T", &StockSpec::new(6000.0).with_kerf(4.0), &pieces).unwrap();
        let limit = Duration::from_millis(100);

        let started = Instant::now();
        let solved = Solver::new(&model, limit).solve();
        let wall = started.elapsed();

        assert!(wall < limit + Duration::from_secs(1), "took {wall:?}");
        assert_eq!(model.check(&solved.assignment), Ok(()));
        assert!(model.objective(&solved.assignment) >= solved.stats.lower_bound);
    }

    #[test]
    fn test_one_piece_per_bar_input_respects_time_limit() {
        // No two pieces share a bar, so every bar closes as soon as it opens.
        let pieces = vec![3100.0; 50_000];
        let model = CuttingModel::formulate("T", &StockSpec::new(6000.0), &pieces).unwrap();
        let limit = Duration::from_millis(100);

        let started = Instant::now();
        let solved = Solver::new(&model, limit).solve();
        let wall = started.elapsed();

        assert!(wall < limit + Duration::from_secs(1), "took {wall:?}");
        assert_eq!(model.objective(&solved.assignment), 50_000);
        assert_eq!(solved.stats.lower_bound, 50_000);
        assert_eq!(solved.stats.status, SolveStatus::Optimal);
    }

    #[test]
    fn test_many_identical_pieces() {
        let pieces = vec![1450.0; 40];
        let (model, solved) = solve(StockSpec::new(6000.0).with_kerf(16.0), &pieces);
        assert_eq!(model.check(&solved.assignment), Ok(()));
        // Four pieces need 4*1450 + 3*16 = 5848 <= 6000.
        assert_eq!(model.objective(&solved.assignment), 10);
    }

    #[test]
    fn test_same_input_same_bar_count() {
        let pieces = [
            2150.5, 1830.0, 1830.0, 960.25, 960.25, 4100.0, 3999.9, 120.0, 770.0, 2500.0,
        ];
        let stock = StockSpec::new(6000.0).with_kerf(4.0).with_edge_trim(10.0);
        let (model, a) = solve(stock, &pieces);
        let (_, b) = solve(stock, &pieces);
        assert_eq!(model.objective(&a.assignment), model.objective(&b.assignment));
        assert_eq!(a.assignment, b.assignment);
    }
}
