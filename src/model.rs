//! Integer-domain model of a single material code's cutting problem.
//!
//! Lengths are stored in fixed point (`round(value * SCALE)`). Kerf is folded
//! into the weights so that the capacity constraint of bar `j` reads
//!
//! ```text
//! sum_i x[i][j] * (p_i + K) <= (L - 2T) + K
//! ```
//!
//! which is vacuous for an empty bar and equivalent to
//! `sum p_i + K * (count_j - 1) <= L - 2T` for a used one.

use crate::error::InputViolation;
use crate::gate::MAX_PIECES;
use crate::types::StockSpec;

/// Fixed-point units per length unit.
pub const SCALE: f64 = 1000.0;

/// Largest scaled length accepted by the formulator.
pub const MAX_SCALED: u64 = 1 << 50;

pub fn to_scaled(value: f64) -> Option<u64> {
    let scaled = (value * SCALE).round();
    if !scaled.is_finite() || scaled < 0.0 || scaled > MAX_SCALED as f64 {
        return None;
    }
    Some(scaled as u64)
}

pub fn from_scaled(value: u64) -> f64 {
    value as f64 / SCALE
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuttingModel {
    capacity: u64,
    weights: Vec<u64>,
}

/// Values of the `x[i][j]` and `y[j]` decision variables.
///
/// `x` is stored sparsely as the bar index of each piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    bar_of: Vec<usize>,
    used: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    /// Piece has no bar, or a bar index outside `0..n`.
    Assignment { piece: usize },
    Capacity { bar: usize, load: u64, capacity: u64 },
    Linking { bar: usize, count: usize, used: bool },
}

impl CuttingModel {
    /// Builds the model. Expects input that already passed the feasibility gate;
    /// values that do not survive scaling are still rejected here.
    pub fn formulate(
        code: &str,
        stock: &StockSpec,
        pieces: &[f64],
    ) -> Result<Self, InputViolation> {
        if pieces.len() > MAX_PIECES {
            return Err(InputViolation::TooManyPieces {
                code: code.to_string(),
                count: pieces.len() as u64,
            });
        }
        let overflow = |value: f64| InputViolation::ScaledOverflow {
            code: code.to_string(),
            value,
        };

        let stock_length =
            to_scaled(stock.stock_length).ok_or_else(|| overflow(stock.stock_length))?;
        let kerf = to_scaled(stock.kerf).ok_or_else(|| overflow(stock.kerf))?;
        let edge_trim = to_scaled(stock.edge_trim).ok_or_else(|| overflow(stock.edge_trim))?;

        let usable = stock_length
            .checked_sub(2 * edge_trim)
            .filter(|&usable| usable > 0)
            .ok_or_else(|| InputViolation::NoUsableLength {
                code: code.to_string(),
                stock_length: stock.stock_length,
                edge_trim: stock.edge_trim,
            })?;
        let capacity = usable + kerf;

        let mut weights = Vec::with_capacity(pieces.len());
        let mut total: u64 = 0;
        for &piece in pieces {
            let length = to_scaled(piece).ok_or_else(|| overflow(piece))?;
            // Rounding can push a piece that fits in real units one unit over.
            if length == 0 || length > usable {
                return Err(if length == 0 {
                    InputViolation::NonPositivePiece {
                        code: code.to_string(),
                        piece,
                    }
                } else {
                    InputViolation::OversizedPiece {
                        code: code.to_string(),
                        piece,
                        usable: stock.usable_length(),
                        stock_length: stock.stock_length,
                        edge_trim: stock.edge_trim,
                    }
                });
            }
            let weight = length + kerf;
            total = total.checked_add(weight).ok_or_else(|| overflow(piece))?;
            weights.push(weight);
        }

        Ok(Self { capacity, weights })
    }

    /// Number of pieces, which is also the number of candidate bars.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Right-hand side of every capacity constraint, `(L - 2T) + K`.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Left-hand side coefficients, `p_i + K`.
    pub fn weights(&self) -> &[u64] {
        &self.weights
    }

    /// Leftover of a used bar given its load `sum (p_i + K)`.
    ///
    /// Equals `L - sum p_i - K * (count - 1) - 2T`.
    pub fn leftover(&self, load: u64) -> u64 {
        debug_assert!(load <= self.capacity, "capacity exceeded");
        self.capacity.saturating_sub(load)
    }

    /// Value of the objective `sum_j y[j]`.
    pub fn objective(&self, assignment: &Assignment) -> usize {
        assignment.used.iter().filter(|&&used| used).count()
    }

    /// Returns the first violated constraint, if any.
    pub fn check(&self, assignment: &Assignment) -> Result<(), ConstraintViolation> {
        let n = self.len();
        if assignment.bar_of.len() != n || assignment.used.len() != n {
            return Err(ConstraintViolation::Assignment {
                piece: assignment.bar_of.len().min(n),
            });
        }

        let mut loads = vec![0u64; n];
        let mut counts = vec![0usize; n];
        for (piece, &bar) in assignment.bar_of.iter().enumerate() {
            if bar >= n {
                return Err(ConstraintViolation::Assignment { piece });
            }
            loads[bar] += self.weights[piece];
            counts[bar] += 1;
        }

        for bar in 0..n {
            if loads[bar] > self.capacity {
                return Err(ConstraintViolation::Capacity {
                    bar,
                    load: loads[bar],
                    capacity: self.capacity,
                });
            }
            let used = assignment.used[bar] as usize;
            // count >= y and count <= n * y
            if counts[bar] < used || counts[bar] > n * used {
                return Err(ConstraintViolation::Linking {
                    bar,
                    count: counts[bar],
                    used: assignment.used[bar],
                });
            }
        }
        Ok(())
    }

    /// Lower bound on the number of used bars.
    ///
    /// Maximum of the continuous bound and the Martello-Toth L2 bound, taken
    /// over sorted weights so each threshold costs a few binary searches.
    pub fn lower_bound(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let c = self.capacity;
        let mut sorted = self.weights.clone();
        sorted.sort_unstable();
        let mut prefix = Vec::with_capacity(sorted.len() + 1);
        prefix.push(0u64);
        for &w in &sorted {
            prefix.push(prefix[prefix.len() - 1] + w);
        }
        let len = sorted.len();
        let mut best = prefix[len].div_ceil(c) as usize;

        // sorted[..half] fit twice into a bar; the thresholds are drawn from them.
        let half = sorted.partition_point(|&w| 2 * w <= c);
        let thresholds = std::iter::once((0, 0)).chain(
            (0..half)
                .filter(|&k| k == 0 || sorted[k] != sorted[k - 1])
                .map(|k| (sorted[k], k)),
        );

        for (alpha, small_from) in thresholds {
            // Since 2 * alpha <= c, every weight below `half` is also <= c - alpha.
            let big_from = sorted.partition_point(|&w| w <= c - alpha);
            let big = len - big_from;
            let medium = big_from - half;
            let medium_sum = prefix[big_from] - prefix[half];
            let small_sum = prefix[half] - prefix[small_from];

            let medium_room = medium as u128 * c as u128 - medium_sum as u128;
            let extra = (small_sum as u128)
                .saturating_sub(medium_room)
                .div_ceil(c as u128) as usize;
            best = best.max(big + medium + extra);
        }
        best
    }
}

impl Assignment {
    /// Builds an assignment from each piece's bar; `y` follows the bar counts.
    pub fn from_bars(bar_of: Vec<usize>) -> Self {
        let n = bar_of.len();
        let mut used = vec![false; n];
        for &bar in &bar_of {
            if let Some(slot) = used.get_mut(bar) {
                *slot = true;
            }
        }
        Self { bar_of, used }
    }

    /// `y[bar]`.
    pub fn y(&self, bar: usize) -> bool {
        self.used.get(bar).copied().unwrap_or(false)
    }

    pub fn bar_of(&self, piece: usize) -> usize {
        self.bar_of[piece]
    }

    pub fn candidate_bars(&self) -> usize {
        self.used.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(stock: StockSpec, pieces: &[f64]) -> CuttingModel {
        CuttingModel::formulate("T", &stock, pieces).unwrap()
    }

    #[test]
    fn test_scaling_rounds_to_nearest() {
        assert_eq!(to_scaled(1.0004), Some(1000));
        assert_eq!(to_scaled(1.0006), Some(1001));
        assert_eq!(to_scaled(0.0), Some(0));
        assert_eq!(to_scaled(-1.0), None);
        assert_eq!(to_scaled(f64::NAN), None);
        assert_eq!(to_scaled(1e300), None);
        assert!((from_scaled(1234567) - 1234.567).abs() < 1e-9);
    }

    #[test]
    fn test_kerf_folded_into_capacity() {
        let m = model(StockSpec::new(3000.0).with_kerf(10.0), &[1000.0, 1000.0]);
        assert_eq!(m.capacity(), 3_010_000);
        assert_eq!(m.weights(), &[1_010_000, 1_010_000]);
        // One bar holding both: 3000 - 2000 - 10 = 990
        assert_eq!(m.leftover(2_020_000), 990_000);
    }

    #[test]
    fn test_edge_trim_deducted_at_both_ends() {
        let m = model(StockSpec::new(6000.0).with_edge_trim(20.0), &[1000.0]);
        assert_eq!(m.capacity(), 5_960_000);
        assert_eq!(from_scaled(m.leftover(1_000_000)), 4960.0);
    }

    #[test]
    fn test_rejects_rounded_oversize() {
        let err = CuttingModel::formulate("T", &StockSpec::new(1.0), &[1.0006]).unwrap_err();
        assert!(matches!(err, InputViolation::OversizedPiece { .. }));
    }

    #[test]
    fn test_rejects_unrepresentable_stock() {
        let err = CuttingModel::formulate("T", &StockSpec::new(1e20), &[1.0]).unwrap_err();
        assert!(matches!(err, InputViolation::ScaledOverflow { .. }));
    }

    #[test]
    fn test_trim_eating_whole_bar() {
        let err = CuttingModel::formulate("T", &StockSpec::new(100.0).with_edge_trim(50.0), &[])
            .unwrap_err();
        assert!(matches!(err, InputViolation::NoUsableLength { .. }));
    }

    #[test]
    fn test_one_piece_per_bar_is_feasible() {
        let m = model(StockSpec::new(6000.0).with_kerf(16.0), &[6000.0, 10.0, 5999.0]);
        let a = Assignment::from_bars((0..m.len()).collect());
        assert_eq!(m.check(&a), Ok(()));
        assert_eq!(m.objective(&a), 3);
    }

    #[test]
    fn test_check_detects_capacity() {
        let m = model(StockSpec::new(3000.0).with_kerf(10.0), &[1000.0; 3]);
        let a = Assignment::from_bars(vec![0, 0, 0]);
        assert!(matches!(
            m.check(&a),
            Err(ConstraintViolation::Capacity { bar: 0, .. })
        ));
        let a = Assignment::from_bars(vec![0, 0, 2]);
        assert_eq!(m.check(&a), Ok(()));
        assert_eq!(m.objective(&a), 2);
        assert!(a.y(2) && !a.y(1));
        assert_eq!(a.bar_of(2), 2);
    }

    #[test]
    fn test_check_detects_linking() {
        let m = model(StockSpec::new(100.0), &[10.0, 10.0]);
        let a = Assignment {
            bar_of: vec![0, 0],
            used: vec![true, true],
        };
        assert!(matches!(
            m.check(&a),
            Err(ConstraintViolation::Linking { bar: 1, count: 0, used: true })
        ));
        let a = Assignment {
            bar_of: vec![0, 0],
            used: vec![false, false],
        };
        assert!(matches!(
            m.check(&a),
            Err(ConstraintViolation::Linking { bar: 0, .. })
        ));
    }

    #[test]
    fn test_check_detects_unassigned() {
        let m = model(StockSpec::new(100.0), &[10.0, 10.0]);
        let a = Assignment::from_bars(vec![0, 7]);
        assert_eq!(
            m.check(&a),
            Err(ConstraintViolation::Assignment { piece: 1 })
        );
    }

    #[test]
    fn test_lower_bound_continuous() {
        let m = model(StockSpec::new(6000.0), &[2000.0; 7]);
        assert_eq!(m.lower_bound(), 3);
    }

    #[test]
    fn test_lower_bound_l2_beats_continuous() {
        // Three pieces over half the bar can never share one.
        let m = model(StockSpec::new(100.0), &[51.0, 51.0, 51.0]);
        assert_eq!(m.lower_bound(), 3);
    }

    #[test]
    fn test_lower_bound_l2_with_small_threshold() {
        // No 35 fits beside a 70 and three 35s overflow one bar; the volume says 3.
        let m = model(StockSpec::new(100.0), &[70.0, 70.0, 35.0, 35.0, 35.0]);
        assert_eq!(m.lower_bound(), 4);
    }

    #[test]
    fn test_formulate_refuses_too_many_pieces() {
        let pieces = vec![1.0; MAX_PIECES + 1];
        let err = CuttingModel::formulate("T", &StockSpec::new(100.0), &pieces).unwrap_err();
        assert_eq!(
            err,
            InputViolation::TooManyPieces {
                code: "T".to_string(),
                count: MAX_PIECES as u64 + 1,
            }
        );
    }

    #[test]
    fn test_lower_bound_empty() {
        let m = model(StockSpec::new(100.0), &[]);
        assert_eq!(m.lower_bound(), 0);
    }
}
