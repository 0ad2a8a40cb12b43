use crate::model::{CuttingModel, from_scaled};
use crate::solver::Solved;
use crate::types::{CutBar, CutPlan, StockSpec};

/// Reads a solved assignment back into real-unit bars.
///
/// Bars come out in ascending candidate index; pieces keep their input order.
/// Unused candidates are dropped.
pub fn extract(
    code: &str,
    stock: &StockSpec,
    pieces: &[f64],
    model: &CuttingModel,
    solved: &Solved,
) -> CutPlan {
    let assignment = &solved.assignment;
    let candidates = assignment.candidate_bars();
    let mut contents: Vec<Vec<usize>> = vec![Vec::new(); candidates];
    for piece in 0..pieces.len() {
        contents[assignment.bar_of(piece)].push(piece);
    }

    let bars = contents
        .into_iter()
        .enumerate()
        .filter(|&(bar, _)| assignment.y(bar))
        .map(|(_, members)| {
            let load: u64 = members.iter().map(|&i| model.weights()[i]).sum();
            CutBar {
                pieces: members.iter().map(|&i| pieces[i]).collect(),
                leftover: from_scaled(model.leftover(load)),
            }
        })
        .collect();

    CutPlan {
        code: code.to_string(),
        stock: *stock,
        bars,
        stats: solved.stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Assignment;
    use crate::types::{SolveStats, SolveStatus};

    fn solved(bar_of: Vec<usize>) -> Solved {
        Solved {
            assignment: Assignment::from_bars(bar_of),
            stats: SolveStats {
                status: SolveStatus::Optimal,
                lower_bound: 0,
                nodes: 0,
                elapsed_ms: 0,
            },
        }
    }

    #[test]
    fn test_drops_unused_and_keeps_order() {
        let stock = StockSpec::new(3000.0).with_kerf(10.0);
        let pieces = [1000.0, 1200.5, 1000.0];
        let model = CuttingModel::formulate("A", &stock, &pieces).unwrap();
        let plan = extract("A", &stock, &pieces, &model, &solved(vec![2, 0, 2]));

        assert_eq!(plan.bar_count(), 2);
        assert_eq!(plan.bars[0].pieces, vec![1200.5]);
        assert_eq!(plan.bars[1].pieces, vec![1000.0, 1000.0]);
        assert!((plan.bars[0].leftover - 1799.5).abs() < 1e-9);
        assert!((plan.bars[1].leftover - 990.0).abs() < 1e-9);
    }

    #[test]
    fn test_leftover_includes_both_trims() {
        let stock = StockSpec::new(6000.0).with_kerf(16.0).with_edge_trim(25.0);
        let pieces = [2000.0, 2000.0];
        let model = CuttingModel::formulate("A", &stock, &pieces).unwrap();
        let plan = extract("A", &stock, &pieces, &model, &solved(vec![0, 0]));
        // 6000 - 4000 - 16 - 50
        assert_eq!(plan.bars[0].leftover, 1934.0);
    }

    #[test]
    fn test_reports_original_lengths() {
        let stock = StockSpec::new(1000.0);
        let pieces = [333.3334, 333.3333];
        let model = CuttingModel::formulate("A", &stock, &pieces).unwrap();
        let plan = extract("A", &stock, &pieces, &model, &solved(vec![0, 0]));
        assert_eq!(plan.bars[0].pieces, vec![333.3334, 333.3333]);
        assert!((plan.bars[0].leftover - 333.334).abs() < 1e-9);
    }
}
