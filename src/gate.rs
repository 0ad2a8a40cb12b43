use std::collections::BTreeMap;

use crate::error::InputViolation;
use crate::types::{PartRow, StockSpec};

/// Most pieces one material code may carry into the engine.
pub const MAX_PIECES: usize = 100_000;

/// Rejects a material code whose input the engine must never see.
///
/// Checks stock values first, then every piece against the length left after
/// trimming both ends (with no edge trim that is the stock length itself).
pub fn check(code: &str, stock: &StockSpec, pieces: &[f64]) -> Result<(), InputViolation> {
    let code_owned = || code.to_string();

    if !stock.stock_length.is_finite() || stock.stock_length <= 0.0 {
        return Err(InputViolation::InvalidStockLength {
            code: code_owned(),
            value: stock.stock_length,
        });
    }
    if !stock.kerf.is_finite() || stock.kerf < 0.0 {
        return Err(InputViolation::InvalidKerf {
            code: code_owned(),
            value: stock.kerf,
        });
    }
    if !stock.edge_trim.is_finite() || stock.edge_trim < 0.0 {
        return Err(InputViolation::InvalidEdgeTrim {
            code: code_owned(),
            value: stock.edge_trim,
        });
    }

    let usable = stock.usable_length();
    if usable <= 0.0 {
        return Err(InputViolation::NoUsableLength {
            code: code_owned(),
            stock_length: stock.stock_length,
            edge_trim: stock.edge_trim,
        });
    }

    check_count(code, pieces.len() as u64)?;
    for &piece in pieces {
        if !piece.is_finite() || piece <= 0.0 {
            return Err(InputViolation::NonPositivePiece {
                code: code_owned(),
                piece,
            });
        }
        if piece > usable {
            return Err(InputViolation::OversizedPiece {
                code: code_owned(),
                piece,
                usable,
                stock_length: stock.stock_length,
                edge_trim: stock.edge_trim,
            });
        }
    }
    Ok(())
}

/// Rejects a material code with more than `MAX_PIECES` pieces.
pub fn check_count(code: &str, count: u64) -> Result<(), InputViolation> {
    if count > MAX_PIECES as u64 {
        return Err(InputViolation::TooManyPieces {
            code: code.to_string(),
            count,
        });
    }
    Ok(())
}

/// Expands `(length, quantity)` pairs into a piece list.
///
/// The summed quantity is checked against `MAX_PIECES` before anything is
/// allocated.
pub fn expand_pieces(code: &str, items: &[(f64, u32)]) -> Result<Vec<f64>, InputViolation> {
    let count: u64 = items.iter().map(|&(_, qty)| u64::from(qty)).sum();
    check_count(code, count)?;
    Ok(items
        .iter()
        .flat_map(|&(length, qty)| std::iter::repeat_n(length, qty as usize))
        .collect())
}

/// Merges configurator rows into one piece list per material code.
///
/// Quantities are expanded; codes come out sorted. A code whose rows add up
/// to more than `MAX_PIECES` pieces is reported instead of expanded.
pub fn group_parts(rows: &[PartRow]) -> BTreeMap<String, Result<Vec<f64>, InputViolation>> {
    let mut grouped: BTreeMap<&str, Vec<(f64, u32)>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.code.as_str())
            .or_default()
            .push((row.length, row.quantity));
    }
    grouped
        .into_iter()
        .map(|(code, items)| (code.to_string(), expand_pieces(code, &items)))
        .collect()
}
