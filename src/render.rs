use crate::types::{CutBar, StockSpec};

const MAX_WIDTH: f64 = 80.0;

/// Formats a length without trailing zeros, at most three decimals.
pub fn format_length(value: f64) -> String {
    let text = format!("{value:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Draws one bar as three text lines: border, cut layout, border.
///
/// `#` marks trimmed ends, `|` marks cut positions and `.` the leftover.
pub fn render_bar(stock: &StockSpec, bar: &CutBar) -> String {
    if stock.stock_length <= 0.0 {
        return String::new();
    }
    let scale = MAX_WIDTH / stock.stock_length;
    let grid_w = (stock.stock_length * scale).round() as usize;
    if grid_w == 0 {
        return String::new();
    }
    let to_col = |x: f64| ((x * scale).round() as usize).min(grid_w);

    let mut row = vec![' '; grid_w + 1];

    // Trimmed ends
    let trim_end = to_col(stock.edge_trim);
    let trim_start = to_col(stock.stock_length - stock.edge_trim);
    if stock.edge_trim > 0.0 {
        for cell in row.iter_mut().take(trim_end) {
            *cell = '#';
        }
        for cell in row.iter_mut().skip(trim_start) {
            *cell = '#';
        }
    }

    // Pieces
    let mut x = stock.edge_trim;
    let mut last_col = trim_end;
    for (i, &piece) in bar.pieces.iter().enumerate() {
        if i > 0 {
            x += stock.kerf;
        }
        let sx = to_col(x);
        let ex = to_col(x + piece);
        row[sx] = '|';
        row[ex] = '|';

        let label: Vec<char> = format_length(piece).chars().collect();
        if ex > sx + label.len() + 1 {
            let start = sx + 1 + (ex - sx - 1 - label.len()) / 2;
            for (k, &ch) in label.iter().enumerate() {
                row[start + k] = ch;
            }
        }
        x += piece;
        last_col = ex;
    }

    // Leftover
    for cell in row
        .iter_mut()
        .take(trim_start)
        .skip(last_col + 1)
    {
        *cell = '.';
    }

    let border: String = std::iter::once('+')
        .chain(std::iter::repeat_n('-', grid_w.saturating_sub(1)))
        .chain(std::iter::once('+'))
        .collect();
    let body: String = row.into_iter().collect();

    let mut result = String::new();
    result.push_str(&border);
    result.push('\n');
    result.push_str(body.trim_end());
    result.push('\n');
    result.push_str(&border);
    result.push('\n');
    result
}
