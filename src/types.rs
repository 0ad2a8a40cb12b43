use serde::{Deserialize, Deserializer, Serialize};

/// Raw stock bar for one material code, with the losses applied when cutting it.
///
/// All lengths share one unit (millimetres in practice).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockSpec {
    /// As-purchased bar length.
    pub stock_length: f64,
    /// Blade width lost at each joint between two adjacent pieces.
    #[serde(default)]
    pub kerf: f64,
    /// Unusable material removed at each end of a used bar.
    #[serde(default)]
    pub edge_trim: f64,
    /// Linear mass, used only for reporting purchased vs used mass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kg_per_meter: Option<f64>,
}

impl StockSpec {
    pub fn new(stock_length: f64) -> Self {
        Self {
            stock_length,
            kerf: 0.0,
            edge_trim: 0.0,
            kg_per_meter: None,
        }
    }

    pub fn with_kerf(mut self, kerf: f64) -> Self {
        self.kerf = kerf;
        self
    }

    pub fn with_edge_trim(mut self, edge_trim: f64) -> Self {
        self.edge_trim = edge_trim;
        self
    }

    pub fn with_kg_per_meter(mut self, kg_per_meter: f64) -> Self {
        self.kg_per_meter = Some(kg_per_meter);
        self
    }

    /// Length left for pieces once both ends are trimmed.
    pub fn usable_length(&self) -> f64 {
        self.stock_length - 2.0 * self.edge_trim
    }

    fn mass_of(&self, length: f64) -> Option<f64> {
        self.kg_per_meter.map(|kg| length / 1000.0 * kg)
    }
}

impl std::fmt::Display for StockSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (kerf {}, edge trim {})",
            self.stock_length, self.kerf, self.edge_trim
        )
    }
}

/// Everything needed to cut one material code.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialJob {
    pub code: String,
    pub stock: StockSpec,
    pub pieces: Vec<f64>,
}

impl MaterialJob {
    pub fn new(code: impl Into<String>, stock: StockSpec, pieces: Vec<f64>) -> Self {
        Self {
            code: code.into(),
            stock,
            pieces,
        }
    }
}

/// A required part as produced by the product configurator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRow {
    pub code: String,
    pub length: f64,
    #[serde(default = "default_qty", deserialize_with = "deserialize_u32_from_number")]
    pub quantity: u32,
}

fn default_qty() -> u32 {
    1
}

/// Accepts both `3` and `3.0` for integer quantities.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u32)
}

/// One used bar: the pieces cut from it and what remains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutBar {
    pub pieces: Vec<f64>,
    pub leftover: f64,
}

impl CutBar {
    pub fn used_length(&self) -> f64 {
        self.pieces.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// The bar count meets the lower bound or the search was exhausted.
    Optimal,
    /// The time budget ran out before optimality was proven.
    Feasible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SolveStats {
    pub status: SolveStatus,
    pub lower_bound: usize,
    pub nodes: u64,
    pub elapsed_ms: u64,
}

/// Cutting plan for a single material code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutPlan {
    pub code: String,
    pub stock: StockSpec,
    pub bars: Vec<CutBar>,
    pub stats: SolveStats,
}

impl CutPlan {
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn purchased_length(&self) -> f64 {
        self.stock.stock_length * self.bars.len() as f64
    }

    pub fn used_length(&self) -> f64 {
        self.bars.iter().map(CutBar::used_length).sum()
    }

    pub fn waste_percent(&self) -> f64 {
        let purchased = self.purchased_length();
        if purchased == 0.0 {
            return 0.0;
        }
        (purchased - self.used_length()) / purchased * 100.0
    }

    pub fn purchased_mass(&self) -> Option<f64> {
        self.stock.mass_of(self.purchased_length())
    }

    pub fn used_mass(&self) -> Option<f64> {
        self.stock.mass_of(self.used_length())
    }

    /// Flattens the plan into parallel piece-list and leftover vectors.
    pub fn into_bars_and_leftovers(self) -> (Vec<Vec<f64>>, Vec<f64>) {
        self.bars
            .into_iter()
            .map(|bar| (bar.pieces, bar.leftover))
            .unzip()
    }
}
