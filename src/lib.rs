//! Bar cutting-stock optimizer: assigns required piece lengths to the fewest
//! stock bars, accounting for saw kerf and edge trim.

pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod model;
pub mod plan;
pub mod render;
pub mod solver;
pub mod types;

pub use config::SolverConfig;
pub use engine::{
    MaterialOutcome, optimize_materials, optimize_parts, solve_cutting_stock, solve_material,
};
pub use error::InputViolation;
pub use types::{CutBar, CutPlan, MaterialJob, PartRow, SolveStatus, StockSpec};
