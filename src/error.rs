use thiserror::Error;

/// Input that must be rejected before a material code reaches the solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputViolation {
    #[error(
        "material {code}: piece {piece} does not fit usable length {usable} \
         (stock {stock_length}, edge trim {edge_trim})"
    )]
    OversizedPiece {
        code: String,
        piece: f64,
        usable: f64,
        stock_length: f64,
        edge_trim: f64,
    },

    #[error("material {code}: piece length {piece} must be a positive number")]
    NonPositivePiece { code: String, piece: f64 },

    #[error("material {code}: stock length {value} must be a positive number")]
    InvalidStockLength { code: String, value: f64 },

    #[error("material {code}: kerf {value} must be zero or a positive number")]
    InvalidKerf { code: String, value: f64 },

    #[error("material {code}: edge trim {value} must be zero or a positive number")]
    InvalidEdgeTrim { code: String, value: f64 },

    #[error("material {code}: edge trim {edge_trim} leaves nothing usable on stock {stock_length}")]
    NoUsableLength {
        code: String,
        stock_length: f64,
        edge_trim: f64,
    },

    #[error("material {code}: length {value} is outside the representable range")]
    ScaledOverflow { code: String, value: f64 },

    #[error(
        "material {code}: {count} pieces exceed the limit of {}",
        crate::gate::MAX_PIECES
    )]
    TooManyPieces { code: String, count: u64 },

    #[error("material {code}: no stock length configured")]
    UnknownMaterial { code: String },
}

impl InputViolation {
    /// Material code the violation belongs to.
    pub fn code(&self) -> &str {
        match self {
            Self::OversizedPiece { code, .. }
            | Self::NonPositivePiece { code, .. }
            | Self::InvalidStockLength { code, .. }
            | Self::InvalidKerf { code, .. }
            | Self::InvalidEdgeTrim { code, .. }
            | Self::NoUsableLength { code, .. }
            | Self::ScaledOverflow { code, .. }
            | Self::TooManyPieces { code, .. }
            | Self::UnknownMaterial { code } => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_code_and_piece() {
        let err = InputViolation::OversizedPiece {
            code: "AL-120".to_string(),
            piece: 5500.0,
            usable: 5000.0,
            stock_length: 5000.0,
            edge_trim: 0.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("AL-120"));
        assert!(msg.contains("5500"));
        assert_eq!(err.code(), "AL-120");
    }

    #[test]
    fn test_piece_limit_message() {
        let err = InputViolation::TooManyPieces {
            code: "ST-40".to_string(),
            count: 4_294_967_295,
        };
        assert_eq!(
            err.to_string(),
            format!(
                "material ST-40: 4294967295 pieces exceed the limit of {}",
                crate::gate::MAX_PIECES
            )
        );
        assert_eq!(err.code(), "ST-40");
    }
}
