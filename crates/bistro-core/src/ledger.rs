//! # Stock Shortage Convention
//!
//! A stock ledger that can only report failures as text encodes a shortage
//! as a sentinel token plus a parseable fragment:
//!
//! ```text
//! INSUFFICIENT_STOCK: product 3fa85f64-5717-4562-b3fc-2c963f66afa6 (missing 2.5)
//! └──── sentinel ───┘ └──────────────── fragment ──────────────────────────┘
//! ```
//!
//! Structured stores report [`StockShortage`] directly; this module is the
//! adapter for message-only backends.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use ts_rs::TS;

/// Token every shortage message contains.
pub const INSUFFICIENT_STOCK_SENTINEL: &str = "INSUFFICIENT_STOCK";

/// Product id reported when the sentinel is present but the fragment is not.
pub const UNKNOWN_PRODUCT: &str = "unknown";

/// The first product a sale could not cover, and by how much.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockShortage {
    pub product_id: String,
    /// Shortfall in the product's unit of measure.
    pub missing: f64,
}

impl StockShortage {
    pub fn new(product_id: impl Into<String>, missing: f64) -> Self {
        StockShortage {
            product_id: product_id.into(),
            missing,
        }
    }

    /// Parses a backend message.
    ///
    /// Returns `None` when the sentinel is absent. When the sentinel is
    /// present but the fragment does not match, the shortage is reported
    /// against [`UNKNOWN_PRODUCT`] with `missing = 0`.
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::ledger::StockShortage;
    ///
    /// let s = StockShortage::parse(
    ///     "INSUFFICIENT_STOCK: product 3fa85f64-5717-4562-b3fc-2c963f66afa6 (missing 2.5)",
    /// ).unwrap();
    /// assert_eq!(s.product_id, "3fa85f64-5717-4562-b3fc-2c963f66afa6");
    /// assert_eq!(s.missing, 2.5);
    ///
    /// assert!(StockShortage::parse("connection reset").is_none());
    /// ```
    pub fn parse(message: &str) -> Option<StockShortage> {
        if !message.contains(INSUFFICIENT_STOCK_SENTINEL) {
            return None;
        }

        let parsed = fragment_pattern()
            .and_then(|re| re.captures(message))
            .and_then(|caps| {
                let product_id = caps.get(1)?.as_str().to_string();
                let missing = caps.get(2)?.as_str().parse::<f64>().ok()?;
                Some(StockShortage { product_id, missing })
            });

        Some(parsed.unwrap_or_else(|| StockShortage::new(UNKNOWN_PRODUCT, 0.0)))
    }
}

/// Renders exactly the wire form, so a shortage survives a round trip
/// through a message-only backend.
impl fmt::Display for StockShortage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: product {} (missing {})",
            INSUFFICIENT_STOCK_SENTINEL, self.product_id, self.missing
        )
    }
}

fn fragment_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)product\s+([a-f0-9-]+)\s+\(missing\s+([\d.]+)\)").ok())
        .as_ref()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_shortage_message() {
        let msg = "INSUFFICIENT_STOCK: product 3fa85f64-5717-4562-b3fc-2c963f66afa6 (missing 2.5)";
        let s = StockShortage::parse(msg).unwrap();
        assert_eq!(s.product_id, "3fa85f64-5717-4562-b3fc-2c963f66afa6");
        assert_eq!(s.missing, 2.5);
    }

    #[test]
    fn test_fragment_is_case_insensitive_and_embedded() {
        let msg = "ERROR: P0001: INSUFFICIENT_STOCK for sale: Product ABCDEF12-0000-4000-8000-000000000001 (Missing 0.2) at line 12";
        let s = StockShortage::parse(msg).unwrap();
        assert_eq!(s.product_id, "ABCDEF12-0000-4000-8000-000000000001");
        assert!((s.missing - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_sentinel_without_fragment_is_unknown() {
        let s = StockShortage::parse("INSUFFICIENT_STOCK").unwrap();
        assert_eq!(s.product_id, UNKNOWN_PRODUCT);
        assert_eq!(s.missing, 0.0);
    }

    #[test]
    fn test_other_messages_are_not_shortages() {
        assert!(StockShortage::parse("duplicate key value violates unique constraint").is_none());
        // fragment alone is not enough
        assert!(StockShortage::parse("product 3fa85f64 (missing 1)").is_none());
    }

    #[test]
    fn test_display_matches_wire_form() {
        let s = StockShortage::new("3fa85f64-5717-4562-b3fc-2c963f66afa6", 2.5);
        let text = s.to_string();
        assert_eq!(
            text,
            "INSUFFICIENT_STOCK: product 3fa85f64-5717-4562-b3fc-2c963f66afa6 (missing 2.5)"
        );
        assert_eq!(StockShortage::parse(&text), Some(s));
    }
}
