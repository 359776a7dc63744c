//! sheetscript_engine - value model, literal encoding and formula translation.

pub mod engine;
pub mod helpers;

#[cfg(test)]
mod tests {
    use crate::engine::*;

    #[test]
    fn test_body_cell_formula_renders_aggregate_helper() {
        let target = CellAddress::parse("body[C0]").unwrap();
        let translation = translate_formula(&target, "=SUM(A0:B1)");
        assert_eq!(translation.assignment(), "c0 = c_sum('a0:b1')");
    }

    #[test]
    fn test_label_target_uses_region_proxy() {
        let target = CellAddress::parse("top_labels[A0]").unwrap();
        let translation = translate_formula(&target, "=A0+A1");
        assert_eq!(translation.assignment(), "top_labels.a0 = a0+a1");
    }

    #[test]
    fn test_encoded_date_round_trips_through_snapshot_json() {
        let value = Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(encode(&value), "date_value('2024-01-15')");
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"type":"date","value":"2024-01-15"}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
