use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("invalid cell address '{0}'")]
    InvalidAddress(String),

    #[error("worksheet parse failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Spreadsheet-style cell coordinate, parsed from "A1" notation.
///
/// Columns are letters (A, B, ..., Z, AA, ...), rows are 1-based digits.
/// Stored zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellAddress {
    pub column: usize,
    pub row: usize,
}

impl CellAddress {
    pub fn parse(address: &str) -> Result<Self, SheetError> {
        let address = address.trim();
        let digits_at = address
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| SheetError::InvalidAddress(address.to_string()))?;
        let (letters, digits) = address.split_at(digits_at);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SheetError::InvalidAddress(address.to_string()));
        }

        let mut column: usize = 0;
        for c in letters.chars() {
            column = column * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
        }

        let row: usize = digits
            .parse()
            .ok()
            .filter(|row| *row > 0)
            .ok_or_else(|| SheetError::InvalidAddress(address.to_string()))?;

        Ok(Self {
            column: column - 1,
            row: row - 1,
        })
    }
}

/// Typed value extracted from a worksheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// Infer a typed value from the raw cell text.
    pub fn infer(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::Empty;
        }
        if raw.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(number) = raw.parse::<f64>() {
            return Self::Number(number);
        }
        Self::Text(raw.to_string())
    }
}

/// A parsed worksheet: ragged rows of raw cell text.
#[derive(Debug)]
pub struct Worksheet {
    rows: Vec<Vec<String>>,
}

impl Worksheet {
    /// Parse CSV worksheet data. Rows may have differing lengths.
    pub fn parse(data: &[u8]) -> Result<Self, SheetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, address: CellAddress) -> Option<&str> {
        self.rows
            .get(address.row)
            .and_then(|row| row.get(address.column))
            .map(String::as_str)
    }
}

/// Pull the mapped fields out of a worksheet.
///
/// The mapping is `field name -> cell address` from configuration. A mapped
/// cell that falls outside the sheet yields [`CellValue::Empty`] with a
/// warning rather than failing the whole conversion — the mapping describes
/// where values should be, not a schema the sheet must satisfy.
pub fn extract(
    sheet: &Worksheet,
    mapping: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, CellValue>, SheetError> {
    let mut data = BTreeMap::new();
    for (field, address) in mapping {
        let address = CellAddress::parse(address)?;
        let value = match sheet.cell(address) {
            Some(raw) => CellValue::infer(raw),
            None => {
                warn!(field, "mapped cell is outside the worksheet");
                CellValue::Empty
            }
        };
        data.insert(field.clone(), value);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_addresses() {
        assert_eq!(CellAddress::parse("A1").unwrap(), CellAddress { column: 0, row: 0 });
        assert_eq!(CellAddress::parse("B3").unwrap(), CellAddress { column: 1, row: 2 });
        assert_eq!(CellAddress::parse("z10").unwrap(), CellAddress { column: 25, row: 9 });
    }

    #[test]
    fn parses_multi_letter_columns() {
        assert_eq!(CellAddress::parse("AA1").unwrap(), CellAddress { column: 26, row: 0 });
        assert_eq!(CellAddress::parse("AB2").unwrap(), CellAddress { column: 27, row: 1 });
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "12", "A0", "A", "1A", "A-1", "A1.5"] {
            assert!(CellAddress::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn infers_cell_value_types() {
        assert_eq!(CellValue::infer("hello"), CellValue::Text("hello".into()));
        assert_eq!(CellValue::infer("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::infer("3.14"), CellValue::Number(3.14));
        assert_eq!(CellValue::infer("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::infer("false"), CellValue::Bool(false));
        assert_eq!(CellValue::infer("  "), CellValue::Empty);
    }

    #[test]
    fn extracts_mapped_cells() {
        let sheet = Worksheet::parse(b"title,Warehouse WMS\nprice,1250.5\nready,true\n").unwrap();
        assert_eq!(sheet.row_count(), 3);

        let mapping = BTreeMap::from([
            ("title".to_string(), "B1".to_string()),
            ("price".to_string(), "B2".to_string()),
            ("ready".to_string(), "B3".to_string()),
        ]);

        let data = extract(&sheet, &mapping).unwrap();
        assert_eq!(data["title"], CellValue::Text("Warehouse WMS".into()));
        assert_eq!(data["price"], CellValue::Number(1250.5));
        assert_eq!(data["ready"], CellValue::Bool(true));
    }

    #[test]
    fn out_of_range_cells_become_empty() {
        let sheet = Worksheet::parse(b"only,one,row\n").unwrap();
        let mapping = BTreeMap::from([("missing".to_string(), "D9".to_string())]);

        let data = extract(&sheet, &mapping).unwrap();
        assert_eq!(data["missing"], CellValue::Empty);
    }

    #[test]
    fn quoted_fields_with_commas_survive() {
        let sheet = Worksheet::parse(b"name,\"Smith, John\"\n").unwrap();
        assert_eq!(sheet.cell(CellAddress::parse("B1").unwrap()), Some("Smith, John"));
    }
}
