//! Master sheet loader and publisher column discovery.

use std::collections::BTreeSet;
use std::io::Cursor;

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use tracing::debug;

use crate::conf::{C_COL_CODE, C_COL_CODE_ACCENTED, N_IDX_ROW_HEADER};
use crate::spec::{
    EnumCellValue, LiquidationError, SpecPublisherColumn, SpecRawTable, TypeContactBook,
};
use crate::util::{derive_publisher_id, derive_unique_column_names, is_publisher_column};

/// Parse the first sheet of a master workbook.
///
/// Row [`N_IDX_ROW_HEADER`] holds the column names; everything above it is
/// ignored. Missing settlement columns are not checked here.
pub fn parse_table(v_bytes: &[u8]) -> Result<SpecRawTable, LiquidationError> {
    let range = derive_first_sheet_range(v_bytes)?;
    let table = derive_raw_table_from_range(&range);
    debug!(
        n_cols = table.width(),
        n_rows = table.height(),
        "parsed master sheet"
    );
    Ok(table)
}

/// Sorted, deduplicated publisher identifiers of a master workbook.
pub fn parse_publishers(v_bytes: &[u8]) -> Result<Vec<String>, LiquidationError> {
    let table = parse_table(v_bytes)?;
    Ok(derive_publisher_ids(&extract_publisher_columns(&table)))
}

/// Scan column names for publisher consignment columns, in sheet order.
pub fn extract_publisher_columns(table: &SpecRawTable) -> Vec<SpecPublisherColumn> {
    table
        .columns
        .iter()
        .filter(|c_name| is_publisher_column(c_name))
        .map(|c_name| SpecPublisherColumn {
            column_name: c_name.clone(),
            publisher_id: derive_publisher_id(c_name),
        })
        .collect()
}

/// Canonical publisher list: unique identifiers in lexicographic order.
pub fn derive_publisher_ids(publisher_columns: &[SpecPublisherColumn]) -> Vec<String> {
    publisher_columns
        .iter()
        .map(|col| col.publisher_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Deserialize a contact book: a JSON object keyed by publisher identifier.
pub fn parse_contact_book(v_bytes: &[u8]) -> Result<TypeContactBook, LiquidationError> {
    let book: TypeContactBook = serde_json::from_slice(v_bytes)?;
    debug!(n_contacts = book.len(), "parsed contact book");
    Ok(book)
}

fn derive_first_sheet_range(v_bytes: &[u8]) -> Result<Range<Data>, LiquidationError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(v_bytes))
        .map_err(|err| LiquidationError::MalformedInput(format!("{err}")))?;

    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LiquidationError::MalformedInput("workbook has no sheets".to_string()))?
        .map_err(|err| {
            LiquidationError::MalformedInput(format!("failed loading first sheet: {err}"))
        })
}

fn derive_raw_table_from_range(range: &Range<Data>) -> SpecRawTable {
    let Some((n_row_end, n_col_end)) = range.end() else {
        return SpecRawTable::default();
    };
    let n_row_header = N_IDX_ROW_HEADER as u32;
    if n_row_end < n_row_header {
        return SpecRawTable::default();
    }

    let get_cell = |n_row: u32, n_col: u32| {
        range
            .get_value((n_row, n_col))
            .map(derive_cell_value)
            .unwrap_or(EnumCellValue::None)
    };

    let l_names_raw = (0..=n_col_end)
        .map(|n_col| derive_header_name(&get_cell(n_row_header, n_col), n_col as usize))
        .collect::<Vec<_>>();
    let columns = rename_code_alias(derive_unique_column_names(l_names_raw));

    let rows = ((n_row_header + 1)..=n_row_end)
        .map(|n_row| {
            (0..=n_col_end)
                .map(|n_col| get_cell(n_row, n_col))
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.iter().all(EnumCellValue::is_blank))
        .collect();

    SpecRawTable { columns, rows }
}

fn derive_header_name(value: &EnumCellValue, n_idx_col: usize) -> String {
    let c_name = match value {
        EnumCellValue::None => format!("Unnamed: {n_idx_col}"),
        _ => value.to_text(),
    };
    c_name.trim().to_string()
}

fn rename_code_alias(mut columns: Vec<String>) -> Vec<String> {
    if columns.iter().any(|c_name| c_name == C_COL_CODE) {
        return columns;
    }
    if let Some(c_name) = columns.iter_mut().find(|c_name| *c_name == C_COL_CODE_ACCENTED) {
        *c_name = C_COL_CODE.to_string();
    }
    columns
}

fn derive_cell_value(data: &Data) -> EnumCellValue {
    match data {
        Data::Empty | Data::Error(_) => EnumCellValue::None,
        Data::String(val) if val.is_empty() => EnumCellValue::None,
        Data::String(val) => EnumCellValue::String(val.clone()),
        Data::Int(val) => EnumCellValue::Integer(*val),
        Data::Float(val) => {
            if val.is_finite() && val.fract() == 0.0 && val.abs() < 9.0e15 {
                EnumCellValue::Integer(*val as i64)
            } else {
                EnumCellValue::Number(*val)
            }
        }
        Data::Bool(val) => EnumCellValue::String(if *val { "True" } else { "False" }.to_string()),
        Data::DateTime(val) => EnumCellValue::String(val.to_string()),
        Data::DateTimeIso(val) | Data::DurationIso(val) => EnumCellValue::String(val.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{build_master_workbook, cell_int, cell_str};

    #[test]
    fn test_parse_table_reads_header_at_sixth_row_and_trims_names() {
        let v_bytes = build_master_workbook(
            &["Producto", " Código ", "BODEGA GENERAL BARI", "Consignaciones Acme "],
            &[
                vec![cell_str("Book A"), cell_str("123/1"), cell_int(5), cell_int(12)],
                vec![cell_str("Book B"), cell_int(456), cell_int(10), cell_int(8)],
            ],
        );

        let table = parse_table(&v_bytes).expect("table");
        assert_eq!(
            table.columns,
            vec!["Producto", "Codigo", "BODEGA GENERAL BARI", "Consignaciones Acme"]
        );
        assert_eq!(table.height(), 2);
        assert_eq!(table.rows[0][1], EnumCellValue::String("123/1".to_string()));
        assert_eq!(table.rows[1][1], EnumCellValue::Integer(456));
        assert_eq!(table.rows[1][3], EnumCellValue::Integer(8));
    }

    #[test]
    fn test_parse_table_names_blank_headers_and_skips_blank_rows() {
        let v_bytes = build_master_workbook(
            &["Producto", "", "Producto"],
            &[
                vec![cell_str("Book A"), EnumCellValue::None, cell_int(1)],
                vec![EnumCellValue::None, EnumCellValue::None, EnumCellValue::None],
                vec![cell_str("Book B"), cell_int(2), EnumCellValue::None],
            ],
        );

        let table = parse_table(&v_bytes).expect("table");
        assert_eq!(table.columns, vec!["Producto", "Unnamed: 1", "Producto.1"]);
        assert_eq!(table.height(), 2);
        assert_eq!(table.rows[1][0], EnumCellValue::String("Book B".to_string()));
    }

    #[test]
    fn test_parse_table_rejects_non_spreadsheet_bytes() {
        let err = parse_table(b"definitely not a workbook").expect_err("malformed");
        assert!(matches!(err, LiquidationError::MalformedInput(_)));
    }

    #[test]
    fn test_parse_table_without_header_row_is_empty() {
        let v_bytes = build_master_workbook(&[], &[]);
        let table = parse_table(&v_bytes).expect("table");
        assert_eq!(table.width(), 0);
        assert_eq!(table.height(), 0);
    }

    #[test]
    fn test_parse_publishers_is_sorted_and_unique() {
        let v_bytes = build_master_workbook(
            &[
                "Producto",
                "Codigo",
                "BODEGA GENERAL BARI",
                "Consignaciones Zeta",
                "consignacion Acme 2023-01",
                "Consignaciones ACME",
                "Consignaciones 2024",
            ],
            &[],
        );

        let l_ids = parse_publishers(&v_bytes).expect("publishers");
        assert_eq!(l_ids, vec!["ACME", "SIN EDITORIAL", "ZETA"]);
    }

    #[test]
    fn test_parse_contact_book() {
        let book = parse_contact_book(
            br#"{"ACME": {"PROVEEDOR": "Acme Ltda.", "FONO_MAIL": "acme@example.com"}}"#,
        )
        .expect("contact book");
        assert_eq!(book["ACME"].get("FONO / MAIL"), Some("acme@example.com"));
        assert_eq!(book["ACME"].get("FECHA"), None);

        let err = parse_contact_book(b"[1, 2]").expect_err("not an object");
        assert!(matches!(err, LiquidationError::ContactBook(_)));
    }

    #[test]
    fn test_extract_publisher_columns_keeps_sheet_order() {
        let table = SpecRawTable {
            columns: vec![
                "Producto".to_string(),
                "Consignaciones Zeta".to_string(),
                "Consignaciones Acme".to_string(),
            ],
            rows: vec![],
        };

        let l_cols = extract_publisher_columns(&table);
        assert_eq!(
            l_cols,
            vec![
                SpecPublisherColumn {
                    column_name: "Consignaciones Zeta".to_string(),
                    publisher_id: "ZETA".to_string(),
                },
                SpecPublisherColumn {
                    column_name: "Consignaciones Acme".to_string(),
                    publisher_id: "ACME".to_string(),
                },
            ]
        );
    }
}
