//! Settlement computation and the end-to-end report pipeline.

use std::collections::BTreeMap;

use polars::prelude::{
    ChunkCompareIneq, Column, DataFrame, DataType, IntoSeries, SortMultipleOptions,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::conf::{
    C_COL_CODE, C_COL_CONSIGNED, C_COL_ISBN, C_COL_PRODUCT, C_COL_STOCK, C_COL_UNITS,
    TUP_COLS_REQUIRED, derive_report_filename,
};
use crate::reader::{extract_publisher_columns, parse_table};
use crate::spec::{
    EnumCellValue, LiquidationError, SpecLiquidationOutput, SpecPublisherColumn, SpecRawTable,
    SpecReportLayout, SpecSettlementBatch, SpecSettlementTable, TypeContactBook,
};
use crate::util::normalize_isbn;
use crate::writer::render_report_with_layout;

////////////////////////////////////////////////////////////////////////////////
// #region Settlement

/// Build one settlement table per publisher column.
///
/// If any of [`TUP_COLS_REQUIRED`] is absent the whole batch is discarded:
/// no tables, an empty no-data list, and `missing_columns` names the gap.
/// Publishers are processed in identifier order.
pub fn compute_settlements(
    table: &SpecRawTable,
    publisher_columns: &[SpecPublisherColumn],
) -> Result<SpecSettlementBatch, LiquidationError> {
    let mut batch = SpecSettlementBatch::default();

    let l_cols_missing: Vec<String> = TUP_COLS_REQUIRED
        .iter()
        .filter(|c_name| !table.has_column(c_name))
        .map(ToString::to_string)
        .collect();
    if !l_cols_missing.is_empty() {
        warn!(
            missing = ?l_cols_missing,
            n_publishers = publisher_columns.len(),
            "required columns absent; discarding every publisher"
        );
        batch.missing_columns = l_cols_missing;
        return Ok(batch);
    }

    let mut l_publisher_cols = publisher_columns.to_vec();
    l_publisher_cols.sort_by(|a, b| a.publisher_id.cmp(&b.publisher_id));

    for publisher_col in l_publisher_cols {
        let df = derive_settlement_frame(table, &publisher_col.column_name)?;
        if df.height() == 0 {
            debug!(publisher = %publisher_col.publisher_id, "no units to liquidate");
            batch.no_data.push(publisher_col.publisher_id);
            continue;
        }

        debug!(
            publisher = %publisher_col.publisher_id,
            n_rows = df.height(),
            "settlement table built"
        );
        batch.tables.insert(
            derive_report_filename(&publisher_col.publisher_id),
            SpecSettlementTable {
                publisher_id: publisher_col.publisher_id,
                df,
            },
        );
    }

    Ok(batch)
}

/// Settlement frame for one consigned-quantity column.
///
/// Rows with negative or missing stock are dropped first; the remaining rows
/// keep only positive `consigned - stock`, sorted by product name with blank
/// products last.
fn derive_settlement_frame(
    table: &SpecRawTable,
    column_consigned: &str,
) -> Result<DataFrame, LiquidationError> {
    let l_products: Vec<Option<String>> = derive_column_cells(table, C_COL_PRODUCT)?
        .into_iter()
        .map(|value| (!value.is_blank()).then(|| value.to_text()))
        .collect();
    // Codes are normalized per row up front; the transform is row-local.
    let l_codes: Vec<String> = derive_column_cells(table, C_COL_CODE)?
        .into_iter()
        .map(|value| normalize_isbn(&value.to_text()))
        .collect();
    let l_stock: Vec<Option<f64>> = derive_column_cells(table, C_COL_STOCK)?
        .into_iter()
        .map(EnumCellValue::to_f64)
        .collect();
    let l_consigned: Vec<Option<f64>> = derive_column_cells(table, column_consigned)?
        .into_iter()
        .map(EnumCellValue::to_f64)
        .collect();

    let df = DataFrame::new(vec![
        Column::new(C_COL_PRODUCT.into(), l_products),
        Column::new(C_COL_CODE.into(), l_codes),
        Column::new(C_COL_STOCK.into(), l_stock),
        Column::new(C_COL_CONSIGNED.into(), l_consigned),
    ])?;

    let mask_stock = df
        .column(C_COL_STOCK)?
        .as_materialized_series()
        .f64()?
        .gt_eq(0.0);
    let mut df = df.filter(&mask_stock)?;

    let ca_units = df.column(C_COL_CONSIGNED)?.as_materialized_series().f64()?
        - df.column(C_COL_STOCK)?.as_materialized_series().f64()?;
    let s_units = ca_units
        .into_series()
        .cast(&DataType::Int64)?
        .with_name(C_COL_UNITS.into());
    df.with_column(s_units)?;

    let mask_units = df
        .column(C_COL_UNITS)?
        .as_materialized_series()
        .i64()?
        .gt(0);
    let df = df.filter(&mask_units)?.sort(
        [C_COL_PRODUCT],
        SortMultipleOptions::default()
            .with_maintain_order(true)
            .with_nulls_last(true),
    )?;

    let mut df = df.select([C_COL_UNITS, C_COL_PRODUCT, C_COL_CODE])?;
    df.rename(C_COL_CODE, C_COL_ISBN.into())?;
    Ok(df)
}

fn derive_column_cells<'a>(
    table: &'a SpecRawTable,
    name: &str,
) -> Result<Vec<&'a EnumCellValue>, LiquidationError> {
    table
        .column_values(name)
        .ok_or_else(|| LiquidationError::MalformedInput(format!("Column not found: {name:?}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Pipeline

/// Run the whole pipeline with the default report layout.
pub fn generate_reports(
    v_bytes: &[u8],
    v_logo: Option<&[u8]>,
    contacts: Option<&TypeContactBook>,
) -> Result<SpecLiquidationOutput, LiquidationError> {
    generate_reports_with_layout(v_bytes, v_logo, contacts, &SpecReportLayout::default())
}

/// Parse, settle and render every publisher of one master workbook.
///
/// Reports render in parallel; the output map is ordered by filename.
pub fn generate_reports_with_layout(
    v_bytes: &[u8],
    v_logo: Option<&[u8]>,
    contacts: Option<&TypeContactBook>,
    layout: &SpecReportLayout,
) -> Result<SpecLiquidationOutput, LiquidationError> {
    let table = parse_table(v_bytes)?;
    let l_publisher_cols = extract_publisher_columns(&table);
    let batch = compute_settlements(&table, &l_publisher_cols)?;

    let files = batch
        .tables
        .par_iter()
        .map(|(c_filename, settlement)| {
            let contact = contacts.and_then(|book| book.get(&settlement.publisher_id));
            render_report_with_layout(
                settlement,
                &settlement.publisher_id,
                v_logo,
                contact,
                layout,
            )
            .map(|v_report| (c_filename.clone(), v_report))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    info!(
        n_publishers = l_publisher_cols.len(),
        n_reports = files.len(),
        n_no_data = batch.no_data.len(),
        "settlement reports generated"
    );

    Ok(SpecLiquidationOutput {
        files,
        no_data: batch.no_data,
        missing_columns: batch.missing_columns,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::fixture::{build_master_workbook, cell_int, cell_str};
    use crate::spec::SpecSettlementRow;

    fn build_table(columns: &[&str], rows: Vec<Vec<EnumCellValue>>) -> SpecRawTable {
        SpecRawTable {
            columns: columns.iter().map(ToString::to_string).collect(),
            rows,
        }
    }

    fn acme_columns() -> Vec<SpecPublisherColumn> {
        vec![SpecPublisherColumn {
            column_name: "Consignaciones Acme".to_string(),
            publisher_id: "ACME".to_string(),
        }]
    }

    const COLS_ACME: [&str; 4] = [
        "Producto",
        "Codigo",
        "BODEGA GENERAL BARI",
        "Consignaciones Acme",
    ];

    #[test]
    fn test_compute_settlements_keeps_positive_units_only() {
        let table = build_table(
            &COLS_ACME,
            vec![
                vec![cell_str("Book A"), cell_str("123/1"), cell_int(5), cell_int(12)],
                vec![cell_str("Book B"), cell_str("456"), cell_int(10), cell_int(8)],
            ],
        );

        let batch = compute_settlements(&table, &acme_columns()).expect("batch");
        assert!(batch.no_data.is_empty());
        assert!(batch.missing_columns.is_empty());
        assert_eq!(
            batch.tables.keys().collect::<Vec<_>>(),
            vec!["Liquidacion_Consignaciones_ACME.xlsx"]
        );

        let settlement = &batch.tables["Liquidacion_Consignaciones_ACME.xlsx"];
        assert_eq!(settlement.publisher_id, "ACME");
        assert_eq!(
            settlement.column_names(),
            vec!["Unidades a liquidar", "Producto", "ISBN"]
        );
        assert_eq!(
            settlement.rows().expect("rows"),
            vec![SpecSettlementRow {
                units: 7,
                product: "Book A".to_string(),
                isbn: "123".to_string(),
            }]
        );
    }

    #[test]
    fn test_compute_settlements_drops_negative_stock_before_subtracting() {
        let table = build_table(
            &COLS_ACME,
            vec![
                vec![cell_str("Book A"), cell_str("1"), cell_int(-1), cell_int(50)],
                vec![cell_str("Book C"), cell_str("2"), EnumCellValue::None, cell_int(50)],
                vec![cell_str("Book D"), cell_str("3"), cell_int(0), EnumCellValue::None],
                vec![cell_str("Book E"), cell_str("4"), cell_int(0), cell_int(3)],
            ],
        );

        let batch = compute_settlements(&table, &acme_columns()).expect("batch");
        let l_rows = batch.tables["Liquidacion_Consignaciones_ACME.xlsx"]
            .rows()
            .expect("rows");
        assert_eq!(l_rows.len(), 1);
        assert_eq!(l_rows[0].product, "Book E");
        assert_eq!(l_rows[0].units, 3);
    }

    #[test]
    fn test_compute_settlements_records_publishers_without_rows() {
        let table = build_table(
            &[
                "Producto",
                "Codigo",
                "BODEGA GENERAL BARI",
                "Consignaciones Zeta",
                "Consignaciones Acme",
            ],
            vec![vec![
                cell_str("Book A"),
                cell_str("1"),
                cell_int(5),
                cell_int(5),
                cell_int(6),
            ]],
        );
        let table_cols = extract_publisher_columns(&table);

        let batch = compute_settlements(&table, &table_cols).expect("batch");
        assert_eq!(batch.no_data, vec!["ZETA"]);
        assert_eq!(
            batch.tables.keys().collect::<Vec<_>>(),
            vec!["Liquidacion_Consignaciones_ACME.xlsx"]
        );
    }

    #[test]
    fn test_compute_settlements_discards_batch_when_code_is_missing() {
        let table = build_table(
            &[
                "Producto",
                "BODEGA GENERAL BARI",
                "Consignaciones Acme",
                "Consignaciones Zeta",
            ],
            vec![vec![cell_str("Book A"), cell_int(0), cell_int(9), cell_int(4)]],
        );
        let table_cols = extract_publisher_columns(&table);

        let batch = compute_settlements(&table, &table_cols).expect("batch");
        assert!(batch.tables.is_empty());
        assert!(batch.no_data.is_empty());
        assert_eq!(batch.missing_columns, vec!["Codigo"]);
    }

    #[test]
    fn test_compute_settlements_sorts_by_product_and_normalizes_codes() {
        let table = build_table(
            &COLS_ACME,
            vec![
                vec![cell_str("b-book"), cell_int(9789561234567), cell_int(0), cell_int(1)],
                vec![cell_str("Zen"), cell_str("9789561234567999/2"), cell_int(1), cell_int(3)],
                vec![cell_str("Alpha"), EnumCellValue::None, cell_int(2), cell_int(4)],
            ],
        );

        let batch = compute_settlements(&table, &acme_columns()).expect("batch");
        let l_rows = batch.tables["Liquidacion_Consignaciones_ACME.xlsx"]
            .rows()
            .expect("rows");
        let l_products: Vec<_> = l_rows.iter().map(|row| row.product.as_str()).collect();
        assert_eq!(l_products, vec!["Alpha", "Zen", "b-book"]);
        assert_eq!(l_rows[0].isbn, "");
        assert_eq!(l_rows[1].isbn, "9789561234567");
        assert_eq!(l_rows[2].isbn, "9789561234567");
    }

    #[test]
    fn test_compute_settlements_sorts_blank_products_last() {
        let table = build_table(
            &COLS_ACME,
            vec![
                vec![EnumCellValue::None, cell_str("1"), cell_int(0), cell_int(4)],
                vec![cell_str("Zen"), cell_str("2"), cell_int(0), cell_int(2)],
                vec![cell_str(""), cell_str("3"), cell_int(0), cell_int(5)],
                vec![cell_str("Alpha"), cell_str("4"), cell_int(0), cell_int(1)],
            ],
        );

        let batch = compute_settlements(&table, &acme_columns()).expect("batch");
        let l_rows = batch.tables["Liquidacion_Consignaciones_ACME.xlsx"]
            .rows()
            .expect("rows");
        let l_pairs: Vec<_> = l_rows
            .iter()
            .map(|row| (row.product.as_str(), row.isbn.as_str()))
            .collect();
        assert_eq!(
            l_pairs,
            vec![("Alpha", "4"), ("Zen", "2"), ("", "1"), ("", "3")]
        );
    }

    #[test]
    fn test_compute_settlements_tolerates_short_rows() {
        let table = build_table(
            &COLS_ACME,
            vec![
                vec![cell_str("Book A"), cell_str("1"), cell_int(0)],
                vec![cell_str("Book B"), cell_str("2"), cell_int(1), cell_int(4)],
                vec![cell_str("Book C")],
            ],
        );

        let batch = compute_settlements(&table, &acme_columns()).expect("batch");
        let l_rows = batch.tables["Liquidacion_Consignaciones_ACME.xlsx"]
            .rows()
            .expect("rows");
        assert_eq!(l_rows.len(), 1);
        assert_eq!(l_rows[0].product, "Book B");
        assert_eq!(l_rows[0].units, 3);
    }

    #[test]
    fn test_compute_settlements_accepts_numeric_text() {
        let table = build_table(
            &COLS_ACME,
            vec![
                vec![cell_str("Book A"), cell_str("1"), cell_str(" 2 "), cell_str("7")],
                vec![cell_str("Book B"), cell_str("2"), cell_str("n/a"), cell_int(7)],
            ],
        );

        let batch = compute_settlements(&table, &acme_columns()).expect("batch");
        let l_rows = batch.tables["Liquidacion_Consignaciones_ACME.xlsx"]
            .rows()
            .expect("rows");
        assert_eq!(l_rows.len(), 1);
        assert_eq!(l_rows[0].units, 5);
    }

    #[test]
    fn test_generate_reports_is_deterministic() {
        let v_bytes = build_master_workbook(
            &COLS_ACME,
            &[
                vec![cell_str("Book A"), cell_str("123/1"), cell_int(5), cell_int(12)],
                vec![cell_str("Book B"), cell_str("456"), cell_int(10), cell_int(8)],
            ],
        );

        let output_a = generate_reports(&v_bytes, None, None).expect("first run");
        let output_b = generate_reports(&v_bytes, None, None).expect("second run");

        assert_eq!(
            output_a.filenames(),
            vec!["Liquidacion_Consignaciones_ACME.xlsx"]
        );
        assert_eq!(output_a.filenames(), output_b.filenames());
        assert_eq!(output_a.files, output_b.files);
        assert!(output_a.no_data.is_empty());
    }

    #[test]
    fn test_generate_reports_surfaces_malformed_input() {
        let err = generate_reports(b"PK-but-not-really", None, None).expect_err("malformed");
        assert!(matches!(err, LiquidationError::MalformedInput(_)));
    }

    proptest! {
        #[test]
        fn prop_settlement_rows_respect_filters_and_order(
            l_quantities in proptest::collection::vec((-5i64..20, -5i64..20), 0..40)
        ) {
            let rows = l_quantities
                .iter()
                .enumerate()
                .map(|(n_idx, (n_stock, n_consigned))| {
                    vec![
                        cell_str(&format!("P{:02}", (n_idx * 7) % 40)),
                        cell_str(&n_idx.to_string()),
                        cell_int(*n_stock),
                        cell_int(*n_consigned),
                    ]
                })
                .collect();
            let table = build_table(&COLS_ACME, rows);

            let batch = compute_settlements(&table, &acme_columns()).expect("batch");
            let n_expected = l_quantities
                .iter()
                .filter(|(n_stock, n_consigned)| *n_stock >= 0 && n_consigned - n_stock > 0)
                .count();

            match batch.tables.get("Liquidacion_Consignaciones_ACME.xlsx") {
                None => {
                    prop_assert_eq!(n_expected, 0);
                    prop_assert_eq!(batch.no_data, vec!["ACME".to_string()]);
                }
                Some(settlement) => {
                    let l_rows = settlement.rows().expect("rows");
                    prop_assert_eq!(l_rows.len(), n_expected);
                    for row in &l_rows {
                        let n_idx: usize = row.isbn.parse().expect("row index");
                        let (n_stock, n_consigned) = l_quantities[n_idx];
                        prop_assert!(n_stock >= 0);
                        prop_assert_eq!(row.units, n_consigned - n_stock);
                        prop_assert!(row.units > 0);
                    }
                    for pair in l_rows.windows(2) {
                        prop_assert!(pair[0].product <= pair[1].product);
                    }
                }
            }
        }
    }
}
