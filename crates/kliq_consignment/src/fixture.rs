//! In-memory master workbooks for tests.

use rust_xlsxwriter::Workbook;

use crate::conf::N_IDX_ROW_HEADER;
use crate::spec::EnumCellValue;

pub(crate) fn cell_str(value: &str) -> EnumCellValue {
    EnumCellValue::String(value.to_string())
}

pub(crate) fn cell_int(value: i64) -> EnumCellValue {
    EnumCellValue::Integer(value)
}

/// Build a master workbook: a title line, blank filler, header at the sixth row.
pub(crate) fn build_master_workbook(header: &[&str], rows: &[Vec<EnumCellValue>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .write_string(0, 0, "INVENTARIO CONSIGNACIONES")
        .expect("title");

    let n_row_header = N_IDX_ROW_HEADER as u32;
    for (n_idx_col, c_name) in header.iter().enumerate() {
        if c_name.is_empty() {
            continue;
        }
        worksheet
            .write_string(n_row_header, n_idx_col as u16, *c_name)
            .expect("header");
    }

    for (n_idx_row, row) in rows.iter().enumerate() {
        let n_row = n_row_header + 1 + n_idx_row as u32;
        for (n_idx_col, value) in row.iter().enumerate() {
            let n_col = n_idx_col as u16;
            match value {
                EnumCellValue::None => {}
                EnumCellValue::String(val) => {
                    worksheet.write_string(n_row, n_col, val).expect("string");
                }
                EnumCellValue::Integer(val) => {
                    worksheet
                        .write_number(n_row, n_col, *val as f64)
                        .expect("integer");
                }
                EnumCellValue::Number(val) => {
                    worksheet.write_number(n_row, n_col, *val).expect("number");
                }
            }
        }
    }

    workbook.save_to_buffer().expect("workbook buffer")
}
