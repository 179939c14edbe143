//! Settlement report renderer built on `rust_xlsxwriter`.

use std::collections::BTreeMap;

use polars::prelude::AnyValue;
use rust_xlsxwriter::{
    DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, Image, Workbook, Worksheet,
    XlsxError,
};
use tracing::{debug, warn};

use crate::conf::{
    C_COL_PRODUCT, C_COL_UNITS, N_IDX_COL_LAYOUT_MAX, derive_default_report_formats,
    derive_report_title,
};
use crate::spec::{
    DecodeError, EnumCellValue, LiquidationError, SpecCellFormat, SpecContactInfo,
    SpecReportLayout, SpecSettlementTable,
};
use crate::util::{coerce_isbn_integer, plan_column_widths};

/// Offset of the ISBN column inside the data table.
const N_OFFSET_COL_ISBN: usize = 2;

/// Render one publisher's settlement report with the default layout.
pub fn render_report(
    table: &SpecSettlementTable,
    publisher_id: &str,
    v_logo: Option<&[u8]>,
    contact: Option<&SpecContactInfo>,
) -> Result<Vec<u8>, LiquidationError> {
    render_report_with_layout(
        table,
        publisher_id,
        v_logo,
        contact,
        &SpecReportLayout::default(),
    )
}

/// Render one publisher's settlement report into workbook bytes.
///
/// The logo and the contact record are optional; a logo that cannot be
/// decoded is skipped and the rest of the report is still produced.
pub fn render_report_with_layout(
    table: &SpecSettlementTable,
    publisher_id: &str,
    v_logo: Option<&[u8]>,
    contact: Option<&SpecContactInfo>,
    layout: &SpecReportLayout,
) -> Result<Vec<u8>, LiquidationError> {
    let dict_fmt = derive_report_formats();
    let title = derive_report_title(publisher_id);
    let n_col_first = layout.col_table_start;
    let n_col_last = n_col_first + N_OFFSET_COL_ISBN;

    let mut workbook = Workbook::new();
    workbook.set_properties(
        &DocProperties::new().set_creation_datetime(&derive_fixed_creation_datetime()?),
    );

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&layout.sheet_name)?;
    worksheet.set_screen_gridlines(false);
    worksheet.set_row_height(0, layout.height_row_first)?;

    if let Some(v_logo) = v_logo {
        match derive_logo_image(v_logo, layout) {
            Ok(image) => {
                worksheet.insert_image(0, 0, &image)?;
            }
            Err(err) => warn!(publisher = publisher_id, %err, "rendering report without logo"),
        }
    }

    worksheet.merge_range(
        0,
        cast_col_num(n_col_first)?,
        1,
        cast_col_num(n_col_last)?,
        &title,
        &dict_fmt["title"],
    )?;
    worksheet.merge_range(
        2,
        cast_col_num(n_col_first)?,
        5,
        cast_col_num(n_col_last)?,
        &layout.client_block,
        &dict_fmt["client"],
    )?;

    write_contact_block(worksheet, contact, layout, &dict_fmt)?;
    write_data_table(worksheet, table, layout, &dict_fmt)?;

    let l_products = table
        .rows()?
        .into_iter()
        .map(|row| row.product)
        .collect::<Vec<_>>();
    let plan_widths = plan_column_widths(
        C_COL_UNITS,
        C_COL_PRODUCT,
        l_products.iter().map(String::as_str),
        &title,
        layout,
    );
    worksheet.set_column_width(cast_col_num(n_col_first)?, plan_widths.width_units as f64)?;
    worksheet.set_column_width(
        cast_col_num(n_col_first + 1)?,
        plan_widths.width_product as f64,
    )?;
    worksheet.set_column_width(cast_col_num(n_col_last)?, plan_widths.width_isbn as f64)?;

    debug!(
        publisher = publisher_id,
        n_rows = table.height(),
        "settlement report rendered"
    );
    Ok(workbook.save_to_buffer()?)
}

/// Decode logo bytes and scale them into the layout's logo box.
///
/// The box is in screen pixels whatever DPI the image declares.
pub fn derive_logo_image(v_logo: &[u8], layout: &SpecReportLayout) -> Result<Image, DecodeError> {
    let image = Image::new_from_buffer(v_logo).map_err(|err| DecodeError::Logo(err.to_string()))?;
    if image.width() <= 0.0 || image.height() <= 0.0 {
        return Err(DecodeError::Logo("image has no extent".to_string()));
    }

    Ok(image.set_scale_to_size(layout.width_logo, layout.height_logo, false))
}

fn derive_report_formats() -> BTreeMap<&'static str, Format> {
    let dict_spec = derive_default_report_formats();
    ["title", "client", "label", "contact", "header", "text", "integer"]
        .into_iter()
        .map(|c_key| {
            let fmt = dict_spec
                .get(c_key)
                .map(derive_rust_xlsx_format)
                .unwrap_or_else(Format::new);
            (c_key, fmt)
        })
        .collect()
}

fn derive_fixed_creation_datetime() -> Result<ExcelDateTime, XlsxError> {
    ExcelDateTime::from_ymd(2000, 1, 1)
}

fn write_contact_block(
    worksheet: &mut Worksheet,
    contact: Option<&SpecContactInfo>,
    layout: &SpecReportLayout,
    dict_fmt: &BTreeMap<&'static str, Format>,
) -> Result<(), LiquidationError> {
    let n_col_label = cast_col_num(layout.col_table_start)?;
    let n_col_value_first = cast_col_num(layout.col_table_start + 1)?;
    let n_col_value_last = cast_col_num(layout.col_table_start + N_OFFSET_COL_ISBN)?;

    for (n_offset, c_label) in layout.contact_labels.iter().enumerate() {
        let n_row = cast_row_num(layout.row_contact_start + n_offset)?;
        let c_key = c_label.replace(':', "");
        let c_value = contact
            .and_then(|info| info.get(c_key.trim()))
            .unwrap_or_default();

        worksheet.write_string_with_format(n_row, n_col_label, c_label, &dict_fmt["label"])?;
        worksheet.merge_range(
            n_row,
            n_col_value_first,
            n_row,
            n_col_value_last,
            c_value,
            &dict_fmt["contact"],
        )?;
    }
    Ok(())
}

fn write_data_table(
    worksheet: &mut Worksheet,
    table: &SpecSettlementTable,
    layout: &SpecReportLayout,
    dict_fmt: &BTreeMap<&'static str, Format>,
) -> Result<(), LiquidationError> {
    let l_colnames = table.column_names();
    let n_width_max = (N_IDX_COL_LAYOUT_MAX + 1).saturating_sub(layout.col_table_start);
    if l_colnames.len() > n_width_max {
        warn!(
            n_cols = l_colnames.len(),
            n_cols_kept = n_width_max,
            "dropping settlement columns past the report layout"
        );
    }
    let n_width = usize::min(l_colnames.len(), n_width_max);

    for (n_offset, c_name) in l_colnames.iter().take(n_width).enumerate() {
        worksheet.write_string_with_format(
            cast_row_num(layout.row_table_start)?,
            cast_col_num(layout.col_table_start + n_offset)?,
            c_name,
            &dict_fmt["header"],
        )?;
    }

    let l_cols = table.df.get_columns();
    for n_idx_row in 0..table.height() {
        let n_row = layout.row_table_start + 1 + n_idx_row;
        for (n_offset, col) in l_cols.iter().take(n_width).enumerate() {
            let value_raw = derive_cell_value_from_any_value(col.get(n_idx_row)?);
            let (value, fmt) = if n_offset == N_OFFSET_COL_ISBN {
                (derive_isbn_cell_value(value_raw), &dict_fmt["integer"])
            } else {
                (value_raw, &dict_fmt["text"])
            };
            write_cell_with_format(
                worksheet,
                n_row,
                layout.col_table_start + n_offset,
                &value,
                fmt,
            )?;
        }
    }
    Ok(())
}

/// ISBN cells become integers when the text parses; otherwise they stay text.
fn derive_isbn_cell_value(value: EnumCellValue) -> EnumCellValue {
    match value {
        EnumCellValue::String(val) => match coerce_isbn_integer(&val) {
            Ok(n_isbn) => EnumCellValue::Integer(n_isbn),
            Err(_) => EnumCellValue::String(val),
        },
        other => other,
    }
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::UInt8(val) => EnumCellValue::Integer(val as i64),
        AnyValue::UInt16(val) => EnumCellValue::Integer(val as i64),
        AnyValue::UInt32(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int8(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int16(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int32(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int64(val) => EnumCellValue::Integer(val),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), LiquidationError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) if val.is_empty() => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Integer(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val as f64, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, LiquidationError> {
    u32::try_from(value).map_err(|_| XlsxError::RowColumnLimitError.into())
}

fn cast_col_num(value: usize) -> Result<u16, LiquidationError> {
    u16::try_from(value).map_err(|_| XlsxError::RowColumnLimitError.into())
}
