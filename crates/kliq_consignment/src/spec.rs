//! Shared settlement models, options and error types.

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, PolarsError};
use rust_xlsxwriter::XlsxError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::result::ZipError;

use crate::conf::{
    C_COL_ISBN, C_COL_PRODUCT, C_COL_UNITS, C_REPORT_CLIENT_BLOCK, C_REPORT_SHEET_NAME,
    TUP_CONTACT_LABELS,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification converted into `rust_xlsxwriter::Format` at render time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RawTable

static CELL_BLANK: EnumCellValue = EnumCellValue::None;

/// Normalized cell value of the master sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Whole number (including whole-valued floats).
    Integer(i64),
    /// Fractional numeric value.
    Number(f64),
}

impl EnumCellValue {
    /// Text rendition used for names and codes.
    ///
    /// Blank cells become an empty string.
    pub fn to_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Number(n) => n.to_string(),
        }
    }

    /// Numeric view; numeric-looking text is accepted.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::None => None,
            Self::Integer(n) => Some(*n as f64),
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) => None,
            Self::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Whether the cell holds no value.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::None => true,
            Self::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// Parsed master sheet: header names plus data rows below the header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRawTable {
    /// Trimmed, unique column names in sheet order.
    pub columns: Vec<String>,
    /// Data rows; each row has exactly `columns.len()` cells.
    pub rows: Vec<Vec<EnumCellValue>>,
}

impl SpecRawTable {
    /// Number of data rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c_name| c_name == name)
    }

    /// Whether a column with exactly this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column, top to bottom.
    ///
    /// Rows shorter than the header read as blank in the missing positions.
    pub fn column_values(&self, name: &str) -> Option<Vec<&EnumCellValue>> {
        let n_idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(n_idx).unwrap_or(&CELL_BLANK))
                .collect(),
        )
    }
}

/// Column recognized as a publisher's consigned quantities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpecPublisherColumn {
    /// Column name as found in the sheet.
    pub column_name: String,
    /// Normalized publisher identifier.
    pub publisher_id: String,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SettlementTable

/// One settled product line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSettlementRow {
    /// Units to return to the publisher (always >= 1).
    pub units: i64,
    /// Product name.
    pub product: String,
    /// Normalized code (first `/` segment, at most 13 chars).
    pub isbn: String,
}

/// Settlement table of one publisher.
///
/// Columns are, in order, [`C_COL_UNITS`], [`C_COL_PRODUCT`] and [`C_COL_ISBN`].
#[derive(Debug, Clone)]
pub struct SpecSettlementTable {
    /// Publisher identifier.
    pub publisher_id: String,
    /// Underlying frame.
    pub df: DataFrame,
}

impl SpecSettlementTable {
    /// Number of settled product lines.
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Column names in display order.
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Materialize typed rows.
    pub fn rows(&self) -> Result<Vec<SpecSettlementRow>, LiquidationError> {
        let ca_units = self.df.column(C_COL_UNITS)?.as_materialized_series().i64()?;
        let ca_product = self
            .df
            .column(C_COL_PRODUCT)?
            .as_materialized_series()
            .str()?;
        let ca_isbn = self.df.column(C_COL_ISBN)?.as_materialized_series().str()?;

        Ok(ca_units
            .into_iter()
            .zip(ca_product)
            .zip(ca_isbn)
            .map(|((units, product), isbn)| SpecSettlementRow {
                units: units.unwrap_or_default(),
                product: product.unwrap_or_default().to_string(),
                isbn: isbn.unwrap_or_default().to_string(),
            })
            .collect())
    }
}

/// Result of the settlement stage for one upload.
#[derive(Debug, Clone, Default)]
pub struct SpecSettlementBatch {
    /// Settlement tables keyed by report filename.
    pub tables: BTreeMap<String, SpecSettlementTable>,
    /// Publishers without any qualifying row.
    pub no_data: Vec<String>,
    /// Required columns absent from the sheet; non-empty means the batch was discarded.
    pub missing_columns: Vec<String>,
}

impl SpecSettlementBatch {
    /// Whether no settlement table was produced.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Final pipeline output handed to the calling layer.
#[derive(Debug, Clone, Default)]
pub struct SpecLiquidationOutput {
    /// Report bytes keyed by report filename.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Publishers without any qualifying row.
    pub no_data: Vec<String>,
    /// Required columns absent from the sheet.
    pub missing_columns: Vec<String>,
}

impl SpecLiquidationOutput {
    /// Generated filenames in archive order.
    pub fn filenames(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ContactInfo

/// Per-publisher contact record printed in the report header block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpecContactInfo {
    /// Supplier name.
    #[serde(rename = "PROVEEDOR", default)]
    pub supplier: Option<String>,
    /// Contact person.
    #[serde(rename = "CONTACTO", default)]
    pub contact: Option<String>,
    /// Phone and/or mail.
    #[serde(rename = "FONO / MAIL", alias = "FONO_MAIL", default)]
    pub phone_mail: Option<String>,
    /// Discount terms.
    #[serde(rename = "DESCUENTO", default)]
    pub discount: Option<String>,
    /// Payment terms.
    #[serde(rename = "PAGO", default)]
    pub payment: Option<String>,
    /// Settlement date.
    #[serde(rename = "FECHA", default)]
    pub date: Option<String>,
}

impl SpecContactInfo {
    /// Lookup by report label key (label text without the trailing colon).
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "PROVEEDOR" => &self.supplier,
            "CONTACTO" => &self.contact,
            "FONO / MAIL" => &self.phone_mail,
            "DESCUENTO" => &self.discount,
            "PAGO" => &self.payment,
            "FECHA" => &self.date,
            _ => return None,
        };
        value.as_deref()
    }
}

/// Contact records keyed by publisher identifier.
pub type TypeContactBook = BTreeMap<String, SpecContactInfo>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportLayout

/// Fixed geometry and literal texts of a settlement report.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecReportLayout {
    /// Worksheet name.
    pub sheet_name: String,
    /// Company identity block.
    pub client_block: String,
    /// Contact labels, one per row.
    pub contact_labels: Vec<String>,
    /// First row height in points.
    pub height_row_first: f64,
    /// Logo box width in pixels.
    pub width_logo: f64,
    /// Logo box height in pixels.
    pub height_logo: f64,
    /// Zero-based first row of the contact block.
    pub row_contact_start: usize,
    /// Zero-based header row of the data table.
    pub row_table_start: usize,
    /// Zero-based first column of the data table.
    pub col_table_start: usize,
    /// Padding added to the units header length.
    pub width_units_padding: usize,
    /// Padding added to the longest product name.
    pub width_product_padding: usize,
    /// Fixed ISBN column width.
    pub width_isbn: usize,
}

impl Default for SpecReportLayout {
    fn default() -> Self {
        Self {
            sheet_name: C_REPORT_SHEET_NAME.to_string(),
            client_block: C_REPORT_CLIENT_BLOCK.to_string(),
            contact_labels: TUP_CONTACT_LABELS.iter().map(ToString::to_string).collect(),
            height_row_first: 45.0,
            width_logo: 80.0,
            height_logo: 50.0,
            row_contact_start: 7,
            row_table_start: 15,
            col_table_start: 1,
            width_units_padding: 2,
            width_product_padding: 5,
            width_isbn: 15,
        }
    }
}

/// Planned widths of the three data columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecColumnWidthPlan {
    /// Units column width.
    pub width_units: usize,
    /// Product column width.
    pub width_product: usize,
    /// ISBN column width.
    pub width_isbn: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Non-fatal failure at an optional enhancement point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Logo bytes are not a supported image.
    #[error("logo could not be decoded: {0}")]
    Logo(String),
    /// ISBN text is not an integer.
    #[error("ISBN {0:?} is not an integer")]
    Isbn(String),
}

/// "Top-level call failed" errors.
#[derive(Debug, Error)]
pub enum LiquidationError {
    /// Upload bytes are not a spreadsheet, or it has no first sheet.
    #[error("could not parse upload: {0}")]
    MalformedInput(String),
    /// Pipeline ran but produced no report.
    #[error("no settlements were generated")]
    NoSettlements,
    /// Frame operation failed.
    #[error("table error: {0}")]
    Table(#[from] PolarsError),
    /// Workbook serialization failed.
    #[error("xlsx write error: {0}")]
    Render(#[from] XlsxError),
    /// Archive serialization failed.
    #[error("archive error: {0}")]
    Archive(#[from] ZipError),
    /// Archive stream write failed.
    #[error("archive io error: {0}")]
    Io(#[from] std::io::Error),
    /// Contact book is not valid JSON for [`TypeContactBook`].
    #[error("contact book error: {0}")]
    ContactBook(#[from] serde_json::Error),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
