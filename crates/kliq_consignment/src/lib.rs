//! `kliq_consignment` v1:
//! Consignment settlement kernel.
//!
//! Data flows master bytes -> raw table -> settlement tables -> report bytes -> archive.
//! - `conf`       : constants and default presets
//! - `spec`       : specs/models/errors
//! - `util`       : pure helper functions
//! - `reader`     : master sheet loader and publisher extractor
//! - `settlement` : settlement calculator and end-to-end pipeline
//! - `writer`     : per-publisher report renderer
//! - `archive`    : zip packaging of rendered reports
pub mod archive;
pub mod conf;
pub mod reader;
pub mod settlement;
pub mod spec;
pub mod util;
pub mod writer;

#[cfg(test)]
mod fixture;

pub use archive::package_reports;
pub use conf::{
    C_PUBLISHER_SENTINEL, N_IDX_ROW_HEADER, TUP_COLS_REQUIRED, derive_report_filename,
    derive_report_title,
};
pub use reader::{
    derive_publisher_ids, extract_publisher_columns, parse_contact_book, parse_publishers,
    parse_table,
};
pub use settlement::{compute_settlements, generate_reports, generate_reports_with_layout};
pub use spec::{
    DecodeError, EnumCellValue, LiquidationError, SpecCellFormat, SpecColumnWidthPlan,
    SpecContactInfo, SpecLiquidationOutput, SpecPublisherColumn, SpecRawTable, SpecReportLayout,
    SpecSettlementBatch, SpecSettlementRow, SpecSettlementTable, TypeContactBook,
};
pub use util::{coerce_isbn_integer, derive_publisher_id, normalize_isbn, plan_column_widths};
pub use writer::{derive_logo_image, render_report, render_report_with_layout};
