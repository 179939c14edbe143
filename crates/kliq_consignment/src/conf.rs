//! Settlement constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::SpecCellFormat;

/// Zero-based row index of the header row in the master sheet.
pub const N_IDX_ROW_HEADER: usize = 5;

/// Product name column.
pub const C_COL_PRODUCT: &str = "Producto";
/// Product code column (accent-free canonical spelling).
pub const C_COL_CODE: &str = "Codigo";
/// Accented spelling renamed to [`C_COL_CODE`] on load.
pub const C_COL_CODE_ACCENTED: &str = "Código";
/// Warehouse stock column.
pub const C_COL_STOCK: &str = "BODEGA GENERAL BARI";
/// Working name of the publisher's consigned-quantity column.
pub const C_COL_CONSIGNED: &str = "Consignaciones";
/// Computed settlement column.
pub const C_COL_UNITS: &str = "Unidades a liquidar";
/// Normalized code column in the settlement table.
pub const C_COL_ISBN: &str = "ISBN";
/// Columns that must all exist for any settlement to be computed.
pub const TUP_COLS_REQUIRED: [&str; 3] = [C_COL_PRODUCT, C_COL_CODE, C_COL_STOCK];

/// Case-insensitive marker for publisher columns.
pub const C_PATTERN_PUBLISHER_COLUMN: &str = r"(?i)consignacion";
/// Token stripped from a publisher column name.
pub const C_PATTERN_PUBLISHER_TOKEN: &str = r"(?i)consignacion(es)?";
/// Identifier used when nothing is left of the column name.
pub const C_PUBLISHER_SENTINEL: &str = "SIN EDITORIAL";

/// Maximum ISBN length after normalization.
pub const N_LEN_ISBN_MAX: usize = 13;

/// Report filename prefix; the publisher identifier and `.xlsx` follow.
pub const C_REPORT_FILENAME_PREFIX: &str = "Liquidacion_Consignaciones_";
/// Report title prefix; the publisher identifier follows.
pub const C_REPORT_TITLE_PREFIX: &str = "LIQUIDACION CONSIGNACIONES";
/// Report worksheet name.
pub const C_REPORT_SHEET_NAME: &str = "Liquidación";

/// Fixed company identity block.
pub const C_REPORT_CLIENT_BLOCK: &str = "CLIENTE: Librería Virtual y Distribuidora El Ático Ltda.\n\
Venta y Distribución de Libros\n\
General Bari 234, Providencia - Santiago, Teléfono: (56)2 21452308\n\
Rut: 76082908-0";

/// Contact block labels, in display order.
pub const TUP_CONTACT_LABELS: [&str; 6] = [
    "PROVEEDOR:",
    "CONTACTO:",
    "FONO / MAIL:",
    "DESCUENTO:",
    "PAGO:",
    "FECHA:",
];

/// Last zero-based column the report layout may occupy (column `E`).
pub const N_IDX_COL_LAYOUT_MAX: usize = 4;

/// Build report filename for one publisher identifier.
pub fn derive_report_filename(publisher_id: &str) -> String {
    format!("{C_REPORT_FILENAME_PREFIX}{publisher_id}.xlsx")
}

/// Build report title for one publisher identifier.
pub fn derive_report_title(publisher_id: &str) -> String {
    format!("{C_REPORT_TITLE_PREFIX} {publisher_id}")
}

/// Build default named format presets used by [`crate::writer::render_report`].
pub fn derive_default_report_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some("Arial".to_string()),
        font_size: Some(10),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(
        "title".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            font_size: Some(16),
            bold: Some(true),
            align: Some("center".to_string()),
            valign: Some("vcenter".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "client".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            align: Some("center".to_string()),
            valign: Some("top".to_string()),
            text_wrap: Some(true),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "label".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            font_size: Some(11),
            bold: Some(true),
            border: Some(1),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "contact".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            border: Some(1),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "header".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            font_size: Some(11),
            bold: Some(true),
            align: Some("center".to_string()),
            valign: Some("vcenter".to_string()),
            border: Some(1),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "text".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            align: Some("left".to_string()),
            valign: Some("vcenter".to_string()),
            border: Some(1),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "integer".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            align: Some("left".to_string()),
            valign: Some("vcenter".to_string()),
            border: Some(1),
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
    );

    dict_fmt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_filename_uses_identifier_verbatim() {
        assert_eq!(
            derive_report_filename("EDITORIAL XYZ"),
            "Liquidacion_Consignaciones_EDITORIAL XYZ.xlsx"
        );
        assert_eq!(
            derive_report_title("ACME"),
            "LIQUIDACION CONSIGNACIONES ACME"
        );
    }

    #[test]
    fn test_default_formats_cover_every_report_role() {
        let dict_fmt = derive_default_report_formats();
        for c_key in ["title", "client", "label", "contact", "header", "text", "integer"] {
            let fmt = dict_fmt.get(c_key).expect("preset");
            assert_eq!(fmt.font_name.as_deref(), Some("Arial"));
        }
        assert_eq!(dict_fmt["title"].font_size, Some(16));
        assert_eq!(dict_fmt["integer"].num_format.as_deref(), Some("0"));
    }
}
