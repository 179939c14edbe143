//! Zip packaging of rendered settlement reports.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::spec::LiquidationError;

/// Pack report files into one zip archive, in filename order.
///
/// Entry timestamps are pinned so equal inputs give equal archive bytes.
pub fn package_reports(files: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, LiquidationError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (c_filename, v_report) in files {
        writer.start_file(c_filename.as_str(), options)?;
        writer.write_all(v_report)?;
    }
    let v_archive = writer.finish()?.into_inner();

    debug!(
        n_files = files.len(),
        n_bytes = v_archive.len(),
        "reports packaged"
    );
    Ok(v_archive)
}
