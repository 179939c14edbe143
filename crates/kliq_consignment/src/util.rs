//! Stateless helper utilities shared by the reader, settlement and writer stages.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::conf::{
    C_PATTERN_PUBLISHER_COLUMN, C_PATTERN_PUBLISHER_TOKEN, C_PUBLISHER_SENTINEL, N_LEN_ISBN_MAX,
};
use crate::spec::{DecodeError, SpecColumnWidthPlan, SpecReportLayout};

static RE_PUBLISHER_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(C_PATTERN_PUBLISHER_COLUMN).expect("publisher column regex"));
static RE_PUBLISHER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(C_PATTERN_PUBLISHER_TOKEN).expect("publisher token regex"));
static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static RE_STRIPPED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:0-9-]+").expect("stripped chars regex"));

////////////////////////////////////////////////////////////////////////////////
// #region PublisherIdentifiers

/// Whether a column name marks a publisher's consigned quantities.
pub fn is_publisher_column(column_name: &str) -> bool {
    RE_PUBLISHER_COLUMN.is_match(column_name)
}

/// Derive the publisher identifier from a consignment column name.
///
/// Colons, digits and hyphens are dropped, every `consignacion(es)` token is
/// removed, whitespace runs collapse to one space, and the rest is trimmed and
/// upper-cased. An empty result maps to [`C_PUBLISHER_SENTINEL`].
pub fn derive_publisher_id(column_name: &str) -> String {
    let mut c_name = RE_STRIPPED_CHARS.replace_all(column_name, "").into_owned();
    while RE_PUBLISHER_TOKEN.is_match(&c_name) {
        c_name = RE_PUBLISHER_TOKEN.replace_all(&c_name, "").into_owned();
    }
    let c_name = RE_WHITESPACE.replace_all(&c_name, " ");
    let c_name = c_name.trim().to_uppercase();

    if c_name.is_empty() {
        C_PUBLISHER_SENTINEL.to_string()
    } else {
        c_name
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CodeNormalization

/// Keep the first `/` segment of a code, truncated to [`N_LEN_ISBN_MAX`] chars.
pub fn normalize_isbn(code: &str) -> String {
    code.split('/')
        .next()
        .unwrap_or_default()
        .chars()
        .take(N_LEN_ISBN_MAX)
        .collect()
}

/// Parse a normalized ISBN as an integer cell value.
pub fn coerce_isbn_integer(isbn: &str) -> Result<i64, DecodeError> {
    isbn.trim()
        .parse::<i64>()
        .map_err(|_| DecodeError::Isbn(isbn.to_string()))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderNormalization

/// Disambiguate repeated column names as `name.1`, `name.2`, ...
pub fn derive_unique_column_names(columns: Vec<String>) -> Vec<String> {
    let mut set_names_taken: BTreeSet<String> = BTreeSet::new();
    let mut dict_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut l_names = Vec::with_capacity(columns.len());

    for c_name in columns {
        if set_names_taken.insert(c_name.clone()) {
            dict_counts.insert(c_name.clone(), 0);
            l_names.push(c_name);
            continue;
        }

        let n_count = dict_counts.entry(c_name.clone()).or_insert(0);
        let c_candidate = loop {
            *n_count += 1;
            let c_candidate = format!("{c_name}.{n_count}");
            if !set_names_taken.contains(&c_candidate) {
                break c_candidate;
            }
        };
        set_names_taken.insert(c_candidate.clone());
        l_names.push(c_candidate);
    }

    l_names
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnWidths

/// Displayed length of a text, counted in characters.
pub fn estimate_text_width(text: &str) -> usize {
    text.chars().count()
}

/// Plan data column widths so the merged title stays un-clipped.
///
/// Any deficit against twice the title length goes to the product column.
pub fn plan_column_widths<'a>(
    header_units: &str,
    header_product: &str,
    products: impl IntoIterator<Item = &'a str>,
    title: &str,
    layout: &SpecReportLayout,
) -> SpecColumnWidthPlan {
    let n_width_units = estimate_text_width(header_units) + layout.width_units_padding;
    let n_width_product_longest = products
        .into_iter()
        .map(estimate_text_width)
        .max()
        .unwrap_or(0);
    let mut n_width_product = usize::max(n_width_product_longest, estimate_text_width(header_product))
        + layout.width_product_padding;
    let n_width_isbn = layout.width_isbn;

    let n_width_required = 2 * estimate_text_width(title);
    let n_width_current = n_width_units + n_width_product + n_width_isbn;
    if n_width_required > n_width_current {
        n_width_product += n_width_required - n_width_current;
    }

    SpecColumnWidthPlan {
        width_units: n_width_units,
        width_product: n_width_product,
        width_isbn: n_width_isbn,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
