//! Local file names for downloaded pages.
//!
//! A page is stored as `<index>-<basename>`, where `index` is its zero based position in the
//! chapter and `basename` is the last path segment of its locator. Indices below 10 are padded
//! to two digits so that directory listings of chapters with less than 100 pages sort in reading
//! order. Wider indices are written as is: `100-x` sorts before `20-x`, and that is kept on
//! purpose so existing downloads keep their names.

/// Last `/` separated segment of `locator`, or the whole locator if it has no `/`
pub fn locator_basename(locator: &str) -> &str {
    match locator.rsplit_once('/') {
        Some((_, basename)) => basename,
        None => locator,
    }
}

/// File name for the page at position `index` that is fetched from `locator`
pub fn page_file_name(index: usize, locator: &str) -> String {
    format!("{index:02}-{}", locator_basename(locator))
}
