//! Index level expressed in units of another asset.

/// `level / price`. A missing level stays missing.
///
/// Division is plain IEEE: a zero price gives `inf` (or `NaN` for `0 / 0`),
/// which is carried through rather than trapped.
pub fn per_unit(level: Option<f64>, price: f64) -> Option<f64> {
    level.map(|l| l / price)
}

/// Column name for an index label priced in gold, e.g. `DJI_per_oz_gold`.
pub fn ratio_column(label: &str) -> String {
    format!("{label}_per_oz_gold")
}
