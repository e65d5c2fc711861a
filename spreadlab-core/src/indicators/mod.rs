//! Indicators computed over close-price history.

pub mod rsi;

pub use rsi::Rsi;

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() < tol,
        "expected {expected}, got {actual} (tol {tol})"
    );
}
