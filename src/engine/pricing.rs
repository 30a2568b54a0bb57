//! Undercut pricing.

use crate::domain::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("price {candidate} is below the minimum {min_price}")]
pub struct BelowMinimum {
    pub candidate: Decimal,
    pub min_price: Decimal,
}

/// Price one `increment` under `lowest`, refusing to go below `min_price`.
pub fn undercut_price(
    lowest: Decimal,
    increment: Decimal,
    min_price: Decimal,
) -> Result<Decimal, BelowMinimum> {
    let candidate = lowest - increment;
    if candidate < min_price {
        return Err(BelowMinimum {
            candidate,
            min_price,
        });
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn undercuts_by_increment() {
        assert_eq!(undercut_price(d("10"), d("0.5"), d("1")).unwrap(), d("9.5"));
    }

    #[test]
    fn minimum_itself_is_allowed() {
        assert_eq!(undercut_price(d("2"), d("1"), d("1")).unwrap(), d("1"));
    }

    #[test]
    fn below_minimum_is_rejected() {
        let err = undercut_price(d("1.2"), d("0.5"), d("1")).unwrap_err();
        assert_eq!(err.candidate, d("0.7"));
        assert_eq!(err.min_price, d("1"));
    }
}
