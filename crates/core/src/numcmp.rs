//! Numeric comparison operators (§4.1). `<=>` returns `undef` rather than a
//! number when either operand is NaN, mirroring the one comparison in this
//! value system whose result is not total.

use crate::arithmetic::int_mode;
use crate::value::Sv;
use std::cmp::Ordering;

/// Same mode decision arithmetic uses: exact `i64` comparison when both
/// operands are int-mode, else `f64` comparison (which is the only option
/// once either side is a float or a fractional string). `f64` only carries
/// 53 bits of exact integer precision, so routing int-mode operands through
/// it would silently equate large `i64` values that differ beyond `2^53`.
fn cmp(a: &Sv, b: &Sv) -> Option<Ordering> {
    if int_mode(a, b) {
        Some(a.as_int().cmp(&b.as_int()))
    } else {
        a.as_float().partial_cmp(&b.as_float())
    }
}

pub fn num_lt(a: &Sv, b: &Sv) -> bool {
    cmp(a, b) == Some(Ordering::Less)
}

pub fn num_le(a: &Sv, b: &Sv) -> bool {
    matches!(cmp(a, b), Some(Ordering::Less) | Some(Ordering::Equal))
}

pub fn num_eq(a: &Sv, b: &Sv) -> bool {
    cmp(a, b) == Some(Ordering::Equal)
}

pub fn num_ge(a: &Sv, b: &Sv) -> bool {
    matches!(cmp(a, b), Some(Ordering::Greater) | Some(Ordering::Equal))
}

pub fn num_gt(a: &Sv, b: &Sv) -> bool {
    cmp(a, b) == Some(Ordering::Greater)
}

/// `<=>`. `-1`/`0`/`1` as an SV, or `undef` if either side is NaN.
pub fn spaceship(a: &Sv, b: &Sv) -> Sv {
    match cmp(a, b) {
        Some(Ordering::Less) => Sv::new_int(-1),
        Some(Ordering::Equal) => Sv::new_int(0),
        Some(Ordering::Greater) => Sv::new_int(1),
        None => Sv::new_undef(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SvType;

    #[test]
    fn spaceship_orders_numerically() {
        assert_eq!(spaceship(&Sv::new_int(1), &Sv::new_int(2)).as_int(), -1);
        assert_eq!(spaceship(&Sv::new_int(2), &Sv::new_int(2)).as_int(), 0);
        assert_eq!(spaceship(&Sv::new_int(3), &Sv::new_int(2)).as_int(), 1);
    }

    #[test]
    fn spaceship_with_nan_is_undef() {
        let nan = Sv::new_float(f64::NAN);
        let r = spaceship(&nan, &Sv::new_int(1));
        assert_eq!(r.ty(), SvType::Undef);
    }

    #[test]
    fn numeric_comparisons_ignore_string_shape() {
        assert!(num_lt(&Sv::new_string("9"), &Sv::new_string("10")));
    }

    #[test]
    fn int_mode_comparison_is_exact_beyond_f64_precision() {
        // 9007199244740993 and ...992 differ by 1 but round to the same
        // f64 (2^53's worth of exact integer precision has run out), so
        // this only comes out right if both operands are int-mode and
        // compared as `i64` rather than routed through `as_float()`.
        let a = Sv::new_int(9_007_199_254_740_993);
        let b = Sv::new_int(9_007_199_254_740_992);
        assert!(!num_eq(&a, &b));
        assert!(num_gt(&a, &b));
        assert!(num_lt(&b, &a));
        assert_eq!(spaceship(&a, &b).as_int(), 1);
    }
}
