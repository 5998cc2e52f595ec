//! Binary arithmetic and bitwise operators over SVs (§4.1).
//!
//! Each operator picks integer or floating-point mode per operand, the way
//! numeric context does generally: if both sides coerce cleanly to an
//! integer and the integer result does not overflow, the result is an
//! integer SV; otherwise the operation is carried out in `f64`.

use crate::error::{QuillError, QuillResult};
use crate::string_ops::{looks_numeric_for_increment, magic_increment_str};
use crate::value::{Sv, SvType};

/// An operand is "integer-mode" if its current representation is already
/// an integer (or undef, numerically zero) rather than a float or a string
/// that only parses as a fraction.
pub(crate) fn is_int_mode(sv: &Sv) -> bool {
    match sv.ty() {
        SvType::Int | SvType::Undef => true,
        SvType::Float => false,
        SvType::Str => {
            let s = sv.as_string();
            let text = String::from_utf8_lossy(&s);
            let trimmed = text.trim();
            !trimmed.is_empty()
                && !trimmed.contains(['.', 'e', 'E'])
                && trimmed.trim_start_matches(['+', '-']).chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

pub(crate) fn int_mode(a: &Sv, b: &Sv) -> bool {
    is_int_mode(a) && is_int_mode(b)
}

pub fn add(a: &Sv, b: &Sv) -> Sv {
    if int_mode(a, b) {
        if let Some(r) = a.as_int().checked_add(b.as_int()) {
            return Sv::new_int(r);
        }
    }
    Sv::new_float(a.as_float() + b.as_float())
}

pub fn subtract(a: &Sv, b: &Sv) -> Sv {
    if int_mode(a, b) {
        if let Some(r) = a.as_int().checked_sub(b.as_int()) {
            return Sv::new_int(r);
        }
    }
    Sv::new_float(a.as_float() - b.as_float())
}

pub fn multiply(a: &Sv, b: &Sv) -> Sv {
    if int_mode(a, b) {
        if let Some(r) = a.as_int().checked_mul(b.as_int()) {
            return Sv::new_int(r);
        }
    }
    Sv::new_float(a.as_float() * b.as_float())
}

/// Division is always float-mode, even for exact integer operands (§4.1).
pub fn divide(a: &Sv, b: &Sv) -> QuillResult<Sv> {
    let divisor = b.as_float();
    if divisor == 0.0 {
        return Err(QuillError::DivisionByZero);
    }
    Ok(Sv::new_float(a.as_float() / divisor))
}

/// Perl's `%`: result takes the sign of the right operand.
pub fn modulus(a: &Sv, b: &Sv) -> QuillResult<Sv> {
    let bi = b.as_int();
    if bi == 0 {
        return Err(QuillError::DivisionByZero);
    }
    let ai = a.as_int();
    let r = ai % bi;
    let r = if r != 0 && (r < 0) != (bi < 0) { r + bi } else { r };
    Ok(Sv::new_int(r))
}

/// `**`: always computed in float, then narrowed to int when the result is
/// finite and an exact integer within `i64` range (§4.1) — unlike the other
/// arithmetic operators, the *result*'s shape decides the type, not the
/// operands'.
pub fn power(a: &Sv, b: &Sv) -> Sv {
    let r = a.as_float().powf(b.as_float());
    if r.is_finite() && r == r.trunc() && r >= i64::MIN as f64 && r <= i64::MAX as f64 {
        return Sv::new_int(r as i64);
    }
    Sv::new_float(r)
}

pub fn negate(a: &Sv) -> Sv {
    if is_int_mode(a) {
        if let Some(r) = a.as_int().checked_neg() {
            return Sv::new_int(r);
        }
    }
    Sv::new_float(-a.as_float())
}

/// `$x++` in place: a string SV that is purely alphanumeric and does not
/// look numeric (per the resolved open question in §9) carries
/// alphanumerically; everything else falls back to ordinary numeric `+ 1`
/// (§4.1).
pub fn increment(sv: &Sv) -> QuillResult<()> {
    if sv.ty() == SvType::Str {
        let s = sv.as_string_lossy();
        if !looks_numeric_for_increment(&s) {
            if let Some(next) = magic_increment_str(&s) {
                return sv.set_string(next);
            }
        }
    }
    let result = add(sv, &Sv::new_int(1));
    sv.copy(&result)
}

/// `$x--` in place: always numeric, never the magical string decrement
/// (§4.1 explicitly carves this asymmetry out).
pub fn decrement(sv: &Sv) -> QuillResult<()> {
    let result = subtract(sv, &Sv::new_int(1));
    sv.copy(&result)
}

pub fn bitwise_and(a: &Sv, b: &Sv) -> Sv {
    Sv::new_int(a.as_int() & b.as_int())
}

pub fn bitwise_or(a: &Sv, b: &Sv) -> Sv {
    Sv::new_int(a.as_int() | b.as_int())
}

pub fn bitwise_xor(a: &Sv, b: &Sv) -> Sv {
    Sv::new_int(a.as_int() ^ b.as_int())
}

pub fn bitwise_not(a: &Sv) -> Sv {
    Sv::new_int(!a.as_int())
}

pub fn shift_left(a: &Sv, b: &Sv) -> QuillResult<Sv> {
    let count = b.as_int();
    if count < 0 {
        return Err(QuillError::NegativeShift);
    }
    Ok(Sv::new_int(a.as_int().wrapping_shl(count as u32)))
}

pub fn shift_right(a: &Sv, b: &Sv) -> QuillResult<Sv> {
    let count = b.as_int();
    if count < 0 {
        return Err(QuillError::NegativeShift);
    }
    Ok(Sv::new_int(a.as_int().wrapping_shr(count as u32)))
}
