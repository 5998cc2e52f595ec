//! Coercion between an SV's cached representations (§4.1).
//!
//! Every coercion path first checks the matching cache flag before doing
//! any conversion work, and every conversion that succeeds re-populates the
//! cache it produced so a repeated read is free. Setters go the other way:
//! they invalidate every cache but the one they just established.

use crate::error::QuillResult;
use crate::value::{Sv, SvType};
use std::sync::Arc;

/// Parse a leading numeric prefix the way Perl's numeric context does:
/// optional whitespace, optional sign, digits, optional fraction, optional
/// exponent. Anything after the recognized prefix is ignored. No digits at
/// all coerces to `0`.
fn parse_numeric_prefix(s: &str) -> f64 {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i] as char).is_whitespace() {
        i += 1;
    }
    let start = i;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let mut saw_digit = false;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        saw_digit = true;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        let dot = i;
        i += 1;
        let mut frac_digits = false;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            frac_digits = true;
        }
        if !frac_digits {
            i = dot;
        } else {
            saw_digit = true;
        }
    }
    if saw_digit && i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mark = i;
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        } else {
            i = mark;
        }
    }
    if !saw_digit {
        return 0.0;
    }
    s[start..i].parse::<f64>().unwrap_or(0.0)
}

impl Sv {
    /// Numeric-context coercion to an integer, truncating any float value.
    pub fn as_int(&self) -> i64 {
        if let Some(v) = self.cached_ival() {
            return v;
        }
        if let Some(v) = self.cached_nval() {
            let i = v as i64;
            self.cache_ival(i);
            return i;
        }
        if let Some(s) = self.cached_sval() {
            let text = String::from_utf8_lossy(&s);
            let n = parse_numeric_prefix(&text);
            let i = n as i64;
            self.cache_ival(i);
            return i;
        }
        if self.ty() == SvType::Ref {
            let id = self.identity() as i64;
            self.cache_ival(id);
            return id;
        }
        if let Some(n) = self.container_len() {
            return n as i64;
        }
        0
    }

    /// Numeric-context coercion to a float.
    pub fn as_float(&self) -> f64 {
        if let Some(v) = self.cached_nval() {
            return v;
        }
        if let Some(v) = self.cached_ival() {
            let n = v as f64;
            self.cache_nval(n);
            return n;
        }
        if let Some(s) = self.cached_sval() {
            let text = String::from_utf8_lossy(&s);
            let n = parse_numeric_prefix(&text);
            self.cache_nval(n);
            return n;
        }
        if self.ty() == SvType::Ref {
            let id = self.identity() as f64;
            self.cache_nval(id);
            return id;
        }
        if let Some(n) = self.container_len() {
            return n as f64;
        }
        0.0
    }

    /// String-context coercion. References stringify as `TYPE(0xADDR)`,
    /// blessed references as `PKG=TYPE(0xADDR)`.
    pub fn as_string(&self) -> Arc<[u8]> {
        if let Some(s) = self.cached_sval() {
            return s;
        }
        if let Some(v) = self.cached_ival() {
            let s: Arc<[u8]> = Arc::from(v.to_string().into_bytes().into_boxed_slice());
            self.cache_sval(s.clone(), true);
            return s;
        }
        if let Some(v) = self.cached_nval() {
            let s: Arc<[u8]> = Arc::from(format_float(v).into_bytes().into_boxed_slice());
            self.cache_sval(s.clone(), true);
            return s;
        }
        if self.ty() == SvType::Ref {
            let inner_name = self.repr_type_name();
            let text = match self.bless_package() {
                Some(pkg) => format!("{pkg}={inner_name}(0x{:x})", self.identity()),
                None => format!("{inner_name}(0x{:x})", self.identity()),
            };
            let s: Arc<[u8]> = Arc::from(text.into_bytes().into_boxed_slice());
            self.cache_sval(s.clone(), true);
            return s;
        }
        // Array/hash/code/glob SVs that are not themselves behind a
        // reference (e.g. `*pkg::arr{ARRAY}`) still stringify by container
        // kind, same as a reference to one would (§4.1).
        match self.ty() {
            SvType::Array | SvType::Hash | SvType::Code | SvType::Glob => {
                let text = format!("{}(0x{:x})", self.ty().type_name(), self.identity());
                Arc::from(text.into_bytes().into_boxed_slice())
            }
            _ => Arc::from(Vec::new().into_boxed_slice()),
        }
    }

    pub fn as_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.as_string()).into_owned()
    }

    /// Boolean-context coercion: false iff undef, `""`, `"0"`, numeric zero.
    pub fn as_bool(&self) -> bool {
        match self.ty() {
            SvType::Undef => false,
            SvType::Int => self.as_int() != 0,
            SvType::Float => self.as_float() != 0.0,
            SvType::Str => {
                let s = self.as_string();
                !(s.is_empty() || &*s == b"0")
            }
            SvType::Array | SvType::Hash => self.container_len().is_some_and(|n| n > 0),
            _ => true,
        }
    }

    /// `Some(count)` for an array/hash-typed SV (not a reference to one);
    /// `None` for anything else. Backs the array/hash coercion rules in
    /// §4.1 (`as_int`/`as_float` ⇒ element count, `as_bool` ⇒ nonempty).
    fn container_len(&self) -> Option<usize> {
        match self.ty() {
            SvType::Array => Some(crate::av::len(self)),
            SvType::Hash => Some(crate::hv::len(self)),
            _ => None,
        }
    }

    pub fn set_int(&self, n: i64) -> QuillResult<()> {
        self.raw_set(SvType::Int, n, 0.0, None, crate::flags::IOK, false)
    }

    pub fn set_float(&self, n: f64) -> QuillResult<()> {
        self.raw_set(SvType::Float, 0, n, None, crate::flags::NOK, false)
    }

    pub fn set_string(&self, s: impl Into<Vec<u8>>) -> QuillResult<()> {
        let bytes = s.into();
        let is_utf8 = std::str::from_utf8(&bytes).is_ok();
        let bytes: Arc<[u8]> = Arc::from(bytes.into_boxed_slice());
        self.raw_set(SvType::Str, 0, 0.0, Some(bytes), crate::flags::POK, is_utf8)
    }

    pub fn set_undef(&self) -> QuillResult<()> {
        self.raw_set(SvType::Undef, 0, 0.0, None, 0, false)
    }

    /// `$a = $b`: copy `other`'s value into `self`'s slot without disturbing
    /// `self`'s identity (anything else aliasing `self` observes the change).
    pub fn copy(&self, other: &Sv) -> QuillResult<()> {
        match other.ty() {
            SvType::Undef => self.set_undef(),
            SvType::Int => self.set_int(other.as_int()),
            SvType::Float => self.set_float(other.as_float()),
            SvType::Str => self.set_string(other.as_string().to_vec()),
            SvType::Ref => {
                let target = other.deref_target().unwrap_or_else(|| other.clone());
                self.raw_set_ref(target)
            }
            _ => self.set_string(other.as_string().to_vec()),
        }
    }
}

/// Perl-style float stringification: up to 15 significant digits, no
/// trailing zeros, integral floats print without a decimal point.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Inf".to_string() } else { "-Inf".to_string() };
    }
    if v == v.trunc() && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let s = format!("{v:.15e}");
    // Fall back to Rust's default formatting, which already drops
    // insignificant trailing zeros for the common case.
    let default = format!("{v}");
    if default.len() <= s.len() {
        default
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_string_parses_leading_prefix() {
        let sv = Sv::new_string("42abc");
        assert_eq!(sv.as_int(), 42);
        let sv = Sv::new_string("  -3.5e1 units");
        assert_eq!(sv.as_float(), -35.0);
    }

    #[test]
    fn non_numeric_string_coerces_to_zero() {
        let sv = Sv::new_string("hello");
        assert_eq!(sv.as_int(), 0);
        assert_eq!(sv.as_float(), 0.0);
    }

    #[test]
    fn bool_context_follows_perl_truthiness() {
        assert!(!Sv::new_undef().as_bool());
        assert!(!Sv::new_string("").as_bool());
        assert!(!Sv::new_string("0").as_bool());
        assert!(Sv::new_string("0.0").as_bool());
        assert!(Sv::new_string("00").as_bool());
        assert!(!Sv::new_int(0).as_bool());
        assert!(Sv::new_int(1).as_bool());
    }

    #[test]
    fn setters_invalidate_other_caches() {
        let sv = Sv::new_int(5);
        let _ = sv.as_string(); // populate POK cache
        sv.set_float(3.5).unwrap();
        assert_eq!(sv.as_float(), 3.5);
        // old cached "5" string must no longer be visible
        assert_eq!(sv.as_string_lossy(), "3.5");
    }

    #[test]
    fn copy_preserves_target_identity() {
        let a = Sv::new_int(1);
        let b = Sv::new_string("hi");
        a.copy(&b).unwrap();
        assert_eq!(a.as_string_lossy(), "hi");
    }

    #[test]
    fn float_stringification_drops_integral_decimal_point() {
        assert_eq!(Sv::new_float(4.0).as_string_lossy(), "4");
        assert_eq!(Sv::new_float(4.5).as_string_lossy(), "4.5");
    }

    #[test]
    fn bare_array_coerces_by_element_count() {
        let av = Sv::new_array_ref().deref_target().unwrap();
        assert_eq!(av.as_int(), 0);
        assert!(!av.as_bool());
        crate::av::push(&av, vec![Sv::new_int(1), Sv::new_int(2)]).unwrap();
        assert_eq!(av.as_int(), 2);
        assert_eq!(av.as_float(), 2.0);
        assert!(av.as_bool());
        assert!(av.as_string_lossy().starts_with("ARRAY(0x"));
    }

    #[test]
    fn bare_hash_coerces_by_element_count() {
        let hv = Sv::new_hash_ref().deref_target().unwrap();
        assert!(!hv.as_bool());
        crate::hv::store(&hv, "k", Sv::new_int(1)).unwrap();
        assert_eq!(hv.as_int(), 1);
        assert!(hv.as_bool());
        assert!(hv.as_string_lossy().starts_with("HASH(0x"));
    }
}
