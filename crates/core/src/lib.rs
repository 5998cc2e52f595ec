//! Core value system for the Quill dynamic language.
//!
//! This crate owns the universal scalar value ([`value::Sv`]) and
//! everything layered directly on top of it: arrays, hashes, code values
//! and globs. It has no notion of a running program — no call stack, no
//! package registry, no `die`/`eval` unwinding. Those live one layer up in
//! `quill_runtime`, which depends on this crate rather than the other way
//! around.

pub mod arithmetic;
pub mod av;
pub mod coercion;
pub mod cv;
pub mod error;
pub mod flags;
pub mod gv;
pub mod hv;
pub mod numcmp;
pub mod range;
pub mod string_ops;
pub mod value;

pub use error::{QuillError, QuillResult};
pub use value::{CallContext, Callable, Cv, Gv, HashBody, IoHandle, RefTarget, Sv, SvType, WantArray};

/// Short, spec-shaped free-function aliases (`sv_*`, with an `sv_h_*`
/// sub-family for hash-specific operations — `sv_push(arr, v)`,
/// `sv_h_set(h, k, v)`) for callers that want the translator-facing
/// mechanical-rename convention (§6) rather than method syntax.
pub mod ops {
    pub use crate::arithmetic::{
        add as sv_add, bitwise_and as sv_band, bitwise_not as sv_bnot, bitwise_or as sv_bor,
        bitwise_xor as sv_bxor, decrement as sv_dec, divide as sv_div, increment as sv_inc,
        modulus as sv_mod, multiply as sv_mul, negate as sv_neg, power as sv_pow,
        shift_left as sv_shl, shift_right as sv_shr, subtract as sv_sub,
    };
    pub use crate::numcmp::{
        num_eq as sv_num_eq, num_ge as sv_num_ge, num_gt as sv_num_gt, num_le as sv_num_le,
        num_lt as sv_num_lt, spaceship as sv_cmp,
    };
    pub use crate::string_ops::{
        concat as sv_concat, str_eq as sv_eq, str_ge as sv_ge, str_gt as sv_gt, str_le as sv_le,
        str_lt as sv_lt,
    };
    pub use crate::av::{
        delete as sv_adelete, exists as sv_aexists, fetch as sv_aget, len as sv_alen,
        pop as sv_pop, push as sv_push, shift as sv_shift, store as sv_aset,
        unshift as sv_unshift,
    };
    pub use crate::hv::{
        delete as sv_hdelete, exists as sv_hexists, fetch as sv_h_get, keys as sv_hkeys,
        len as sv_hlen, store as sv_h_set,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_aliases_match_underlying_functions() {
        let a = Sv::new_int(2);
        let b = Sv::new_int(3);
        assert_eq!(ops::sv_add(&a, &b).as_int(), arithmetic::add(&a, &b).as_int());
    }

    #[test]
    fn ops_array_and_hash_aliases_resolve_to_av_and_hv() {
        let arr = Sv::new_array_ref().deref_target().unwrap();
        ops::sv_push(&arr, vec![Sv::new_int(1)]).unwrap();
        assert_eq!(ops::sv_alen(&arr), av::len(&arr));
        assert_eq!(ops::sv_aget(&arr, 0).as_int(), av::fetch(&arr, 0).as_int());

        let hash = Sv::new_hash_ref().deref_target().unwrap();
        ops::sv_h_set(&hash, "k", Sv::new_int(7)).unwrap();
        assert_eq!(ops::sv_h_get(&hash, "k").as_int(), hv::fetch(&hash, "k").as_int());
        assert!(ops::sv_hexists(&hash, "k"));
    }
}
