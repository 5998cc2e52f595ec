//! Free-function entry points for the CV calling convention (§4.4).
//!
//! The data and the mechanics live on [`Cv`] itself (see `value.rs`); this
//! module is the stable, short-named surface the rest of the workspace
//! calls through — the same re-export-under-a-short-name shape the
//! arithmetic and string modules use.

use crate::error::QuillResult;
use crate::value::{CallContext, Cv, Sv, WantArray};

pub fn call(cv: &Cv, args: Vec<Sv>, want_array: WantArray) -> QuillResult<Sv> {
    let mut ctx = CallContext::new(args, want_array);
    cv.call(&mut ctx)
}

pub fn call_list(cv: &Cv, args: Vec<Sv>) -> QuillResult<Vec<Sv>> {
    let mut ctx = CallContext::new(args, WantArray::List);
    cv.call_list(&mut ctx)
}

/// Call with an already-built context, e.g. one a caller populated with a
/// specific `caller_package`/`caller_file`/`caller_line` for `caller()`
/// introspection.
pub fn call_with_context(cv: &Cv, ctx: &mut CallContext) -> QuillResult<Sv> {
    cv.call(ctx)
}

pub fn closure_over(outer: &Cv, captured: Vec<Sv>) -> Cv {
    outer.make_closure(captured)
}

pub fn is_method(cv: &Cv) -> bool {
    cv.flags().method
}

pub fn is_lvalue(cv: &Cv) -> bool {
    cv.flags().lvalue
}

pub fn is_locked(cv: &Cv) -> bool {
    cv.flags().locked
}
