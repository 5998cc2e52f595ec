//! Array (AV) operations layered on a `Array`-typed [`Sv`] (§4.2).
//!
//! Every function here takes the array SV directly (already dereferenced,
//! if it started life behind a reference). Per §7, a non-array input is
//! fatal (`NotAnArray`) from a *mutating* operation but quietly reads back
//! as `undef`/empty/`false` from a reading one — mirroring the lazy
//! autovivification a fresh `@array` lookup gets elsewhere in this layer.
//! The two halves below are split accordingly: [`with_array`] for the
//! former, [`read_array`] for the latter.

use crate::error::{QuillError, QuillResult};
use crate::value::{CallContext, Cv, Sv, WantArray};

fn with_array<R>(av: &Sv, f: impl FnOnce(&mut Vec<Sv>) -> R) -> QuillResult<R> {
    av.with_array(f).ok_or(QuillError::NotAnArray)
}

fn read_array<R>(av: &Sv, default: R, f: impl FnOnce(&mut Vec<Sv>) -> R) -> R {
    av.with_array(f).unwrap_or(default)
}

/// Perl negative indices count from the end; `-1` is the last element.
fn resolve_index(len: usize, idx: i64) -> Option<usize> {
    if idx >= 0 {
        Some(idx as usize)
    } else {
        let from_end = (-idx) as usize;
        if from_end > len {
            None
        } else {
            Some(len - from_end)
        }
    }
}

/// `$a[i]`: a reading op, so a non-array input or an out-of-range index
/// both just yield `undef` rather than failing (§7).
pub fn fetch(av: &Sv, idx: i64) -> Sv {
    read_array(av, None, |items| match resolve_index(items.len(), idx) {
        Some(i) if i < items.len() => Some(items[i].clone()),
        _ => None,
    })
    .unwrap_or_else(Sv::new_undef)
}

/// `$a[i] = value`: extends the array with `undef` as needed.
pub fn store(av: &Sv, idx: i64, value: Sv) -> QuillResult<()> {
    with_array(av, |items| {
        let i = if idx >= 0 {
            idx as usize
        } else {
            let len = items.len();
            match resolve_index(len, idx) {
                Some(i) => i,
                // §7's error vocabulary has no distinct "index out of
                // range" kind, so an out-of-bounds negative index reuses
                // `NotAnArray` here deliberately rather than growing the
                // closed vocabulary for one rare, already-fatal case.
                None => return Err(QuillError::NotAnArray),
            }
        };
        if i >= items.len() {
            items.resize_with(i + 1, Sv::new_undef);
        }
        items[i] = value;
        Ok(())
    })?
}

pub fn len(av: &Sv) -> usize {
    read_array(av, 0, |items| items.len())
}

/// `$#array`: highest valid index, `-1` for an empty (or non-array) input.
pub fn max_index(av: &Sv) -> i64 {
    len(av) as i64 - 1
}

pub fn exists(av: &Sv, idx: i64) -> bool {
    read_array(av, false, |items| {
        resolve_index(items.len(), idx).is_some_and(|i| i < items.len())
    })
}

/// `delete $a[i]`: leaves a hole (sets the slot to `undef`) rather than
/// shifting subsequent elements, except when deleting the last element,
/// which actually shrinks the array.
pub fn delete(av: &Sv, idx: i64) -> QuillResult<Sv> {
    with_array(av, |items| {
        let i = match resolve_index(items.len(), idx) {
            Some(i) if i < items.len() => i,
            _ => return Sv::new_undef(),
        };
        let old = std::mem::replace(&mut items[i], Sv::new_undef());
        if i == items.len() - 1 {
            items.truncate(i);
            while matches!(items.last(), Some(v) if v.is_undef()) {
                items.pop();
            }
        }
        old
    })
}

pub fn push(av: &Sv, values: impl IntoIterator<Item = Sv>) -> QuillResult<()> {
    with_array(av, |items| items.extend(values))
}

pub fn pop(av: &Sv) -> QuillResult<Sv> {
    with_array(av, |items| items.pop().unwrap_or_else(Sv::new_undef))
}

pub fn shift(av: &Sv) -> QuillResult<Sv> {
    with_array(av, |items| {
        if items.is_empty() {
            Sv::new_undef()
        } else {
            items.remove(0)
        }
    })
}

pub fn unshift(av: &Sv, values: impl IntoIterator<Item = Sv>) -> QuillResult<()> {
    with_array(av, |items| {
        let mut front: Vec<Sv> = values.into_iter().collect();
        front.append(items);
        *items = front;
    })
}

/// `splice(@a, offset, length, replacement...)`: returns the removed
/// elements.
pub fn splice(
    av: &Sv,
    offset: i64,
    length: Option<i64>,
    replacement: Vec<Sv>,
) -> QuillResult<Vec<Sv>> {
    with_array(av, |items| {
        let len = items.len();
        let start = resolve_index(len, offset).unwrap_or(len).min(len);
        let count = match length {
            Some(n) if n < 0 => (len as i64 - start as i64 + n).max(0) as usize,
            Some(n) => (n as usize).min(len - start),
            None => len - start,
        };
        let removed: Vec<Sv> = items.splice(start..start + count, replacement).collect();
        removed
    })
}

pub fn reverse(av: &Sv) -> QuillResult<()> {
    with_array(av, |items| items.reverse())
}

pub fn clear(av: &Sv) -> QuillResult<()> {
    with_array(av, |items| items.clear())
}

/// Shallow copy into a fresh array. A non-array input reads back as
/// `undef` rather than a ref-to-empty-array, consistent with other reading
/// ops (§7).
pub fn clone(av: &Sv) -> Sv {
    match av.with_array(|items| items.clone()) {
        Some(items) => {
            let new = Sv::new_array_ref();
            let target = new.deref_target().expect("just-created array ref");
            target.with_array(|slot| *slot = items);
            new
        }
        None => Sv::new_undef(),
    }
}

/// Read-only element list snapshot (for iteration, `join`, list-context
/// results, ...). Unlike [`flatten`], elements are passed through as-is —
/// an array-ref element stringifies to `ARRAY(0x...)` rather than
/// expanding, matching how `join`/`grep`/`map` treat their list argument.
fn elements(av: &Sv) -> Vec<Sv> {
    read_array(av, Vec::new(), |items| items.iter().map(|v| v.incref()).collect())
}

/// `flatten(@a)`: one-level ref flattening — an element that is itself a
/// reference to an array expands into that array's elements; anything
/// else (including a hash ref, which has no positional meaning here)
/// passes through unchanged. This is the named §4.2 `flatten` operation,
/// distinct from the plain element snapshot [`elements`] takes for
/// `join`/`grep`/`map`, none of which expand nested array refs.
pub fn flatten(av: &Sv) -> Vec<Sv> {
    let mut out = Vec::new();
    for item in elements(av) {
        if item.ty() == crate::value::SvType::Ref {
            if let Some(target) = item.deref_target() {
                if target.is_array() {
                    out.extend(elements(&target));
                    continue;
                }
            }
        }
        out.push(item);
    }
    out
}

pub fn join(av: &Sv, sep: &str) -> String {
    elements(av)
        .iter()
        .map(|v| v.as_string_lossy())
        .collect::<Vec<_>>()
        .join(sep)
}

pub fn slice(av: &Sv, indices: &[i64]) -> Vec<Sv> {
    indices.iter().map(|&i| fetch(av, i)).collect()
}

pub fn slice_store(av: &Sv, indices: &[i64], values: Vec<Sv>) -> QuillResult<()> {
    for (i, v) in indices.iter().zip(values.into_iter()) {
        store(av, *i, v)?;
    }
    Ok(())
}

/// `sort { ... } @a`: stable sort driven by a two-argument comparator CV.
/// The comparator is called with each pair bound as `$a`/`$b` via the
/// first two context args (the pad-level `$a`/`$b` alias is the evaluator's
/// job; this just establishes the calling convention).
pub fn sort_with(av: &Sv, comparator: &Cv) -> QuillResult<()> {
    let mut items = with_array(av, |items| items.clone())?;
    let mut err = None;
    items.sort_by(|a, b| {
        if err.is_some() {
            return std::cmp::Ordering::Equal;
        }
        let mut ctx = CallContext::new(vec![a.incref(), b.incref()], WantArray::Scalar);
        match comparator.call(&mut ctx) {
            Ok(r) => match r.as_int() {
                n if n < 0 => std::cmp::Ordering::Less,
                0 => std::cmp::Ordering::Equal,
                _ => std::cmp::Ordering::Greater,
            },
            Err(e) => {
                err = Some(e);
                std::cmp::Ordering::Equal
            }
        }
    });
    if let Some(e) = err {
        return Err(e);
    }
    with_array(av, |slot| *slot = items)
}

/// Default `sort @a`: ascending byte-string order.
pub fn sort_default(av: &Sv) -> QuillResult<()> {
    with_array(av, |items| {
        items.sort_by(|a, b| a.as_string().cmp(&b.as_string()));
    })
}

/// `sort { $a <=> $b } @a` convenience: ascending numeric order.
pub fn sort_numeric(av: &Sv) -> QuillResult<()> {
    with_array(av, |items| {
        items.sort_by(|a, b| {
            a.as_float()
                .partial_cmp(&b.as_float())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    })
}

/// `grep { ... } @a`: elements for which `block` returns a true value.
/// Each element is passed both as the sole call argument and preloaded
/// into pad slot 0, so a block written as either `$_[0]` or a captured
/// `$_` alias observes it.
pub fn grep(av: &Sv, block: &Cv) -> QuillResult<Vec<Sv>> {
    let items = elements(av);
    let mut kept = Vec::new();
    for item in items {
        let mut ctx = CallContext::new(vec![item.incref()], WantArray::Scalar);
        ctx.pad.push(Some(item.incref()));
        if block.call(&mut ctx)?.as_bool() {
            kept.push(item);
        }
    }
    Ok(kept)
}

/// `map { ... } @a`: each element's block result list, flattened.
pub fn map(av: &Sv, block: &Cv) -> QuillResult<Vec<Sv>> {
    let items = elements(av);
    let mut out = Vec::new();
    for item in items {
        let mut ctx = CallContext::new(vec![item.incref()], WantArray::List);
        ctx.pad.push(Some(item.incref()));
        out.extend(block.call_list(&mut ctx)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array() -> Sv {
        let r = Sv::new_array_ref();
        r.deref_target().unwrap()
    }

    #[test]
    fn flatten_expands_nested_array_refs_one_level() {
        let av = array();
        let inner = array();
        push(&inner, vec![Sv::new_int(2), Sv::new_int(3)]).unwrap();
        push(
            &av,
            vec![Sv::new_int(1), Sv::new_ref(inner), Sv::new_int(4)],
        )
        .unwrap();
        let vals: Vec<i64> = flatten(&av).iter().map(|v| v.as_int()).collect();
        assert_eq!(vals, vec![1, 2, 3, 4]);
    }

    #[test]
    fn flatten_does_not_expand_hash_refs() {
        let av = array();
        let href = Sv::new_hash_ref();
        push(&av, vec![Sv::new_int(1), href.clone()]).unwrap();
        let out = flatten(&av);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].deref_target().unwrap(), href.deref_target().unwrap());
    }

    #[test]
    fn push_pop_shift_unshift_round_trip() {
        let av = array();
        push(&av, vec![Sv::new_int(1), Sv::new_int(2)]).unwrap();
        unshift(&av, vec![Sv::new_int(0)]).unwrap();
        assert_eq!(len(&av), 3);
        assert_eq!(shift(&av).unwrap().as_int(), 0);
        assert_eq!(pop(&av).unwrap().as_int(), 2);
        assert_eq!(len(&av), 1);
    }

    #[test]
    fn negative_index_counts_from_end() {
        let av = array();
        push(&av, vec![Sv::new_int(10), Sv::new_int(20), Sv::new_int(30)]).unwrap();
        assert_eq!(fetch(&av, -1).as_int(), 30);
        assert_eq!(fetch(&av, -3).as_int(), 10);
    }

    #[test]
    fn store_past_end_autoextends_with_undef() {
        let av = array();
        store(&av, 2, Sv::new_int(9)).unwrap();
        assert_eq!(len(&av), 3);
        assert!(fetch(&av, 0).is_undef());
        assert!(fetch(&av, 1).is_undef());
        assert_eq!(fetch(&av, 2).as_int(), 9);
    }

    #[test]
    fn splice_removes_and_replaces() {
        let av = array();
        push(&av, (1..=5).map(Sv::new_int)).unwrap();
        let removed = splice(&av, 1, Some(2), vec![Sv::new_int(99)]).unwrap();
        let removed: Vec<i64> = removed.iter().map(|v| v.as_int()).collect();
        assert_eq!(removed, vec![2, 3]);
        let remaining: Vec<i64> = flatten(&av).iter().map(|v| v.as_int()).collect();
        assert_eq!(remaining, vec![1, 99, 4, 5]);
    }

    #[test]
    fn max_index_of_empty_array_is_negative_one() {
        let av = array();
        assert_eq!(max_index(&av), -1);
    }

    #[test]
    fn reading_ops_on_non_array_input_read_back_as_empty_rather_than_erroring() {
        let not_an_array = Sv::new_int(5);
        assert!(fetch(&not_an_array, 0).is_undef());
        assert_eq!(len(&not_an_array), 0);
        assert_eq!(max_index(&not_an_array), -1);
        assert!(!exists(&not_an_array, 0));
        assert!(flatten(&not_an_array).is_empty());
        assert_eq!(join(&not_an_array, ","), "");
        assert!(clone(&not_an_array).is_undef());
    }

    #[test]
    fn mutating_ops_on_non_array_input_are_fatal() {
        let not_an_array = Sv::new_int(5);
        assert_eq!(store(&not_an_array, 0, Sv::new_int(1)), Err(QuillError::NotAnArray));
        assert_eq!(push(&not_an_array, vec![Sv::new_int(1)]), Err(QuillError::NotAnArray));
    }

    #[test]
    fn sort_default_is_string_order() {
        let av = array();
        push(&av, vec![Sv::new_string("10"), Sv::new_string("9")]).unwrap();
        sort_default(&av).unwrap();
        let vals: Vec<String> = flatten(&av).iter().map(|v| v.as_string_lossy()).collect();
        assert_eq!(vals, vec!["10", "9"]);
    }

    #[test]
    fn sort_numeric_is_numeric_order() {
        let av = array();
        push(&av, vec![Sv::new_string("10"), Sv::new_string("9")]).unwrap();
        sort_numeric(&av).unwrap();
        let vals: Vec<String> = flatten(&av).iter().map(|v| v.as_string_lossy()).collect();
        assert_eq!(vals, vec!["9", "10"]);
    }

    #[test]
    fn grep_and_map_apply_block() {
        let av = array();
        push(&av, (1..=5).map(Sv::new_int)).unwrap();
        let is_even = Cv::new_anonymous(std::sync::Arc::new(|ctx: &mut CallContext| {
            Ok(Sv::new_int((ctx.args[0].as_int() % 2 == 0) as i64))
        }));
        let evens = grep(&av, &is_even).unwrap();
        assert_eq!(evens.len(), 2);

        let doubled = Cv::new_anonymous(std::sync::Arc::new(|ctx: &mut CallContext| {
            Ok(Sv::new_int(ctx.args[0].as_int() * 2))
        }));
        let mapped = map(&av, &doubled).unwrap();
        let vals: Vec<i64> = mapped.iter().map(|v| v.as_int()).collect();
        assert_eq!(vals, vec![2, 4, 6, 8, 10]);
    }
}
