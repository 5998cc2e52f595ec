//! Hash (HV) operations layered on a `Hash`-typed [`Sv`] (§4.3).
//!
//! As with [`crate::av`], a non-hash input is fatal (`NotAHash`) from a
//! mutating operation but reads back as `undef`/empty/`false` from a
//! reading one (§7); [`with_hash`] covers the former, [`read_hash`] the
//! latter.

use crate::error::{QuillError, QuillResult};
use crate::value::{HashBody, Sv};

fn with_hash<R>(hv: &Sv, f: impl FnOnce(&mut HashBody) -> R) -> QuillResult<R> {
    hv.with_hash(f).ok_or(QuillError::NotAHash)
}

fn read_hash<R>(hv: &Sv, default: R, f: impl FnOnce(&mut HashBody) -> R) -> R {
    hv.with_hash(f).unwrap_or(default)
}

pub fn fetch(hv: &Sv, key: &str) -> Sv {
    read_hash(hv, None, |body| body.map.get(key).map(|v| v.incref())).unwrap_or_else(Sv::new_undef)
}

pub fn store(hv: &Sv, key: impl Into<String>, value: Sv) -> QuillResult<()> {
    with_hash(hv, |body| {
        body.map.insert(key.into(), value);
    })
}

pub fn exists(hv: &Sv, key: &str) -> bool {
    read_hash(hv, false, |body| body.map.contains_key(key))
}

pub fn delete(hv: &Sv, key: &str) -> QuillResult<Sv> {
    with_hash(hv, |body| body.map.remove(key).unwrap_or_else(Sv::new_undef))
}

/// `%h` in scalar context: true (nonzero) iff the hash has at least one key.
pub fn scalar(hv: &Sv) -> bool {
    read_hash(hv, false, |body| !body.map.is_empty())
}

pub fn len(hv: &Sv) -> usize {
    read_hash(hv, 0, |body| body.map.len())
}

/// `keys %h`: resets the `each` iterator, per Perl's own coupling of the
/// two.
pub fn keys(hv: &Sv) -> Vec<String> {
    read_hash(hv, Vec::new(), |body| {
        body.reset_iterator();
        body.map.keys().cloned().collect()
    })
}

pub fn keys_sorted(hv: &Sv) -> Vec<String> {
    let mut ks = keys(hv);
    ks.sort();
    ks
}

pub fn values(hv: &Sv) -> Vec<Sv> {
    read_hash(hv, Vec::new(), |body| {
        body.reset_iterator();
        body.map.values().map(|v| v.incref()).collect()
    })
}

/// `each %h`: snapshot the key set on first call after a reset, then walk
/// it in that fixed order regardless of concurrent inserts (§4.3).
pub fn each(hv: &Sv) -> Option<(String, Sv)> {
    read_hash(hv, None, |body| {
        if body.iter_snapshot.is_none() {
            let mut ks: Vec<String> = body.map.keys().cloned().collect();
            ks.sort();
            body.iter_snapshot = Some(ks);
            body.iter_pos = 0;
        }
        let snapshot = body.iter_snapshot.as_ref().unwrap();
        loop {
            if body.iter_pos >= snapshot.len() {
                body.reset_iterator();
                return None;
            }
            let key = snapshot[body.iter_pos].clone();
            body.iter_pos += 1;
            if let Some(v) = body.map.get(&key) {
                return Some((key, v.incref()));
            }
            // Key was deleted since the snapshot was taken; skip it.
        }
    })
}

pub fn reset_iterator(hv: &Sv) -> QuillResult<()> {
    with_hash(hv, |body| body.reset_iterator())
}

pub fn clear(hv: &Sv) -> QuillResult<()> {
    with_hash(hv, |body| {
        body.map.clear();
        body.reset_iterator();
    })
}

/// Shallow copy into a fresh hash. A non-hash input reads back as `undef`
/// rather than a ref-to-empty-hash (§7).
pub fn clone(hv: &Sv) -> Sv {
    match hv.with_hash(|body| body.map.iter().map(|(k, v)| (k.clone(), v.incref())).collect::<Vec<_>>()) {
        Some(entries) => {
            let new = Sv::new_hash_ref();
            let target = new.deref_target().expect("just-created hash ref");
            target.with_hash(|body| {
                for (k, v) in entries {
                    body.map.insert(k, v);
                }
            });
            new
        }
        None => Sv::new_undef(),
    }
}

/// `%a = (%a, %b, %c, ...)`: each hash in `others`, in order, overwrites
/// `hv`'s entries on key collision — the last hash holding a given key
/// wins (§4.3's `merge(...hashes)`).
pub fn merge(hv: &Sv, others: &[Sv]) -> QuillResult<()> {
    for other in others {
        let entries = with_hash(other, |body| {
            body.map
                .iter()
                .map(|(k, v)| (k.clone(), v.incref()))
                .collect::<Vec<_>>()
        })?;
        with_hash(hv, |body| {
            for (k, v) in entries {
                body.map.insert(k, v);
            }
        })?;
    }
    Ok(())
}

pub fn slice(hv: &Sv, keys: &[String]) -> Vec<Sv> {
    keys.iter().map(|k| fetch(hv, k)).collect()
}

pub fn slice_store(hv: &Sv, keys: &[String], values: Vec<Sv>) -> QuillResult<()> {
    for (k, v) in keys.iter().zip(values.into_iter()) {
        store(hv, k.clone(), v)?;
    }
    Ok(())
}

pub fn delete_slice(hv: &Sv, keys: &[String]) -> QuillResult<Vec<Sv>> {
    keys.iter().map(|k| delete(hv, k)).collect()
}

/// `%h = (k1, v1, k2, v2, ...)`: replaces the hash's contents wholesale
/// from a flat key/value list.
pub fn from_list(hv: &Sv, flat: Vec<Sv>) -> QuillResult<()> {
    with_hash(hv, |body| {
        body.map.clear();
        body.reset_iterator();
        let mut it = flat.into_iter();
        while let Some(k) = it.next() {
            let v = it.next().unwrap_or_else(Sv::new_undef);
            body.map.insert(k.as_string_lossy(), v);
        }
    })
}

/// `%h` flattened back into a `(key, value, ...)` list, e.g. for passing
/// to a function expecting a list.
pub fn flatten(hv: &Sv) -> Vec<Sv> {
    read_hash(hv, Vec::new(), |body| {
        let mut out = Vec::with_capacity(body.map.len() * 2);
        for (k, v) in body.map.iter() {
            out.push(Sv::new_string(k.clone()));
            out.push(v.incref());
        }
        out
    })
}

/// `reverse %h`: a new hash with keys and values swapped (last writer wins
/// on value collision, following insertion-nondeterministic `HashMap` order;
/// callers that need a deterministic winner should sort first). A non-hash
/// input reads back as `undef` (§7).
pub fn invert(hv: &Sv) -> Sv {
    match hv.with_hash(|body| body.map.iter().map(|(k, v)| (k.clone(), v.incref())).collect::<Vec<_>>()) {
        Some(entries) => {
            let new = Sv::new_hash_ref();
            let target = new.deref_target().expect("just-created hash ref");
            target.with_hash(|body| {
                for (k, v) in entries {
                    body.map.insert(v.as_string_lossy(), Sv::new_string(k));
                }
            });
            new
        }
        None => Sv::new_undef(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> Sv {
        let r = Sv::new_hash_ref();
        r.deref_target().unwrap()
    }

    #[test]
    fn store_fetch_exists_delete_round_trip() {
        let hv = hash();
        store(&hv, "a", Sv::new_int(1)).unwrap();
        assert!(exists(&hv, "a"));
        assert_eq!(fetch(&hv, "a").as_int(), 1);
        assert_eq!(delete(&hv, "a").unwrap().as_int(), 1);
        assert!(!exists(&hv, "a"));
    }

    #[test]
    fn fetch_of_missing_key_is_undef() {
        let hv = hash();
        assert!(fetch(&hv, "nope").is_undef());
    }

    #[test]
    fn each_walks_snapshot_once_then_resets() {
        let hv = hash();
        store(&hv, "a", Sv::new_int(1)).unwrap();
        store(&hv, "b", Sv::new_int(2)).unwrap();
        let mut seen = Vec::new();
        while let Some((k, v)) = each(&hv) {
            seen.push((k, v.as_int()));
        }
        seen.sort();
        assert_eq!(seen, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
        // iterator reset after exhaustion; walking again yields everything
        let mut seen2 = Vec::new();
        while let Some((k, _)) = each(&hv) {
            seen2.push(k);
        }
        assert_eq!(seen2.len(), 2);
    }

    #[test]
    fn keys_resets_the_each_cursor() {
        let hv = hash();
        store(&hv, "a", Sv::new_int(1)).unwrap();
        store(&hv, "b", Sv::new_int(2)).unwrap();
        each(&hv); // advance cursor partway
        let ks = keys_sorted(&hv);
        assert_eq!(ks, vec!["a".to_string(), "b".to_string()]);
        // each() after keys() must start over, not resume mid-snapshot
        let (first_key, _) = each(&hv).unwrap();
        assert!(first_key == "a" || first_key == "b");
    }

    #[test]
    fn from_list_and_flatten_round_trip() {
        let hv = hash();
        from_list(
            &hv,
            vec![
                Sv::new_string("x"),
                Sv::new_int(1),
                Sv::new_string("y"),
                Sv::new_int(2),
            ],
        )
        .unwrap();
        assert_eq!(fetch(&hv, "x").as_int(), 1);
        assert_eq!(fetch(&hv, "y").as_int(), 2);
        assert_eq!(flatten(&hv).len(), 4);
    }

    #[test]
    fn merge_overwrites_on_collision() {
        let a = hash();
        let b = hash();
        store(&a, "k", Sv::new_int(1)).unwrap();
        store(&b, "k", Sv::new_int(2)).unwrap();
        merge(&a, &[b]).unwrap();
        assert_eq!(fetch(&a, "k").as_int(), 2);
    }

    #[test]
    fn merge_of_several_hashes_lets_the_last_one_win() {
        let a = hash();
        let b = hash();
        let c = hash();
        store(&a, "k", Sv::new_int(1)).unwrap();
        store(&b, "k", Sv::new_int(2)).unwrap();
        store(&c, "k", Sv::new_int(3)).unwrap();
        store(&c, "only_in_c", Sv::new_int(9)).unwrap();
        merge(&a, &[b, c]).unwrap();
        assert_eq!(fetch(&a, "k").as_int(), 3);
        assert_eq!(fetch(&a, "only_in_c").as_int(), 9);
    }

    #[test]
    fn reading_ops_on_non_hash_input_read_back_as_empty_rather_than_erroring() {
        let not_a_hash = Sv::new_int(5);
        assert!(fetch(&not_a_hash, "a").is_undef());
        assert!(!exists(&not_a_hash, "a"));
        assert!(!scalar(&not_a_hash));
        assert_eq!(len(&not_a_hash), 0);
        assert!(keys(&not_a_hash).is_empty());
        assert!(each(&not_a_hash).is_none());
        assert!(clone(&not_a_hash).is_undef());
    }

    #[test]
    fn mutating_ops_on_non_hash_input_are_fatal() {
        let not_a_hash = Sv::new_int(5);
        assert_eq!(store(&not_a_hash, "a", Sv::new_int(1)), Err(QuillError::NotAHash));
        assert_eq!(delete(&not_a_hash, "a"), Err(QuillError::NotAHash));
    }
}
