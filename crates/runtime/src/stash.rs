//! Package symbol tables and method resolution (§4.6).
//!
//! Every package's stash lives in one process-wide registry, mirroring the
//! global `Mutex<HashMap<...>>` registries the value layer's teacher keeps
//! for its channels and strands. Each stash owns a flat `name -> Gv` table;
//! `@ISA` is just the array slot of the glob named `ISA`, so inheritance
//! falls out of the glob model instead of needing its own storage.

use quill_core::{Cv, Gv, Sv};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex};

static STASH_REGISTRY: LazyLock<Mutex<HashMap<String, Stash>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

struct StashInner {
    package: String,
    symbols: Mutex<HashMap<String, Gv>>,
}

/// A package's symbol table. Cheap to clone; all clones share the same
/// underlying table.
#[derive(Clone)]
pub struct Stash(Arc<StashInner>);

impl Stash {
    /// Look up (creating if necessary) the stash for `package`. Creating
    /// `"A::B::C"` recursively creates `"A"` and `"A::B"` too if they don't
    /// already exist (§3, §4.6), and registers each child under its parent
    /// as a `"Local::"`-suffixed glob so walking from a package down into a
    /// nested one is possible the same way `*A::{B::}` works.
    pub fn get(package: &str) -> Stash {
        let stash = Self::get_one(package);
        if let Some((parent, local)) = package.rsplit_once("::") {
            if !parent.is_empty() {
                let parent_stash = Stash::get(parent);
                parent_stash.glob(&format!("{local}::"));
            }
        }
        stash
    }

    /// Look up (creating if necessary) the registry entry for exactly
    /// `package`, without touching any ancestor. Releases the registry lock
    /// before `get` recurses into ancestor registration, so a deep package
    /// path never holds the global lock across its own recursive call (§5).
    fn get_one(package: &str) -> Stash {
        let mut registry = STASH_REGISTRY.lock().unwrap();
        registry
            .entry(package.to_string())
            .or_insert_with(|| {
                Stash(Arc::new(StashInner {
                    package: package.to_string(),
                    symbols: Mutex::new(HashMap::new()),
                }))
            })
            .clone()
    }

    pub fn package(&self) -> &str {
        &self.0.package
    }

    /// The glob bound to `name` in this package, creating it on first use.
    pub fn glob(&self, name: &str) -> Gv {
        let mut symbols = self.0.symbols.lock().unwrap();
        symbols
            .entry(name.to_string())
            .or_insert_with(|| Gv::new(self.0.package.clone(), name.to_string()))
            .clone()
    }

    pub fn has_glob(&self, name: &str) -> bool {
        self.0.symbols.lock().unwrap().contains_key(name)
    }

    pub fn resolve_scalar(&self, name: &str) -> Sv {
        self.glob(name).scalar()
    }

    pub fn resolve_array(&self, name: &str) -> Sv {
        self.glob(name).array()
    }

    pub fn resolve_hash(&self, name: &str) -> Sv {
        self.glob(name).hash()
    }

    pub fn resolve_code(&self, name: &str) -> Option<Cv> {
        self.glob(name).code().and_then(|sv| sv.as_code())
    }

    pub fn define_sub(&self, name: &str, cv: Cv) {
        cv.set_name(self.0.package.clone(), name.to_string());
        self.glob(name).set_code(Some(Sv::new_code(cv)));
    }

    /// `@Package::ISA`, in declaration order.
    pub fn isa(&self) -> Vec<String> {
        let av = self.glob("ISA").array();
        quill_core::av::flatten(&av)
            .iter()
            .map(|sv| sv.as_string_lossy())
            .collect()
    }

    pub fn push_isa(&self, parent: impl Into<String>) {
        let av = self.glob("ISA").array();
        let _ = quill_core::av::push(&av, vec![Sv::new_string(parent.into())]);
    }

    pub fn can(&self, method: &str) -> bool {
        find_method(self.package(), method).is_some()
    }
}

/// Depth-first, left-to-right `@ISA` method resolution (§4.6), falling back
/// to `UNIVERSAL` on a total miss. Visits each package at most once so
/// diamond inheritance and accidental cycles both terminate. Returns the
/// resolved sub together with the package that actually defines it, so
/// callers (e.g. `AUTOLOAD` dispatch) can tell a direct hit from an
/// inherited one.
pub fn find_method(package: &str, method: &str) -> Option<(Cv, String)> {
    let mut visited = HashSet::new();
    find_method_rec(package, method, &mut visited)
        .or_else(|| find_method_rec("UNIVERSAL", method, &mut HashSet::new()))
}

fn find_method_rec(
    package: &str,
    method: &str,
    visited: &mut HashSet<String>,
) -> Option<(Cv, String)> {
    if !visited.insert(package.to_string()) {
        return None;
    }
    let stash = Stash::get(package);
    if let Some(cv) = stash.resolve_code(method) {
        return Some((cv, package.to_string()));
    }
    for parent in stash.isa() {
        if let Some(hit) = find_method_rec(&parent, method, visited) {
            return Some(hit);
        }
    }
    None
}

/// Resolve `AUTOLOAD` for `package`, the same way `find_method` resolves an
/// ordinary method name, reusing its `@ISA` walk and `UNIVERSAL` fallback.
pub fn find_autoload(package: &str) -> Option<(Cv, String)> {
    find_method(package, "AUTOLOAD")
}

/// `$obj->method(...)`-style dispatch: resolve `method` via `find_method`,
/// fall back to `AUTOLOAD` on a miss, and raise `UnknownMethod` (§7) if
/// neither exists. The one place in this crate that actually constructs
/// that error variant — `find_method` itself stays `Option`-returning
/// per §4.6/§8's boundary scenario (a bare miss is not by itself fatal;
/// it only becomes fatal at an actual call site like this one).
pub fn dispatch_method(package: &str, method: &str) -> quill_core::QuillResult<(Cv, String)> {
    find_method(package, method)
        .or_else(|| find_autoload(package))
        .ok_or_else(|| quill_core::QuillError::UnknownMethod(method.to_string()))
}

/// Whether `package` (or an ancestor) appears in `package`'s own `@ISA`
/// chain, i.e. `$obj->isa($package)`. Every package `isa("UNIVERSAL")`.
pub fn isa_check(package: &str, candidate: &str) -> bool {
    if package == candidate || candidate == "UNIVERSAL" {
        return true;
    }
    let mut visited = HashSet::new();
    isa_check_rec(package, candidate, &mut visited)
}

fn isa_check_rec(package: &str, candidate: &str, visited: &mut HashSet<String>) -> bool {
    if !visited.insert(package.to_string()) {
        return false;
    }
    let stash = Stash::get(package);
    for parent in stash.isa() {
        if parent == candidate || isa_check_rec(&parent, candidate, visited) {
            return true;
        }
    }
    false
}

/// Resolve a fully or partially qualified symbolic name (`"Foo::bar"` or
/// bare `"bar"`, taken to mean `"main::bar"`) to its package and local
/// name, the split every symbolic-reference lookup needs (§4.6).
pub fn split_qualified(name: &str) -> (String, String) {
    match name.rsplit_once("::") {
        Some((pkg, local)) => (pkg.to_string(), local.to_string()),
        None => ("main".to_string(), name.to_string()),
    }
}

/// Symbolic scalar dereference: `$$name` where `name` is itself a string.
pub fn resolve_symbolic_scalar(name: &str) -> Sv {
    let (pkg, local) = split_qualified(name);
    Stash::get(&pkg).resolve_scalar(&local)
}

pub fn resolve_symbolic_array(name: &str) -> Sv {
    let (pkg, local) = split_qualified(name);
    Stash::get(&pkg).resolve_array(&local)
}

pub fn resolve_symbolic_hash(name: &str) -> Sv {
    let (pkg, local) = split_qualified(name);
    Stash::get(&pkg).resolve_hash(&local)
}

pub fn resolve_symbolic_code(name: &str) -> Option<Cv> {
    let (pkg, local) = split_qualified(name);
    Stash::get(&pkg).resolve_code(&local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Arc as StdArc;

    #[test]
    #[serial]
    fn glob_lookup_is_idempotent_within_a_package() {
        let stash = Stash::get("Test::GlobIdempotent");
        let a = stash.glob("x");
        let b = stash.glob("x");
        assert_eq!(a.name(), b.name());
        a.set_scalar(Sv::new_int(1));
        assert_eq!(b.scalar().as_int(), 1);
    }

    #[test]
    #[serial]
    fn method_resolution_walks_isa_left_to_right() {
        let base = Stash::get("Test::MroBase");
        base.define_sub(
            "greet",
            quill_core::Cv::new_anonymous(StdArc::new(|_ctx| Ok(Sv::new_string("base")))),
        );
        let mixin = Stash::get("Test::MroMixin");
        mixin.define_sub(
            "greet",
            quill_core::Cv::new_anonymous(StdArc::new(|_ctx| Ok(Sv::new_string("mixin")))),
        );
        let child = Stash::get("Test::MroChild");
        child.push_isa("Test::MroMixin");
        child.push_isa("Test::MroBase");

        let (cv, defining_package) = find_method("Test::MroChild", "greet").unwrap();
        let mut ctx = quill_core::CallContext::new(vec![], quill_core::WantArray::Scalar);
        let result = cv.call(&mut ctx).unwrap();
        assert_eq!(result.as_string_lossy(), "mixin");
        assert_eq!(defining_package, "Test::MroMixin");
    }

    #[test]
    #[serial]
    fn cyclic_isa_does_not_infinite_loop() {
        let a = Stash::get("Test::CycleA");
        let b = Stash::get("Test::CycleB");
        a.push_isa("Test::CycleB");
        b.push_isa("Test::CycleA");
        assert!(find_method("Test::CycleA", "nonexistent").is_none());
    }

    #[test]
    #[serial]
    fn isa_check_reports_transitive_ancestry() {
        let child = Stash::get("Test::IsaChild");
        let parent = Stash::get("Test::IsaParent");
        let _ = parent;
        child.push_isa("Test::IsaParent");
        assert!(isa_check("Test::IsaChild", "Test::IsaParent"));
        assert!(!isa_check("Test::IsaParent", "Test::IsaChild"));
    }

    #[test]
    #[serial]
    fn find_method_falls_back_to_universal_on_total_miss() {
        let universal = Stash::get("UNIVERSAL");
        universal.define_sub(
            "isa",
            quill_core::Cv::new_anonymous(StdArc::new(|_ctx| Ok(Sv::new_int(1)))),
        );
        let orphan = Stash::get("Test::UniversalFallback");
        let _ = orphan;
        let (_cv, defining_package) = find_method("Test::UniversalFallback", "isa").unwrap();
        assert_eq!(defining_package, "UNIVERSAL");
    }

    #[test]
    #[serial]
    fn every_package_isa_universal() {
        assert!(isa_check("Test::AnyPackage", "UNIVERSAL"));
    }

    #[test]
    #[serial]
    fn dispatch_method_falls_back_to_autoload_then_to_unknown_method() {
        let has_autoload = Stash::get("Test::DispatchAutoload");
        has_autoload.define_sub(
            "AUTOLOAD",
            quill_core::Cv::new_anonymous(StdArc::new(|_ctx| Ok(Sv::new_string("caught")))),
        );
        let (cv, pkg) = dispatch_method("Test::DispatchAutoload", "missing").unwrap();
        assert_eq!(pkg, "Test::DispatchAutoload");
        let mut ctx = quill_core::CallContext::new(vec![], quill_core::WantArray::Scalar);
        assert_eq!(cv.call(&mut ctx).unwrap().as_string_lossy(), "caught");

        let no_autoload = Stash::get("Test::DispatchNoAutoload");
        let _ = no_autoload;
        let err = dispatch_method("Test::DispatchNoAutoload", "missing").unwrap_err();
        assert!(matches!(err, quill_core::QuillError::UnknownMethod(ref m) if m == "missing"));
    }

    #[test]
    #[serial]
    fn creating_a_nested_package_creates_its_ancestors_and_links_them() {
        let _ = Stash::get("Test::Deep::Nested::Leaf");
        assert!(STASH_REGISTRY.lock().unwrap().contains_key("Test::Deep"));
        assert!(STASH_REGISTRY
            .lock()
            .unwrap()
            .contains_key("Test::Deep::Nested"));
        let mid = Stash::get("Test::Deep");
        assert!(mid.has_glob("Nested::"));
    }

    #[test]
    fn split_qualified_defaults_to_main() {
        assert_eq!(split_qualified("x"), ("main".to_string(), "x".to_string()));
        assert_eq!(
            split_qualified("Foo::Bar::x"),
            ("Foo::Bar".to_string(), "x".to_string())
        );
    }
}
