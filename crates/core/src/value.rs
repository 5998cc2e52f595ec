//! The universal scalar value (SV) and the entities layered on it: arrays,
//! hashes, code values (CV) and globs (GV).
//!
//! Real interpreters for this family of language give AV/HV/CV/GV their own
//! C structs that are cast-compatible with SV; in safe Rust the cheapest way
//! to get the same "everything is reachable through one handle" property is
//! to make each of them a cheap `Arc<Mutex<..>>` wrapper, exactly the shape
//! `Sv` itself uses. Keeping Cv/Gv defined here (rather than in the runtime
//! crate) is what lets an `Sv` hold a `Code`/`Glob` variant directly without
//! a dependency cycle between the value layer and the runtime layer.

use crate::error::{QuillError, QuillResult};
use crate::flags::{self, SvFlags};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// The logical type tag of an [`Sv`]. Distinct from the flag bits, which
/// track which *cached* representations are currently valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SvType {
    Undef,
    Int,
    Float,
    Str,
    Ref,
    Array,
    Hash,
    Code,
    Glob,
    Regex,
    Io,
}

impl SvType {
    /// The bareword perl-ish `ref()` name used when formatting `as_string`.
    pub fn type_name(self) -> &'static str {
        match self {
            SvType::Undef | SvType::Int | SvType::Float | SvType::Str => "SCALAR",
            SvType::Ref => "REF",
            SvType::Array => "ARRAY",
            SvType::Hash => "HASH",
            SvType::Code => "CODE",
            SvType::Glob => "GLOB",
            SvType::Regex => "Regexp",
            SvType::Io => "IO",
        }
    }
}

/// Either a strong (owning) or weak (non-owning) edge to a referent SV.
#[derive(Clone)]
pub enum RefTarget {
    Strong(Sv),
    Weak(Weak<Mutex<SvInner>>),
}

impl RefTarget {
    /// Upgrade to a strong handle. A weak edge whose referent has already
    /// been released yields `None`, matching Perl's "weak ref goes undef".
    pub fn upgrade(&self) -> Option<Sv> {
        match self {
            RefTarget::Strong(sv) => Some(sv.clone()),
            RefTarget::Weak(w) => w.upgrade().map(Sv),
        }
    }
}

/// Hash storage plus the `each` iteration cursor (§4.3).
#[derive(Default)]
pub struct HashBody {
    pub map: HashMap<String, Sv>,
    /// Snapshot of keys taken on the first `each` call after a reset.
    pub iter_snapshot: Option<Vec<String>>,
    pub iter_pos: usize,
}

impl HashBody {
    pub fn reset_iterator(&mut self) {
        self.iter_snapshot = None;
        self.iter_pos = 0;
    }
}

/// Opaque file-handle-like value. The core stores only an identity; actual
/// I/O is a collaborator's concern (§6).
#[derive(Clone)]
pub struct IoHandle {
    pub label: Arc<str>,
}

/// How many values a call site wants back (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WantArray {
    Void,
    Scalar,
    List,
}

impl WantArray {
    pub fn as_i8(self) -> i8 {
        match self {
            WantArray::Void => -1,
            WantArray::Scalar => 0,
            WantArray::List => 1,
        }
    }
}

/// Everything a callable needs to run: arguments, a lexical pad, caller
/// identity, the arity the caller wants, and a slot to report failure.
///
/// Deliberately plain data (no reference to a `Runtime`): building one from
/// the real call stack, and pushing/popping the matching `StackFrame`, is
/// `quill_runtime::Runtime`'s job. This keeps `Cv::call` usable from the
/// value layer itself (array/hash higher-order operations build a minimal
/// ad hoc context rather than depending on the runtime crate).
pub struct CallContext {
    pub args: Vec<Sv>,
    pub pad: Vec<Option<Sv>>,
    pub caller_package: String,
    pub caller_file: String,
    pub caller_line: u32,
    pub want_array: WantArray,
    pub error: Option<QuillError>,
}

impl CallContext {
    pub fn new(args: Vec<Sv>, want_array: WantArray) -> Self {
        CallContext {
            args,
            pad: Vec::new(),
            caller_package: "main".to_string(),
            caller_file: "-".to_string(),
            caller_line: 0,
            want_array,
            error: None,
        }
    }
}

/// A host or evaluator-supplied callable body. Opaque to the core (§6): it
/// is handed a [`CallContext`] and must produce one [`Sv`].
pub type Callable = dyn Fn(&mut CallContext) -> QuillResult<Sv> + Send + Sync;

enum CvBody {
    Callable(Arc<Callable>),
    /// A constant sub: every call returns the same SV, incref'd to the caller.
    Constant(Sv),
}

#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct CvFlags {
    pub lvalue: bool,
    pub method: bool,
    pub locked: bool,
}

pub struct CvInner {
    body: CvBody,
    package: String,
    name: String,
    prototype: String,
    attributes: HashMap<String, Option<String>>,
    flags: CvFlags,
    pad_names: Vec<String>,
    outer: Option<Cv>,
    captured_pad: Option<Vec<Sv>>,
}

/// A code value: a closure over an optional captured pad plus the body that
/// actually runs.
#[derive(Clone)]
pub struct Cv(Arc<Mutex<CvInner>>);

impl Cv {
    fn from_inner(inner: CvInner) -> Self {
        Cv(Arc::new(Mutex::new(inner)))
    }

    /// A plain (non-closure) callable bound to a package and name.
    pub fn new_named(
        package: impl Into<String>,
        name: impl Into<String>,
        prototype: impl Into<String>,
        body: Arc<Callable>,
    ) -> Self {
        Cv::from_inner(CvInner {
            body: CvBody::Callable(body),
            package: package.into(),
            name: name.into(),
            prototype: prototype.into(),
            attributes: HashMap::new(),
            flags: CvFlags::default(),
            pad_names: Vec::new(),
            outer: None,
            captured_pad: None,
        })
    }

    /// An anonymous callable, as produced by an evaluator for `sub { ... }`.
    pub fn new_anonymous(body: Arc<Callable>) -> Self {
        Cv::new_named("main", "", "", body)
    }

    /// A constant sub bound to a single SV (§4.4).
    pub fn new_constant(value: Sv) -> Self {
        Cv::from_inner(CvInner {
            body: CvBody::Constant(value),
            package: "main".to_string(),
            name: "".to_string(),
            prototype: "".to_string(),
            attributes: HashMap::new(),
            flags: CvFlags::default(),
            pad_names: Vec::new(),
            outer: None,
            captured_pad: None,
        })
    }

    /// Produce a closure over `self`: `captured` is incref'd into the new
    /// CV's private pad, independent of any other closure built from the
    /// same outer CV.
    pub fn make_closure(&self, captured: Vec<Sv>) -> Self {
        let inner = self.0.lock().unwrap();
        let body = match &inner.body {
            CvBody::Callable(f) => CvBody::Callable(f.clone()),
            CvBody::Constant(v) => CvBody::Constant(v.clone()),
        };
        let closure = CvInner {
            body,
            package: inner.package.clone(),
            name: inner.name.clone(),
            prototype: inner.prototype.clone(),
            attributes: inner.attributes.clone(),
            flags: inner.flags,
            pad_names: inner.pad_names.clone(),
            outer: Some(self.clone()),
            captured_pad: Some(captured),
        };
        drop(inner);
        Cv::from_inner(closure)
    }

    pub fn package(&self) -> String {
        self.0.lock().unwrap().package.clone()
    }

    pub fn name(&self) -> String {
        self.0.lock().unwrap().name.clone()
    }

    pub fn set_name(&self, package: impl Into<String>, name: impl Into<String>) {
        let mut inner = self.0.lock().unwrap();
        inner.package = package.into();
        inner.name = name.into();
    }

    pub fn prototype(&self) -> String {
        self.0.lock().unwrap().prototype.clone()
    }

    pub fn set_prototype(&self, proto: impl Into<String>) {
        self.0.lock().unwrap().prototype = proto.into();
    }

    pub fn set_pad_names(&self, names: Vec<String>) {
        self.0.lock().unwrap().pad_names = names;
    }

    pub fn pad_names(&self) -> Vec<String> {
        self.0.lock().unwrap().pad_names.clone()
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: Option<String>) {
        let mut inner = self.0.lock().unwrap();
        let name = name.into();
        match name.as_str() {
            ":lvalue" => inner.flags.lvalue = true,
            ":method" => inner.flags.method = true,
            ":locked" => inner.flags.locked = true,
            _ => {}
        }
        inner.attributes.insert(name, value);
    }

    pub fn attributes(&self) -> HashMap<String, Option<String>> {
        self.0.lock().unwrap().attributes.clone()
    }

    pub fn flags(&self) -> CvFlags {
        self.0.lock().unwrap().flags
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.0.lock().unwrap().body, CvBody::Constant(_))
    }

    /// Identity used for `as_string` formatting and `==` on code refs.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Invoke, returning a single SV per the calling convention (§4.4).
    ///
    /// Closure pads are merged into `ctx.pad` at indices the caller left
    /// empty, preserving call-site overrides.
    pub fn call(&self, ctx: &mut CallContext) -> QuillResult<Sv> {
        let (body, outer_merge) = {
            let inner = self.0.lock().unwrap();
            let body = match &inner.body {
                CvBody::Callable(f) => Some(f.clone()),
                CvBody::Constant(v) => return Ok(v.incref()),
            };
            (body, inner.captured_pad.clone())
        };
        if let Some(captured) = outer_merge {
            if ctx.pad.len() < captured.len() {
                ctx.pad.resize_with(captured.len(), || None);
            }
            for (i, sv) in captured.into_iter().enumerate() {
                if ctx.pad[i].is_none() {
                    ctx.pad[i] = Some(sv);
                }
            }
        }
        let body = body.expect("non-constant CvBody always has a Callable");
        body(ctx)
    }

    /// Invoke in list context: a single return that is a ref-to-array
    /// flattens into its elements (§4.4).
    pub fn call_list(&self, ctx: &mut CallContext) -> QuillResult<Vec<Sv>> {
        let result = self.call(ctx)?;
        if result.ty() == SvType::Ref {
            if let Some(referent) = result.deref_target() {
                if referent.ty() == SvType::Array {
                    let inner = referent.0.lock().unwrap();
                    if let SvRepr::Array(items) = &inner.repr {
                        return Ok(items.iter().map(|v| v.incref()).collect());
                    }
                }
            }
        }
        Ok(vec![result])
    }
}

struct GvInner {
    name: String,
    package: String,
    scalar: Option<Sv>,
    array: Option<Sv>,
    hash: Option<Sv>,
    code: Option<Sv>,
    io: Option<Sv>,
}

/// A glob: the five independent slots bound to one name in one package (§4.5).
#[derive(Clone)]
pub struct Gv(Arc<Mutex<GvInner>>);

impl Gv {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Gv(Arc::new(Mutex::new(GvInner {
            name: name.into(),
            package: package.into(),
            scalar: None,
            array: None,
            hash: None,
            code: None,
            io: None,
        })))
    }

    pub fn name(&self) -> String {
        self.0.lock().unwrap().name.clone()
    }

    pub fn package(&self) -> String {
        self.0.lock().unwrap().package.clone()
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// `*pkg::name{SCALAR}`: lazily vivifies an undef scalar.
    pub fn scalar(&self) -> Sv {
        let mut inner = self.0.lock().unwrap();
        inner.scalar.get_or_insert_with(Sv::new_undef).clone()
    }

    pub fn set_scalar(&self, value: Sv) {
        self.0.lock().unwrap().scalar = Some(value);
    }

    /// `*pkg::name{ARRAY}`: lazily vivifies an empty array.
    pub fn array(&self) -> Sv {
        let mut inner = self.0.lock().unwrap();
        inner.array.get_or_insert_with(Sv::new_array).clone()
    }

    pub fn set_array(&self, value: Sv) {
        self.0.lock().unwrap().array = Some(value);
    }

    /// `*pkg::name{HASH}`: lazily vivifies an empty hash.
    pub fn hash(&self) -> Sv {
        let mut inner = self.0.lock().unwrap();
        inner.hash.get_or_insert_with(Sv::new_hash).clone()
    }

    pub fn set_hash(&self, value: Sv) {
        self.0.lock().unwrap().hash = Some(value);
    }

    /// `*pkg::name{CODE}`: `None` if never assigned.
    pub fn code(&self) -> Option<Sv> {
        self.0.lock().unwrap().code.clone()
    }

    pub fn set_code(&self, value: Option<Sv>) {
        self.0.lock().unwrap().code = value;
    }

    pub fn io(&self) -> Option<Sv> {
        self.0.lock().unwrap().io.clone()
    }

    pub fn set_io(&self, value: Option<Sv>) {
        self.0.lock().unwrap().io = value;
    }

    /// `*foo = $x` / `*foo = \@x` / ...: route by the assigned value's
    /// (referent's) type, aliasing the slot to the referent rather than
    /// wrapping it in another layer of reference (§4.5).
    pub fn assign(&self, value: &Sv) {
        let target = if value.ty() == SvType::Ref {
            value.deref_target().unwrap_or_else(|| value.clone())
        } else {
            value.clone()
        };
        match target.ty() {
            SvType::Array => self.set_array(target),
            SvType::Hash => self.set_hash(target),
            SvType::Code => self.set_code(Some(target)),
            SvType::Io => self.set_io(Some(target)),
            _ => self.set_scalar(target),
        }
    }
}

/// The concrete payload behind an [`SvType`]. Only the variant matching
/// `ty` is populated; the scalar cache slots (`ival`/`nval`/`sval`) on
/// [`SvInner`] are independent of this and may be populated for any type.
enum SvRepr {
    Scalar,
    Ref(RefTarget),
    Array(Vec<Sv>),
    Hash(HashBody),
    Code(Cv),
    Glob(Gv),
    Regex(Arc<regex::Regex>),
    Io(IoHandle),
}

pub struct SvInner {
    ty: SvType,
    flags: SvFlags,
    ival: i64,
    nval: f64,
    sval: Option<Arc<[u8]>>,
    bless_pkg: Option<Arc<str>>,
    repr: SvRepr,
}

/// The universal polymorphic value (§3). Cheap to clone (an `Arc` bump);
/// `incref`/`decref`/`refcount` below make that cost explicit at call sites
/// that care, matching the spec's refcounting contract even though Rust's
/// own `Drop` glue does the actual releasing.
#[derive(Clone)]
pub struct Sv(Arc<Mutex<SvInner>>);

impl Sv {
    fn from_inner(inner: SvInner) -> Self {
        Sv(Arc::new(Mutex::new(inner)))
    }

    fn lock(&self) -> MutexGuard<'_, SvInner> {
        self.0.lock().unwrap()
    }

    // ---- factories (§4.1) ----------------------------------------------

    pub fn new_undef() -> Self {
        Sv::from_inner(SvInner {
            ty: SvType::Undef,
            flags: SvFlags::empty(),
            ival: 0,
            nval: 0.0,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Scalar,
        })
    }

    pub fn new_int(n: i64) -> Self {
        let mut flags = SvFlags::empty();
        flags.set(flags::IOK);
        Sv::from_inner(SvInner {
            ty: SvType::Int,
            flags,
            ival: n,
            nval: 0.0,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Scalar,
        })
    }

    pub fn new_float(n: f64) -> Self {
        let mut flags = SvFlags::empty();
        flags.set(flags::NOK);
        Sv::from_inner(SvInner {
            ty: SvType::Float,
            flags,
            ival: 0,
            nval: n,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Scalar,
        })
    }

    pub fn new_string(s: impl Into<Vec<u8>>) -> Self {
        let bytes = s.into();
        let is_utf8 = std::str::from_utf8(&bytes).is_ok();
        let mut flags = SvFlags::empty();
        flags.set(flags::POK);
        if is_utf8 {
            flags.set(flags::UTF8);
        }
        Sv::from_inner(SvInner {
            ty: SvType::Str,
            flags,
            ival: 0,
            nval: 0.0,
            sval: Some(Arc::from(bytes.into_boxed_slice())),
            bless_pkg: None,
            repr: SvRepr::Scalar,
        })
    }

    fn new_ref_to(target: RefTarget) -> Self {
        let mut flags = SvFlags::empty();
        flags.set(flags::ROK);
        Sv::from_inner(SvInner {
            ty: SvType::Ref,
            flags,
            ival: 0,
            nval: 0.0,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Ref(target),
        })
    }

    pub fn new_ref(target: Sv) -> Self {
        Sv::new_ref_to(RefTarget::Strong(target))
    }

    /// A reference that does not keep its referent alive (§9, weak refs
    /// break cycles that pure refcounting would otherwise leak).
    pub fn new_weak_ref(target: &Sv) -> Self {
        let weak = Arc::downgrade(&target.0);
        let mut sv = Sv::new_ref_to(RefTarget::Weak(weak));
        sv.lock().flags.set(flags::WEAK);
        sv
    }

    fn new_array() -> Self {
        Sv::from_inner(SvInner {
            ty: SvType::Array,
            flags: SvFlags::empty(),
            ival: 0,
            nval: 0.0,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Array(Vec::new()),
        })
    }

    fn new_hash() -> Self {
        Sv::from_inner(SvInner {
            ty: SvType::Hash,
            flags: SvFlags::empty(),
            ival: 0,
            nval: 0.0,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Hash(HashBody::default()),
        })
    }

    /// `[...]`: a reference to a freshly allocated array.
    pub fn new_array_ref() -> Self {
        Sv::new_ref(Sv::new_array())
    }

    /// `{...}`: a reference to a freshly allocated hash.
    pub fn new_hash_ref() -> Self {
        Sv::new_ref(Sv::new_hash())
    }

    pub fn new_code(cv: Cv) -> Self {
        Sv::from_inner(SvInner {
            ty: SvType::Code,
            flags: SvFlags::empty(),
            ival: 0,
            nval: 0.0,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Code(cv),
        })
    }

    pub fn new_glob(gv: Gv) -> Self {
        Sv::from_inner(SvInner {
            ty: SvType::Glob,
            flags: SvFlags::empty(),
            ival: 0,
            nval: 0.0,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Glob(gv),
        })
    }

    pub fn new_regex(re: regex::Regex) -> Self {
        Sv::from_inner(SvInner {
            ty: SvType::Regex,
            flags: SvFlags::empty(),
            ival: 0,
            nval: 0.0,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Regex(Arc::new(re)),
        })
    }

    pub fn new_io(label: impl Into<Arc<str>>) -> Self {
        Sv::from_inner(SvInner {
            ty: SvType::Io,
            flags: SvFlags::empty(),
            ival: 0,
            nval: 0.0,
            sval: None,
            bless_pkg: None,
            repr: SvRepr::Io(IoHandle {
                label: label.into(),
            }),
        })
    }

    // ---- identity / lifecycle -------------------------------------------

    pub fn ty(&self) -> SvType {
        self.lock().ty
    }

    pub fn is_undef(&self) -> bool {
        self.ty() == SvType::Undef
    }

    pub fn is_ref(&self) -> bool {
        self.ty() == SvType::Ref
    }

    pub fn is_array(&self) -> bool {
        self.ty() == SvType::Array
    }

    pub fn is_hash(&self) -> bool {
        self.ty() == SvType::Hash
    }

    pub fn is_code(&self) -> bool {
        self.ty() == SvType::Code
    }

    pub fn is_blessed(&self) -> bool {
        self.lock().bless_pkg.is_some()
    }

    pub fn is_readonly(&self) -> bool {
        self.lock().flags.contains(flags::RO)
    }

    pub fn set_readonly(&self, ro: bool) {
        let mut inner = self.lock();
        if ro {
            inner.flags.set(flags::RO);
        } else {
            inner.flags.clear(flags::RO);
        }
    }

    fn check_writable(&self) -> QuillResult<()> {
        if self.is_readonly() {
            Err(QuillError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Opaque nonzero identity used by reference stringification and numeric
    /// coercion of references/containers.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Strong-count based refcount, mirroring the spec's manual-refcount
    /// contract: every live handle (this one plus any held elsewhere) counts.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Returns a new handle sharing ownership (bumps the refcount).
    pub fn incref(&self) -> Sv {
        self.clone()
    }

    /// Drops this handle (decrements the refcount; releases the storage
    /// transitively once the last handle is gone).
    pub fn decref(self) {
        drop(self)
    }

    // ---- references -------------------------------------------------------

    /// Follows a `Ref`-typed SV to its referent. `None` if not a reference,
    /// or if a weak reference's target has already been released.
    pub fn deref_target(&self) -> Option<Sv> {
        let inner = self.lock();
        match &inner.repr {
            SvRepr::Ref(target) => target.upgrade(),
            _ => None,
        }
    }

    /// The spec's named `deref` contract entry: `NotAReference` on a
    /// non-reference SV, and on a weak reference whose target is gone.
    pub fn deref(&self) -> QuillResult<Sv> {
        self.deref_target().ok_or(QuillError::NotAReference)
    }

    /// The spec's named `set_ref` contract entry: turns this SV into a
    /// strong reference to `target`, the public counterpart of
    /// `raw_set_ref` used by the `new_ref`/`new_array_ref`/`new_hash_ref`
    /// factories.
    pub fn set_ref(&self, target: Sv) -> QuillResult<()> {
        self.raw_set_ref(target)
    }

    pub fn bless(&self, package: impl Into<String>) -> QuillResult<()> {
        if self.ty() != SvType::Ref {
            return Err(QuillError::NotBlessable);
        }
        let mut inner = self.lock();
        inner.bless_pkg = Some(Arc::from(package.into()));
        inner.flags.set(flags::BLESSED);
        Ok(())
    }

    pub fn bless_package(&self) -> Option<String> {
        self.lock().bless_pkg.as_ref().map(|p| p.to_string())
    }

    // ---- container/code/glob/regex/io accessors ---------------------------

    pub fn as_code(&self) -> Option<Cv> {
        let inner = self.lock();
        match &inner.repr {
            SvRepr::Code(cv) => Some(cv.clone()),
            _ => None,
        }
    }

    pub fn as_glob(&self) -> Option<Gv> {
        let inner = self.lock();
        match &inner.repr {
            SvRepr::Glob(gv) => Some(gv.clone()),
            _ => None,
        }
    }

    pub fn as_regex(&self) -> Option<Arc<regex::Regex>> {
        let inner = self.lock();
        match &inner.repr {
            SvRepr::Regex(re) => Some(re.clone()),
            _ => None,
        }
    }

    pub fn as_io(&self) -> Option<Arc<str>> {
        let inner = self.lock();
        match &inner.repr {
            SvRepr::Io(io) => Some(io.label.clone()),
            _ => None,
        }
    }

    // ---- internal accessors used by sibling modules in this crate --------

    pub(crate) fn with_array<R>(&self, f: impl FnOnce(&mut Vec<Sv>) -> R) -> Option<R> {
        let mut inner = self.lock();
        match &mut inner.repr {
            SvRepr::Array(items) => Some(f(items)),
            _ => None,
        }
    }

    pub(crate) fn with_hash<R>(&self, f: impl FnOnce(&mut HashBody) -> R) -> Option<R> {
        let mut inner = self.lock();
        match &mut inner.repr {
            SvRepr::Hash(body) => Some(f(body)),
            _ => None,
        }
    }

    pub(crate) fn raw_flags(&self) -> SvFlags {
        self.lock().flags
    }

    pub(crate) fn raw_set(
        &self,
        ty: SvType,
        ival: i64,
        nval: f64,
        sval: Option<Arc<[u8]>>,
        cache_bit: u16,
        utf8: bool,
    ) -> QuillResult<()> {
        self.check_writable()?;
        let mut inner = self.lock();
        inner.ty = ty;
        inner.ival = ival;
        inner.nval = nval;
        inner.sval = sval;
        inner.repr = SvRepr::Scalar;
        inner.bless_pkg = None;
        inner.flags.clear_caches();
        inner.flags.clear(flags::ROK);
        inner.flags.clear(flags::BLESSED);
        inner.flags.set(cache_bit);
        if utf8 {
            inner.flags.set(flags::UTF8);
        }
        Ok(())
    }

    pub(crate) fn raw_set_ref(&self, target: Sv) -> QuillResult<()> {
        self.check_writable()?;
        let mut inner = self.lock();
        inner.ty = SvType::Ref;
        inner.sval = None;
        inner.bless_pkg = None;
        inner.flags.clear_caches();
        inner.flags.clear(flags::BLESSED);
        inner.flags.set(flags::ROK);
        inner.repr = SvRepr::Ref(RefTarget::Strong(target));
        Ok(())
    }

    pub(crate) fn cached_ival(&self) -> Option<i64> {
        let inner = self.lock();
        inner.flags.contains(flags::IOK).then_some(inner.ival)
    }

    pub(crate) fn cached_nval(&self) -> Option<f64> {
        let inner = self.lock();
        inner.flags.contains(flags::NOK).then_some(inner.nval)
    }

    pub(crate) fn cached_sval(&self) -> Option<Arc<[u8]>> {
        let inner = self.lock();
        inner
            .flags
            .contains(flags::POK)
            .then(|| inner.sval.clone())
            .flatten()
    }

    pub(crate) fn cache_ival(&self, v: i64) {
        let mut inner = self.lock();
        inner.ival = v;
        inner.flags.set(flags::IOK);
    }

    pub(crate) fn cache_nval(&self, v: f64) {
        let mut inner = self.lock();
        inner.nval = v;
        inner.flags.set(flags::NOK);
    }

    pub(crate) fn cache_sval(&self, v: Arc<[u8]>, utf8: bool) {
        let mut inner = self.lock();
        inner.sval = Some(v);
        inner.flags.set(flags::POK);
        if utf8 {
            inner.flags.set(flags::UTF8);
        }
    }

    pub(crate) fn repr_type_name(&self) -> &'static str {
        let inner = self.lock();
        match &inner.repr {
            SvRepr::Ref(target) => target
                .upgrade()
                .map(|r| r.repr_type_name())
                .unwrap_or("SCALAR"),
            _ => inner.ty.type_name(),
        }
    }
}

impl PartialEq for Sv {
    /// Identity equality (same underlying storage), used by e.g. `isa`
    /// cycle detection and reference equality checks. Logical equality is
    /// `==`/`eq` as defined in §4.1, not this impl.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Sv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sv({:?}@{:#x})", self.ty(), self.identity())
    }
}
