//! The running-program state: call stack, dynamic (`local`) scope,
//! pragmas, and `die`/`eval` unwinding (§4.7).

use crate::special_vars::SpecialVars;
use quill_core::{Cv, Gv, QuillError, QuillResult, Sv};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

/// One entry in the call stack, as `caller()` sees it.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub package: String,
    pub file: String,
    pub line: u32,
    pub sub_name: String,
    pub arguments: Vec<Sv>,
    pub want_array: quill_core::WantArray,
    /// Whether this frame is itself the body of an `eval { }` or `eval ""`.
    pub is_eval: bool,
    /// The source text being compiled, for a frame pushed by `eval ""`.
    pub eval_text: Option<String>,
}

impl StackFrame {
    pub fn new(package: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        StackFrame {
            package: package.into(),
            file: file.into(),
            line,
            sub_name: String::new(),
            arguments: Vec::new(),
            want_array: quill_core::WantArray::Void,
            is_eval: false,
            eval_text: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Sv>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_sub_name(mut self, sub_name: impl Into<String>) -> Self {
        self.sub_name = sub_name.into();
        self
    }

    pub fn with_want_array(mut self, want_array: quill_core::WantArray) -> Self {
        self.want_array = want_array;
        self
    }

    /// Marks this frame as an `eval ""` of `text`, the string form rather
    /// than `eval { }`.
    pub fn as_string_eval(mut self, text: impl Into<String>) -> Self {
        self.is_eval = true;
        self.eval_text = Some(text.into());
        self
    }

    pub fn as_block_eval(mut self) -> Self {
        self.is_eval = true;
        self
    }
}

enum SavedSlot {
    Scalar(Gv, Sv),
    Array(Gv, Sv),
    Hash(Gv, Sv),
}

/// The set of `local`-ized slots belonging to one dynamic scope. Dropping
/// (popping) a frame restores every slot it holds, in reverse order, the
/// way nested `local`s unwind in Perl.
#[derive(Default)]
pub struct LocalFrame {
    saved: Vec<SavedSlot>,
}

/// Lexically-scoped compiler pragmas: `use strict`, `use warnings`,
/// `use feature`.
#[derive(Clone, Default)]
pub struct Pragmas {
    pub strict: bool,
    pub warnings: bool,
    pub features: HashSet<String>,
}

impl Pragmas {
    pub fn has_feature(&self, name: &str) -> bool {
        self.features.contains(name)
    }
}

struct RuntimeInner {
    call_stack: Vec<StackFrame>,
    local_stack: Vec<LocalFrame>,
    pragma_stack: Vec<Pragmas>,
    specials: SpecialVars,
    eval_depth: u32,
    /// `$SIG{__WARN__}`: if set, called with the warning message instead of
    /// writing to stderr.
    warn_handler: Option<Cv>,
    /// `$SIG{__DIE__}`: if set, called with the die message before `eval`
    /// records it in `$@`.
    die_handler: Option<Cv>,
}

/// The execution context an evaluator drives: one `Runtime` per running
/// program (or per thread of execution, if embedding hosts more than one).
pub struct Runtime {
    inner: Mutex<RuntimeInner>,
}

impl Runtime {
    pub fn new() -> Self {
        Runtime {
            inner: Mutex::new(RuntimeInner {
                call_stack: Vec::new(),
                local_stack: Vec::new(),
                pragma_stack: vec![Pragmas::default()],
                specials: SpecialVars::new(),
                eval_depth: 0,
                warn_handler: None,
                die_handler: None,
            }),
        }
    }

    // ---- call stack / caller() -----------------------------------------

    pub fn push_frame(&self, frame: StackFrame) {
        self.inner.lock().unwrap().call_stack.push(frame);
    }

    pub fn pop_frame(&self) -> Option<StackFrame> {
        self.inner.lock().unwrap().call_stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().unwrap().call_stack.len()
    }

    /// `caller(level)`: `level == 0` is the immediate caller of the
    /// currently executing sub.
    pub fn caller(&self, level: usize) -> Option<StackFrame> {
        let stack = &self.inner.lock().unwrap().call_stack;
        let idx = stack.len().checked_sub(level + 1)?;
        stack.get(idx).cloned()
    }

    pub fn stack_trace(&self) -> Vec<StackFrame> {
        self.inner.lock().unwrap().call_stack.clone()
    }

    // ---- local (dynamic) scope ------------------------------------------

    pub fn begin_local_scope(&self) {
        self.inner.lock().unwrap().local_stack.push(LocalFrame::default());
    }

    /// Restores every slot `local`-ized in the current scope, in reverse
    /// declaration order.
    pub fn end_local_scope(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(frame) = inner.local_stack.pop() {
            for slot in frame.saved.into_iter().rev() {
                match slot {
                    SavedSlot::Scalar(gv, old) => gv.set_scalar(old),
                    SavedSlot::Array(gv, old) => gv.set_array(old),
                    SavedSlot::Hash(gv, old) => gv.set_hash(old),
                }
            }
        }
    }

    fn current_local_frame<'a>(inner: &'a mut RuntimeInner) -> &'a mut LocalFrame {
        if inner.local_stack.is_empty() {
            inner.local_stack.push(LocalFrame::default());
        }
        inner.local_stack.last_mut().unwrap()
    }

    /// `local $pkg::name`: saves the glob's current scalar value and resets
    /// it to undef, returning the now-current (fresh) slot value.
    pub fn local_scalar(&self, gv: &Gv) -> Sv {
        let old = gv.scalar();
        gv.set_scalar(Sv::new_undef());
        let mut inner = self.inner.lock().unwrap();
        Self::current_local_frame(&mut inner).saved.push(SavedSlot::Scalar(gv.clone(), old));
        gv.scalar()
    }

    pub fn local_array(&self, gv: &Gv) -> Sv {
        let old = gv.array();
        gv.set_array(Sv::new_array_ref().deref_target().unwrap());
        let mut inner = self.inner.lock().unwrap();
        Self::current_local_frame(&mut inner).saved.push(SavedSlot::Array(gv.clone(), old));
        gv.array()
    }

    pub fn local_hash(&self, gv: &Gv) -> Sv {
        let old = gv.hash();
        gv.set_hash(Sv::new_hash_ref().deref_target().unwrap());
        let mut inner = self.inner.lock().unwrap();
        Self::current_local_frame(&mut inner).saved.push(SavedSlot::Hash(gv.clone(), old));
        gv.hash()
    }

    // ---- pragmas ----------------------------------------------------------

    pub fn push_pragma_scope(&self) {
        let mut inner = self.inner.lock().unwrap();
        let top = inner.pragma_stack.last().cloned().unwrap_or_default();
        inner.pragma_stack.push(top);
    }

    pub fn pop_pragma_scope(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.pragma_stack.len() > 1 {
            inner.pragma_stack.pop();
        }
    }

    pub fn set_strict(&self, on: bool) {
        self.inner.lock().unwrap().pragma_stack.last_mut().unwrap().strict = on;
    }

    pub fn set_warnings(&self, on: bool) {
        self.inner.lock().unwrap().pragma_stack.last_mut().unwrap().warnings = on;
    }

    pub fn enable_feature(&self, name: impl Into<String>) {
        self.inner.lock().unwrap().pragma_stack.last_mut().unwrap().features.insert(name.into());
    }

    pub fn is_strict(&self) -> bool {
        self.inner.lock().unwrap().pragma_stack.last().unwrap().strict
    }

    pub fn is_warnings(&self) -> bool {
        self.inner.lock().unwrap().pragma_stack.last().unwrap().warnings
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.inner.lock().unwrap().pragma_stack.last().unwrap().has_feature(name)
    }

    // ---- special variables --------------------------------------------

    pub fn with_specials<R>(&self, f: impl FnOnce(&SpecialVars) -> R) -> R {
        f(&self.inner.lock().unwrap().specials)
    }

    pub fn with_specials_mut<R>(&self, f: impl FnOnce(&mut SpecialVars) -> R) -> R {
        f(&mut self.inner.lock().unwrap().specials)
    }

    // ---- die / warn / eval ------------------------------------------------

    /// `$SIG{__WARN__} = sub { ... }`: installs a handler `warn` dispatches
    /// to instead of stderr. Passing `None` restores the default.
    pub fn set_warn_handler(&self, handler: Option<Cv>) {
        self.inner.lock().unwrap().warn_handler = handler;
    }

    /// `$SIG{__DIE__} = sub { ... }`: installs a handler `die` invokes
    /// (for side effects like logging) before the error unwinds.
    pub fn set_die_handler(&self, handler: Option<Cv>) {
        self.inner.lock().unwrap().die_handler = handler;
    }

    /// `warn "...";`: dispatched to `$SIG{__WARN__}` if one is installed,
    /// otherwise written straight to stderr — no logging framework
    /// involved (there is nothing downstream of this process to forward
    /// structured records to).
    pub fn warn(&self, message: &str) {
        let handler = self.inner.lock().unwrap().warn_handler.clone();
        if let Some(handler) = handler {
            let mut ctx = quill_core::CallContext::new(
                vec![Sv::new_string(message)],
                quill_core::WantArray::Void,
            );
            let _ = handler.call(&mut ctx);
            return;
        }
        use std::io::Write;
        let mut stderr = std::io::stderr();
        let _ = if message.ends_with('\n') {
            write!(stderr, "{message}")
        } else {
            writeln!(stderr, "{message} at - line 0.")
        };
    }

    /// `die "...";`: runs `$SIG{__DIE__}` (if installed) for its side
    /// effects, then returns the error for the caller to propagate or for
    /// `try_eval` to catch.
    pub fn die(&self, message: impl Into<String>) -> QuillError {
        let message = message.into();
        let handler = self.inner.lock().unwrap().die_handler.clone();
        if let Some(handler) = handler {
            let mut ctx = quill_core::CallContext::new(
                vec![Sv::new_string(message.clone())],
                quill_core::WantArray::Void,
            );
            let _ = handler.call(&mut ctx);
        }
        QuillError::UserDie(message)
    }

    fn enter_eval(&self) {
        self.inner.lock().unwrap().eval_depth += 1;
    }

    fn leave_eval(&self, result: &QuillResult<Sv>) {
        let mut inner = self.inner.lock().unwrap();
        inner.eval_depth -= 1;
        match result {
            Ok(_) => inner.specials.at_error = Sv::new_string(""),
            Err(e) => inner.specials.at_error = Sv::new_string(e.die_message()),
        }
    }

    pub fn eval_depth(&self) -> u32 {
        self.inner.lock().unwrap().eval_depth
    }

    /// `eval { ... }`: runs `body`, catching both a `QuillError` unwind and
    /// a host panic (treated as `die` with the panic payload as the
    /// message), and reports the outcome through `$@` rather than
    /// propagating it to the caller.
    pub fn try_eval(&self, body: impl FnOnce() -> QuillResult<Sv>) -> Sv {
        self.enter_eval();
        let outcome = catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|payload| {
            Err(QuillError::HostPanic(panic_message(payload)))
        });
        self.leave_eval(&outcome);
        match outcome {
            Ok(v) => v,
            Err(_) => Sv::new_undef(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
