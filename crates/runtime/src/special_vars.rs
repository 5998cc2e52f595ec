//! The handful of globally-visible special scalars every frame can read or
//! `local`-ize (§4.7): `$_`, the record/output separators, the regex match
//! vars, process identity, and the `eval` error variable `$@`.

use quill_core::Sv;

/// Backing storage for the special variables. Each field is itself an
/// `Sv`, so `local $_` (etc.) composes with the ordinary glob-based
/// `local` machinery in [`crate::runtime::Runtime`] instead of needing its
/// own save/restore path.
pub struct SpecialVars {
    /// `$_`: the default topic for many operators.
    pub underscore: Sv,
    /// `$/`: input record separator.
    pub input_record_sep: Sv,
    /// `$\`: output record separator, appended by `print`.
    pub output_record_sep: Sv,
    /// `$,`: output field separator, joined between `print` arguments.
    pub output_field_sep: Sv,
    /// `$"`: list separator used when interpolating an array into a string.
    pub list_sep: Sv,
    /// `$&`: the text matched by the last successful pattern match.
    pub match_whole: Sv,
    /// `` $` ``: the text preceding the last successful match.
    pub match_prematch: Sv,
    /// `$'`: the text following the last successful match.
    pub match_postmatch: Sv,
    /// `$+`: the last bracket match.
    pub match_last_paren: Sv,
    /// `$1`, `$2`, ...: numbered capture groups from the last match.
    pub match_groups: Vec<Sv>,
    /// `$@`: the error from the most recent `eval`.
    pub at_error: Sv,
    /// `$$`: this process's id.
    pub pid: Sv,
    /// `$<` / `$>`: real / effective user id.
    pub uid: Sv,
    pub euid: Sv,
    /// `$(` / `$)`: real / effective group id.
    pub gid: Sv,
    pub egid: Sv,
    /// `$0`: program name.
    pub program_name: Sv,
    /// `$;`: subscript separator for emulated multidimensional hashes.
    pub subscript_sep: Sv,
    /// `$!`: the last OS/library error, readable as errno or message.
    pub os_error: Sv,
    /// `$?`: the exit status of the last child process or `system` call.
    pub child_status: Sv,
    /// `$~`: the name of the current report format for `write`.
    pub format_name: Sv,
    /// `$^A`: the `write`/`formline` accumulator.
    pub format_accumulator: Sv,
}

impl SpecialVars {
    pub fn new() -> Self {
        SpecialVars {
            underscore: Sv::new_undef(),
            input_record_sep: Sv::new_string("\n"),
            output_record_sep: Sv::new_undef(),
            output_field_sep: Sv::new_undef(),
            list_sep: Sv::new_string(" "),
            match_whole: Sv::new_undef(),
            match_prematch: Sv::new_undef(),
            match_postmatch: Sv::new_undef(),
            match_last_paren: Sv::new_undef(),
            match_groups: Vec::new(),
            at_error: Sv::new_string(""),
            pid: Sv::new_int(0),
            uid: Sv::new_int(0),
            euid: Sv::new_int(0),
            gid: Sv::new_int(0),
            egid: Sv::new_int(0),
            program_name: Sv::new_string(""),
            subscript_sep: Sv::new_string("\u{1c}"),
            os_error: Sv::new_string(""),
            child_status: Sv::new_int(0),
            format_name: Sv::new_string(""),
            format_accumulator: Sv::new_string(""),
        }
    }

    /// `$1`, `$2`, ... one-indexed; `undef` past the number of groups the
    /// last match actually captured.
    pub fn capture(&self, n: usize) -> Sv {
        self.match_groups
            .get(n.wrapping_sub(1))
            .cloned()
            .unwrap_or_else(Sv::new_undef)
    }

    pub fn set_match(&mut self, whole: &str, pre: &str, post: &str, groups: Vec<Option<String>>) {
        self.match_whole = Sv::new_string(whole);
        self.match_prematch = Sv::new_string(pre);
        self.match_postmatch = Sv::new_string(post);
        self.match_last_paren = groups
            .iter()
            .rev()
            .find_map(|g| g.clone())
            .map(Sv::new_string)
            .unwrap_or_else(Sv::new_undef);
        self.match_groups = groups
            .into_iter()
            .map(|g| g.map(Sv::new_string).unwrap_or_else(Sv::new_undef))
            .collect();
    }
}

impl Default for SpecialVars {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_is_one_indexed_and_undef_past_the_end() {
        let mut sv = SpecialVars::new();
        sv.set_match("ab", "", "", vec![Some("a".into()), Some("b".into())]);
        assert_eq!(sv.capture(1).as_string_lossy(), "a");
        assert_eq!(sv.capture(2).as_string_lossy(), "b");
        assert!(sv.capture(3).is_undef());
    }

    #[test]
    fn defaults_match_perl_initial_values() {
        let sv = SpecialVars::new();
        assert_eq!(sv.input_record_sep.as_string_lossy(), "\n");
        assert_eq!(sv.list_sep.as_string_lossy(), " ");
        assert_eq!(sv.at_error.as_string_lossy(), "");
    }
}
