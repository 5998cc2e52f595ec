//! Free-function entry points for glob slot access (§4.5). Mechanics live
//! on [`Gv`] itself; this module is the short-named call surface.

use crate::value::{Gv, Sv};

pub fn scalar(gv: &Gv) -> Sv {
    gv.scalar()
}

pub fn array(gv: &Gv) -> Sv {
    gv.array()
}

pub fn hash(gv: &Gv) -> Sv {
    gv.hash()
}

pub fn code(gv: &Gv) -> Option<Sv> {
    gv.code()
}

pub fn io(gv: &Gv) -> Option<Sv> {
    gv.io()
}

pub fn assign(gv: &Gv, value: &Sv) {
    gv.assign(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SvType;

    #[test]
    fn scalar_array_hash_slots_vivify_independently() {
        let gv = Gv::new("main", "x");
        assert_eq!(scalar(&gv).ty(), SvType::Undef);
        assert_eq!(array(&gv).ty(), SvType::Array);
        assert_eq!(hash(&gv).ty(), SvType::Hash);
    }

    #[test]
    fn code_and_io_default_to_none() {
        let gv = Gv::new("main", "x");
        assert!(code(&gv).is_none());
        assert!(io(&gv).is_none());
    }

    #[test]
    fn assign_code_ref_populates_code_slot() {
        let gv = Gv::new("main", "x");
        let cv = crate::value::Cv::new_anonymous(std::sync::Arc::new(|ctx| {
            Ok(ctx.args[0].incref())
        }));
        let code_ref = Sv::new_ref(Sv::new_code(cv));
        assign(&gv, &code_ref);
        assert!(code(&gv).is_some());
    }
}
