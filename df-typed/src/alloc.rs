use df_common::DType;
use df_ir::{Ident, LVal, Rhs, Stmt};

/// How a fragment's result array gets its storage.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum AllocSpec {
    /// A fresh array of `len` elements of `dtype`.
    Sized { len: Ident, dtype: DType },
    /// A fresh array matching an existing one's shape and dtype.
    Like { base: Ident },
}

/// The instruction sequence performing the allocation into `target`.
pub fn gen_alloc(target: &Ident, strategy: AllocSpec) -> Vec<Stmt> {
    let right = match strategy {
        AllocSpec::Sized { len, dtype } => Rhs::Alloc { len, dtype },
        AllocSpec::Like { base } => Rhs::AllocLike { base },
    };
    vec![Stmt::new(LVal::Id { id: target.clone() }, right)]
}
