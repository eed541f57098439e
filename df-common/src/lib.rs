#![no_std]
use core::iter::once;

use either::Either;

#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[non_exhaustive]
pub enum LVal<I> {
    Id { id: I },
    Index { base: I, idx: I },
}
impl<I> LVal<I> {
    pub fn as_ref(&self) -> LVal<&I> {
        match self {
            LVal::Id { id } => LVal::Id { id },
            LVal::Index { base, idx } => LVal::Index { base, idx },
        }
    }
    pub fn refs(self) -> impl Iterator<Item = I> {
        match self {
            LVal::Id { id } => Either::Left(once(id)),
            LVal::Index { base, idx } => Either::Right(once(base).chain(once(idx))),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}
impl BinOp {
    pub fn is_cmp(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum DType {
    Bool,
    Int64,
    Float64,
    Utf8,
}

/// Runtime helpers the rewrite passes recognize by resolved identity rather
/// than by the spelling of the call-site variable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum FrameHelper {
    ToArray,
}
impl FrameHelper {
    pub fn of(module: &str, name: &str) -> Option<Self> {
        Some(match (module, name) {
            ("frame_rt.columns", "to_array") => Self::ToArray,
            _ => return None,
        })
    }
    pub fn key(&self) -> (&'static str, &'static str) {
        match self {
            FrameHelper::ToArray => ("frame_rt.columns", "to_array"),
        }
    }
}
