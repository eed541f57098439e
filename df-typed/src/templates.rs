//! Pre-defined loop templates and their specialization to call-site types.
//!
//! Each template is a parametrized fragment builder; specializing one against
//! concrete argument types produces a fresh mini-CFG whose internal variables
//! are all newly named and fully typed, ready for splicing into a host
//! function.

use anyhow::{Context, bail};
use arena_traits::IndexAlloc;
use df_common::{BinOp, DType};
use df_ir::splice::Fragment;
use df_ir::vars::VarMap;
use df_ir::{Block, Cfg, Ident, LVal, Lit, Rhs, Stmt, Term, Ty, TypeMap};
use id_arena::Id;

use crate::alloc::{AllocSpec, gen_alloc};
use crate::lookup;

/// Which operand of a comparison an access applies to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CmpSide {
    Left,
    Right,
}

#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Template {
    /// Element-wise comparison producing a fresh boolean array; `index`
    /// picks the per-element operand, `len` the operand that is measured.
    CmpLoop {
        op: BinOp,
        index: CmpSide,
        len: CmpSide,
    },
    /// Masked copy of a column into a freshly allocated target, with a NaN
    /// sentinel wherever the mask is false.
    MaskFill,
}

/// Mutable typing and naming state threaded through a specialization. The
/// driver owns the canonical maps; this is a reborrow, never a copy.
pub struct SpecCtx<'a> {
    pub typemap: &'a mut TypeMap,
    pub regs: &'a mut VarMap<()>,
}
impl SpecCtx<'_> {
    /// A fresh variable, named and typed in one step.
    pub fn fresh(&mut self, ty: Ty) -> Ident {
        let name = self.regs.alloc(());
        self.typemap.insert(name.clone(), ty);
        name
    }
}

pub fn specialize(
    template: &Template,
    args: &[Ident],
    ctx: &mut SpecCtx,
) -> anyhow::Result<Fragment> {
    match template {
        Template::CmpLoop { op, index, len } => match args {
            [left, right] => cmp_loop(*op, *index, *len, left, right, ctx),
            _ => bail!(
                "in specializing a comparison template: expected 2 arguments, got {}",
                args.len()
            ),
        },
        Template::MaskFill => match args {
            [target, source, mask] => mask_fill(target, source, mask, ctx),
            _ => bail!(
                "in specializing a filter template: expected 3 arguments, got {}",
                args.len()
            ),
        },
    }
}

fn loop_skeleton(cfg: &mut Cfg) -> (Id<Block>, Id<Block>, Id<Block>, Id<Block>) {
    let entry = cfg.blocks.alloc(Default::default());
    let header = cfg.blocks.alloc(Default::default());
    let body = cfg.blocks.alloc(Default::default());
    let exit = cfg.blocks.alloc(Default::default());
    cfg.blocks[entry].term = Term::Jmp(header);
    cfg.blocks[body].term = Term::Jmp(header);
    (entry, header, body, exit)
}

fn cmp_loop(
    op: BinOp,
    index: CmpSide,
    len: CmpSide,
    left: &Ident,
    right: &Ident,
    ctx: &mut SpecCtx,
) -> anyhow::Result<Fragment> {
    if !op.is_cmp() {
        bail!("in specializing a comparison template: `{op:?}` is not a comparison");
    }
    let idx_base = match index {
        CmpSide::Left => left,
        CmpSide::Right => right,
    };
    let len_base = match len {
        CmpSide::Left => left,
        CmpSide::Right => right,
    };
    let elem = lookup(ctx.typemap, idx_base)?
        .element()
        .with_context(|| format!("in taking an element of `{idx_base}`"))?;

    let mut cfg = Cfg::default();
    let (entry, header, body, exit) = loop_skeleton(&mut cfg);

    let l = ctx.fresh(Ty::Scalar(DType::Int64));
    let s = ctx.fresh(Ty::Array(DType::Bool));
    let i = ctx.fresh(Ty::Scalar(DType::Int64));
    let e = ctx.fresh(Ty::Scalar(elem));
    let c = ctx.fresh(Ty::Scalar(DType::Bool));

    cfg.blocks[entry].stmts.push(Stmt::new(
        LVal::Id { id: l.clone() },
        Rhs::Len {
            base: len_base.clone(),
        },
    ));
    cfg.blocks[entry].stmts.extend(gen_alloc(
        &s,
        AllocSpec::Sized {
            len: l.clone(),
            dtype: DType::Bool,
        },
    ));
    cfg.blocks[header].term = Term::ParFor {
        index: i.clone(),
        stop: l.clone(),
        body,
        exit,
    };

    // the non-indexed operand is used as-is, whatever its type
    let (access_l, access_r) = match index {
        CmpSide::Left => (e.clone(), right.clone()),
        CmpSide::Right => (left.clone(), e.clone()),
    };
    cfg.blocks[body].stmts.push(Stmt::new(
        LVal::Id { id: e.clone() },
        Rhs::Index {
            base: idx_base.clone(),
            index: i.clone(),
        },
    ));
    cfg.blocks[body].stmts.push(Stmt::new(
        LVal::Id { id: c.clone() },
        Rhs::Bin {
            left: access_l,
            right: access_r,
            op,
        },
    ));
    cfg.blocks[body].stmts.push(Stmt::new(
        LVal::Index {
            base: s.clone(),
            idx: i.clone(),
        },
        Rhs::Just { id: c.clone() },
    ));

    Ok(Fragment {
        cfg,
        entry,
        exit,
        result: Some(s),
    })
}

fn mask_fill(
    target: &Ident,
    source: &Ident,
    mask: &Ident,
    ctx: &mut SpecCtx,
) -> anyhow::Result<Fragment> {
    let elem = lookup(ctx.typemap, source)?
        .element()
        .with_context(|| format!("in taking an element of `{source}`"))?;

    let mut cfg = Cfg::default();
    let (entry, header, body, exit) = loop_skeleton(&mut cfg);

    let n = ctx.fresh(Ty::Scalar(DType::Int64));
    let i = ctx.fresh(Ty::Scalar(DType::Int64));
    let m = ctx.fresh(Ty::Scalar(DType::Bool));
    let v = ctx.fresh(Ty::Scalar(elem));
    let d = ctx.fresh(Ty::Scalar(DType::Float64));
    let s = ctx.fresh(Ty::Scalar(elem));

    // the allocation comes first so the target is sized before the loop
    cfg.blocks[entry].stmts = gen_alloc(
        target,
        AllocSpec::Like {
            base: source.clone(),
        },
    );
    cfg.blocks[entry].stmts.push(Stmt::new(
        LVal::Id { id: n.clone() },
        Rhs::Len {
            base: target.clone(),
        },
    ));
    cfg.blocks[header].term = Term::ParFor {
        index: i.clone(),
        stop: n.clone(),
        body,
        exit,
    };

    cfg.blocks[body].stmts.push(Stmt::new(
        LVal::Id { id: m.clone() },
        Rhs::Index {
            base: mask.clone(),
            index: i.clone(),
        },
    ));
    cfg.blocks[body].stmts.push(Stmt::new(
        LVal::Id { id: v.clone() },
        Rhs::Index {
            base: source.clone(),
            index: i.clone(),
        },
    ));
    cfg.blocks[body].stmts.push(Stmt::new(
        LVal::Id { id: d.clone() },
        Rhs::Lit {
            lit: Lit::Float(f64::NAN),
        },
    ));
    cfg.blocks[body].stmts.push(Stmt::new(
        LVal::Id { id: s.clone() },
        Rhs::Select {
            cond: m.clone(),
            if_true: v.clone(),
            if_false: d.clone(),
        },
    ));
    cfg.blocks[body].stmts.push(Stmt::new(
        LVal::Index {
            base: target.clone(),
            idx: i.clone(),
        },
        Rhs::Just { id: s.clone() },
    ));

    Ok(Fragment {
        cfg,
        entry,
        exit,
        result: None,
    })
}
