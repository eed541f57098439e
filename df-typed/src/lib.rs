//! Post-typing rewrite of recognized dataframe operations.
//!
//! Runs once per function, after type inference has resolved every variable.
//! Walks the CFG in topological order, recognizes a fixed set of high-level
//! patterns left behind by earlier lowering (string-array comparisons, the
//! defensive column-normalization call, boolean-mask column filters), and
//! rewrites each into type-concrete instructions, splicing in parallel-loop
//! fragments where needed.

use std::collections::BTreeSet;
use std::mem::take;

use anyhow::Context;
use df_common::{BinOp, FrameHelper};
use df_ir::order::topo_order;
use df_ir::splice::Fragment;
use df_ir::{CallTable, Definitions, Func, Ident, LVal, Rhs, Stmt, Ty, TypeMap};
use tracing::{debug, trace};

pub mod alloc;
pub mod templates;

use templates::{CmpSide, SpecCtx, Template, specialize};

pub(crate) fn lookup<'a>(typemap: &'a TypeMap, v: &Ident) -> anyhow::Result<&'a Ty> {
    typemap
        .get(v)
        .with_context(|| format!("in looking up the type of `{v}`"))
}

/// What one assignment rewrites into.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Rewrite {
    /// Instructions appended verbatim to the current output buffer.
    Passthrough(Vec<Stmt>),
    /// A fragment spliced in; emission continues in its exit block.
    Spliced(Fragment),
    /// A fragment spliced in, then the tail seeds the new output buffer.
    SplicedWithTail(Fragment, Vec<Stmt>),
}

pub struct TypedRew<'a> {
    pub func: &'a mut Func,
    pub typemap: &'a mut TypeMap,
    pub call_table: &'a CallTable,
    pub df_cols: &'a BTreeSet<Ident>,
}
impl TypedRew<'_> {
    pub fn run(mut self) -> anyhow::Result<Definitions> {
        self.func.cfg.update();
        let known: Vec<Ident> = self.typemap.keys().cloned().collect();
        for k in known {
            self.func.cfg.regs[k] = ();
        }
        let order = topo_order(&self.func.cfg, self.func.entry);
        for label in order {
            let mut current = label;
            let mut out: Vec<Stmt> = Vec::new();
            for stmt in take(&mut self.func.cfg.blocks[label].stmts) {
                match self.run_assign(stmt)? {
                    Rewrite::Passthrough(stmts) => out.extend(stmts),
                    Rewrite::Spliced(fragment) => {
                        current = self.func.cfg.splice(fragment, current, take(&mut out));
                    }
                    Rewrite::SplicedWithTail(fragment, tail) => {
                        current = self.func.cfg.splice(fragment, current, take(&mut out));
                        out = tail;
                    }
                }
            }
            self.func.cfg.blocks[current].stmts = out;
        }
        self.func.remark();
        let defs = self.func.cfg.definitions();
        debug!(
            blocks = self.func.cfg.blocks.len(),
            "typed frame rewrite finished"
        );
        return Ok(defs);
    }

    fn run_assign(&mut self, stmt: Stmt) -> anyhow::Result<Rewrite> {
        // element stores are not plain assignments; they pass through
        if let LVal::Index { .. } = stmt.left {
            return Ok(Rewrite::Passthrough(vec![stmt]));
        }
        if let Some(res) = self.match_str_cmp(&stmt)? {
            return Ok(res);
        }
        if let Some(res) = self.match_to_array(&stmt)? {
            return Ok(res);
        }
        if let Some(res) = self.match_col_filter(&stmt)? {
            return Ok(res);
        }
        Ok(Rewrite::Passthrough(vec![stmt]))
    }

    fn match_str_cmp(&mut self, stmt: &Stmt) -> anyhow::Result<Option<Rewrite>> {
        let Rhs::Bin { left, right, op } = &stmt.right else {
            return Ok(None);
        };
        if !matches!(op, BinOp::Eq | BinOp::Ne) {
            return Ok(None);
        }
        let left_ty = lookup(self.typemap, left)?.clone();
        let right_ty = lookup(self.typemap, right)?.clone();
        if left_ty != Ty::StrArray && right_ty != Ty::StrArray {
            return Ok(None);
        }
        // one flag for the element-wise side, written in operand order: a
        // string array on the right overrides one on the left, and takes the
        // length measurement with it
        let mut index = CmpSide::Left;
        let mut len = CmpSide::Left;
        if left_ty == Ty::StrArray {
            index = CmpSide::Left;
        }
        if right_ty == Ty::StrArray {
            index = CmpSide::Right;
            len = CmpSide::Right;
        }
        trace!("rewriting a string-array comparison to an element-wise loop");
        let mut ctx = SpecCtx {
            typemap: &mut *self.typemap,
            regs: &mut self.func.cfg.regs,
        };
        let fragment = specialize(
            &Template::CmpLoop {
                op: *op,
                index,
                len,
            },
            &[left.clone(), right.clone()],
            &mut ctx,
        )?;
        let result = fragment
            .result
            .clone()
            .context("in getting the comparison result array")?;
        let assign = Stmt {
            left: stmt.left.clone(),
            flags: stmt.flags,
            right: Rhs::Just { id: result },
        };
        Ok(Some(Rewrite::SplicedWithTail(fragment, vec![assign])))
    }

    fn match_to_array(&mut self, stmt: &Stmt) -> anyhow::Result<Option<Rewrite>> {
        let Rhs::Call {
            callee,
            args,
            kwargs,
        } = &stmt.right
        else {
            return Ok(None);
        };
        if !kwargs.is_empty() {
            return Ok(None);
        }
        // an unresolved callee just means this is not the helper
        let Some(resolved) = self.call_table.get(callee) else {
            return Ok(None);
        };
        if resolved.helper() != Some(FrameHelper::ToArray) {
            return Ok(None);
        }
        let [arg] = args.as_slice() else {
            return Ok(None);
        };
        if !lookup(self.typemap, arg)?.is_array() {
            return Ok(None);
        }
        trace!("eliding a column normalization of an already-array value");
        Ok(Some(Rewrite::Passthrough(vec![Stmt {
            left: stmt.left.clone(),
            flags: stmt.flags,
            right: Rhs::Just { id: arg.clone() },
        }])))
    }

    fn match_col_filter(&mut self, stmt: &Stmt) -> anyhow::Result<Option<Rewrite>> {
        let Rhs::Index { base, index } = &stmt.right else {
            return Ok(None);
        };
        let LVal::Id { id: target } = &stmt.left else {
            return Ok(None);
        };
        if !self.df_cols.contains(base) || !self.df_cols.contains(target) {
            return Ok(None);
        }
        if !lookup(self.typemap, index)?.is_bool_array() {
            return Ok(None);
        }
        trace!("rewriting a boolean-mask column filter to a masked fill loop");
        let mut ctx = SpecCtx {
            typemap: &mut *self.typemap,
            regs: &mut self.func.cfg.regs,
        };
        let fragment = specialize(
            &Template::MaskFill,
            &[target.clone(), base.clone(), index.clone()],
            &mut ctx,
        )?;
        Ok(Some(Rewrite::Spliced(fragment)))
    }
}
