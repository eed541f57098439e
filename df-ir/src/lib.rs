use std::collections::BTreeMap;
use std::iter::{empty, once};

use bitflags::bitflags;
use id_arena::{Arena, Id};

pub use df_common::{BinOp, DType, FrameHelper};

pub mod impls;
pub mod order;
pub mod splice;
pub mod vars;

use vars::VarMap;

pub type Ident = String;
pub type LVal = df_common::LVal<Ident>;

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct StmtFlags: u64{
        const SINGLE_DEF = 0x1;
    }
}

/// Resolved value types. Every variable the pass touches already has one;
/// the pass only adds entries for variables it introduces itself.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum Ty {
    Scalar(DType),
    Array(DType),
    StrArray,
}
impl Ty {
    pub fn is_array(&self) -> bool {
        matches!(self, Ty::Array(_) | Ty::StrArray)
    }
    pub fn is_bool_array(&self) -> bool {
        matches!(self, Ty::Array(DType::Bool))
    }
    pub fn element(&self) -> Option<DType> {
        match self {
            Ty::Scalar(_) => None,
            Ty::Array(d) => Some(*d),
            Ty::StrArray => Some(DType::Utf8),
        }
    }
}

pub type TypeMap = BTreeMap<Ident, Ty>;

/// A resolved fully-qualified callee identity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CalleeId {
    pub module: String,
    pub name: String,
}
impl CalleeId {
    pub fn helper(&self) -> Option<FrameHelper> {
        FrameHelper::of(&self.module, &self.name)
    }
}

pub type CallTable = BTreeMap<Ident, CalleeId>;

#[derive(Clone, PartialEq, Debug)]
#[non_exhaustive]
pub enum Lit {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Clone, PartialEq, Debug)]
#[non_exhaustive]
pub enum Rhs {
    Just {
        id: Ident,
    },
    Lit {
        lit: Lit,
    },
    Bin {
        left: Ident,
        right: Ident,
        op: BinOp,
    },
    Call {
        callee: Ident,
        args: Vec<Ident>,
        kwargs: Vec<(Ident, Ident)>,
    },
    Index {
        base: Ident,
        index: Ident,
    },
    Len {
        base: Ident,
    },
    Alloc {
        len: Ident,
        dtype: DType,
    },
    AllocLike {
        base: Ident,
    },
    Select {
        cond: Ident,
        if_true: Ident,
        if_false: Ident,
    },
}
impl Rhs {
    pub fn refs<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Ident> + 'a> {
        match self {
            Rhs::Just { id } => Box::new(once(id)),
            Rhs::Lit { .. } => Box::new(empty()),
            Rhs::Bin { left, right, .. } => Box::new([left, right].into_iter()),
            Rhs::Call {
                callee,
                args,
                kwargs,
            } => Box::new(
                once(callee)
                    .chain(args.iter())
                    .chain(kwargs.iter().map(|a| &a.1)),
            ),
            Rhs::Index { base, index } => Box::new([base, index].into_iter()),
            Rhs::Len { base } => Box::new(once(base)),
            Rhs::Alloc { len, .. } => Box::new(once(len)),
            Rhs::AllocLike { base } => Box::new(once(base)),
            Rhs::Select {
                cond,
                if_true,
                if_false,
            } => Box::new([cond, if_true, if_false].into_iter()),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Stmt {
    pub left: LVal,
    pub flags: StmtFlags,
    pub right: Rhs,
}
impl Stmt {
    pub fn new(left: LVal, right: Rhs) -> Self {
        Self {
            left,
            flags: StmtFlags::default(),
            right,
        }
    }
}

#[derive(Clone, Default, PartialEq, Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub term: Term,
}

#[derive(Clone, Default, PartialEq, Debug)]
#[non_exhaustive]
pub enum Term {
    Return(Option<Ident>),
    Jmp(Id<Block>),
    CondJmp {
        cond: Ident,
        if_true: Id<Block>,
        if_false: Id<Block>,
    },
    /// Data-parallel counted loop: one independent iteration of `body` per
    /// `index` in `[0, stop)`. The loop construct itself defines and
    /// advances the index; the body jumps back here.
    ParFor {
        index: Ident,
        stop: Ident,
        body: Id<Block>,
        exit: Id<Block>,
    },
    #[default]
    Default,
}
impl Term {
    pub fn targets<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Id<Block>> + 'a> {
        match self {
            Term::Return(_) => Box::new(empty()),
            Term::Jmp(id) => Box::new(once(id)),
            Term::CondJmp {
                if_true, if_false, ..
            } => Box::new([if_true, if_false].into_iter()),
            Term::ParFor { body, exit, .. } => Box::new([body, exit].into_iter()),
            Term::Default => Box::new(empty()),
        }
    }
    pub fn targets_mut<'a>(&'a mut self) -> Box<dyn Iterator<Item = &'a mut Id<Block>> + 'a> {
        match self {
            Term::Return(_) => Box::new(empty()),
            Term::Jmp(id) => Box::new(once(id)),
            Term::CondJmp {
                if_true, if_false, ..
            } => Box::new([if_true, if_false].into_iter()),
            Term::ParFor { body, exit, .. } => Box::new([body, exit].into_iter()),
            Term::Default => Box::new(empty()),
        }
    }
    pub fn uses<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Ident> + 'a> {
        match self {
            Term::Return(a) => Box::new(a.iter()),
            Term::Jmp(_) | Term::Default => Box::new(empty()),
            Term::CondJmp { cond, .. } => Box::new(once(cond)),
            Term::ParFor { stop, .. } => Box::new(once(stop)),
        }
    }
}

/// Where a variable is defined: a statement assigning it, or the parallel
/// loop that owns it as an index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum DefSite {
    Stmt { block: Id<Block>, idx: usize },
    Loop { block: Id<Block> },
}

pub type Definitions = BTreeMap<Ident, Vec<DefSite>>;

#[derive(Clone, Default, Debug)]
pub struct Cfg {
    pub blocks: Arena<Block>,
    pub regs: VarMap<()>,
}
impl Cfg {
    pub fn refs<'a>(&'a self) -> impl Iterator<Item = &'a Ident> + 'a {
        self.blocks.iter().flat_map(|(_, b)| {
            b.term.uses().chain(
                b.stmts
                    .iter()
                    .flat_map(|s| s.left.as_ref().refs().chain(s.right.refs())),
            )
        })
    }
    /// Record every name this CFG mentions in the register map, so fresh
    /// allocations can never collide with a live variable.
    pub fn update(&mut self) {
        let mut names: Vec<Ident> = self.refs().cloned().collect();
        for (_, b) in self.blocks.iter() {
            if let Term::ParFor { index, .. } = &b.term {
                names.push(index.clone());
            }
        }
        for n in names {
            self.regs[n] = ();
        }
    }
    /// Fresh scan of every definition in the CFG. Element stores do not
    /// define; parallel-loop index variables do.
    pub fn definitions(&self) -> Definitions {
        let mut defs: Definitions = BTreeMap::new();
        for (k, b) in self.blocks.iter() {
            for (i, s) in b.stmts.iter().enumerate() {
                if let LVal::Id { id } = &s.left {
                    defs.entry(id.clone())
                        .or_default()
                        .push(DefSite::Stmt { block: k, idx: i });
                }
            }
            if let Term::ParFor { index, .. } = &b.term {
                defs.entry(index.clone())
                    .or_default()
                    .push(DefSite::Loop { block: k });
            }
        }
        return defs;
    }
}

#[derive(Clone, Debug)]
pub struct Func {
    pub cfg: Cfg,
    pub entry: Id<Block>,
    pub params: Vec<Ident>,
}
impl Func {
    /// Recompute the single-definition flags from a fresh definition scan.
    pub fn remark(&mut self) {
        let defs = self.cfg.definitions();
        for (_, b) in self.cfg.blocks.iter_mut() {
            for s in b.stmts.iter_mut() {
                if let LVal::Id { id } = &s.left {
                    if defs.get(id).map(|d| d.len()) == Some(1) {
                        s.flags |= StmtFlags::SINGLE_DEF;
                    } else {
                        s.flags &= !StmtFlags::SINGLE_DEF;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::topo_order;
    use crate::splice::Fragment;
    use arena_traits::IndexAlloc;

    fn var(n: &str) -> Ident {
        n.to_string()
    }

    #[test]
    fn topo_order_visits_preds_first() {
        let mut cfg = Cfg::default();
        let a = cfg.blocks.alloc(Default::default());
        let b = cfg.blocks.alloc(Default::default());
        let c = cfg.blocks.alloc(Default::default());
        let d = cfg.blocks.alloc(Default::default());
        cfg.blocks[a].term = Term::CondJmp {
            cond: var("p"),
            if_true: b,
            if_false: c,
        };
        cfg.blocks[b].term = Term::Jmp(d);
        cfg.blocks[c].term = Term::Jmp(d);
        cfg.blocks[d].term = Term::Return(None);
        let order = topo_order(&cfg, a);
        assert_eq!(order.len(), 4);
        let pos = |x| order.iter().position(|k| *k == x).unwrap();
        assert_eq!(pos(a), 0);
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn topo_order_covers_unreachable_blocks() {
        let mut cfg = Cfg::default();
        let a = cfg.blocks.alloc(Default::default());
        let orphan = cfg.blocks.alloc(Default::default());
        cfg.blocks[a].term = Term::Return(None);
        cfg.blocks[orphan].term = Term::Return(None);
        let order = topo_order(&cfg, a);
        assert_eq!(order, vec![a, orphan]);
    }

    #[test]
    fn splice_threads_the_current_label() {
        let mut host = Cfg::default();
        let h0 = host.blocks.alloc(Default::default());
        host.blocks[h0].term = Term::Return(Some(var("x")));

        let mut inner = Cfg::default();
        let f0 = inner.blocks.alloc(Default::default());
        let f1 = inner.blocks.alloc(Default::default());
        inner.blocks[f0]
            .stmts
            .push(Stmt::new(LVal::Id { id: var("t") }, Rhs::Lit {
                lit: Lit::Int(2),
            }));
        inner.blocks[f0].term = Term::Jmp(f1);
        let fragment = Fragment {
            cfg: inner,
            entry: f0,
            exit: f1,
            result: None,
        };

        let emitted = vec![Stmt::new(LVal::Id { id: var("pre") }, Rhs::Lit {
            lit: Lit::Int(1),
        })];
        let cur = host.splice(fragment, h0, emitted);
        assert_ne!(cur, h0);
        assert_eq!(host.blocks.len(), 3);
        assert_eq!(host.blocks[h0].stmts.len(), 1);
        let Term::Jmp(entry) = &host.blocks[h0].term else {
            panic!("host block should jump into the fragment");
        };
        assert_eq!(host.blocks[*entry].term, Term::Jmp(cur));
        // the displaced terminator lands on the fragment exit
        assert_eq!(host.blocks[cur].term, Term::Return(Some(var("x"))));
    }

    #[test]
    fn definitions_cover_loop_indices() {
        let mut cfg = Cfg::default();
        let header = cfg.blocks.alloc(Default::default());
        let body = cfg.blocks.alloc(Default::default());
        let exit = cfg.blocks.alloc(Default::default());
        cfg.blocks[header].term = Term::ParFor {
            index: var("i"),
            stop: var("n"),
            body,
            exit,
        };
        cfg.blocks[body].stmts.push(Stmt::new(
            LVal::Id { id: var("x") },
            Rhs::Index {
                base: var("a"),
                index: var("i"),
            },
        ));
        cfg.blocks[body].stmts.push(Stmt::new(
            LVal::Index {
                base: var("s"),
                idx: var("i"),
            },
            Rhs::Just { id: var("x") },
        ));
        cfg.blocks[body].term = Term::Jmp(header);
        let defs = cfg.definitions();
        assert_eq!(defs.get("i"), Some(&vec![DefSite::Loop { block: header }]));
        assert_eq!(defs.get("x").map(|d| d.len()), Some(1));
        // the element store does not define `s`
        assert_eq!(defs.get("s"), None);
    }

    #[test]
    fn remark_flags_single_defs() {
        let mut cfg = Cfg::default();
        let b0 = cfg.blocks.alloc(Default::default());
        cfg.blocks[b0]
            .stmts
            .push(Stmt::new(LVal::Id { id: var("x") }, Rhs::Lit {
                lit: Lit::Int(1),
            }));
        cfg.blocks[b0]
            .stmts
            .push(Stmt::new(LVal::Id { id: var("y") }, Rhs::Lit {
                lit: Lit::Int(2),
            }));
        cfg.blocks[b0]
            .stmts
            .push(Stmt::new(LVal::Id { id: var("y") }, Rhs::Lit {
                lit: Lit::Int(3),
            }));
        cfg.blocks[b0].term = Term::Return(Some(var("y")));
        let mut func = Func {
            cfg,
            entry: b0,
            params: vec![],
        };
        func.remark();
        let stmts = &func.cfg.blocks[b0].stmts;
        assert!(stmts[0].flags.contains(StmtFlags::SINGLE_DEF));
        assert!(!stmts[1].flags.contains(StmtFlags::SINGLE_DEF));
        assert!(!stmts[2].flags.contains(StmtFlags::SINGLE_DEF));
    }

    #[test]
    fn fresh_names_skip_taken_slots() {
        let mut cfg = Cfg::default();
        let b0 = cfg.blocks.alloc(Default::default());
        cfg.blocks[b0]
            .stmts
            .push(Stmt::new(LVal::Id { id: var("$0") }, Rhs::Lit {
                lit: Lit::Int(0),
            }));
        cfg.update();
        assert_eq!(cfg.regs.alloc(()), var("$1"));
        assert_eq!(cfg.regs.alloc(()), var("$2"));
    }
}
