use std::collections::BTreeMap;
use std::mem::replace;

use id_arena::Id;

use crate::{Block, Cfg, Ident, Stmt, Term};

/// A freshly synthesized mini-CFG implementing one operation, specialized to
/// concrete argument types. `result` names the fragment's result array when
/// the host assignment has to be retargeted at it. A fragment is owned by
/// the matcher that requested it until it is spliced into a host CFG, which
/// consumes it.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub cfg: Cfg,
    pub entry: Id<Block>,
    pub exit: Id<Block>,
    pub result: Option<Ident>,
}

impl Cfg {
    /// Merge `fragment`'s blocks into this CFG at `at`, under fresh labels.
    ///
    /// `emitted` becomes the body of `at`, which then jumps into the
    /// fragment's entry; `at`'s displaced terminator moves onto the
    /// fragment's exit block. Returns the exit's label in this CFG, which is
    /// the new current label for continued linear emission.
    pub fn splice(&mut self, fragment: Fragment, at: Id<Block>, emitted: Vec<Stmt>) -> Id<Block> {
        let mut all: BTreeMap<Id<Block>, Id<Block>> = BTreeMap::new();
        for (k, _) in fragment.cfg.blocks.iter() {
            all.insert(k, self.blocks.alloc(Default::default()));
        }
        for (k, b) in fragment.cfg.blocks.iter() {
            let mut b = b.clone();
            for t in b.term.targets_mut() {
                *t = all[&*t];
            }
            self.blocks[all[&k]] = b;
        }
        let entry = all[&fragment.entry];
        let exit = all[&fragment.exit];
        let displaced = replace(&mut self.blocks[at].term, Term::Jmp(entry));
        self.blocks[at].stmts = emitted;
        self.blocks[exit].term = displaced;
        return exit;
    }
}
