//! Trait implementations from the `cfg-traits` crate for the dataframe IR,
//! so generic control-flow algorithms can walk it.

use std::iter::once;

use id_arena::{Arena, Id};

use crate::{Block, Func, Term};

impl cfg_traits::Func for Func {
    type Block = Id<Block>;

    type Blocks = Arena<Block>;

    fn blocks(&self) -> &Self::Blocks {
        &self.cfg.blocks
    }

    fn blocks_mut(&mut self) -> &mut Self::Blocks {
        &mut self.cfg.blocks
    }

    fn entry(&self) -> Self::Block {
        self.entry
    }
}

impl cfg_traits::Block<Func> for Block {
    type Terminator = Term;

    fn term(&self) -> &Self::Terminator {
        &self.term
    }

    fn term_mut(&mut self) -> &mut Self::Terminator {
        &mut self.term
    }
}

impl cfg_traits::Term<Func> for Term {
    type Target = Id<Block>;

    fn targets<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Self::Target> + 'a>
    where
        Func: 'a,
    {
        Term::targets(self)
    }

    fn targets_mut<'a>(&'a mut self) -> Box<dyn Iterator<Item = &'a mut Self::Target> + 'a>
    where
        Func: 'a,
    {
        Term::targets_mut(self)
    }
}

impl cfg_traits::Term<Func> for Id<Block> {
    type Target = Id<Block>;

    fn targets<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Self::Target> + 'a>
    where
        Func: 'a,
    {
        Box::new(once(self))
    }

    fn targets_mut<'a>(&'a mut self) -> Box<dyn Iterator<Item = &'a mut Self::Target> + 'a>
    where
        Func: 'a,
    {
        Box::new(once(self))
    }
}

impl cfg_traits::Target<Func> for Id<Block> {
    fn block(&self) -> <Func as cfg_traits::Func>::Block {
        *self
    }

    fn block_mut(&mut self) -> &mut <Func as cfg_traits::Func>::Block {
        self
    }
}
