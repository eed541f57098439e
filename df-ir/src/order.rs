use std::collections::BTreeSet;

use id_arena::Id;

use crate::{Block, Cfg};

/// Reverse postorder over the terminator edges from `entry`. Blocks
/// unreachable from the entry are appended afterwards in arena order, so the
/// result covers every block exactly once. The caller is responsible for
/// supplying an acyclic-enough CFG; no cycle defense happens here.
pub fn topo_order(cfg: &Cfg, entry: Id<Block>) -> Vec<Id<Block>> {
    let mut seen: BTreeSet<Id<Block>> = BTreeSet::new();
    let mut post: Vec<Id<Block>> = Vec::new();
    let mut stack: Vec<(Id<Block>, Vec<Id<Block>>)> = Vec::new();
    seen.insert(entry);
    stack.push((entry, cfg.blocks[entry].term.targets().copied().collect()));
    while let Some((node, mut rest)) = stack.pop() {
        match rest.pop() {
            Some(next) => {
                stack.push((node, rest));
                if seen.insert(next) {
                    stack.push((next, cfg.blocks[next].term.targets().copied().collect()));
                }
            }
            None => post.push(node),
        }
    }
    post.reverse();
    let mut order = post;
    for (k, _) in cfg.blocks.iter() {
        if seen.insert(k) {
            order.push(k);
        }
    }
    return order;
}
