use std::{
    collections::HashMap,
    fmt::Debug,
    ops::{Index, IndexMut},
    sync::Arc,
};

use arena_traits::{IndexAlloc, IndexIter};

use crate::Ident;

pub trait NameResolver: Debug {
    fn resolve(&self, n: usize) -> Ident;
}
#[derive(Debug, Default)]
pub struct DollarResolver {}
impl NameResolver for DollarResolver {
    fn resolve(&self, n: usize) -> Ident {
        format!("${n}")
    }
}
#[derive(Clone, Debug)]
pub struct VarMap<T> {
    map: HashMap<Ident, T>,
    default: T,
    next: usize,
    pub resolver: Arc<dyn NameResolver>,
}
impl<T: Default> VarMap<T> {
    pub fn new(resolver: impl NameResolver + 'static) -> Self {
        Self {
            map: HashMap::new(),
            default: T::default(),
            next: 0,
            resolver: Arc::new(resolver),
        }
    }
}
impl<T: Default> Default for VarMap<T> {
    fn default() -> Self {
        Self::new(DollarResolver {})
    }
}
impl<T> Index<Ident> for VarMap<T> {
    type Output = T;

    fn index(&self, index: Ident) -> &Self::Output {
        match self.map.get(&index) {
            Some(value) => value,
            None => &self.default,
        }
    }
}
impl<T: Default> IndexMut<Ident> for VarMap<T> {
    fn index_mut(&mut self, index: Ident) -> &mut Self::Output {
        self.map.entry(index).or_insert(T::default())
    }
}
impl<T: Default> IndexIter<Ident> for VarMap<T> {
    fn iter<'a>(&'a self) -> Box<(dyn Iterator<Item = Ident> + 'a)> {
        Box::new(self.map.keys().cloned())
    }
}
impl<T: Default> IndexAlloc<Ident> for VarMap<T> {
    fn alloc(&mut self, value: Self::Output) -> Ident {
        loop {
            let name = self.resolver.resolve(self.next);
            self.next += 1;
            if !self.map.contains_key(&name) {
                self.map.insert(name.clone(), value);
                return name;
            }
        }
    }
}
