use std::{cell::RefCell, collections::HashMap, hash::Hash, rc::Rc};

use derive_ex::Ex;

use crate::Readable;


/// A lazily populated map from key to a shared value, normally a [`Readable`].
///
/// The first [`get`](Self::get) of a key builds the value with the factory. Later calls with an
/// equal key return the same instance, so every observer of a key shares one upstream stream.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct KeyedCache<K: 'static, V: 'static>(Rc<CacheInner<K, V>>);

struct CacheInner<K: 'static, V: 'static> {
    entries: RefCell<HashMap<K, V>>,
    factory: Box<dyn Fn(&K) -> V>,
}

impl<K, V> KeyedCache<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    pub fn new(factory: impl Fn(&K) -> V + 'static) -> Self {
        Self(Rc::new(CacheInner {
            entries: RefCell::new(HashMap::new()),
            factory: Box::new(factory),
        }))
    }

    pub fn get(&self, key: &K) -> V {
        if let Some(value) = self.0.entries.borrow().get(key) {
            return value.clone();
        }
        // The factory may read other entries of this cache.
        let value = (self.0.factory)(key);
        self.0
            .entries
            .borrow_mut()
            .entry(key.clone())
            .or_insert(value)
            .clone()
    }

    /// The values of `keys`, in order.
    pub fn slice<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Vec<(K, V)> {
        keys.into_iter()
            .map(|key| (key.clone(), self.get(key)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.entries.borrow().is_empty()
    }
    pub fn contains_key(&self, key: &K) -> bool {
        self.0.entries.borrow().contains_key(key)
    }
}

impl<K, T> KeyedCache<K, Readable<T>>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + 'static,
{
    /// Drops the readables nobody is subscribed to. Returns the number of dropped entries.
    pub fn evict_idle(&self) -> usize {
        let evicted: Vec<Readable<T>> = {
            let mut entries = self.0.entries.borrow_mut();
            let idle: Vec<K> = entries
                .iter()
                .filter(|(_, r)| r.subscriber_count() == 0)
                .map(|(key, _)| key.clone())
                .collect();
            idle.iter().filter_map(|key| entries.remove(key)).collect()
        };
        evicted.len()
    }
}
