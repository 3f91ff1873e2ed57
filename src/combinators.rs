use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::{AsyncValue, LatchingSetter, Readable, Subscription};


impl<T: Clone + 'static> Readable<T> {
    /// Applies `f` to every completed upstream value.
    ///
    /// `Pending` and `Error` are forwarded without calling `f`.
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(&T) -> U + 'static) -> Readable<U> {
        let source = self.clone();
        let f = Rc::new(f);
        Readable::new(move |set| {
            let set = set.latching();
            let f = f.clone();
            source.subscribe(move |value| {
                set.set(match value {
                    AsyncValue::Pending => AsyncValue::Pending,
                    AsyncValue::Complete(value) => AsyncValue::Complete(f(value)),
                    AsyncValue::Error(e) => AsyncValue::Error(e.clone()),
                })
            })
        })
    }

    /// Follows the readable returned by `f` for the latest completed upstream value.
    ///
    /// When the upstream value changes, the new inner readable is subscribed before the previous
    /// one is released, so a shared inner readable is not restarted. Emissions of a replaced
    /// inner readable are ignored.
    pub fn then<U: Clone + 'static>(&self, f: impl Fn(&T) -> Readable<U> + 'static) -> Readable<U> {
        let source = self.clone();
        let f = Rc::new(f);
        Readable::new(move |set| {
            let state = Rc::new(ThenState {
                set: set.latching(),
                inner: RefCell::new(None),
                generation: Cell::new(0),
            });
            let outer = source.subscribe({
                let state = state.clone();
                let f = f.clone();
                move |value| match value {
                    AsyncValue::Complete(value) => {
                        let inner = f(value);
                        state.follow(&inner);
                    }
                    AsyncValue::Pending => state.release(AsyncValue::Pending),
                    AsyncValue::Error(e) => state.release(AsyncValue::Error(e.clone())),
                }
            });
            outer.merge(Subscription::from_fn(move || drop(state.inner.take())))
        })
    }

    /// Suppresses emissions equal to the previous one.
    pub fn dedup(&self) -> Readable<T>
    where
        T: PartialEq,
    {
        let source = self.clone();
        Readable::new(move |set| source.subscribe(move |value| set.set_dedup(value.clone())))
    }

    /// Calls `f` with every emission and forwards it unchanged.
    pub fn inspect(&self, f: impl Fn(&AsyncValue<T>) + 'static) -> Readable<T> {
        let source = self.clone();
        let f = Rc::new(f);
        Readable::new(move |set| {
            let f = f.clone();
            source.subscribe(move |value| {
                f(value);
                set.set(value.clone());
            })
        })
    }

    /// Forwards this readable and keeps `other` subscribed while it runs.
    ///
    /// The values of `other` are ignored.
    pub fn keep_alive<U: Clone + 'static>(&self, other: &Readable<U>) -> Readable<T> {
        let source = self.clone();
        let other = other.clone();
        Readable::new(move |set| {
            let side = other.subscribe(|_| {});
            source.subscribe(move |value| set.set(value.clone())).merge(side)
        })
    }
}

struct ThenState<U: 'static> {
    set: LatchingSetter<U>,
    inner: RefCell<Option<Subscription>>,
    generation: Cell<u64>,
}

impl<U: Clone + 'static> ThenState<U> {
    fn follow(self: &Rc<Self>, inner: &Readable<U>) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let this = Rc::downgrade(self);
        let s = inner.subscribe(move |value| {
            if let Some(this) = this.upgrade() {
                if this.generation.get() == generation {
                    this.set.set(value.clone());
                }
            }
        });
        let old = self.inner.replace(Some(s));
        drop(old);
    }
    fn release(&self, value: AsyncValue<U>) {
        self.generation.set(self.generation.get() + 1);
        let old = self.inner.take();
        drop(old);
        self.set.set(value);
    }
}

/// Combines two readables.
///
/// The result is `Complete` once both inputs are complete and `Error` as soon as one of them
/// fails (the first input wins when both fail).
pub fn join2<A, B>(a: &Readable<A>, b: &Readable<B>) -> Readable<(A, B)>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let a = a.clone();
    let b = b.clone();
    Readable::new(move |set| {
        let state = Rc::new(JoinState::new(
            set.latching(),
            (AsyncValue::Pending, AsyncValue::Pending),
        ));
        let sa = a.subscribe({
            let state = state.clone();
            move |value| state.update(|values| values.0 = value.clone(), combine2)
        });
        let sb = b.subscribe({
            let state = state.clone();
            move |value| state.update(|values| values.1 = value.clone(), combine2)
        });
        state.ready(combine2);
        sa.merge(sb)
    })
}

pub fn join3<A, B, C>(a: &Readable<A>, b: &Readable<B>, c: &Readable<C>) -> Readable<(A, B, C)>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
{
    join2(&join2(a, b), c).map(|((a, b), c)| (a.clone(), b.clone(), c.clone()))
}

/// Combines any number of readables of the same type, keeping the input order.
///
/// An empty input completes immediately with an empty vector.
pub fn join_all<T: Clone + 'static>(inputs: Vec<Readable<T>>) -> Readable<Vec<T>> {
    if inputs.is_empty() {
        return Readable::from_value(Vec::new());
    }
    let inputs = Rc::new(inputs);
    Readable::new(move |set| {
        let state = Rc::new(JoinState::new(
            set.latching(),
            vec![AsyncValue::Pending; inputs.len()],
        ));
        let subscriptions = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let state = state.clone();
                input.subscribe(move |value| {
                    state.update(|values| values[index] = value.clone(), combine_all)
                })
            })
            .collect();
        state.ready(combine_all);
        Subscription::from_vec(subscriptions)
    })
}

/// Like [`join_all`], but inputs that fail are left out of the result instead of failing it.
///
/// The result stays `Pending` while any input is pending.
pub fn join_all_filtered<K, T>(inputs: Vec<(K, Readable<T>)>) -> Readable<Vec<(K, T)>>
where
    K: Clone + 'static,
    T: Clone + 'static,
{
    if inputs.is_empty() {
        return Readable::from_value(Vec::new());
    }
    let inputs = Rc::new(inputs);
    Readable::new(move |set| {
        let keys: Vec<K> = inputs.iter().map(|(key, _)| key.clone()).collect();
        let values = vec![AsyncValue::Pending; inputs.len()];
        let state = Rc::new(JoinState::new(set.latching(), (keys, values)));
        let subscriptions = inputs
            .iter()
            .enumerate()
            .map(|(index, (_, input))| {
                let state = state.clone();
                input.subscribe(move |value| {
                    state.update(|(_, values)| values[index] = value.clone(), combine_filtered)
                })
            })
            .collect();
        state.ready(combine_filtered);
        Subscription::from_vec(subscriptions)
    })
}

struct JoinState<S, O: 'static> {
    set: LatchingSetter<O>,
    values: RefCell<S>,
    ready: Cell<bool>,
}

impl<S, O: Clone + 'static> JoinState<S, O> {
    fn new(set: LatchingSetter<O>, values: S) -> Self {
        Self {
            set,
            values: RefCell::new(values),
            ready: Cell::new(false),
        }
    }

    fn update(&self, f: impl FnOnce(&mut S), combine: fn(&S) -> AsyncValue<O>) {
        f(&mut self.values.borrow_mut());
        if self.ready.get() {
            self.emit(combine);
        }
    }
    fn ready(&self, combine: fn(&S) -> AsyncValue<O>) {
        self.ready.set(true);
        self.emit(combine);
    }
    fn emit(&self, combine: fn(&S) -> AsyncValue<O>) {
        let value = combine(&self.values.borrow());
        self.set.set(value);
    }
}

fn combine2<A: Clone, B: Clone>(values: &(AsyncValue<A>, AsyncValue<B>)) -> AsyncValue<(A, B)> {
    match values {
        (AsyncValue::Error(e), _) | (_, AsyncValue::Error(e)) => AsyncValue::Error(e.clone()),
        (AsyncValue::Complete(a), AsyncValue::Complete(b)) => {
            AsyncValue::Complete((a.clone(), b.clone()))
        }
        _ => AsyncValue::Pending,
    }
}

fn combine_all<T: Clone>(values: &Vec<AsyncValue<T>>) -> AsyncValue<Vec<T>> {
    let mut out = Vec::with_capacity(values.len());
    let mut pending = false;
    for value in values {
        match value {
            AsyncValue::Error(e) => return AsyncValue::Error(e.clone()),
            AsyncValue::Complete(value) => out.push(value.clone()),
            AsyncValue::Pending => pending = true,
        }
    }
    if pending {
        AsyncValue::Pending
    } else {
        AsyncValue::Complete(out)
    }
}

fn combine_filtered<K: Clone, T: Clone>(
    (keys, values): &(Vec<K>, Vec<AsyncValue<T>>),
) -> AsyncValue<Vec<(K, T)>> {
    let mut out = Vec::with_capacity(values.len());
    for (key, value) in keys.iter().zip(values) {
        match value {
            AsyncValue::Pending => return AsyncValue::Pending,
            AsyncValue::Complete(value) => out.push((key.clone(), value.clone())),
            AsyncValue::Error(_) => {}
        }
    }
    AsyncValue::Complete(out)
}
