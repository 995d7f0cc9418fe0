use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

thread_local! {
    static ACTIVE: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Marks a container as being formatted on this thread.
///
/// A component that refers back to its own container would otherwise expand
/// it forever; a nested attempt to format the same container gets `None`.
pub(crate) struct ReprGuard(usize);

impl ReprGuard {
    pub(crate) fn enter<T>(target: &T) -> Option<Self> {
        let addr = target as *const T as usize;
        let entered = ACTIVE.with(|active| active.borrow_mut().insert(addr));
        entered.then(|| ReprGuard(addr))
    }
}

impl Drop for ReprGuard {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            active.borrow_mut().remove(&self.0);
        });
    }
}

/// Writes `Name([item, ...])`, or `...` when `target` is already being written.
pub(crate) fn debug_container<T, I>(
    target: &T,
    f: &mut fmt::Formatter<'_>,
    name: &str,
    items: I,
) -> fmt::Result
where
    I: IntoIterator,
    I::Item: fmt::Debug,
{
    let Some(_guard) = ReprGuard::enter(target) else {
        return f.write_str("...");
    };
    write!(f, "{}(", name)?;
    f.debug_list().entries(items).finish()?;
    f.write_str(")")
}
