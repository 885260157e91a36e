#![allow(unused_macros)]

/// Helper macro for locking items, mapping a poisoned lock to [`crate::Error::LockError`]
///
/// Only usable inside functions returning [`crate::Result`].
///
/// ```rust, ignore
///  let mut state = lock!(self.state);
///  state.locked.insert(path);
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}
