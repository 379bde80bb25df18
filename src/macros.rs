#![allow(unused_macros)]

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let data = read_lock!(my_rwlock);
///  println!("{:?}", *data);
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().expect("Failed to acquire read lock")
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut data = write_lock!(my_rwlock);
///  *data = Some(value);
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().expect("Failed to acquire write lock")
    };
}
