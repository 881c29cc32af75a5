//! Blocking, mutex-guarded collections used to hand messages and connection
//! handles between the application threads and the reactor thread.
//!
//! Both collections pair the container mutex with a separate condition
//! variable so a producer can wake a blocked `wait()` caller without holding
//! the container lock across the wake-up.

pub use queue::SharedQueue;
pub use vector::SharedVec;

mod queue;
mod vector;
