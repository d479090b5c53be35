pub mod frame;
pub mod inflight;
pub mod pool;
pub mod session;
pub mod stream;
