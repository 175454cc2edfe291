pub mod proxy;

pub use proxy::{execute, ProxyCommand};
