//! Implementations of the outbound ports.

pub mod clock;
pub mod mail;
pub mod memory;
pub mod redis;

pub use clock::SystemClock;
pub use mail::{LogNotifier, RabbitMqNotifier};
pub use memory::{MemoryCache, MemoryDirectory};
pub use self::redis::RedisCache;
