// DANS : src/rpc/mod.rs

pub mod resilient_client;
pub mod resolver;
pub mod transaction;

pub use resilient_client::ResilientRpcClient;
pub use resolver::{ResolveError, TransactionResolver, TransactionSource};
pub use transaction::{ResolvedInstruction, ResolvedTransaction};
