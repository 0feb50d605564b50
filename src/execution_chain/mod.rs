//! Execution layer access over JSON-RPC.
mod node;

pub use node::ExecutionBlock;
pub use node::ExecutionNode;
pub use node::ExecutionNodeHttp;
pub use node::ExecutionTransaction;
pub use node::MockExecutionNode;
pub use node::TransactionReceipt;

/// First mainnet block with a base fee.
pub const LONDON_HARD_FORK_BLOCK_NUMBER: u64 = 12_965_000;
