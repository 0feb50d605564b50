mod node;
mod slots;

pub use node::BeaconBlock;
pub use node::BeaconBlockBody;
pub use node::BeaconNode;
pub use node::BeaconNodeHttp;
pub use node::BlockRewards;
pub use node::ExecutionPayload;
pub use node::MockBeaconNode;
pub use node::ValidatorIndex;
pub use slots::slot_from_string;
pub use slots::Slot;
pub use slots::SlotClock;
