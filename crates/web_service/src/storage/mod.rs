mod file_provider;
mod memory_provider;
mod provider;

pub use file_provider::FileMessageStore;
pub use memory_provider::MemoryMessageStore;
pub use provider::{MessageStore, NewMessage};
