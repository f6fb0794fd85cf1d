pub mod assistant_controller;
pub mod chat_controller;
pub mod topic_controller;
