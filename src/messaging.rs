//! Concrete chat-platform adapters implementing [`crate::adapter::ChatAdapter`].

pub mod discord;
