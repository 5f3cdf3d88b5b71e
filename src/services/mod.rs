pub mod campaigns;
pub mod conversation_service;
pub mod media_store;
pub mod message_service;
pub mod participant_service;
pub mod read_tracker;
pub mod typing;
