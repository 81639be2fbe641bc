pub mod campaign;
pub mod company;
pub mod conversation;
pub mod lead;
pub mod message;
