pub mod phone;
pub mod template;
pub mod time;
