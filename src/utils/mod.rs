pub mod retry;
pub mod upload_slots;
pub mod validation;
