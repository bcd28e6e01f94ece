pub mod activity;
pub mod campaign;
pub mod company;
pub mod contact;
pub mod email_log;
pub mod operation;
pub mod segment;
pub mod template;
