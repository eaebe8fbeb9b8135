pub mod academics;
pub mod attendance;
pub mod billing;
pub mod core;
pub mod custom_fields;
pub mod diary;
pub mod fees;
pub mod hostel;
pub mod id_cards;
pub mod scheduling;
pub mod schools;
pub mod students;
