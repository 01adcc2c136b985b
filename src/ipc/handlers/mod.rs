pub mod core;
pub mod gurukuls;
pub mod milestones;
pub mod offerings;
pub mod roster;
pub mod students;
pub mod subjects;
pub mod subtopics;
pub mod teachers;
pub mod topics;
pub mod users;
pub mod views;
