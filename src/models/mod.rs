pub mod user;
pub mod train;
pub mod booking;
pub mod book;
pub mod exam;
pub mod atm;

pub use user::User;
pub use train::Train;
pub use book::{Book, Category};
pub use exam::{Exam, ExamSession, Question};
pub use atm::AtmUser;
