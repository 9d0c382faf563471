pub mod attempt;
pub mod errors;
pub mod quiz;
pub mod user;

// Re-export all types
pub use attempt::*;
pub use errors::*;
pub use quiz::*;
pub use user::*;

pub type UserId = uuid::Uuid;
pub type QuizId = uuid::Uuid;
pub type QuestionId = uuid::Uuid;
pub type AttemptId = uuid::Uuid;
