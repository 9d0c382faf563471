pub mod prelude;

pub mod quiz_best_scores;
pub mod quiz_questions;
pub mod quizzes;
pub mod users;
