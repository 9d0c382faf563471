pub use super::quiz_best_scores::Entity as QuizBestScores;
pub use super::quiz_questions::Entity as QuizQuestions;
pub use super::quizzes::Entity as Quizzes;
pub use super::users::Entity as Users;
