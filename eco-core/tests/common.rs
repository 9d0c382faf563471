#![allow(dead_code)]

use eco_core::InMemoryRecordStore;
use eco_types::{Question, QuizDefinition, UserId};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Creates a quiz where the correct option of every question is index 1
pub fn create_test_quiz(question_count: usize, points_max: i32) -> QuizDefinition {
    create_timed_quiz(question_count, points_max, 120)
}

pub fn create_timed_quiz(
    question_count: usize,
    points_max: i32,
    time_limit_seconds: u32,
) -> QuizDefinition {
    let questions = (0..question_count)
        .map(|i| Question {
            id: Uuid::new_v4(),
            prompt: format!("Green question {}", i + 1),
            options: vec![
                "Landfill".to_string(),
                "Recycle".to_string(),
                "Burn".to_string(),
            ],
            correct_index: 1,
            explanation: "Recycling keeps material in use.".to_string(),
        })
        .collect();

    QuizDefinition {
        id: Uuid::new_v4(),
        title: "Waste sorting".to_string(),
        description: "How well do you know the campus bins?".to_string(),
        questions,
        points_max,
        time_limit_seconds,
    }
}

/// Answer map with the first `correct` questions right and the rest wrong
pub fn answers_with_correct(correct: usize, total: usize) -> BTreeMap<usize, usize> {
    (0..total)
        .map(|i| (i, if i < correct { 1 } else { 0 }))
        .collect()
}

/// Store holding one quiz and one user with the given starting points
pub async fn create_store_with(
    quiz: &QuizDefinition,
    initial_points: i32,
) -> (Arc<InMemoryRecordStore>, UserId) {
    let store = Arc::new(InMemoryRecordStore::new());
    let user_id = Uuid::new_v4();
    store.insert_quiz(quiz.clone()).await;
    store.set_user_points(user_id, initial_points).await;
    (store, user_id)
}

/// Seeds a previous best without going through reconciliation
pub async fn seed_best_score(
    store: &InMemoryRecordStore,
    user_id: UserId,
    quiz: &QuizDefinition,
    score_percent: u8,
) {
    use eco_core::RecordStore;
    store
        .upsert_best_score(user_id, quiz.id, score_percent)
        .await
        .unwrap();
}
