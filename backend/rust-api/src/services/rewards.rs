//! Reward arithmetic. Everything here is pure so the completion
//! orchestrator can recompute the final score from stored answer records
//! and always get the same numbers the evaluator handed out per answer.

use crate::models::{Achievement, AnswerRecord, Difficulty, GameMode, User};

/// Points window for the speed bonus, in seconds.
pub const SPEED_BONUS_WINDOW_SECS: u32 = 10;
pub const SPEED_BONUS_POINTS: u32 = 50;

pub fn base_points(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 100,
        Difficulty::Medium => 150,
        Difficulty::Hard => 200,
    }
}

fn difficulty_weight(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 1.0,
        Difficulty::Medium => 1.5,
        Difficulty::Hard => 2.0,
    }
}

/// Points for a single answer. Incorrect answers always score zero; the
/// speed bonus applies only to correct answers inside the window.
pub fn answer_points(difficulty: Difficulty, is_correct: bool, time_to_answer: u32) -> u32 {
    if !is_correct {
        return 0;
    }
    let mut points = base_points(difficulty);
    if time_to_answer < SPEED_BONUS_WINDOW_SECS {
        points += SPEED_BONUS_POINTS;
    }
    points
}

/// Deterministic aggregate over stored answer records: (score, correct count).
/// Unanswered slots count as incorrect and score nothing.
pub fn score_answers(answers: &[AnswerRecord]) -> (u32, u32) {
    let mut score = 0u32;
    let mut correct = 0u32;
    for record in answers {
        if record.is_correct == Some(true) {
            correct += 1;
            score += answer_points(
                record.difficulty,
                true,
                record.time_to_answer.unwrap_or(u32::MAX),
            );
        }
    }
    (score, correct)
}

/// XP per session: 10 base XP per correct answer, weighted by that answer's
/// difficulty and the game mode, floored once at the end.
pub fn compute_xp(mode: GameMode, answers: &[AnswerRecord]) -> u64 {
    let weighted: f64 = answers
        .iter()
        .filter(|a| a.is_correct == Some(true))
        .map(|a| difficulty_weight(a.difficulty))
        .sum();
    (10.0 * mode.xp_multiplier() * weighted).floor() as u64
}

pub fn compute_coins(score: u32, correct_answers: u32) -> u64 {
    (score / 100) as u64 + correct_answers as u64 * 5
}

/// Square-root level curve: each level costs progressively more XP.
pub fn level_from_xp(xp: u64) -> u32 {
    (xp as f64 / 1000.0).sqrt().floor() as u32 + 1
}

/// Total XP at which `current_level` is left behind.
pub fn xp_for_next_level(current_level: u32) -> u64 {
    (current_level as u64).pow(2) * 1000
}

/// Coins granted once when a completion pushes the level up.
pub fn level_up_bonus(new_level: u32) -> u64 {
    new_level as u64 * 10
}

/// Achievements this completion qualifies for, evaluated against the
/// already-updated user row (post-increment totals and streak). The store
/// decides which of these are actually new; repeats unlock nothing.
pub fn check_achievements(
    user: &User,
    mode: GameMode,
    correct_answers: u32,
    total_questions: u32,
) -> Vec<Achievement> {
    let mut achievements = Vec::new();

    if user.total_games == 1 {
        achievements.push(Achievement::FirstWin);
    }
    if mode == GameMode::SixtySecond && correct_answers >= 50 {
        achievements.push(Achievement::SpeedDemon);
    }
    if total_questions > 0 && correct_answers == total_questions {
        achievements.push(Achievement::Perfectionist);
    }
    if user.current_streak >= 10 {
        achievements.push(Achievement::StreakMaster);
    }

    achievements
}
