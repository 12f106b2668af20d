//! Read side of the curated question catalogue, plus the seeding used at startup and by admins.

use std::collections::HashSet;

use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::QuestionSeed,
    dao::{
        couple_store::CoupleStore,
        models::{GameKind, QuestionEntity},
        storage::StorageResult,
    },
};

/// Namespace of question identifiers derived from their content.
const QUESTION_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_4c3e_9d2b_4b7a_8f05_3e21_7c9d_a410);

/// Why `choices` cannot belong to a question of `kind`, if anything.
pub fn choices_problem(kind: GameKind, choices: Option<&[String; 2]>) -> Option<&'static str> {
    match (kind.is_choice(), choices) {
        (true, Some(choices)) if choices.iter().any(|choice| choice.trim().is_empty()) => {
            Some("choices must not be blank")
        }
        (true, Some(_)) | (false, None) => None,
        (true, None) => Some("choice games need two choices"),
        (false, Some(_)) => Some("daily questions take no choices"),
    }
}

/// Stable identifier of a question: seeding the same content twice updates one record.
pub fn question_id(kind: GameKind, text: &str) -> Uuid {
    let name = format!("{}:{}", kind.as_str(), text.trim());
    Uuid::new_v5(&QUESTION_NAMESPACE, name.as_bytes())
}

impl From<QuestionSeed> for QuestionEntity {
    fn from(value: QuestionSeed) -> Self {
        Self {
            id: question_id(value.kind, &value.text),
            text: value.text.trim().to_owned(),
            kind: value.kind,
            choices: value.choices,
            active: value.active,
            selection_weight: value.weight,
        }
    }
}

/// Upsert every well-formed seed, skipping the others with a warning. Returns how many were stored.
pub async fn seed(store: &dyn CoupleStore, seeds: &[QuestionSeed]) -> StorageResult<usize> {
    let mut stored = 0;
    for seed in seeds {
        if let Some(problem) = choices_problem(seed.kind, seed.choices.as_ref()) {
            warn!(text = %seed.text, problem, "skipping malformed question seed");
            continue;
        }
        store.save_question(seed.clone().into()).await?;
        stored += 1;
    }
    info!(stored, "question catalogue seeded");
    Ok(stored)
}

/// Pick an active question, preferring ones not in `played`.
///
/// The choice is random, weighted by `selection_weight`. Weights below one count as one so
/// that no active question is ever excluded.
pub fn pick<'a, R: Rng + ?Sized>(
    questions: &'a [QuestionEntity],
    played: &HashSet<Uuid>,
    rng: &mut R,
) -> Option<&'a QuestionEntity> {
    let active = questions
        .iter()
        .filter(|question| question.active)
        .collect::<Vec<_>>();
    let fresh = active
        .iter()
        .copied()
        .filter(|question| !played.contains(&question.id))
        .collect::<Vec<_>>();
    let pool = if fresh.is_empty() { active } else { fresh };

    let weight = |question: &QuestionEntity| u64::from(question.selection_weight.max(1));
    let total = pool.iter().copied().map(weight).sum::<u64>();
    if total == 0 {
        return None;
    }

    let mut ticket = rng.random_range(0..total);
    for question in pool {
        let slice = weight(question);
        if ticket < slice {
            return Some(question);
        }
        ticket -= slice;
    }
    None
}
