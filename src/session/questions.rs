/// Question binding for one level session.
///
/// Each of the six object slots carries a pool of questions; at session start
/// one question is drawn per slot, uniformly at random, and stays bound for
/// the whole session. A slot whose pool is empty simply stays unbound and the
/// engine surfaces "no question here" feedback on interact.

use rand::Rng;

use crate::domain::level::SLOT_COUNT;

use super::store::QuestionRecord;

pub struct SlotQuestions {
    bound: [Option<QuestionRecord>; SLOT_COUNT],
}

impl SlotQuestions {
    /// Draw one question per slot from `pool`. Slot indices in the records
    /// are 1-based; records with an out-of-range slot are ignored.
    pub fn draw(pool: &[QuestionRecord], rng: &mut impl Rng) -> Self {
        let mut bound: [Option<QuestionRecord>; SLOT_COUNT] = Default::default();

        for slot in 1..=SLOT_COUNT {
            let candidates: Vec<&QuestionRecord> =
                pool.iter().filter(|q| q.slot == slot).collect();
            if !candidates.is_empty() {
                let pick = rng.random_range(0..candidates.len());
                bound[slot - 1] = Some(candidates[pick].clone());
            }
        }

        SlotQuestions { bound }
    }

    /// The question bound to a 1-based slot, if any.
    pub fn question(&self, slot: usize) -> Option<&QuestionRecord> {
        self.bound.get(slot.wrapping_sub(1)).and_then(|q| q.as_ref())
    }

    /// The passcode digit revealed by solving a slot.
    pub fn passcode(&self, slot: usize) -> Option<u8> {
        self.question(slot).map(|q| q.passcode)
    }
}

/// Leading/trailing whitespace on the submitted answer is forgiven; the
/// comparison itself is exact and case-sensitive.
pub fn check_answer(question: &QuestionRecord, submitted: &str) -> bool {
    submitted.trim() == question.answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn q(id: &str, slot: usize, answer: &str, passcode: u8) -> QuestionRecord {
        QuestionRecord {
            id: id.to_string(),
            slot,
            text: format!("question {id}"),
            answer: answer.to_string(),
            passcode,
        }
    }

    #[test]
    fn every_populated_slot_gets_a_binding() {
        let pool = vec![
            q("A", 1, "x", 1),
            q("B", 1, "x", 2),
            q("C", 2, "x", 3),
            q("D", 6, "x", 4),
        ];
        let mut rng = Pcg32::seed_from_u64(7);
        let bound = SlotQuestions::draw(&pool, &mut rng);

        assert!(bound.question(1).is_some());
        assert!(bound.question(2).is_some());
        assert!(bound.question(3).is_none()); // empty pool stays unbound
        assert_eq!(bound.question(6).map(|q| q.id.as_str()), Some("D"));
        assert_eq!(bound.passcode(6), Some(4));
    }

    #[test]
    fn draw_is_deterministic_for_a_seed() {
        let pool: Vec<QuestionRecord> =
            (0..8).map(|i| q(&format!("Q{i}"), 1, "x", i as u8)).collect();

        let a = SlotQuestions::draw(&pool, &mut Pcg32::seed_from_u64(42));
        let b = SlotQuestions::draw(&pool, &mut Pcg32::seed_from_u64(42));
        assert_eq!(
            a.question(1).map(|q| q.id.clone()),
            b.question(1).map(|q| q.id.clone())
        );
    }

    #[test]
    fn different_seeds_can_pick_different_questions() {
        let pool: Vec<QuestionRecord> =
            (0..16).map(|i| q(&format!("Q{i}"), 1, "x", 0)).collect();

        let picks: Vec<String> = (0..16)
            .map(|seed| {
                SlotQuestions::draw(&pool, &mut Pcg32::seed_from_u64(seed))
                    .question(1)
                    .map(|q| q.id.clone())
                    .into_iter()
                    .collect()
            })
            .collect();
        let first = &picks[0];
        assert!(picks.iter().any(|p| p != first));
    }

    #[test]
    fn answers_are_trimmed_but_case_sensitive() {
        let record = q("A", 1, "Paris", 3);
        assert!(check_answer(&record, "Paris"));
        assert!(check_answer(&record, "  Paris \n"));
        assert!(!check_answer(&record, "paris"));
        assert!(!check_answer(&record, "Par is"));
        assert!(!check_answer(&record, ""));
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let pool = vec![q("A", 0, "x", 1), q("B", 7, "x", 2)];
        let bound = SlotQuestions::draw(&pool, &mut Pcg32::seed_from_u64(1));
        for slot in 1..=SLOT_COUNT {
            assert!(bound.question(slot).is_none());
        }
        assert!(bound.question(0).is_none());
        assert!(bound.question(7).is_none());
    }
}
