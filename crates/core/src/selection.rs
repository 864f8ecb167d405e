//! Practice-set selection and navigation over a question bank.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::model::{Progress, Question, QuestionId, QuestionSet};
use crate::text::first_number;

/// Which questions a practice run draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    All,
    /// Inclusive id range; reversed bounds are swapped.
    Range { start: u64, end: u64 },
    /// `n` questions sampled once, clamped to `1..=pool size`.
    RandomN { n: usize },
    /// Questions currently in the user's `wrong_ids`.
    WrongOnly,
    /// Questions not yet in the user's `seen_ids`.
    NotSeen,
    /// Questions tagged as calculations in the `calc` column.
    CalculationOnly,
    /// The complement of `CalculationOnly`.
    NonCalculationOnly,
}

impl SelectionMode {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SelectionMode::All => "All",
            SelectionMode::Range { .. } => "Range",
            SelectionMode::RandomN { .. } => "Random N",
            SelectionMode::WrongOnly => "Wrong only",
            SelectionMode::NotSeen => "Not done yet",
            SelectionMode::CalculationOnly => "Calculation only",
            SelectionMode::NonCalculationOnly => "Non-calculation only",
        }
    }

    fn admits(&self, question: &Question, wrong: &HashSet<QuestionId>, seen: &HashSet<QuestionId>) -> bool {
        let id = question.id();
        match *self {
            SelectionMode::All | SelectionMode::RandomN { .. } => true,
            SelectionMode::Range { start, end } => {
                let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
                (lo..=hi).contains(&id.value())
            }
            SelectionMode::WrongOnly => wrong.contains(&id),
            SelectionMode::NotSeen => !seen.contains(&id),
            SelectionMode::CalculationOnly => question.is_calculation(),
            SelectionMode::NonCalculationOnly => !question.is_calculation(),
        }
    }
}

/// Mode plus ordering preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub mode: SelectionMode,
    pub shuffle: bool,
}

impl Selection {
    #[must_use]
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            shuffle: false,
        }
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

/// Result of resolving a "go to" query against a worklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jump {
    pub index: usize,
    pub requested: QuestionId,
    /// `false` when the requested id is not in the worklist and the nearest id was used.
    pub exact: bool,
}

/// The ordered question ids of the current practice run.
///
/// Built once per selection and kept stable until the selection changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Worklist {
    ids: Vec<QuestionId>,
}

impl Worklist {
    /// Builds the worklist for `selection` from the bank and the user's progress.
    pub fn build<R: Rng + ?Sized>(
        questions: &QuestionSet,
        progress: &Progress,
        selection: &Selection,
        rng: &mut R,
    ) -> Self {
        let wrong: HashSet<QuestionId> = progress.wrong_ids().iter().copied().collect();
        let seen: HashSet<QuestionId> = progress.seen_ids().iter().copied().collect();

        let pool: Vec<QuestionId> = questions
            .iter()
            .filter(|q| selection.mode.admits(q, &wrong, &seen))
            .map(Question::id)
            .collect();

        let ids = match selection.mode {
            SelectionMode::RandomN { n } => {
                if pool.is_empty() {
                    Vec::new()
                } else {
                    let n = n.clamp(1, pool.len());
                    pool.choose_multiple(rng, n).copied().collect()
                }
            }
            _ => {
                let mut ids = pool;
                if selection.shuffle {
                    ids.shuffle(rng);
                }
                ids
            }
        };

        Self { ids }
    }

    #[must_use]
    pub fn from_ids(ids: Vec<QuestionId>) -> Self {
        Self { ids }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<QuestionId> {
        self.ids.get(index).copied()
    }

    #[must_use]
    pub fn ids(&self) -> &[QuestionId] {
        &self.ids
    }

    #[must_use]
    pub fn position(&self, id: QuestionId) -> Option<usize> {
        self.ids.iter().position(|candidate| *candidate == id)
    }

    /// Resolves queries like `47` or `Q47`.
    ///
    /// Falls back to the id closest to the requested one when it is not part
    /// of the worklist. Returns `None` for queries without digits or an empty worklist.
    #[must_use]
    pub fn jump_to(&self, query: &str) -> Option<Jump> {
        let requested = QuestionId::new(first_number(query)?);
        if let Some(index) = self.position(requested) {
            return Some(Jump {
                index,
                requested,
                exact: true,
            });
        }
        let index = self
            .ids
            .iter()
            .enumerate()
            .min_by_key(|(_, id)| id.distance(requested))
            .map(|(index, _)| index)?;
        Some(Jump {
            index,
            requested,
            exact: false,
        })
    }
}

/// Clamps a cursor into `0..len`; an empty list clamps to `0`.
#[must_use]
pub fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn bank() -> QuestionSet {
        let questions = (1..=10)
            .map(|id| {
                Question::new(
                    QuestionId::new(id),
                    format!("Q{id}"),
                    vec!["a".into(), "b".into()],
                    0,
                    "",
                    id % 2 == 0,
                )
                .unwrap()
            })
            .collect();
        QuestionSet::new(questions).unwrap()
    }

    fn ids(raw: &[u64]) -> Vec<QuestionId> {
        raw.iter().copied().map(QuestionId::new).collect()
    }

    fn build(mode: SelectionMode, progress: &Progress) -> Worklist {
        let mut rng = StdRng::seed_from_u64(7);
        Worklist::build(&bank(), progress, &Selection::new(mode), &mut rng)
    }

    fn blank() -> Progress {
        Progress::empty(UserId::random(), fixed_now())
    }

    #[test]
    fn all_keeps_bank_order() {
        let wl = build(SelectionMode::All, &blank());
        assert_eq!(wl.ids(), ids(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).as_slice());
    }

    #[test]
    fn range_is_inclusive_and_swaps_bounds() {
        let wl = build(SelectionMode::Range { start: 6, end: 4 }, &blank());
        assert_eq!(wl.ids(), ids(&[4, 5, 6]).as_slice());
    }

    #[test]
    fn calculation_views_are_complementary() {
        let calc = build(SelectionMode::CalculationOnly, &blank());
        let non_calc = build(SelectionMode::NonCalculationOnly, &blank());
        assert_eq!(calc.ids(), ids(&[2, 4, 6, 8, 10]).as_slice());
        assert_eq!(non_calc.ids(), ids(&[1, 3, 5, 7, 9]).as_slice());
        assert!(calc.ids().iter().all(|id| non_calc.position(*id).is_none()));
    }

    #[test]
    fn wrong_only_and_not_seen_follow_progress() {
        let mut progress = blank();
        progress.apply_attempt(QuestionId::new(3), false, fixed_now());
        progress.apply_attempt(QuestionId::new(5), true, fixed_now());

        let wrong = build(SelectionMode::WrongOnly, &progress);
        assert_eq!(wrong.ids(), ids(&[3]).as_slice());

        let unseen = build(SelectionMode::NotSeen, &progress);
        assert_eq!(unseen.len(), 8);
        assert!(unseen.position(QuestionId::new(3)).is_none());
        assert!(unseen.position(QuestionId::new(5)).is_none());
    }

    #[test]
    fn random_n_samples_without_repeats() {
        let wl = build(SelectionMode::RandomN { n: 4 }, &blank());
        assert_eq!(wl.len(), 4);
        let unique: HashSet<_> = wl.ids().iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn random_n_is_clamped() {
        assert_eq!(build(SelectionMode::RandomN { n: 0 }, &blank()).len(), 1);
        assert_eq!(build(SelectionMode::RandomN { n: 99 }, &blank()).len(), 10);
    }

    #[test]
    fn shuffle_permutes_the_pool() {
        let mut rng = StdRng::seed_from_u64(11);
        let selection = Selection::new(SelectionMode::All).with_shuffle(true);
        let wl = Worklist::build(&bank(), &blank(), &selection, &mut rng);

        let mut sorted = wl.ids().to_vec();
        sorted.sort();
        assert_eq!(sorted, ids(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
    }

    #[test]
    fn jump_to_exact_and_nearest() {
        let wl = Worklist::from_ids(ids(&[10, 20, 30]));

        let exact = wl.jump_to("Q20").unwrap();
        assert_eq!(exact.index, 1);
        assert!(exact.exact);

        let nearest = wl.jump_to("28").unwrap();
        assert_eq!(nearest.index, 2);
        assert!(!nearest.exact);
        assert_eq!(nearest.requested, QuestionId::new(28));

        assert!(wl.jump_to("next").is_none());
        assert!(Worklist::default().jump_to("5").is_none());
    }

    #[test]
    fn clamp_index_bounds() {
        assert_eq!(clamp_index(5, 3), 2);
        assert_eq!(clamp_index(1, 3), 1);
        assert_eq!(clamp_index(4, 0), 0);
    }
}
