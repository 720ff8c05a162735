use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::{ChoiceId, QuestionId};

/// A single row of a submission payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question: QuestionId,
    pub choice: ChoiceId,
}

/// The learner's current selections, at most one choice per question.
///
/// Serialises as a JSON object mapping question id to choice id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    selections: BTreeMap<QuestionId, ChoiceId>,
}

impl AnswerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `choice` for `question`, returning the choice it replaced.
    pub fn select(&mut self, question: QuestionId, choice: ChoiceId) -> Option<ChoiceId> {
        self.selections.insert(question, choice)
    }

    #[must_use]
    pub fn get(&self, question: QuestionId) -> Option<ChoiceId> {
        self.selections.get(&question).copied()
    }

    #[must_use]
    pub fn contains(&self, question: QuestionId) -> bool {
        self.selections.contains_key(&question)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn clear(&mut self) {
        self.selections.clear();
    }

    /// Keep only the selections accepted by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(QuestionId, ChoiceId) -> bool) {
        self.selections.retain(|q, c| keep(*q, *c));
    }

    /// Submission rows ordered by question id. Unanswered questions have no row.
    #[must_use]
    pub fn entries(&self) -> Vec<AnswerEntry> {
        self.selections
            .iter()
            .map(|(question, choice)| AnswerEntry {
                question: *question,
                choice: *choice,
            })
            .collect()
    }
}

impl FromIterator<(QuestionId, ChoiceId)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (QuestionId, ChoiceId)>>(iter: T) -> Self {
        Self {
            selections: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(id: u64) -> QuestionId {
        QuestionId::new(id)
    }

    fn c(id: u64) -> ChoiceId {
        ChoiceId::new(id)
    }

    #[test]
    fn later_selection_overwrites() {
        let mut answers = AnswerSet::new();
        assert_eq!(answers.select(q(1), c(10)), None);
        assert_eq!(answers.select(q(1), c(11)), Some(c(10)));
        assert_eq!(answers.len(), 1);
        assert_eq!(answers.get(q(1)), Some(c(11)));
    }

    #[test]
    fn entries_are_sorted_by_question() {
        let answers: AnswerSet = [(q(3), c(30)), (q(1), c(10))].into_iter().collect();
        let entries = answers.entries();
        assert_eq!(entries[0].question, q(1));
        assert_eq!(entries[1].question, q(3));
    }

    #[test]
    fn json_layout_is_an_object_of_ids() {
        let answers: AnswerSet = [(q(12), c(45)), (q(13), c(50))].into_iter().collect();
        let json = serde_json::to_string(&answers).unwrap();
        assert_eq!(json, r#"{"12":45,"13":50}"#);

        let back: AnswerSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, answers);
    }

    #[test]
    fn retain_drops_rejected_rows() {
        let mut answers: AnswerSet = [(q(1), c(10)), (q(2), c(20))].into_iter().collect();
        answers.retain(|question, _| question == q(2));
        assert!(!answers.contains(q(1)));
        assert!(answers.contains(q(2)));
    }
}
