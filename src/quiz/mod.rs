pub mod controller;

use thiserror::Error;

pub use controller::QuizController;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    #[serde(alias = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub correct_option_index: usize,
}

impl Question {
    pub fn new(prompt: &str, options: &[&str], correct_option_index: usize) -> Self {
        Self {
            prompt: prompt.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_option_index,
        }
    }

    /// Maps an option label, as the user picked it, back to its index.
    pub fn option_index(&self, text: &str) -> Option<usize> {
        let text = text.trim();
        self.options.iter().position(|o| o == text)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("The question bank is empty")]
    Empty,
    #[error("Question {index} has fewer than two options")]
    TooFewOptions { index: usize },
    #[error("Question {index} marks option {correct} as correct, but only has {options} options")]
    CorrectOptionOutOfRange {
        index: usize,
        correct: usize,
        options: usize,
    },
    #[error("Question index {index} is out of range (bank holds {len} questions)")]
    OutOfRange { index: usize, len: usize },
}

/// Immutable, validated sequence of quiz questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        if questions.is_empty() {
            return Err(BankError::Empty);
        }
        for (index, question) in questions.iter().enumerate() {
            if question.options.len() < 2 {
                return Err(BankError::TooFewOptions { index });
            }
            if question.correct_option_index >= question.options.len() {
                return Err(BankError::CorrectOptionOutOfRange {
                    index,
                    correct: question.correct_option_index,
                    options: question.options.len(),
                });
            }
        }

        Ok(Self { questions })
    }

    pub fn get(&self, index: usize) -> Result<&Question, BankError> {
        self.questions.get(index).ok_or(BankError::OutOfRange {
            index,
            len: self.questions.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of answers matching the correct option of the question at the same position.
    pub fn score(&self, answers: &[usize]) -> usize {
        answers
            .iter()
            .zip(&self.questions)
            .filter(|(answer, question)| **answer == question.correct_option_index)
            .count()
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self {
            questions: vec![
                Question::new(
                    "What CAN you build with Maschine right now?",
                    &["Complex DAOs", "Static frames with buttons", "Onchain NFT mints"],
                    1,
                ),
                Question::new(
                    "What requires external services?",
                    &["Basic interactions", "User authentication", "Simple quizzes"],
                    1,
                ),
                Question::new(
                    "What's NOT supported yet?",
                    &["Frame buttons", "Database integration", "Image generation"],
                    2,
                ),
            ],
        }
    }
}

pub const DEFAULT_RESULT_MESSAGES: [&str; 3] = [
    "Nice try! Let's review Maschine's limits",
    "Getting there! Check our docs for updates",
    "Expert level! You understand the boundaries",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizState {
    pub current_index: usize,
    pub answers: Vec<usize>,
    pub score: usize,
}

impl QuizState {
    /// True once every question of a bank of `total` questions has an answer.
    pub fn is_complete(&self, total: usize) -> bool {
        self.answers.len() >= total
    }
}

/// Buckets `score` out of `total` into one of `messages`.
///
/// `floor(score / total * messages.len())`, with a perfect score landing on the last message.
pub fn result_message<S: AsRef<str>>(score: usize, total: usize, messages: &[S]) -> Option<&str> {
    if messages.is_empty() || total == 0 {
        return None;
    }
    let bucket = (score * messages.len() / total).min(messages.len() - 1);
    messages.get(bucket).map(|m| m.as_ref())
}
