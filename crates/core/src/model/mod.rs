mod identity;
mod ids;
mod progress;
mod question;

pub use identity::Identity;
pub use ids::{ParseIdError, QuestionId, UserId};
pub use progress::Progress;
pub use question::{
    AnswerParseError, Question, QuestionError, QuestionSet, parse_calculation_flag,
    parse_choices, parse_correct_index,
};
