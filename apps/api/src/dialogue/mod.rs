// Question dialogue: question types, structural gap rules, answer application and the
// queue that ties them together.

pub mod answers;
pub mod orchestrator;
pub mod question;
pub mod structural;

pub use question::Answer;
