pub mod labels;
pub mod top_n;

use std::fmt;

use serde::Serialize;

/// One classification result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub confidence: f32,
    pub class_name: String,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {:.2}", self.class_name, self.confidence)
    }
}
