use std::fmt::{Display, Formatter, Result};

/// What the consumer does with a delivery once the pipeline has run.
///
/// Decode and classification failures complete the message (redelivery
/// cannot fix a malformed payload); only a transport failure sends it back
/// to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Complete,
    Redeliver,
}

impl Display for Disposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Disposition::Complete => write!(f, "complete"),
            Disposition::Redeliver => write!(f, "redeliver"),
        }
    }
}
