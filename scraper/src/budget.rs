use crate::errors::ScrapeError;

/// Request budget for one run.
///
/// Every request of the run, whether it loads a page, follows a gate redirect or replays the status query,
/// consumes one attempt before it is sent. The count only ever grows, so a redirect loop anywhere in the
/// run trips the ceiling instead of running forever.
#[derive(Debug)]
pub struct AttemptBudget {
    ceiling: u32,
    used: u32,
}

impl AttemptBudget {
    pub fn new(ceiling: u32) -> AttemptBudget {
        AttemptBudget { ceiling, used: 0 }
    }

    /// Records one attempt, failing once more than `ceiling` attempts have been made.
    pub fn consume(&mut self) -> Result<u32, ScrapeError> {
        self.used = self.used.saturating_add(1);
        if self.used > self.ceiling {
            return Err(ScrapeError::RetryExceeded { ceiling: self.ceiling });
        }
        Ok(self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }
}
