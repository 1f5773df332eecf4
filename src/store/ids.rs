use chrono::Utc;

/// Hands out ids derived from the wall clock in milliseconds. Two ids
/// requested within the same millisecond still differ because the counter
/// never goes backwards.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        let now = Utc::now().timestamp_millis();
        self.last = now.max(self.last + 1);
        self.last.to_string()
    }
}
