//! Fixtures shared by the unit test modules.

use chrono::{TimeZone, Utc};
use explorer_core::{Category, Message, Role, Trace};

pub fn trace(id: &str, question: &str) -> Trace {
    Trace::new(
        id,
        Utc.with_ymd_and_hms(2025, 1, 20, 8, 5, 0).unwrap(),
        vec![
            Message::new(Role::User, question),
            Message::new(Role::Assistant, format!("Answer about {}", question)),
        ],
    )
}

/// A trace with analyses recorded in the given order.
pub fn scored(id: &str, entries: &[(Category, u8, &str)]) -> Trace {
    let mut t = trace(id, "How much tree cover was lost in Pará?");
    for (category, score, reason) in entries {
        t.record_analysis(*category, *score, *reason);
    }
    t
}
