// tests/property/schedule_next.rs

use chrono::Duration;
use proptest::prelude::*;

use jobflow::schedule::Schedule;

use crate::common::monday_morning;

proptest! {
    #[test]
    fn next_fire_is_the_first_match_after(
        step in 1u32..30,
        hour in 0u32..24,
        offset_minutes in 0i64..(3 * 24 * 60),
        offset_seconds in 0i64..60,
    ) {
        let schedule = Schedule::parse(&format!("0 */{step} {hour} * * *")).expect("schedule");
        let start = monday_morning()
            + Duration::minutes(offset_minutes)
            + Duration::seconds(offset_seconds);

        let next = schedule.next_after(start).expect("fires daily");
        prop_assert!(next > start);
        prop_assert!(schedule.matches(next));
        prop_assert!(next - start <= Duration::days(1));

        // No earlier minute boundary in between matches.
        let mut cursor = next - Duration::minutes(1);
        while cursor > start {
            prop_assert!(!schedule.matches(cursor));
            cursor -= Duration::minutes(1);
        }
    }
}
