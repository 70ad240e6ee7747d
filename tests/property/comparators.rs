// tests/property/comparators.rs

use proptest::prelude::*;

use jobflow::flow::check;
use jobflow::types::Conditional;

proptest! {
    #[test]
    fn exactly_one_ordering_holds(value in -10_000i64..10_000, threshold in -10_000i64..10_000) {
        let (value, threshold) = (value.to_string(), threshold.to_string());
        let holds = [Conditional::LowerThan, Conditional::Equal, Conditional::GreaterThan]
            .into_iter()
            .filter(|conditional| check(&value, &threshold, *conditional))
            .count();
        prop_assert_eq!(holds, 1);
    }

    #[test]
    fn negated_comparators_disagree(value in -1e6f64..1e6, threshold in -1e6f64..1e6) {
        let (value, threshold) = (value.to_string(), threshold.to_string());
        let pairs = [
            (Conditional::Equal, Conditional::NotEqual),
            (Conditional::LowerThan, Conditional::GreaterThanOrEqual),
            (Conditional::GreaterThan, Conditional::LowerThanOrEqual),
        ];
        for (positive, negative) in pairs {
            prop_assert_ne!(
                check(&value, &threshold, positive),
                check(&value, &threshold, negative)
            );
        }
    }

    #[test]
    fn non_numeric_values_never_pass(value in "[a-z]{1,8}", threshold in -100i64..100) {
        let threshold = threshold.to_string();
        for conditional in [
            Conditional::Equal,
            Conditional::NotEqual,
            Conditional::LowerThan,
            Conditional::LowerThanOrEqual,
            Conditional::GreaterThan,
            Conditional::GreaterThanOrEqual,
        ] {
            prop_assert!(!check(&value, &threshold, conditional));
            prop_assert!(!check(&threshold, &value, conditional));
        }
    }
}
