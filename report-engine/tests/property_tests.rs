//! Property-based tests for report-engine invariants
//!
//! These tests use proptest to verify:
//! - Reconciliation: constructed identities always balance, perturbed ones
//!   never do
//! - Account number sort: parsable numbers ascend, unparsable sort last
//! - Paging: total is independent of skip/take, pages never exceed `take`

use proptest::prelude::*;
use report_engine::paging::{self, PageRequest, SortSpec, SortableRow};
use report_engine::reconcile;
use rust_decimal::Decimal;

/// Strategy for generating amounts (positive or negative cents)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000_000_00i64..1_000_000_00i64).prop_map(|cents| Decimal::new(cents, 2))
}

struct NumberRow(Option<String>);

impl SortableRow for NumberRow {
    fn company_id(&self) -> &str {
        "C1"
    }
    fn account_number(&self) -> Option<&str> {
        self.0.as_deref()
    }
    fn account_name(&self) -> Option<&str> {
        None
    }
}

fn number_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        (0i64..100_000).prop_map(|n| Some(n.to_string())),
        "[a-z]{1,6}".prop_map(Some),
        Just(Some(String::new())),
        Just(None),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: beginning + net == ending always reconciles
    #[test]
    fn prop_constructed_identity_balances(
        beginning in amount_strategy(),
        net in amount_strategy(),
    ) {
        let result = reconcile::check(beginning, net, beginning + net, Some("BS"), Some(3));
        prop_assert!(result.balanced);
    }

    /// Property: a nonzero perturbation always breaks the identity, and
    /// never raises
    #[test]
    fn prop_perturbed_identity_flags(
        beginning in amount_strategy(),
        net in amount_strategy(),
        delta in (1i64..1_000_00).prop_map(|cents| Decimal::new(cents, 2)),
    ) {
        let result = reconcile::check(beginning, net, beginning + net + delta, Some("BS"), Some(3));
        prop_assert!(!result.balanced);
    }

    /// Property: PL accounts in fiscal period 1 reconcile from zero no
    /// matter what beginning balance is supplied
    #[test]
    fn prop_pl_period_one_ignores_beginning(
        beginning in amount_strategy(),
        net in amount_strategy(),
    ) {
        let result = reconcile::check(beginning, net, net, Some("PL"), Some(1));
        prop_assert!(result.balanced);
        prop_assert_eq!(result.beginning, Decimal::ZERO);
    }

    /// Property: ascending account-number sort puts every parsable number
    /// before every unparsable one, and parsable numbers ascend
    #[test]
    fn prop_account_number_sort_partitions(numbers in prop::collection::vec(number_strategy(), 0..40)) {
        let rows: Vec<NumberRow> = numbers.into_iter().map(NumberRow).collect();
        let page = paging::paginate(
            rows,
            &PageRequest {
                skip: 0,
                take: usize::MAX,
                sort: SortSpec::parse("AccountNumber asc"),
                search: None,
            },
            |_| 0,
        );

        let parsed: Vec<i64> = page
            .items
            .iter()
            .map(|r| paging::parse_account_number(r.0.as_deref()))
            .collect();
        // i64::MAX keys (blank/unparsable) form a suffix and the rest ascend
        prop_assert!(parsed.windows(2).all(|w| w[0] <= w[1]));
    }

    /// Property: total_records ignores skip/take, and a page never exceeds
    /// its take
    #[test]
    fn prop_paging_bounds(
        count in 0usize..60,
        skip in 0usize..80,
        take in 0usize..80,
    ) {
        let rows: Vec<NumberRow> = (0..count).map(|n| NumberRow(Some(n.to_string()))).collect();
        let page = paging::paginate(
            rows,
            &PageRequest { skip, take, sort: None, search: None },
            |_| 0,
        );
        prop_assert_eq!(page.total_records, count);
        prop_assert!(page.items.len() <= take);
        prop_assert_eq!(page.items.len(), count.saturating_sub(skip).min(take));
    }
}
