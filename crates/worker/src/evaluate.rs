//! Pure rule evaluation with tri-valued outcomes.
//!
//! Evaluation never touches the outside world: rules, a wallet snapshot
//! and a price map go in, per-rule evaluations and per-role decisions
//! come out. "Unknown" is a first-class outcome, distinct from both
//! satisfied and unsatisfied, and callers must not mutate state for it.

use std::collections::{BTreeMap, HashMap};

use chain::WalletSnapshot;
use db::{gating_rule::RuleSpec, Decimal};

/// Tri-valued evaluation outcome.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The rule (or some rule of a role group) holds.
    Satisfied,
    /// Evidence is sufficient and the rule does not hold.
    Unsatisfied,
    /// Evidence is insufficient; do not change state.
    Indeterminate,
}

/// One gating rule prepared for evaluation.
#[derive(Debug, Clone)]
pub struct RuleInput {
    pub rule_id: i64,
    pub role_id: i64,
    pub spec: RuleSpec,
}

/// Result of evaluating a single rule.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub rule_id: i64,
    pub role_id: i64,
    pub outcome: Outcome,
    /// Operands and comparison, phrased for the audit log.
    pub reason: String,
}

/// Aggregated decision for a single role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecision {
    pub role_id: i64,
    pub should_have: Outcome,
    /// Rules that satisfied the role, empty unless `should_have` is
    /// [`Outcome::Satisfied`].
    pub matched_rule_ids: Vec<i64>,
}

/// Evaluate every rule against a wallet snapshot and a price map.
///
/// Returns exactly one evaluation per input rule. Only USD-denominated
/// rules can come out indeterminate, and only when their asset id is
/// missing from `prices`.
pub fn evaluate(
    rules: &[RuleInput],
    snapshot: &WalletSnapshot,
    prices: &HashMap<String, Decimal>,
) -> Vec<Evaluation> {
    rules
        .iter()
        .map(|rule| {
            let (outcome, reason) = match &rule.spec {
                RuleSpec::TokenAmount {
                    mint,
                    threshold_amount,
                } => {
                    let balance = snapshot
                        .token_balances_by_mint
                        .get(mint)
                        .copied()
                        .unwrap_or_default();

                    let outcome = compare(balance >= *threshold_amount);

                    (
                        outcome,
                        format!(
                            "balance {balance} of mint {mint} {} threshold {threshold_amount}",
                            comparator(outcome)
                        ),
                    )
                }
                RuleSpec::TokenUsd {
                    mint,
                    threshold_usd,
                    price_asset_id,
                } => match prices.get(price_asset_id) {
                    None => (
                        Outcome::Indeterminate,
                        format!("no usd price available for asset {price_asset_id}"),
                    ),
                    Some(price) => {
                        let balance = snapshot
                            .token_balances_by_mint
                            .get(mint)
                            .copied()
                            .unwrap_or_default();
                        let value = balance * *price;

                        let outcome = compare(value >= *threshold_usd);

                        (
                            outcome,
                            format!(
                                "usd value {value} ({balance} x {price}) of mint {mint} {} threshold {threshold_usd}",
                                comparator(outcome)
                            ),
                        )
                    }
                },
                RuleSpec::NftCollection {
                    collection_address,
                    threshold_count,
                } => {
                    let count = snapshot
                        .nft_counts_by_verified_collection
                        .get(collection_address)
                        .copied()
                        .unwrap_or_default();

                    let outcome = compare(count >= *threshold_count);

                    (
                        outcome,
                        format!(
                            "{count} items of verified collection {collection_address} {} threshold {threshold_count}",
                            comparator(outcome)
                        ),
                    )
                }
            };

            Evaluation {
                rule_id: rule.rule_id,
                role_id: rule.role_id,
                outcome,
                reason,
            }
        })
        .collect()
}

fn compare(holds: bool) -> Outcome {
    if holds {
        Outcome::Satisfied
    } else {
        Outcome::Unsatisfied
    }
}

fn comparator(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Satisfied => "meets",
        _ => "below",
    }
}

/// Collapse evaluations into one decision per distinct role.
///
/// Rules targeting the same role compose disjunctively: any satisfied
/// evaluation satisfies the role; otherwise any indeterminate one makes
/// the whole role indeterminate; only an all-unsatisfied group revokes.
/// Output order is deterministic (ascending role id).
pub fn decide(evaluations: &[Evaluation]) -> Vec<RoleDecision> {
    let mut groups: BTreeMap<i64, Vec<&Evaluation>> = BTreeMap::new();

    for evaluation in evaluations {
        groups.entry(evaluation.role_id).or_default().push(evaluation);
    }

    groups
        .into_iter()
        .map(|(role_id, group)| {
            let matched_rule_ids: Vec<i64> = group
                .iter()
                .filter(|eval| eval.outcome == Outcome::Satisfied)
                .map(|eval| eval.rule_id)
                .collect();

            let should_have = if !matched_rule_ids.is_empty() {
                Outcome::Satisfied
            } else if group
                .iter()
                .any(|eval| eval.outcome == Outcome::Indeterminate)
            {
                Outcome::Indeterminate
            } else {
                Outcome::Unsatisfied
            };

            RoleDecision {
                role_id,
                should_have,
                matched_rule_ids,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chain::WalletSnapshot;
    use db::gating_rule::RuleSpec;

    use super::{decide, evaluate, Outcome, RuleInput};

    fn snapshot(
        balances: &[(&str, &str)],
        counts: &[(&str, u64)],
    ) -> WalletSnapshot {
        WalletSnapshot {
            wallet: String::from("wallet"),
            token_balances_by_mint: balances
                .iter()
                .map(|(mint, amount)| (mint.to_string(), amount.parse().unwrap()))
                .collect(),
            nft_counts_by_verified_collection: counts
                .iter()
                .map(|(collection, count)| (collection.to_string(), *count))
                .collect(),
        }
    }

    fn token_amount(rule_id: i64, role_id: i64, mint: &str, threshold: &str) -> RuleInput {
        RuleInput {
            rule_id,
            role_id,
            spec: RuleSpec::TokenAmount {
                mint: mint.to_owned(),
                threshold_amount: threshold.parse().unwrap(),
            },
        }
    }

    fn token_usd(rule_id: i64, role_id: i64, mint: &str, threshold: &str, asset: &str) -> RuleInput {
        RuleInput {
            rule_id,
            role_id,
            spec: RuleSpec::TokenUsd {
                mint: mint.to_owned(),
                threshold_usd: threshold.parse().unwrap(),
                price_asset_id: asset.to_owned(),
            },
        }
    }

    fn nft(rule_id: i64, role_id: i64, collection: &str, threshold: u64) -> RuleInput {
        RuleInput {
            rule_id,
            role_id,
            spec: RuleSpec::NftCollection {
                collection_address: collection.to_owned(),
                threshold_count: threshold,
            },
        }
    }

    #[test]
    fn token_amount_passes_at_equality() {
        let evaluations = evaluate(
            &[token_amount(1, 10, "M", "100")],
            &snapshot(&[("M", "100")], &[]),
            &HashMap::new(),
        );

        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].outcome, Outcome::Satisfied);

        let decisions = decide(&evaluations);

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].should_have, Outcome::Satisfied);
        assert_eq!(decisions[0].matched_rule_ids, vec![1]);
    }

    #[test]
    fn missing_balance_counts_as_zero() {
        let evaluations = evaluate(
            &[token_amount(1, 10, "M", "0")],
            &snapshot(&[], &[]),
            &HashMap::new(),
        );

        // Zero threshold with zero balance still holds.
        assert_eq!(evaluations[0].outcome, Outcome::Satisfied);
    }

    #[test]
    fn usd_rule_without_price_is_indeterminate() {
        let evaluations = evaluate(
            &[token_usd(1, 10, "M", "10", "sol")],
            &snapshot(&[("M", "5")], &[]),
            &HashMap::new(),
        );

        assert_eq!(evaluations[0].outcome, Outcome::Indeterminate);

        let decisions = decide(&evaluations);

        assert_eq!(decisions[0].should_have, Outcome::Indeterminate);
        assert!(decisions[0].matched_rule_ids.is_empty());
    }

    #[test]
    fn usd_rule_multiplies_balance_by_price() {
        let prices = HashMap::from([(String::from("sol"), "2.5".parse().unwrap())]);

        let evaluations = evaluate(
            &[token_usd(1, 10, "M", "10", "sol")],
            &snapshot(&[("M", "4")], &[]),
            &prices,
        );

        assert_eq!(evaluations[0].outcome, Outcome::Satisfied);

        let below = evaluate(
            &[token_usd(1, 10, "M", "10.01", "sol")],
            &snapshot(&[("M", "4")], &[]),
            &prices,
        );

        assert_eq!(below[0].outcome, Outcome::Unsatisfied);
    }

    #[test]
    fn nft_rule_passes_at_threshold() {
        let evaluations = evaluate(
            &[nft(1, 10, "C", 2)],
            &snapshot(&[], &[("C", 2)]),
            &HashMap::new(),
        );

        assert_eq!(evaluations[0].outcome, Outcome::Satisfied);
    }

    #[test]
    fn evaluation_is_total() {
        let rules = vec![
            token_amount(1, 10, "M", "1"),
            token_usd(2, 10, "M", "1", "sol"),
            nft(3, 20, "C", 1),
        ];

        let evaluations = evaluate(&rules, &snapshot(&[], &[]), &HashMap::new());

        assert_eq!(evaluations.len(), rules.len());

        let decisions = decide(&evaluations);

        // One decision per distinct role id.
        assert_eq!(decisions.len(), 2);
    }

    #[test]
    fn roles_compose_disjunctively() {
        // role_1: unsatisfied, indeterminate; role_2: satisfied.
        let rules = vec![
            token_amount(1, 1, "M", "1000"),
            token_usd(2, 1, "M", "1", "sol"),
            token_amount(3, 2, "M", "1"),
        ];

        let evaluations = evaluate(&rules, &snapshot(&[("M", "5")], &[]), &HashMap::new());
        let decisions = decide(&evaluations);

        assert_eq!(decisions[0].role_id, 1);
        assert_eq!(decisions[0].should_have, Outcome::Indeterminate);

        assert_eq!(decisions[1].role_id, 2);
        assert_eq!(decisions[1].should_have, Outcome::Satisfied);
        assert_eq!(decisions[1].matched_rule_ids, vec![3]);
    }

    #[test]
    fn all_unsatisfied_revokes() {
        let rules = vec![
            token_amount(1, 1, "M", "1000"),
            nft(2, 1, "C", 5),
        ];

        let decisions = decide(&evaluate(&rules, &snapshot(&[], &[]), &HashMap::new()));

        assert_eq!(decisions[0].should_have, Outcome::Unsatisfied);
    }

    #[test]
    fn satisfied_wins_over_indeterminate() {
        let rules = vec![
            token_usd(1, 1, "M", "1", "sol"),
            token_amount(2, 1, "M", "1"),
        ];

        let decisions = decide(&evaluate(
            &rules,
            &snapshot(&[("M", "5")], &[]),
            &HashMap::new(),
        ));

        assert_eq!(decisions[0].should_have, Outcome::Satisfied);
        assert_eq!(decisions[0].matched_rule_ids, vec![2]);
    }
}
