//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify:
//! - Balance derivation: only completed records count
//! - Status monotonicity: a terminal status never changes
//! - Non-negative balances under arbitrary earn/redeem sequences
//! - Sign discipline: earn is positive, redeem is negative

use chrono::Utc;
use loyalty_ledger::{
    balance::fold_balance,
    types::{NewBusiness, NewReward, NewTransaction, NewUser, TokenParams},
    BusinessId, Config, EntityStore, ErrorKind, Ledger, MemoryStore, MockGateway, Transaction,
    TransactionId, TransactionStatus, TransactionType, UserId,
};
use proptest::prelude::*;
use std::sync::Arc;

/// Strategy for transaction types
fn tx_type_strategy() -> impl Strategy<Value = TransactionType> {
    prop_oneof![Just(TransactionType::Earn), Just(TransactionType::Redeem)]
}

/// Strategy for statuses
fn status_strategy() -> impl Strategy<Value = TransactionStatus> {
    prop_oneof![
        Just(TransactionStatus::Pending),
        Just(TransactionStatus::Completed),
        Just(TransactionStatus::Failed),
    ]
}

/// Strategy for stored transactions spread over two users and two businesses
fn transaction_strategy() -> impl Strategy<Value = Transaction> {
    (
        tx_type_strategy(),
        1i64..10_000,
        status_strategy(),
        1u64..=2,
        1u64..=2,
    )
        .prop_map(|(tx_type, magnitude, status, user, business)| Transaction {
            id: TransactionId(0),
            user_id: Some(UserId(user)),
            business_id: BusinessId(business),
            tx_type,
            amount: match tx_type {
                TransactionType::Earn => magnitude,
                TransactionType::Redeem => -magnitude,
            },
            description: None,
            status,
            created_at: Utc::now(),
        })
}

/// Ledger operation for the balance property
#[derive(Debug, Clone)]
enum Op {
    Earn(i64),
    Redeem(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![(1i64..300).prop_map(Op::Earn), (0usize..3).prop_map(Op::Redeem)]
}

fn store_with_user() -> (MemoryStore, UserId, BusinessId) {
    let store = MemoryStore::new();
    let business = store
        .create_business(NewBusiness {
            name: "Shop".to_string(),
            wallet_address: "W1".to_string(),
            token_symbol: None,
            token_name: None,
        })
        .unwrap();
    let user = store
        .create_user(NewUser {
            username: "p".to_string(),
            password: "pw".to_string(),
            wallet_address: Some("PW".to_string()),
        })
        .unwrap();
    (store, user.id, business.id)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the fold counts exactly the completed records of the pair
    #[test]
    fn prop_balance_counts_only_completed(
        txs in prop::collection::vec(transaction_strategy(), 0..50)
    ) {
        let user = UserId(1);
        let business = BusinessId(1);

        let expected: i64 = txs
            .iter()
            .filter(|t| t.user_id == Some(user) && t.business_id == business)
            .filter(|t| t.status == TransactionStatus::Completed)
            .map(|t| t.amount)
            .sum();

        prop_assert_eq!(fold_balance(&txs, user, business).unwrap(), expected);
    }

    /// Property: the fold does not depend on record order
    #[test]
    fn prop_balance_order_independent(
        txs in prop::collection::vec(transaction_strategy(), 0..30)
    ) {
        let mut reversed = txs.clone();
        reversed.reverse();

        for user in [UserId(1), UserId(2)] {
            for business in [BusinessId(1), BusinessId(2)] {
                prop_assert_eq!(
                    fold_balance(&txs, user, business).unwrap(),
                    fold_balance(&reversed, user, business).unwrap()
                );
            }
        }
    }

    /// Property: only the first terminal transition is accepted
    #[test]
    fn prop_status_monotone(updates in prop::collection::vec(status_strategy(), 1..10)) {
        let (store, user, business) = store_with_user();
        let tx = store
            .create_transaction(NewTransaction {
                user_id: Some(user),
                business_id: business,
                tx_type: TransactionType::Earn,
                amount: 10,
                description: None,
                created_at: None,
            })
            .unwrap();
        prop_assert_eq!(tx.status, TransactionStatus::Pending);

        let mut current = TransactionStatus::Pending;
        for status in updates {
            let result = store.update_transaction_status(tx.id, status);
            if current == TransactionStatus::Pending && status.is_terminal() {
                prop_assert!(result.is_ok());
                current = status;
            } else {
                prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
            }
            prop_assert_eq!(store.get_transaction(tx.id).unwrap().status, current);
        }
    }

    /// Property: amounts with the wrong sign for their type are rejected
    #[test]
    fn prop_sign_discipline(tx_type in tx_type_strategy(), amount in -1_000i64..1_000) {
        let (store, user, business) = store_with_user();
        let result = store.create_transaction(NewTransaction {
            user_id: Some(user),
            business_id: business,
            tx_type,
            amount,
            description: None,
            created_at: None,
        });

        let valid = match tx_type {
            TransactionType::Earn => amount > 0,
            TransactionType::Redeem => amount < 0,
        };
        prop_assert_eq!(result.is_ok(), valid);
    }

    /// Property: no earn/redeem sequence drives a balance negative
    #[test]
    fn prop_balance_never_negative(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut config = Config::default();
            config.storage.seed_sample_data = false;

            let store = Arc::new(MemoryStore::new());
            let ledger = Ledger::new(config, store, Arc::new(MockGateway::reliable())).unwrap();
            let business = ledger
                .register_business(NewBusiness {
                    name: "Shop".to_string(),
                    wallet_address: "W1".to_string(),
                    token_symbol: None,
                    token_name: None,
                })
                .unwrap();
            let token = ledger
                .create_token(business.id, TokenParams {
                    name: "Points".to_string(),
                    symbol: "PTS".to_string(),
                    supply: 1_000_000,
                    decimals: 0,
                    mintable: false,
                    freezable: false,
                })
                .await
                .unwrap();
            let user = ledger
                .register_user(NewUser {
                    username: "p".to_string(),
                    password: "pw".to_string(),
                    wallet_address: Some("PW".to_string()),
                })
                .unwrap();

            let mut rewards = Vec::new();
            for cost in [50, 150, 400] {
                rewards.push(
                    ledger
                        .create_reward(NewReward {
                            business_id: business.id,
                            name: format!("Reward {cost}"),
                            description: String::new(),
                            token_cost: cost,
                            is_active: true,
                        })
                        .unwrap(),
                );
            }

            let mut expected = 0i64;
            for op in ops {
                match op {
                    Op::Earn(amount) => {
                        ledger
                            .earn(user.id, business.id, amount, "earn", &token.token_ref())
                            .await
                            .unwrap();
                        expected += amount;
                    }
                    Op::Redeem(index) => {
                        let reward = &rewards[index];
                        match ledger
                            .redeem(user.id, business.id, reward.id, &token.token_ref())
                            .await
                        {
                            Ok(_) => expected -= reward.token_cost,
                            Err(e) => {
                                prop_assert_eq!(e.kind(), ErrorKind::InsufficientBalance);
                                prop_assert!(expected < reward.token_cost);
                            }
                        }
                    }
                }

                let balance = ledger.balance_of(user.id, token.id).unwrap();
                prop_assert!(balance >= 0);
                prop_assert_eq!(balance, expected);
            }
            Ok(())
        })?;
    }
}
