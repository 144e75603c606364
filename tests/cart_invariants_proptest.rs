//! Randomized operation sequences against the in-memory cart.
//!
//! After every step: line keys stay unique, a failed step leaves the cart
//! exactly as it was, and a successful step leaves the local cart equal to
//! the server's.

use proptest::prelude::*;
use storecart::{
    AddLineInput, EngineConfig, GatewayCallKind, GatewayError, ProductRef, UserId, VariantKey,
};

const PRODUCTS: [&str; 3] = ["P1", "P2", "P3"];
const COLORS: [&str; 2] = ["red", "blue"];

#[derive(Debug, Clone)]
enum Step {
    Add {
        product: usize,
        color: usize,
        quantity: u32,
        fail: bool,
    },
    Update {
        pick: usize,
        quantity: u32,
        fail: bool,
    },
    Remove {
        pick: usize,
        fail: bool,
    },
    Clear {
        fail: bool,
    },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0..PRODUCTS.len(), 0..COLORS.len(), 1u32..4, any::<bool>()).prop_map(
            |(product, color, quantity, fail)| Step::Add {
                product,
                color,
                quantity,
                fail,
            }
        ),
        2 => (0usize..8, 1u32..6, any::<bool>())
            .prop_map(|(pick, quantity, fail)| Step::Update { pick, quantity, fail }),
        2 => (0usize..8, any::<bool>()).prop_map(|(pick, fail)| Step::Remove { pick, fail }),
        1 => any::<bool>().prop_map(|fail| Step::Clear { fail }),
    ]
}

fn injected() -> GatewayError {
    GatewayError::rejected("injected failure")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_sequential_steps_keep_cart_consistent(steps in prop::collection::vec(step(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let user = UserId::new("u1");
            let (engine, gateway) = storecart::in_memory(EngineConfig::new("u1")).unwrap();

            for step in steps {
                let before = engine.cart_items().await;

                let (outcome, failing) = match step {
                    Step::Add { product, color, quantity, fail } => {
                        if fail {
                            gateway.fail_next(GatewayCallKind::Add, injected()).await;
                        }
                        let input = AddLineInput::new(
                            ProductRef::new(PRODUCTS[product], PRODUCTS[product], 100),
                            VariantKey::color(COLORS[color]),
                            quantity,
                        );
                        (engine.add_line(input).await, fail)
                    }
                    Step::Update { pick, quantity, fail } => {
                        if before.is_empty() {
                            continue;
                        }
                        if fail {
                            gateway.fail_next(GatewayCallKind::UpdateQuantity, injected()).await;
                        }
                        let local_id = before[pick % before.len()].local_id;
                        (engine.update_quantity(local_id, quantity).await, fail)
                    }
                    Step::Remove { pick, fail } => {
                        if before.is_empty() {
                            continue;
                        }
                        if fail {
                            gateway.fail_next(GatewayCallKind::Remove, injected()).await;
                        }
                        let local_id = before[pick % before.len()].local_id;
                        (engine.remove_line(local_id).await, fail)
                    }
                    Step::Clear { fail } => {
                        if fail {
                            gateway.fail_next(GatewayCallKind::Clear, injected()).await;
                        }
                        (engine.clear_cart().await, fail)
                    }
                };

                let items = engine.cart_items().await;
                let mut keys: Vec<_> = items.iter().map(|line| line.key()).collect();
                keys.sort();
                keys.dedup();
                prop_assert_eq!(keys.len(), items.len());
                prop_assert!(!engine.is_any_loading().await);

                if failing {
                    prop_assert!(!outcome.success());
                    prop_assert_eq!(items, before);
                    engine.clear_error(outcome.op_id).await;
                } else {
                    prop_assert!(outcome.success(), "{:?}", outcome.error);
                    prop_assert!(items.iter().all(|line| !line.speculative));
                    prop_assert_eq!(
                        engine.confirmed_snapshot().await,
                        gateway.snapshot_of(&user).await
                    );
                }
            }

            prop_assert!(engine.current_errors().await.is_empty());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
