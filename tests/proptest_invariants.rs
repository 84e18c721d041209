//! Property-based checks of the shop invariants.
//!
//! Random seeds, policies and wait durations; after every kernel round the
//! product population and every machine batch are inspected.

use std::collections::HashSet;

use jobshop_sim::shop::{DispatchPolicy, FlexibleJobShop, ShopConfig};
use proptest::prelude::*;

fn arb_config() -> impl Strategy<Value = ShopConfig> {
    (
        0..500u64,
        prop::sample::select(DispatchPolicy::ALL.to_vec()),
        prop::sample::select(vec![0.0, 60.0, 180.0, 360.0]),
        prop::sample::select(vec![1.0 / 60.0 / 4.0, 1.0 / 60.0 / 2.0]),
    )
        .prop_map(|(seed, policy, max_wait_duration, gen_rate)| ShopConfig {
            seed,
            target_num: 12,
            gen_rate,
            dispatching_strategy: policy,
            max_wait_duration,
            ..ShopConfig::default()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every generated product is in exactly one place: router, one machine, or sink
    #[test]
    fn products_are_never_lost_or_duplicated(config in arb_config()) {
        let mut shop = FlexibleJobShop::new(config).unwrap();

        for _ in 0..20_000 {
            if shop.sink().unwrap().target_reached() || !shop.step().unwrap() {
                break;
            }

            let router = shop.router().unwrap();
            let mut seen = HashSet::new();
            let mut located = 0u64;
            let mut place = |id| {
                located += 1;
                seen.insert(id)
            };

            for product in router.queued() {
                prop_assert!(place(product.id()), "{} held twice", product.id());
            }
            if let Some(reservation) = router.reservation() {
                prop_assert!(place(reservation.product().id()));
            }
            for machine in shop.machines().unwrap() {
                for product in machine.batch() {
                    prop_assert!(place(product.id()), "{} duplicated into {}", product.id(), machine.id());
                }
            }
            for product in shop.sink().unwrap().products() {
                prop_assert!(place(product.id()));
            }

            prop_assert_eq!(located, shop.generator().unwrap().generated());
        }
    }

    /// Batches stay within capacity and hold a single product type
    #[test]
    fn batches_respect_capacity_and_type(config in arb_config()) {
        let mut shop = FlexibleJobShop::new(config).unwrap();

        for _ in 0..20_000 {
            if shop.sink().unwrap().target_reached() || !shop.step().unwrap() {
                break;
            }
            for machine in shop.machines().unwrap() {
                prop_assert!(machine.used_capacity() <= machine.capacity());
                if let Some(batch_type) = machine.batch_type() {
                    prop_assert!(machine.batch().iter().all(|p| p.product_type() == batch_type));
                } else {
                    prop_assert!(machine.batch().is_empty());
                }
            }
        }
    }

    /// Same configuration, same outcome
    #[test]
    fn runs_are_deterministic(config in arb_config()) {
        let first = FlexibleJobShop::new(config.clone()).unwrap().run().unwrap();
        let second = FlexibleJobShop::new(config).unwrap().run().unwrap();
        prop_assert_eq!(first, second);
    }
}
