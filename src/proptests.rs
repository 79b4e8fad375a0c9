use proptest::prelude::*;

use crate::bits::prefix_mask;
use crate::{MultiwayTrie, Poptrie};

/// A route as (network address, prefix length, fib index).
type Route = (u32, u8, u32);

/// Reference model: linear scan for the longest covering prefix.
fn model_lookup(routes: &[Route], key: u32) -> Option<u32> {
    routes
        .iter()
        .filter(|&&(addr, len, _)| covers(addr, len, key))
        .max_by_key(|&&(_, len, _)| len)
        .map(|&(_, _, fib)| fib)
}

fn covers(addr: u32, len: u8, key: u32) -> bool {
    len == 0 || (addr ^ key) >> (32 - u32::from(len)) == 0
}

fn build(routes: &[Route], direct_bits: u8) -> Poptrie {
    let mut trie = MultiwayTrie::new();
    for &(addr, len, fib) in routes {
        trie.insert(addr, len, fib);
    }
    trie.build_poptrie(direct_bits)
}

/// Generates a deduplicated set of canonical prefixes. Duplicate
/// (address, length) pairs are dropped because their resolution order is
/// unspecified; every surviving route gets a distinct fib index so wrong
/// answers are distinguishable.
fn route_set(with_default: bool) -> impl Strategy<Value = Vec<Route>> {
    prop::collection::vec((any::<u32>(), 0u8..=32), 1..64).prop_map(move |raw| {
        let mut seen = std::collections::HashSet::new();
        let mut routes = Vec::new();
        if with_default {
            seen.insert((0u32, 0u8));
            routes.push((0, 0, 0));
        }
        for (addr, len) in raw {
            let addr = addr & prefix_mask(u32::from(len));
            if seen.insert((addr, len)) {
                let fib = routes.len() as u32;
                routes.push((addr, len, fib));
            }
        }
        routes
    })
}

fn direct_bits() -> impl Strategy<Value = u8> {
    prop_oneof![Just(0u8), Just(6), Just(12), Just(18), Just(24)]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn matches_model_with_default_route(
        routes in route_set(true),
        keys in prop::collection::vec(any::<u32>(), 1..64),
        s in direct_bits(),
    ) {
        let poptrie = build(&routes, s);
        for key in keys {
            prop_assert_eq!(
                poptrie.route(key),
                model_lookup(&routes, key),
                "key {:#010x} direct_bits {}", key, s
            );
        }
    }

    #[test]
    fn matches_model_without_default_route(
        routes in route_set(false),
        keys in prop::collection::vec(any::<u32>(), 1..64),
        s in direct_bits(),
    ) {
        // Uncovered keys must come back as a typed no-route answer, never as
        // a stale fib index.
        let poptrie = build(&routes, s);
        for key in keys {
            prop_assert_eq!(
                poptrie.route(key),
                model_lookup(&routes, key),
                "key {:#010x} direct_bits {}", key, s
            );
        }
    }

    #[test]
    fn resolves_inserted_prefix_addresses(
        routes in route_set(false),
        s in direct_bits(),
    ) {
        // Every inserted prefix address resolves to its own fib unless a
        // strictly longer prefix in the set covers it, in which case the
        // longer prefix wins.
        let poptrie = build(&routes, s);
        for &(addr, _, _) in &routes {
            prop_assert_eq!(
                poptrie.route(addr),
                model_lookup(&routes, addr),
                "prefix address {:#010x} direct_bits {}", addr, s
            );
        }
    }
}
