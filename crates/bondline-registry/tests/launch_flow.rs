//! Registry launches driven end to end

use bondline_core::prelude::*;
use bondline_registry::{LaunchRequest, Registry, RegistryConfig};
use bondline_token::MemoryBank;
use proptest::prelude::*;
use std::sync::Arc;

fn owner() -> Address {
    Address::from_label("platform-owner")
}

fn registry() -> (Registry, Arc<MemoryBank>) {
    let bank = Arc::new(MemoryBank::new());
    let registry = Registry::new(RegistryConfig::new(owner()), bank.clone()).unwrap();
    (registry, bank)
}

fn request(symbol: &str) -> LaunchRequest {
    LaunchRequest::new(format!("{symbol} token"), symbol, U256::exp10(15), U256::exp10(8))
}

#[test]
fn test_symbols_are_unique_ignoring_case() {
    let (mut registry, _) = registry();
    let alice = Address::from_label("alice");
    let bob = Address::from_label("bob");

    registry.launch(&alice, request("PEPE"), U256::exp10(18)).unwrap();
    let result = registry.launch(&bob, request("pepe"), U256::exp10(18));
    assert_eq!(result.err(), Some(BondlineError::SymbolTaken("pepe".into())));
    assert_eq!(registry.token_count(), 1);
    assert!(registry.tokens_by_creator(&bob).is_empty());
}

#[test]
fn test_creator_index_and_launch_order() {
    let (mut registry, _) = registry();
    let alice = Address::from_label("alice");
    let bob = Address::from_label("bob");

    registry.launch(&alice, request("AAA"), U256::exp10(18)).unwrap();
    registry.launch(&bob, request("BBB"), U256::exp10(18)).unwrap();
    registry.launch(&alice, request("CCC"), U256::exp10(18)).unwrap();

    let symbols: Vec<_> = registry
        .all_tokens()
        .iter()
        .map(|token| token.engine.symbol().to_string())
        .collect();
    assert_eq!(symbols, vec!["AAA", "BBB", "CCC"]);

    let alices: Vec<_> = registry
        .tokens_by_creator(&alice)
        .iter()
        .map(|token| token.sequence)
        .collect();
    assert_eq!(alices, vec![0, 2]);
}

#[test]
fn test_rejected_launch_leaves_registry_unchanged() {
    let (mut registry, _) = registry();
    let creator = Address::from_label("creator");

    let bad = request("BAD").with_min_reserve_ratio(3_000);
    assert!(matches!(
        registry.launch(&creator, bad, U256::exp10(18)),
        Err(BondlineError::InvalidParameter(_))
    ));
    assert_eq!(registry.token_count(), 0);
    assert!(registry.collected_fees().is_zero());
    assert!(!registry.is_symbol_taken("BAD"));
}

#[test]
fn test_launched_engine_trades_and_pays_platform() {
    let (mut registry, bank) = registry();
    let creator = Address::from_label("creator");
    let token = registry
        .launch(&creator, request("FROG"), U256::exp10(18))
        .unwrap();
    let engine = Arc::clone(&token.engine);

    let trader = Address::from_label("trader");
    let receipt = engine.mint(&trader, U256::exp10(18)).unwrap();
    assert_eq!(engine.pending_fees(&owner()), receipt.protocol_fee);
    assert_eq!(engine.pending_fees(&creator), receipt.spread);

    engine.withdraw_fees(&owner()).unwrap();
    assert_eq!(bank.balance_of(&owner()), receipt.protocol_fee);
}

#[test]
fn test_engines_are_independent() {
    let (mut registry, _) = registry();
    let a = registry
        .launch(&Address::from_label("a"), request("ONE"), U256::exp10(18))
        .unwrap();
    let b = registry
        .launch(&Address::from_label("b"), request("TWO"), U256::exp10(18))
        .unwrap();

    let price_b = b.engine.current_price().unwrap();
    std::thread::scope(|scope| {
        let engine = &a.engine;
        scope.spawn(move || {
            for i in 0..10 {
                let buyer = Address::from_label(&format!("buyer-{i}"));
                engine.mint(&buyer, U256::exp10(17)).unwrap();
            }
        });
    });
    assert_eq!(b.engine.current_price().unwrap(), price_b);
    assert!(a.engine.current_price().unwrap() > price_b);
}

proptest! {
    #[test]
    fn prop_symbol_validation(symbol in "[A-Za-z0-9]{1,10}") {
        let (mut registry, _) = registry();
        let token = registry
            .launch(&Address::from_label("c"), request(&symbol), U256::exp10(18))
            .unwrap();
        prop_assert!(registry.by_symbol(&symbol.to_ascii_lowercase()).is_some());
        prop_assert_eq!(registry.get(&token.id).unwrap().sequence, 0);
    }

    #[test]
    fn prop_bad_symbols_rejected(symbol in "[A-Z]{0,3}[^A-Za-z0-9][A-Z]{0,3}") {
        let (mut registry, _) = registry();
        let result = registry.launch(&Address::from_label("c"), request(&symbol), U256::exp10(18));
        prop_assert!(result.is_err());
        prop_assert_eq!(registry.token_count(), 0);
    }
}
