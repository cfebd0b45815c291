use rand::{rngs::StdRng, Rng, SeedableRng};
use referral_ledger::{Address, LedgerError, Points, ReferralState, Role, RoleMask};

const OWNER: Address = Address::mock(0xa0);
const ISSUER: Address = Address::mock(0xa1);
const CONSUMER: Address = Address::mock(0xa2);
const SELLER: Address = Address::mock(0xa4);

fn pts(n: u64) -> Points {
    Points::from(n)
}

fn setup() -> ReferralState {
    let mut state = ReferralState::new(OWNER);
    state
        .update_role(&OWNER, ISSUER, Role::Issuer.into())
        .unwrap();
    state
        .update_role(&OWNER, CONSUMER, Role::Consumer.into())
        .unwrap();
    state
        .update_role(&OWNER, SELLER, Role::Seller.into())
        .unwrap();
    state
}

#[test]
fn issue_then_consume() {
    let mut state = setup();
    let a = Address::mock(1);

    state.issue_to(&ISSUER, a, pts(5)).unwrap();
    state.consume_from(&CONSUMER, a, pts(3)).unwrap();

    assert_eq!(state.issued(&a), pts(5));
    assert_eq!(state.consumed(&a), pts(3));
    assert_eq!(state.available(&a), pts(2));
    assert_eq!(state.balance_of(&a), pts(2));
    assert_eq!(state.number_of_holders(), 1);
    assert_eq!(state.holder(0).unwrap(), a);
    assert_eq!(state.all_holders(), vec![a]);
}

#[test]
fn zero_issue_is_rejected() {
    let mut state = setup();
    let a = Address::mock(1);
    state.issue_to(&ISSUER, a, pts(1)).unwrap();
    let before = state.clone();

    assert_eq!(
        state.issue_to(&ISSUER, a, Points::ZERO),
        Err(LedgerError::InvalidAmount { account: a })
    );
    assert_eq!(
        state.consume_from(&CONSUMER, a, Points::ZERO),
        Err(LedgerError::InvalidAmount { account: a })
    );
    assert_eq!(state, before);
}

#[test]
fn consume_without_issuance_fails() {
    let mut state = setup();
    let a = Address::mock(1);
    assert_eq!(
        state.consume_from(&CONSUMER, a, pts(1)),
        Err(LedgerError::InsufficientBalance {
            account: a,
            available: Points::ZERO,
            requested: pts(1),
        })
    );
    assert_eq!(state.number_of_holders(), 0);
}

#[test]
fn second_max_issue_overflows() {
    let mut state = setup();
    let a = Address::mock(1);
    state.issue_to(&ISSUER, a, Points::MAX).unwrap();
    assert_eq!(
        state.issue_to(&ISSUER, a, pts(1)),
        Err(LedgerError::ArithmeticOverflow { account: a })
    );
    assert_eq!(
        state.issue_to(&ISSUER, a, Points::MAX),
        Err(LedgerError::ArithmeticOverflow { account: a })
    );
    assert_eq!(state.issued(&a), Points::MAX);
    assert_eq!(state.available(&a), Points::MAX);
    assert_eq!(state.number_of_holders(), 1);
}

#[test]
fn bulk_issue_is_all_or_nothing() {
    let mut state = setup();
    let (a, b, c) = (Address::mock(1), Address::mock(2), Address::mock(3));
    state.issue_to(&ISSUER, c, Points::MAX).unwrap();
    let before = state.clone();

    // a and b are valid, c overflows: nothing may land, not even holders.
    let err = state
        .bulk_issue(&ISSUER, &[a, b, c], &[pts(1), pts(2), pts(3)])
        .unwrap_err();
    assert_eq!(err, LedgerError::ArithmeticOverflow { account: c });
    assert_eq!(state, before);
    assert_eq!(state.all_holders(), vec![c]);

    let err = state
        .bulk_issue(&ISSUER, &[a, b], &[pts(1), Points::ZERO])
        .unwrap_err();
    assert_eq!(err, LedgerError::InvalidAmount { account: b });
    assert_eq!(state, before);

    state
        .bulk_issue(&ISSUER, &[b, a, b], &[pts(1), pts(2), pts(3)])
        .unwrap();
    assert_eq!(state.all_holders(), vec![c, b, a]);
    assert_eq!(state.issued(&b), pts(4));
}

#[test]
fn bulk_known_addresses_skip_null() {
    let mut state = setup();
    let (x, y) = (Address::mock(1), Address::mock(2));
    state
        .bulk_add_known_addresses(&SELLER, &[Address::NULL, x, y])
        .unwrap();

    assert!(!state.is_known(&Address::NULL));
    assert!(state.is_known(&x));
    assert!(state.is_known(&y));
    assert_eq!(state.number_of_known_addresses(), 2);

    let before = state.clone();
    state.bulk_add_known_addresses(&SELLER, &[y, x]).unwrap();
    state.add_known_address(&SELLER, x).unwrap();
    assert_eq!(state, before);
    assert_eq!(state.known_addresses(), vec![x, y]);
}

#[test]
fn referral_becomes_invalid_once_referred_is_known() {
    let mut state = setup();
    let (x, y) = (Address::mock(1), Address::mock(2));
    state.add_known_address(&SELLER, x).unwrap();
    assert!(state.is_valid(&x, &y));
    assert!(!state.is_valid(&y, &x));

    state.add_known_address(&SELLER, y).unwrap();
    assert!(!state.is_valid(&x, &y));
}

#[test]
fn multi_role_account() {
    let mut state = setup();
    let all: RoleMask = Role::ALL.into_iter().collect();
    assert_eq!(all, RoleMask::from_bits(7));
    let ops = Address::mock(0x0f);
    state.update_role(&OWNER, ops, all).unwrap();

    let a = Address::mock(1);
    state.issue_to(&ops, a, pts(3)).unwrap();
    state.consume_from(&ops, a, pts(3)).unwrap();
    state.add_known_address(&ops, a).unwrap();
    assert!(state.is_known(&a));
    assert_eq!(state.available(&a), Points::ZERO);
    assert_eq!(state.all_holders(), vec![a]);

    state.update_role(&OWNER, ops, Role::Seller.into()).unwrap();
    assert!(matches!(
        state.issue_to(&ops, a, pts(1)),
        Err(LedgerError::Unauthorized { .. })
    ));
}

#[test]
fn random_operations_keep_invariants() {
    let mut rng = StdRng::seed_from_u64(0x5eed_1eda);
    let mut state = setup();
    // Index 0 is the null address.
    let accounts: Vec<Address> = (0..7).map(Address::mock).collect();
    let mut holders: Vec<Address> = Vec::new();
    let mut known: Vec<Address> = Vec::new();

    for _ in 0..2_000 {
        let batch_len = rng.gen_range(1..4);
        let batch: Vec<Address> = (0..batch_len)
            .map(|_| accounts[rng.gen_range(0..accounts.len())])
            .collect();
        let amounts: Vec<Points> = (0..batch_len).map(|_| pts(rng.gen_range(0..20))).collect();

        let before = state.clone();
        let op = rng.gen_range(0..3);
        let result = match op {
            0 => state.bulk_issue(&ISSUER, &batch, &amounts),
            1 => state.bulk_consume(&CONSUMER, &batch, &amounts),
            _ => state.bulk_add_known_addresses(&SELLER, &batch),
        };

        match result {
            // New holders join in batch order, once, on their first issuance.
            Ok(()) if op == 0 => {
                for account in &batch {
                    if before.issued(account).is_zero() && !holders.contains(account) {
                        holders.push(*account);
                    }
                }
            }
            Ok(()) if op == 2 => {
                for account in &batch {
                    if !account.is_null() && !known.contains(account) {
                        known.push(*account);
                    }
                }
            }
            Ok(()) => {}
            Err(_) => assert_eq!(state, before),
        }

        for account in &accounts {
            assert!(state.consumed(account) <= state.issued(account));
        }
        assert_eq!(state.all_holders(), holders);
        assert_eq!(state.known_addresses(), known);
        assert!(!state.is_known(&Address::NULL));
        for r in &accounts {
            for t in &accounts {
                let expected = r != t && !t.is_null() && state.is_known(r) && !state.is_known(t);
                assert_eq!(state.is_valid(r, t), expected);
            }
        }
    }
}
