use rand::rngs::StdRng;
use rand::SeedableRng;
use test_utils::addr;
use v6scout::net::nybble::{from_nybbles, hamming_distance, to_nybbles};
use v6scout::{AddressSpaceError, GenRange, Ipv6Cidr};


#[test]
fn test_size_law() {
    let base = GenRange::from_address(addr("2001:db8::1"));
    assert_eq!(base.size(), 1.0);
    for n in 1..=8usize {
        let indices: Vec<usize> = (0..n).map(|i| i * 3).collect();
        let range = base.copy_with_wildened(&indices);
        assert_eq!(range.wildcard_count(), n);
        assert_eq!(range.size(), 16f64.powi(n as i32));
    }
}

#[test]
fn test_copy_with_wildened_leaves_original() {
    let base = GenRange::from_address(addr("2001:db8::1"));
    let wider = base.copy_with_wildened(&[31, 30]);
    assert_eq!(base.wildcard_count(), 0);
    assert_eq!(wider.wild_indices(), vec![30, 31]);
    assert!(wider.contains(addr("2001:db8::ff")));
    assert!(!base.contains(addr("2001:db8::ff")));
}

#[test]
fn test_widen_only_marks_differing_nybbles() {
    let mut range = GenRange::from_address(addr("2001:db8::1"));
    range.widen(addr("2001:db8::1"));
    assert_eq!(range.size(), 1.0);
    range.widen(addr("2001:db8::21"));
    assert_eq!(range.wild_indices(), vec![30]);
    range.widen(addr("2001:db9::21"));
    assert_eq!(range.wild_indices(), vec![7, 30]);
}

#[test]
fn test_signature_and_display() {
    let range = GenRange::from_address(addr("2600:0:1::1")).copy_with_wildened(&[31, 8]);
    assert_eq!(range.signature(), "26000000?0010000000000000000000?");
    assert_eq!(range.to_string(), "2600:0000:?001:0000:0000:0000:0000:000?");

    let parsed: GenRange = range.to_string().parse().unwrap();
    assert_eq!(parsed, range);
    let from_sig: GenRange = range.signature().parse().unwrap();
    assert_eq!(from_sig, range);
}

#[test]
fn test_equal_patterns_share_signature() {
    let a = GenRange::from_address(addr("2600::5")).copy_with_wildened(&[31]);
    let b = GenRange::from_address(addr("2600::9")).copy_with_wildened(&[31]);
    assert_eq!(a.signature(), b.signature());
    assert_eq!(a, b);
}

#[test]
fn test_invalid_pattern_text() {
    assert!(matches!("2600::1".parse::<GenRange>(), Err(AddressSpaceError::InvalidPattern(_))));
    assert!(matches!(
        "2600:0000:0001:0000:0000:0000:0000:000g".parse::<GenRange>(),
        Err(AddressSpaceError::InvalidPattern(_))
    ));
}

#[test]
fn test_mask_bounds() {
    let range: GenRange = "2600:0000:0001:000?:0000:0000:0000:?00?".parse().unwrap();
    let mask = range.get_mask();
    assert_eq!(mask.first.mask, 0xFFFF_FFFF_FFFF_FFF0);
    assert_eq!(mask.first.expected, 0x2600_0000_0001_0000);
    assert_eq!(mask.first.min, 0x2600_0000_0001_0000);
    assert_eq!(mask.first.max, 0x2600_0000_0001_000F);
    assert_eq!(mask.second.mask, 0xFFFF_FFFF_FFFF_0FF0);
    assert_eq!(mask.second.min, 0);
    assert_eq!(mask.second.max, 0x0000_0000_0000_F00F);
    assert!(mask.second.matches(0x0000_0000_0000_A003));
    assert!(!mask.second.matches(0x0000_0000_0000_A013));
}

#[test]
fn test_random_address_respects_fixed_nybbles() {
    let mut rng = StdRng::seed_from_u64(3);
    let range: GenRange = "2600:0000:0001:0000:0000:0000:????:000?".parse().unwrap();
    for _ in 0..200 {
        assert!(range.contains(range.random_address(&mut rng, 0.0)));
    }
    let jittered = (0..200)
        .map(|_| range.random_address(&mut rng, 1.0))
        .filter(|&a| !range.contains(a))
        .count();
    assert!(jittered > 150);
}

#[test]
fn test_restrict_to_network() {
    let range: GenRange = "2600:0000:????:0000:0000:0000:0000:000?".parse().unwrap();
    let net: Ipv6Cidr = "2600:0:ab00::/40".parse().unwrap();
    let restricted = range.restrict_to(&net).unwrap();
    assert_eq!(restricted.to_string(), "2600:0000:ab??:0000:0000:0000:0000:000?");

    let partial: Ipv6Cidr = "2600:0:ab80::/41".parse().unwrap();
    let restricted = range.restrict_to(&partial).unwrap();
    // Nybble 10 is only half covered and stays wild
    assert_eq!(restricted.to_string(), "2600:0000:ab??:0000:0000:0000:0000:000?");
    let clamped = GenRange::clamp_to_network(addr("2600:0:ab00::3"), &partial);
    assert!(partial.contains(clamped));

    let conflicting: Ipv6Cidr = "2601::/16".parse().unwrap();
    assert!(matches!(range.restrict_to(&conflicting), Err(AddressSpaceError::IncompatibleNetwork(_))));
}

#[test]
fn test_nybble_helpers() {
    let a = addr("2001:db8::1");
    assert_eq!(from_nybbles(&to_nybbles(a)), a);
    assert_eq!(to_nybbles(a)[0..4], [2, 0, 0, 1]);

    let b = to_nybbles(addr("2001:db8::2"));
    assert_eq!(hamming_distance(&to_nybbles(a), &b).unwrap(), 1);
    assert!(matches!(
        hamming_distance(&[1, 2, 3], &[1, 2]),
        Err(AddressSpaceError::LengthMismatch { left: 3, right: 2 })
    ));
}
