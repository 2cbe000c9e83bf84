mod support;

use market_pulse::feed::metrics::{current_price, price_change_pct};

use support::{bar, minute_bar};

#[test]
fn current_price_is_latest_close() {
    assert_eq!(current_price(None), None);
    assert_eq!(current_price(Some(&minute_bar(4))), Some(104.0));
}

#[test]
fn change_is_undefined_below_two_bars() {
    let only = minute_bar(1);
    assert_eq!(price_change_pct(&[], Some(&only)), None);
    assert_eq!(price_change_pct(std::slice::from_ref(&only), Some(&only)), None);
}

#[test]
fn change_is_undefined_without_latest() {
    let bars = vec![minute_bar(1), minute_bar(2)];
    assert_eq!(price_change_pct(&bars, None), None);
}

#[test]
fn zero_reference_open_does_not_divide() {
    let bars = vec![bar(0, 0.0, 1.0, 0.0, 1.0), bar(60_000, 1.0, 2.0, 1.0, 2.0)];
    assert_eq!(price_change_pct(&bars, bars.last()), None);
}

#[test]
fn change_uses_first_open_and_latest_close() {
    let bars = vec![bar(0, 100.0, 105.0, 99.0, 104.0), bar(60_000, 104.0, 104.0, 90.0, 95.0)];
    let pct = price_change_pct(&bars, bars.last()).unwrap();
    assert!((pct - (-5.0)).abs() < 1e-9);
}
