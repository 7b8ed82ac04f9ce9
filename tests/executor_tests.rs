mod common;

use binance_futures_service::error::Error;
use binance_futures_service::types::{CancelOutcome, Deadline, OrderIntent, OrderKind, Side, TimeInForce};
use common::{creds, FakeVenue, Harness};
use std::time::Duration;

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(60))
}

#[tokio::test]
async fn market_order_sends_quantity_only() {
    let h = Harness::new(FakeVenue::funded());
    let res = h
        .executor
        .create_order(&creds(), &OrderIntent::market("BTCUSDT", Side::Buy, 0.2), deadline())
        .await
        .unwrap();
    assert_eq!(res.order_type, "MARKET");

    let sent = h.venue.orders();
    assert_eq!(sent.len(), 1);
    let req = &sent[0];
    assert_eq!(req.kind, OrderKind::Market);
    assert_eq!(req.symbol, "BTCUSDT");
    assert_eq!(req.side, Side::Buy);
    assert_eq!(req.quantity.as_deref(), Some("0.333"));
    assert_eq!(req.price, None);
    assert_eq!(req.stop_price, None);
    assert_eq!(req.time_in_force, None);
    assert!(!req.close_position);
}

#[tokio::test]
async fn limit_order_is_sized_from_its_own_price() {
    let h = Harness::new(FakeVenue::funded());
    let intent = OrderIntent::limit("ETHUSDT", Side::Sell, 0.1, "3200.0", TimeInForce::Gtc);
    h.executor.create_order(&creds(), &intent, deadline()).await.unwrap();

    let req = &h.venue.orders()[0];
    // 0.1 * 10000 * 10 / 3200 = 3.125
    assert_eq!(req.quantity.as_deref(), Some("3.125"));
    assert_eq!(req.price.as_deref(), Some("3200.0"));
    assert_eq!(req.time_in_force, Some(TimeInForce::Gtc));
    assert_eq!(req.stop_price, None);
}

#[tokio::test]
async fn stop_order_is_sized_from_stop_price() {
    let h = Harness::new(FakeVenue::funded());
    let intent = OrderIntent::stop("BTCUSDT", Side::Sell, 0.5, "55000", TimeInForce::Gtc);
    let res = h.executor.create_order(&creds(), &intent, deadline()).await.unwrap();
    assert_eq!(res.order_type, "STOP_MARKET");

    let req = &h.venue.orders()[0];
    // 50000 / 55000 = 0.90909…
    assert_eq!(req.quantity.as_deref(), Some("0.909"));
    assert_eq!(req.stop_price.as_deref(), Some("55000"));
    assert_eq!(req.time_in_force, Some(TimeInForce::Gtc));
    assert_eq!(req.price, None);
    assert!(!req.close_position);
}

#[tokio::test]
async fn malformed_fields_fail_before_any_venue_call() {
    let h = Harness::new(FakeVenue::funded());
    let mut no_price = OrderIntent::limit("BTCUSDT", Side::Buy, 0.1, "x", TimeInForce::Gtc);
    no_price.price = None;
    let bad_stop = OrderIntent::stop("BTCUSDT", Side::Sell, 0.1, "-1", TimeInForce::Gtc);
    let mut no_tif = OrderIntent::stop("BTCUSDT", Side::Sell, 0.1, "55000", TimeInForce::Gtc);
    no_tif.time_in_force = None;

    for intent in [no_price, bad_stop, no_tif] {
        let res = h.executor.create_order(&creds(), &intent, deadline()).await;
        assert!(matches!(res, Err(Error::Validation(_))), "{intent:?}: {res:?}");
    }
    assert!(h.venue.calls().is_empty());
}

#[tokio::test]
async fn unknown_symbol_fails_before_touching_the_account() {
    let h = Harness::new(FakeVenue::funded());
    let res = h
        .executor
        .create_order(&creds(), &OrderIntent::market("NOPEUSDT", Side::Buy, 0.1), deadline())
        .await;
    assert!(matches!(res, Err(Error::SymbolNotFound { .. })));
    assert!(h.venue.calls().is_empty());
}

#[tokio::test]
async fn venue_rejection_keeps_code_and_message() {
    let h = Harness::new(FakeVenue::funded());
    h.venue.fail_next("create_order", Error::Venue { code: -2019, msg: "Margin is insufficient.".into() });
    let res = h
        .executor
        .create_order(&creds(), &OrderIntent::market("BTCUSDT", Side::Buy, 0.2), deadline())
        .await;
    assert!(matches!(res, Err(Error::Venue { code: -2019, ref msg }) if msg == "Margin is insufficient."));
    assert_eq!(h.venue.count("create_order"), 1);
}

#[tokio::test]
async fn notional_below_one_step_submits_nothing() {
    let venue = FakeVenue::funded();
    venue.set_wallet("USDT", 1.0);
    let h = Harness::new(venue);
    // 1 USDT × 10x × 0.1 buys 0.0000166 BTC, under the 0.001 step
    let res = h
        .executor
        .create_order(&creds(), &OrderIntent::market("BTCUSDT", Side::Buy, 0.1), deadline())
        .await;
    assert!(matches!(res, Err(Error::Validation(_))), "{res:?}");
    assert_eq!(h.venue.count("create_order"), 0);
}

#[tokio::test]
async fn close_all_positions_places_close_position_stop() {
    let h = Harness::new(FakeVenue::funded());
    let res = h
        .executor
        .close_all_positions(&creds(), "BTCUSDT", Side::Sell, "50000", deadline())
        .await
        .unwrap();
    assert_eq!(res.order_type, "STOP_MARKET");

    let req = &h.venue.orders()[0];
    assert_eq!(req.kind, OrderKind::Stop);
    assert_eq!(req.side, Side::Sell);
    assert_eq!(req.stop_price.as_deref(), Some("50000"));
    assert!(req.close_position);
    assert_eq!(req.quantity, None);
    // no sizing involved
    assert_eq!(h.venue.count("account"), 0);
}

#[tokio::test]
async fn close_all_positions_rejects_bad_stop_price() {
    let h = Harness::new(FakeVenue::funded());
    let res = h
        .executor
        .close_all_positions(&creds(), "BTCUSDT", Side::Buy, "abc", deadline())
        .await;
    assert!(matches!(res, Err(Error::Validation(_))));
    assert!(h.venue.calls().is_empty());
}

#[tokio::test]
async fn cancel_orders_reports_each_outcome() {
    let h = Harness::new(FakeVenue::funded());
    let out = h
        .executor
        .cancel_orders(&creds(), "BTCUSDT", &[11, -1], &["my-order".to_string()], deadline())
        .await
        .unwrap();
    assert_eq!(out.len(), 3);
    assert!(matches!(&out[0], CancelOutcome::Cancelled(o) if o.order_id == 11));
    assert!(matches!(&out[1], CancelOutcome::Rejected { code: -2011, .. }));
    assert!(matches!(&out[2], CancelOutcome::Cancelled(o) if o.client_order_id == "my-order"));
}

#[tokio::test]
async fn cancel_orders_validates_id_lists() {
    let h = Harness::new(FakeVenue::funded());
    let empty = h.executor.cancel_orders(&creds(), "BTCUSDT", &[], &[], deadline()).await;
    assert!(matches!(empty, Err(Error::Validation(_))));

    let ids: Vec<i64> = (1..=11).collect();
    let too_many = h.executor.cancel_orders(&creds(), "BTCUSDT", &ids, &[], deadline()).await;
    assert!(matches!(too_many, Err(Error::Validation(_))));
    assert_eq!(h.venue.count("cancel_orders"), 0);
}

#[tokio::test]
async fn cancel_all_orders_is_retried_on_skew() {
    let h = Harness::new(FakeVenue::funded());
    h.venue.fail_next("cancel_all_orders", common::clock_skew());
    h.executor.cancel_all_orders(&creds(), "BTCUSDT", deadline()).await.unwrap();
    assert_eq!(h.venue.windows("cancel_all_orders"), vec![None, Some(5000)]);
}

#[tokio::test]
async fn quote_balance_and_account() {
    let h = Harness::new(FakeVenue::funded());
    let bal = h.executor.quote_balance(&creds(), deadline()).await.unwrap();
    assert_eq!(bal.asset, "USDT");
    assert_eq!(bal.balance, "10000");

    let acct = h.executor.account(&creds(), deadline()).await.unwrap();
    assert_eq!(acct.wallet_balance("USDT"), Some(10_000.0));

    let venue = FakeVenue::funded();
    venue.wallet.lock().unwrap().clear();
    let h = Harness::new(venue);
    let res = h.executor.quote_balance(&creds(), deadline()).await;
    assert!(matches!(res, Err(Error::MissingBalance(_))));
}
