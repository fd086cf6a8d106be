//! Order lifecycle tests
//!
//! Covers order creation, merchandise receipts against orders, incident
//! registration and the completion/cancellation transitions.

mod common;

use common::{dec, TestEnv};
use proptest::prelude::*;
use shared::{
    NewOrderLine, Order, OrderLine, OrderStatus, ReceiptLine, DEFAULT_INCIDENT_DESCRIPTION,
};
use stockcloud_backend::cache::keys;
use stockcloud_backend::error::AppError;
use stockcloud_backend::services::order::{CreateOrderInput, ReceivePurchaseInput};
use stockcloud_backend::store::Store;

fn receipt_line(product_id: i64, quantity: i32, incident: Option<&str>) -> ReceiptLine {
    ReceiptLine {
        product_id,
        product_name: None,
        quantity,
        unit_price: dec("4.50"),
        incident: incident.map(str::to_string),
    }
}

fn receive(supplier_id: i64, order_id: Option<i64>, lines: Vec<ReceiptLine>) -> ReceivePurchaseInput {
    let total = lines
        .iter()
        .map(|l| l.unit_price * rust_decimal::Decimal::from(l.quantity))
        .sum();
    ReceivePurchaseInput {
        supplier_id,
        order_id,
        total,
        note: None,
        lines,
    }
}

/// Supplier, one product with stock 0 and an order for 10 units of it
async fn order_for_ten(env: &TestEnv) -> (i64, i64, Order) {
    let supplier = env.supplier().await;
    let product = env.product("Leche evaporada", 0, 5, "4.50").await;
    let order = env
        .orders()
        .create(
            1,
            CreateOrderInput {
                supplier_id: supplier.id,
                lines: vec![NewOrderLine {
                    product_id: product.id,
                    quantity: 10,
                }],
            },
        )
        .await
        .unwrap();
    (supplier.id, product.id, order)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_create_order_starts_in_progress_with_nothing_received() {
    let env = TestEnv::new();
    let (_, product_id, order) = order_for_ten(&env).await;

    assert_eq!(order.status, OrderStatus::InProgress);
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].product_id, product_id);
    assert_eq!(order.lines[0].received, 0);
    assert_eq!(order.lines[0].product_name.as_deref(), Some("Leche evaporada"));
}

#[tokio::test]
async fn test_full_receipt_without_incident_completes_order() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;

    let receipt = env
        .orders()
        .receive_purchase(1, receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 10, None)]))
        .await
        .unwrap();

    assert!(receipt.incident.is_none());
    let stored = env.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(stored.lines[0].received, 10);
    assert_eq!(env.stock_of(product_id).await, 10);
}

#[tokio::test]
async fn test_partial_receipt_with_incident_keeps_order_open() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;

    let receipt = env
        .orders()
        .receive_purchase(
            1,
            receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 6, Some("damaged"))]),
        )
        .await
        .unwrap();

    let stored = env.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::InProgress);
    assert_eq!(stored.lines[0].received, 6);
    assert_eq!(stored.lines[0].incident.as_deref(), Some("damaged"));

    let incident = receipt.incident.expect("incident registered");
    assert_eq!(incident.movement_id, receipt.movement.id);
    assert_eq!(incident.order_id, Some(order.id));
    assert_eq!(incident.description, DEFAULT_INCIDENT_DESCRIPTION);
    assert_eq!(incident.details.len(), 1);
    assert_eq!(incident.details[0].product_id, product_id);
    assert_eq!(incident.details[0].quantity, 6);
    assert_eq!(incident.details[0].description, "damaged");

    let for_order = env.store.incidents_for_order(order.id).await.unwrap();
    assert_eq!(for_order.len(), 1);
}

#[tokio::test]
async fn test_incident_blocks_completion_even_when_quantities_are_met() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;

    env.orders()
        .receive_purchase(
            1,
            receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 10, Some("caja abierta"))]),
        )
        .await
        .unwrap();

    let stored = env.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::InProgress);
    assert!(stored.is_fully_received());
}

#[tokio::test]
async fn test_blank_incident_note_is_not_an_incident() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;

    let receipt = env
        .orders()
        .receive_purchase(
            1,
            receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 10, Some("   "))]),
        )
        .await
        .unwrap();

    assert!(receipt.incident.is_none());
    assert_eq!(receipt.order.unwrap().status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_cancel_completed_order_overwrites_status() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;
    env.orders()
        .receive_purchase(1, receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 10, None)]))
        .await
        .unwrap();

    let cancelled = env.orders().cancel(order.id).await.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let stored = env.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_unknown_order_is_not_found() {
    let env = TestEnv::new();
    assert!(matches!(env.orders().cancel(99).await, Err(AppError::NotFound(_))));
}

// ============================================================================
// Edge cases
// ============================================================================

#[tokio::test]
async fn test_receipt_against_completed_order_is_rejected_and_rolled_back() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;
    let orders = env.orders();
    orders
        .receive_purchase(1, receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 10, None)]))
        .await
        .unwrap();
    let movements_before = env.store.list_movements().await.unwrap().len();

    let second = orders
        .receive_purchase(1, receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 3, None)]))
        .await;

    assert!(matches!(second, Err(AppError::InvalidStateTransition(_))));
    assert_eq!(env.stock_of(product_id).await, 10);
    assert_eq!(env.store.list_movements().await.unwrap().len(), movements_before);
}

#[tokio::test]
async fn test_failing_line_rolls_back_whole_receipt() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;

    // Product 999 does not exist, so its stock increase fails after the
    // first line was already applied inside the unit of work
    let result = env
        .orders()
        .receive_purchase(
            1,
            receive(
                supplier_id,
                Some(order.id),
                vec![receipt_line(product_id, 10, None), receipt_line(999, 1, None)],
            ),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(env.stock_of(product_id).await, 0);
    assert!(env.store.list_movements().await.unwrap().is_empty());
    let stored = env.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::InProgress);
    assert_eq!(stored.lines[0].received, 0);
}

#[tokio::test]
async fn test_lines_outside_the_order_still_enter_stock() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;
    let extra = env.product("Fideos", 2, 1, "3.20").await;

    let receipt = env
        .orders()
        .receive_purchase(
            1,
            receive(
                supplier_id,
                Some(order.id),
                vec![receipt_line(product_id, 4, None), receipt_line(extra.id, 5, None)],
            ),
        )
        .await
        .unwrap();

    assert_eq!(env.stock_of(extra.id).await, 7);
    let order = receipt.order.unwrap();
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].received, 4);
    assert_eq!(order.status, OrderStatus::InProgress);
}

#[tokio::test]
async fn test_purchase_without_order() {
    let env = TestEnv::new();
    let supplier = env.supplier().await;
    let product = env.product("Aceite", 1, 0, "9.90").await;

    let receipt = env
        .orders()
        .receive_purchase(1, receive(supplier.id, None, vec![receipt_line(product.id, 12, None)]))
        .await
        .unwrap();

    assert!(receipt.order.is_none());
    assert_eq!(receipt.purchase.order_id, None);
    assert_eq!(receipt.lines.len(), 1);
    assert_eq!(env.stock_of(product.id).await, 13);
}

#[tokio::test]
async fn test_create_order_validation() {
    let env = TestEnv::new();
    let supplier = env.supplier().await;
    let product = env.product("Atún", 0, 3, "5.00").await;
    let orders = env.orders();

    let empty = orders
        .create(1, CreateOrderInput { supplier_id: supplier.id, lines: vec![] })
        .await;
    assert!(matches!(empty, Err(AppError::Validation { .. }) | Err(AppError::ValidationError(_))));

    let zero = orders
        .create(
            1,
            CreateOrderInput {
                supplier_id: supplier.id,
                lines: vec![NewOrderLine { product_id: product.id, quantity: 0 }],
            },
        )
        .await;
    assert!(zero.is_err());

    let unknown_supplier = orders
        .create(
            1,
            CreateOrderInput {
                supplier_id: 404,
                lines: vec![NewOrderLine { product_id: product.id, quantity: 2 }],
            },
        )
        .await;
    assert!(matches!(unknown_supplier, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_open_order_lookup_and_critical_products() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;
    let uncovered = env.product("Sal", 1, 4, "1.20").await;
    let orders = env.orders();

    let found = orders.find_open_order_for_product(product_id).await.unwrap();
    assert_eq!(found.map(|o| o.id), Some(order.id));
    assert!(orders
        .find_open_order_for_product(uncovered.id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(orders.open_order_products().await.unwrap(), vec![product_id]);

    // Covered by the open order, so only the other product is critical
    let critical = env.products().critical_products().await.unwrap();
    assert_eq!(critical.iter().map(|p| p.id).collect::<Vec<_>>(), vec![uncovered.id]);

    orders
        .receive_purchase(1, receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 10, None)]))
        .await
        .unwrap();
    assert!(orders.open_order_products().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_order_detail_and_daily_summary() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;
    let orders = env.orders();
    orders
        .receive_purchase(
            1,
            receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 2, Some("golpeado"))]),
        )
        .await
        .unwrap();

    let detail = orders.get_order(order.id).await.unwrap();
    assert_eq!(detail.incidents.len(), 1);

    let today = env.clock.today();
    assert_eq!(orders.orders_on_date(today).await.unwrap().len(), 1);
    let summary = orders.orders_summary_30_days().await.unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].date, today);
    assert_eq!(summary[0].count, 1);
}

#[tokio::test]
async fn test_purchase_evicts_order_and_incident_lists() {
    let env = TestEnv::new();
    let (supplier_id, product_id, order) = order_for_ten(&env).await;
    let orders = env.orders();

    orders.list_orders().await.unwrap();
    assert!(env.cache_entries.contains(keys::ORDERS_ALL).await);

    orders
        .receive_purchase(1, receive(supplier_id, Some(order.id), vec![receipt_line(product_id, 1, None)]))
        .await
        .unwrap();

    assert!(!env.cache_entries.contains(keys::ORDERS_ALL).await);
    let listed = orders.list_orders().await.unwrap();
    assert_eq!(listed[0].lines[0].received, 1);
}

#[tokio::test]
async fn test_received_overflow_is_rejected_and_rolled_back() {
    let env = TestEnv::new();
    let supplier = env.supplier().await;
    let arroz = env.product("Arroz", 0, 5, "4.50").await;
    let azucar = env.product("Azúcar", 0, 5, "4.50").await;
    let orders = env.orders();
    let order = orders
        .create(
            1,
            CreateOrderInput {
                supplier_id: supplier.id,
                lines: vec![
                    NewOrderLine { product_id: arroz.id, quantity: 10 },
                    NewOrderLine { product_id: azucar.id, quantity: 10 },
                ],
            },
        )
        .await
        .unwrap();

    orders
        .receive_purchase(1, receive(supplier.id, Some(order.id), vec![receipt_line(arroz.id, i32::MAX - 5, None)]))
        .await
        .unwrap();
    // A shortage lowers stock while `received` stays put
    env.movements()
        .register_shortage(
            1,
            stockcloud_backend::services::movement::RegisterAdjustmentInput {
                product_id: arroz.id,
                quantity: 1_000,
                reason: "Inventario".into(),
                note: None,
            },
        )
        .await
        .unwrap();

    let result = orders
        .receive_purchase(1, receive(supplier.id, Some(order.id), vec![receipt_line(arroz.id, 10, None)]))
        .await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
    let stored = env.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.lines[0].received, i32::MAX - 5);
    assert_eq!(stored.status, OrderStatus::InProgress);
    assert_eq!(env.stock_of(arroz.id).await, i32::MAX - 1_005);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_receipts_on_one_order_serialize() {
    let env = TestEnv::new();
    let supplier = env.supplier().await;
    let product = env.product("Aceite", 0, 5, "4.50").await;
    let order = env
        .orders()
        .create(
            1,
            CreateOrderInput {
                supplier_id: supplier.id,
                lines: vec![NewOrderLine { product_id: product.id, quantity: 20 }],
            },
        )
        .await
        .unwrap();

    // Eight deliveries of 4 units race for an order of 20
    let mut handles = Vec::new();
    for _ in 0..8 {
        let orders = env.orders();
        let input = receive(supplier.id, Some(order.id), vec![receipt_line(product.id, 4, None)]);
        handles.push(tokio::spawn(async move { orders.receive_purchase(1, input).await }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    let mut completions = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                accepted += 1;
                if receipt.order.map(|o| o.status) == Some(OrderStatus::Completed) {
                    completions += 1;
                }
            }
            Err(AppError::InvalidStateTransition(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!((accepted, rejected, completions), (5, 3, 1));
    let stored = env.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(stored.lines[0].received, 20);
    assert_eq!(env.stock_of(product.id).await, 20);
    assert_eq!(env.store.list_movements().await.unwrap().len(), 5);
}

// ============================================================================
// Property Tests
// ============================================================================

fn order_with(quantities: &[i32]) -> Order {
    Order {
        id: 1,
        supplier_id: 1,
        requested_by: 1,
        status: OrderStatus::InProgress,
        lines: quantities
            .iter()
            .enumerate()
            .map(|(i, q)| OrderLine::new(i as i64 + 1, *q))
            .collect(),
        created_at: chrono::Utc::now(),
    }
}

proptest! {
    /// However a fully covering set of deliveries is split, the order
    /// completes exactly once and never accepts receipts afterwards.
    #[test]
    fn prop_full_coverage_completes_exactly_once(
        quantities in prop::collection::vec(1i32..50, 1..5),
        splits in prop::collection::vec(1usize..4, 1..5),
    ) {
        let mut order = order_with(&quantities);
        let mut transitions = 0;

        for (idx, qty) in quantities.iter().enumerate() {
            let parts = splits[idx % splits.len()].min(*qty as usize);
            let base = qty / parts as i32;
            let mut delivered = 0;
            for part in 0..parts {
                let amount = if part + 1 == parts { qty - delivered } else { base };
                delivered += amount;
                if order.status.can_receive() {
                    order
                        .apply_receipt(&[receipt_line(idx as i64 + 1, amount, None)])
                        .unwrap();
                    if order.complete_if_received() {
                        transitions += 1;
                    }
                }
            }
        }

        prop_assert_eq!(transitions, 1);
        prop_assert_eq!(order.status, OrderStatus::Completed);
        prop_assert!(order.apply_receipt(&[receipt_line(1, 1, None)]).is_err());
        prop_assert!(!order.complete_if_received());
    }

    /// Received totals equal the sum of matching deliveries
    #[test]
    fn prop_received_is_sum_of_matching_deliveries(
        deliveries in prop::collection::vec((1i64..4, 1i32..20), 0..20),
    ) {
        let mut order = order_with(&[100, 100]);
        for (product_id, qty) in &deliveries {
            order.apply_receipt(&[receipt_line(*product_id, *qty, None)]).unwrap();
        }
        for line in &order.lines {
            let expected: i32 = deliveries
                .iter()
                .filter(|(p, _)| *p == line.product_id)
                .map(|(_, q)| q)
                .sum();
            prop_assert_eq!(line.received, expected);
        }
    }
}
