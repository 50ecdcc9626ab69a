//! Integration tests for the ledger pipeline.
//!
//! Tests: Service → LedgerStore transaction → commit → EventBus
//!
//! Verifies:
//! - Transfers conserve stock and balances never go negative
//! - Movement numbers are gapless per tenant and year
//! - Bulk fulfillment scenarios (exact, across batches, short, racing)
//! - Concurrent writers cannot spend the same stock twice
//! - Tenant isolation is preserved
//! - Events are published only for committed work

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal_macros::dec;

    use medstock_catalog::{Batch, Location, Presentation, Product, Warehouse};
    use medstock_core::{
        AggregateRoot, BatchId, LocationId, PresentationId, ProductId, Quantity, RequestId, TenantId, WarehouseId,
    };
    use medstock_events::{EventBus, InMemoryEventBus, Subscription};
    use medstock_inventory::{
        BalanceKey, ConfirmationDecision, ConfirmationStatus, InventoryError, MovementDraft,
        MovementReference, MovementType, NewRequestItem, RequestStatus, StockMovement,
        StockMovementRequest, SuppliedFulfillment, SuppliedLine,
    };

    use crate::error::LedgerError;
    use crate::event_bus::JsonEnvelope;
    use crate::fulfillment::{BulkFulfillmentInput, BulkFulfillmentService, CoveragePolicy, SuppliedPlanInput};
    use crate::ledger::InMemoryLedgerStore;
    use crate::movement_engine::{FefoIssue, MovementEngine};
    use crate::read_model::InMemoryCatalog;
    use crate::requests::{OpenRequest, RequestService};
    use crate::batch_registry::BatchRegistry;

    type Store = Arc<InMemoryLedgerStore>;
    type Catalog = Arc<InMemoryCatalog>;
    type Bus = Arc<InMemoryEventBus<JsonEnvelope>>;

    struct Fixture {
        tenant_id: TenantId,
        catalog: Catalog,
        bus: Bus,
        engine: Arc<MovementEngine<Store, Catalog, Bus>>,
        requests: RequestService<Store, Catalog, Bus>,
        fulfillment: BulkFulfillmentService<Store, Catalog, Bus>,
        registry: BatchRegistry<Store, Catalog>,
        product: ProductId,
        boxed: PresentationId,
        central: LocationId,
        branch: LocationId,
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn setup() -> Fixture {
        let tenant_id = TenantId::new();
        let store: Store = Arc::new(InMemoryLedgerStore::new());
        let catalog: Catalog = Arc::new(InMemoryCatalog::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());

        let product = Product::new(tenant_id, ProductId::new(), "AMX-500", "Amoxicillin 500mg").unwrap();
        let boxed = Presentation::new(tenant_id, PresentationId::new(), product.id, "Box of 20", dec!(20)).unwrap();

        let central_wh = Warehouse::new(tenant_id, WarehouseId::new(), "WH-C", "Central").unwrap().in_city("Bogota");
        let branch_wh = Warehouse::new(tenant_id, WarehouseId::new(), "WH-B", "Branch").unwrap().in_city("Cali");
        let central = Location::new(tenant_id, LocationId::new(), central_wh.id, "C-01").unwrap();
        let branch = Location::new(tenant_id, LocationId::new(), branch_wh.id, "B-01").unwrap();

        catalog.add_product(product.clone());
        catalog.add_presentation(boxed.clone());
        catalog.add_warehouse(central_wh);
        catalog.add_warehouse(branch_wh);
        catalog.add_location(central.clone());
        catalog.add_location(branch.clone());

        let engine = MovementEngine::new(store.clone(), catalog.clone(), bus.clone());
        let fulfillment = BulkFulfillmentService::new(MovementEngine::new(store.clone(), catalog.clone(), bus.clone()));

        Fixture {
            tenant_id,
            requests: RequestService::new(store.clone(), catalog.clone(), bus.clone()),
            registry: BatchRegistry::new(store.clone(), catalog.clone()),
            engine: Arc::new(engine),
            fulfillment,
            catalog,
            bus,
            product: product.id,
            boxed: boxed.id,
            central: central.id,
            branch: branch.id,
        }
    }

    impl Fixture {
        fn batch(&self, number: &str, expires_in_days: Option<i64>) -> BatchId {
            let batch = Batch::new(
                self.tenant_id,
                BatchId::new(),
                self.product,
                number,
                expires_in_days.map(|d| today() + Duration::days(d)),
            )
            .unwrap();
            let id = batch.id;
            self.catalog.add_batch(batch);
            id
        }

        fn receive(&self, batch_id: BatchId, location: LocationId, quantity: i64) -> StockMovement {
            self.engine
                .apply_movement(self.tenant_id, draft(MovementType::In, self.product, Some(batch_id), None, Some(location), quantity))
                .unwrap()
        }

        fn balance(&self, location: LocationId, batch_id: BatchId) -> Quantity {
            self.engine
                .balance(self.tenant_id, &BalanceKey::new(location, self.product, batch_id))
                .unwrap()
        }

        fn open(&self, city: &str, items: Vec<NewRequestItem>) -> StockMovementRequest {
            self.requests
                .open_request(
                    self.tenant_id,
                    OpenRequest {
                        requested_city: city.to_string(),
                        items,
                        note: None,
                    },
                )
                .unwrap()
        }

        fn bulk(&self, request_ids: Vec<RequestId>) -> BulkFulfillmentInput {
            BulkFulfillmentInput {
                from_location_id: self.central,
                to_location_id: self.branch,
                request_ids,
                note: Some("weekly run".to_string()),
            }
        }
    }

    fn draft(
        movement_type: MovementType,
        product_id: ProductId,
        batch_id: Option<BatchId>,
        from: Option<LocationId>,
        to: Option<LocationId>,
        quantity: i64,
    ) -> MovementDraft {
        MovementDraft {
            movement_type,
            product_id,
            batch_id,
            from_location_id: from,
            to_location_id: to,
            quantity: Quantity::units(quantity),
            presentation_id: None,
            reference: MovementReference::default(),
            note: None,
        }
    }

    fn item(product_id: ProductId, presentation_id: Option<PresentationId>, quantity: i64) -> NewRequestItem {
        NewRequestItem {
            product_id,
            presentation_id,
            quantity: Quantity::units(quantity),
        }
    }

    fn event_types(sub: &Subscription<JsonEnvelope>) -> Vec<String> {
        sub.drain().iter().map(|e| e.event_type().to_string()).collect()
    }

    #[test]
    fn transfer_conserves_stock_across_locations() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(120));
        fx.receive(lot, fx.central, 50);

        let moved = fx
            .engine
            .apply_movement(
                fx.tenant_id,
                draft(MovementType::Transfer, fx.product, Some(lot), Some(fx.central), Some(fx.branch), 18),
            )
            .unwrap();

        assert_eq!(moved.quantity, Quantity::units(18));
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(32));
        assert_eq!(fx.balance(fx.branch, lot), Quantity::units(18));
        let total = fx.balance(fx.central, lot).checked_add(fx.balance(fx.branch, lot)).unwrap();
        assert_eq!(total, Quantity::units(50));
    }

    #[test]
    fn overdraw_fails_and_leaves_no_trace() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(30));
        fx.receive(lot, fx.central, 4);
        let sub = fx.bus.subscribe();

        let err = fx
            .engine
            .apply_movement(fx.tenant_id, draft(MovementType::Out, fx.product, Some(lot), Some(fx.central), None, 10))
            .unwrap_err();

        match err {
            LedgerError::Inventory(InventoryError::InsufficientStock {
                batch_id,
                available,
                shortfall,
                ..
            }) => {
                assert_eq!(batch_id, Some(lot));
                assert_eq!(available, Quantity::units(4));
                assert_eq!(shortfall, Quantity::units(6));
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(4));
        assert_eq!(fx.engine.movements(fx.tenant_id, None).unwrap().len(), 1);
        assert!(event_types(&sub).is_empty());
    }

    #[test]
    fn movement_numbers_are_gapless_even_after_failures() {
        let fx = setup();
        let lot = fx.batch("L-1", None);
        fx.receive(lot, fx.central, 5);

        let over = draft(MovementType::Out, fx.product, Some(lot), Some(fx.central), None, 50);
        assert!(fx.engine.apply_movement(fx.tenant_id, over).is_err());
        fx.receive(lot, fx.central, 5);
        fx.engine
            .apply_movement(fx.tenant_id, draft(MovementType::Adjustment, fx.product, Some(lot), None, Some(fx.central), -3))
            .unwrap();

        let movements = fx.engine.movements(fx.tenant_id, Some(fx.product)).unwrap();
        let numbers: Vec<u64> = movements.iter().map(|m| m.number.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        let year = Utc::now().format("%Y").to_string();
        assert_eq!(movements[2].display_number(), format!("MOV-{year}-000003"));
        assert_eq!(movements[2].quantity, Quantity::units(-3));
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(7));
    }

    #[test]
    fn presentation_quantities_are_normalised_to_base_units() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(200));
        let mut input = draft(MovementType::In, fx.product, Some(lot), None, Some(fx.central), 3);
        input.presentation_id = Some(fx.boxed);

        let recorded = fx.engine.apply_movement(fx.tenant_id, input).unwrap();

        assert_eq!(recorded.quantity, Quantity::units(60));
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(60));
    }

    #[test]
    fn out_without_batch_draws_from_the_earliest_expiry() {
        let fx = setup();
        let late = fx.batch("LATE", Some(60));
        let never = fx.batch("NEVER", None);
        let soon = fx.batch("SOON", Some(-10));
        for lot in [late, never, soon] {
            fx.receive(lot, fx.central, 10);
        }

        let listed: Vec<BatchId> = fx
            .registry
            .list_available_batches(fx.tenant_id, fx.product, Some(fx.central))
            .unwrap()
            .into_iter()
            .map(|b| b.batch_id)
            .collect();
        assert_eq!(listed, vec![soon, late, never]);

        let out = fx
            .engine
            .apply_movement(fx.tenant_id, draft(MovementType::Out, fx.product, None, Some(fx.central), None, 4))
            .unwrap();
        assert_eq!(out.batch_id, soon);
        assert_eq!(fx.balance(fx.central, soon), Quantity::units(6));
    }

    #[test]
    fn fefo_issue_spans_batches_or_changes_nothing() {
        let fx = setup();
        let first = fx.batch("A", Some(5));
        let second = fx.batch("B", Some(90));
        fx.receive(first, fx.central, 30);
        fx.receive(second, fx.central, 200);

        let issue = |quantity: i64| FefoIssue {
            product_id: fx.product,
            location_id: fx.central,
            quantity: Quantity::units(quantity),
            presentation_id: None,
            reference: MovementReference::new("DISPENSE", "RX-1"),
            note: None,
        };

        let err = fx.engine.issue_fefo(fx.tenant_id, issue(500)).unwrap_err();
        assert_eq!(err.code(), "insufficient_stock");
        assert_eq!(fx.balance(fx.central, first), Quantity::units(30));

        let movements = fx.engine.issue_fefo(fx.tenant_id, issue(100)).unwrap();
        let drawn: Vec<(BatchId, Quantity)> = movements.iter().map(|m| (m.batch_id, m.quantity)).collect();
        assert_eq!(
            drawn,
            vec![(first, Quantity::units(-30)), (second, Quantity::units(-70))]
        );
        assert_eq!(fx.balance(fx.central, second), Quantity::units(130));
    }

    #[test]
    fn exact_fulfillment_from_matching_batch() {
        let fx = setup();
        let boxed_batch = Batch::new(fx.tenant_id, BatchId::new(), fx.product, "BX-1", Some(today() + Duration::days(180)))
            .unwrap()
            .received_as(fx.boxed);
        let lot = boxed_batch.id;
        fx.catalog.add_batch(boxed_batch);
        fx.receive(lot, fx.central, 50);
        let request = fx.open("Cali", vec![item(fx.product, Some(fx.boxed), 2)]);
        let sub = fx.bus.subscribe();

        let outcome = fx
            .fulfillment
            .bulk_fulfill(fx.tenant_id, fx.bulk(vec![request.request_id()]), CoveragePolicy::RequireFull)
            .unwrap();

        assert_eq!(outcome.movements.len(), 1);
        let transfer = &outcome.movements[0];
        assert_eq!(transfer.movement_type, MovementType::Transfer);
        assert_eq!(transfer.quantity, Quantity::units(40));
        assert_eq!(transfer.reference.reference_type.as_deref(), Some("STOCK_MOVEMENT_REQUEST"));
        assert_eq!(transfer.reference.reference_id, Some(request.request_id().to_string()));

        let request = &outcome.requests[0];
        assert_eq!(request.status(), RequestStatus::Fulfilled);
        assert_eq!(request.items()[0].remaining_quantity, Quantity::ZERO);
        assert_eq!(request.confirmation().map(|c| c.status), Some(ConfirmationStatus::Pending));
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(10));
        assert_eq!(fx.balance(fx.branch, lot), Quantity::units(40));

        assert_eq!(
            event_types(&sub),
            vec!["inventory.movement.recorded", "inventory.request.fulfilled"]
        );
    }

    #[test]
    fn fulfillment_spans_batches_in_expiry_order() {
        let fx = setup();
        let x = fx.batch("X", Some(5));
        let y = fx.batch("Y", Some(90));
        fx.receive(y, fx.central, 200);
        fx.receive(x, fx.central, 30);
        let request = fx.open("Cali", vec![item(fx.product, None, 100)]);

        let outcome = fx
            .fulfillment
            .bulk_fulfill(fx.tenant_id, fx.bulk(vec![request.request_id()]), CoveragePolicy::AllowPartial)
            .unwrap();

        let drawn: Vec<(BatchId, Quantity)> = outcome.movements.iter().map(|m| (m.batch_id, m.quantity)).collect();
        assert_eq!(drawn, vec![(x, Quantity::units(30)), (y, Quantity::units(70))]);
        assert_eq!(outcome.requests[0].items()[0].remaining_quantity, Quantity::ZERO);
        assert_eq!(outcome.requests[0].status(), RequestStatus::Fulfilled);
        assert_eq!(fx.balance(fx.central, x), Quantity::ZERO);
        assert_eq!(fx.balance(fx.central, y), Quantity::units(130));
    }

    #[test]
    fn short_stock_is_partial_unless_full_coverage_is_required() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 50);

        let unstocked = Product::new(fx.tenant_id, ProductId::new(), "IBU-400", "Ibuprofen 400mg").unwrap();
        fx.catalog.add_product(unstocked.clone());

        // 3 boxes of 20 = 60 needed, 50 on hand: 2 whole boxes are covered.
        let request = fx.open(
            "Cali",
            vec![item(fx.product, Some(fx.boxed), 3), item(unstocked.id, None, 5)],
        );

        let strict = fx
            .fulfillment
            .bulk_fulfill(fx.tenant_id, fx.bulk(vec![request.request_id()]), CoveragePolicy::RequireFull)
            .unwrap_err();
        assert_eq!(strict.code(), "insufficient_stock");
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(50));

        let outcome = fx
            .fulfillment
            .bulk_fulfill(fx.tenant_id, fx.bulk(vec![request.request_id()]), CoveragePolicy::AllowPartial)
            .unwrap();

        assert_eq!(outcome.movements.len(), 1);
        assert_eq!(outcome.movements[0].quantity, Quantity::units(50));
        let after = &outcome.requests[0];
        assert_eq!(after.status(), RequestStatus::Open);
        assert_eq!(after.items()[0].remaining_quantity, Quantity::units(1));
        assert_eq!(after.items()[1].remaining_quantity, Quantity::units(5));
        assert_eq!(after.version(), request.version() + 1);
    }

    #[test]
    fn first_selected_request_is_served_first() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 25);
        let first = fx.open("Cali", vec![item(fx.product, None, 20)]);
        let second = fx.open("Cali", vec![item(fx.product, None, 20)]);

        let outcome = fx
            .fulfillment
            .bulk_fulfill(
                fx.tenant_id,
                fx.bulk(vec![second.request_id(), first.request_id()]),
                CoveragePolicy::AllowPartial,
            )
            .unwrap();

        let by_id = |id: RequestId| outcome.requests.iter().find(|r| r.request_id() == id).unwrap();
        assert_eq!(by_id(second.request_id()).status(), RequestStatus::Fulfilled);
        assert_eq!(by_id(first.request_id()).items()[0].remaining_quantity, Quantity::units(15));
    }

    #[test]
    fn only_open_requests_can_be_fulfilled() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 25);
        let open = fx.open("Cali", vec![item(fx.product, None, 5)]);
        let cancelled = fx.open("Cali", vec![item(fx.product, None, 5)]);
        fx.requests.cancel_request(fx.tenant_id, cancelled.request_id()).unwrap();

        let err = fx
            .fulfillment
            .bulk_fulfill(
                fx.tenant_id,
                fx.bulk(vec![open.request_id(), cancelled.request_id()]),
                CoveragePolicy::AllowPartial,
            )
            .unwrap_err();

        assert_eq!(err.code(), "invalid_request_state");
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(25));
        let untouched = fx.requests.get_request(fx.tenant_id, open.request_id()).unwrap();
        assert_eq!(untouched.items()[0].remaining_quantity, Quantity::units(5));
    }

    #[test]
    fn destination_must_serve_the_requested_city() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 25);
        let request = fx.open("Medellin", vec![item(fx.product, None, 5)]);

        let err = fx
            .fulfillment
            .plan(fx.tenant_id, fx.bulk(vec![request.request_id()]))
            .unwrap_err();

        assert_eq!(err.code(), "invalid_request_state");
    }

    #[test]
    fn drained_batch_between_plan_and_execute_aborts_everything() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 30);
        let request = fx.open("Cali", vec![item(fx.product, None, 30)]);

        let plan = fx.fulfillment.plan(fx.tenant_id, fx.bulk(vec![request.request_id()])).unwrap();
        fx.engine
            .apply_movement(fx.tenant_id, draft(MovementType::Out, fx.product, Some(lot), Some(fx.central), None, 10))
            .unwrap();

        let err = fx
            .fulfillment
            .execute(fx.tenant_id, plan, CoveragePolicy::AllowPartial)
            .unwrap_err();

        assert_eq!(err.code(), "concurrent_modification");
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(20));
        assert_eq!(fx.balance(fx.branch, lot), Quantity::ZERO);
        let after = fx.requests.get_request(fx.tenant_id, request.request_id()).unwrap();
        assert_eq!(after.version(), request.version());
    }

    #[test]
    fn request_changed_since_planning_is_a_conflict() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 30);
        let request = fx.open("Cali", vec![item(fx.product, None, 10)]);

        let plan = fx.fulfillment.plan(fx.tenant_id, fx.bulk(vec![request.request_id()])).unwrap();
        fx.fulfillment
            .bulk_fulfill(fx.tenant_id, fx.bulk(vec![request.request_id()]), CoveragePolicy::AllowPartial)
            .unwrap();

        let err = fx
            .fulfillment
            .execute(fx.tenant_id, plan, CoveragePolicy::AllowPartial)
            .unwrap_err();
        assert_eq!(err.code(), "concurrent_modification");
        assert_eq!(fx.balance(fx.branch, lot), Quantity::units(10));
    }

    #[test]
    fn supplied_plan_is_checked_against_demand() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 100);
        let request = fx.open("Cali", vec![item(fx.product, Some(fx.boxed), 2)]);

        let supplied = |quantity: i64| SuppliedPlanInput {
            from_location_id: fx.central,
            to_location_id: fx.branch,
            fulfillments: vec![SuppliedFulfillment {
                request_id: request.request_id(),
                items: vec![SuppliedLine {
                    product_id: fx.product,
                    batch_id: lot,
                    quantity: Quantity::units(quantity),
                }],
            }],
            note: None,
        };

        let over = fx.fulfillment.plan_supplied(fx.tenant_id, supplied(60)).unwrap_err();
        assert_eq!(over.code(), "validation_failed");

        let plan = fx.fulfillment.plan_supplied(fx.tenant_id, supplied(40)).unwrap();
        let outcome = fx
            .fulfillment
            .execute(fx.tenant_id, plan, CoveragePolicy::RequireFull)
            .unwrap();
        assert_eq!(outcome.requests[0].status(), RequestStatus::Fulfilled);
        assert_eq!(fx.balance(fx.branch, lot), Quantity::units(40));
    }

    #[test]
    fn edited_plan_cannot_move_more_than_requested() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 100);
        let request = fx.open("Cali", vec![item(fx.product, None, 10)]);

        let mut plan = fx.fulfillment.plan(fx.tenant_id, fx.bulk(vec![request.request_id()])).unwrap();
        plan.lines[0].quantity = Quantity::units(90);

        let err = fx
            .fulfillment
            .execute(fx.tenant_id, plan, CoveragePolicy::AllowPartial)
            .unwrap_err();

        assert_eq!(err.code(), "validation_failed");
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(100));
        assert_eq!(fx.balance(fx.branch, lot), Quantity::ZERO);
        let after = fx.requests.get_request(fx.tenant_id, request.request_id()).unwrap();
        assert_eq!(after.status(), RequestStatus::Open);
        assert_eq!(after.version(), request.version());
    }

    #[test]
    fn edited_coverage_does_not_satisfy_require_full() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 30);
        let request = fx.open("Cali", vec![item(fx.product, None, 40)]);

        let mut plan = fx.fulfillment.plan(fx.tenant_id, fx.bulk(vec![request.request_id()])).unwrap();
        for coverage in &mut plan.coverage {
            coverage.allocated = coverage.required;
            coverage.shortfall = Quantity::ZERO;
        }
        plan.settlements.clear();

        let err = fx
            .fulfillment
            .execute(fx.tenant_id, plan, CoveragePolicy::RequireFull)
            .unwrap_err();

        assert_eq!(err.code(), "insufficient_stock");
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(30));
    }

    #[test]
    fn edited_plan_lines_must_match_the_item_product() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 100);
        let first = fx.open("Cali", vec![item(fx.product, None, 10)]);
        let second = fx.open("Cali", vec![item(fx.product, None, 10)]);

        let mut plan = fx
            .fulfillment
            .plan(fx.tenant_id, fx.bulk(vec![first.request_id(), second.request_id()]))
            .unwrap();
        // Point the second request's line at the first request's item.
        plan.lines[1].item_id = plan.lines[0].item_id;

        let err = fx
            .fulfillment
            .execute(fx.tenant_id, plan, CoveragePolicy::AllowPartial)
            .unwrap_err();

        assert_eq!(err.code(), "validation_failed");
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(100));
    }

    #[test]
    fn redirected_plan_must_still_serve_the_requested_city() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 100);
        let request = fx.open("Cali", vec![item(fx.product, None, 10)]);

        let elsewhere_wh = Warehouse::new(fx.tenant_id, WarehouseId::new(), "WH-M", "North")
            .unwrap()
            .in_city("Medellin");
        let elsewhere = Location::new(fx.tenant_id, LocationId::new(), elsewhere_wh.id, "M-01").unwrap();
        fx.catalog.add_warehouse(elsewhere_wh);
        fx.catalog.add_location(elsewhere.clone());

        let mut plan = fx.fulfillment.plan(fx.tenant_id, fx.bulk(vec![request.request_id()])).unwrap();
        plan.to_location_id = elsewhere.id;

        let err = fx
            .fulfillment
            .execute(fx.tenant_id, plan, CoveragePolicy::AllowPartial)
            .unwrap_err();

        assert_eq!(err.code(), "invalid_request_state");
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(100));
    }

    #[test]
    fn receipt_is_confirmed_once() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 10);
        let request = fx.open("cali", vec![item(fx.product, None, 10)]);

        let early = fx
            .requests
            .confirm_receipt(fx.tenant_id, request.request_id(), ConfirmationDecision::Accept, None)
            .unwrap_err();
        assert_eq!(early.code(), "invalid_request_state");

        fx.fulfillment
            .bulk_fulfill(fx.tenant_id, fx.bulk(vec![request.request_id()]), CoveragePolicy::AllowPartial)
            .unwrap();
        let confirmed = fx
            .requests
            .confirm_receipt(
                fx.tenant_id,
                request.request_id(),
                ConfirmationDecision::Reject,
                Some("two vials broken".to_string()),
            )
            .unwrap();
        let confirmation = confirmed.confirmation().unwrap();
        assert_eq!(confirmation.status, ConfirmationStatus::Rejected);
        assert!(confirmation.decided_at.is_some());

        let again = fx
            .requests
            .confirm_receipt(fx.tenant_id, request.request_id(), ConfirmationDecision::Accept, None)
            .unwrap_err();
        assert_eq!(again.code(), "invalid_request_state");
    }

    #[test]
    fn open_requests_are_listed_by_city() {
        let fx = setup();
        let a = fx.open("Cali", vec![item(fx.product, None, 1)]);
        let b = fx.open("Bogota", vec![item(fx.product, None, 1)]);
        let c = fx.open(" CALI ", vec![item(fx.product, None, 1)]);
        fx.requests.cancel_request(fx.tenant_id, a.request_id()).unwrap();

        let listed: Vec<RequestId> = fx
            .requests
            .open_requests_in(fx.tenant_id, "cali")
            .unwrap()
            .iter()
            .map(|r| r.request_id())
            .collect();
        assert_eq!(listed, vec![c.request_id()]);
        assert_ne!(listed[0], b.request_id());
    }

    #[test]
    fn concurrent_outs_never_spend_the_same_stock() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 10);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = fx.engine.clone();
                let (tenant_id, product, central) = (fx.tenant_id, fx.product, fx.central);
                thread::spawn(move || {
                    engine
                        .apply_movement(tenant_id, draft(MovementType::Out, product, Some(lot), Some(central), None, 3))
                        .is_ok()
                })
            })
            .collect();
        let succeeded = handles.into_iter().filter_map(|h| h.join().ok()).filter(|ok| *ok).count();

        assert_eq!(succeeded, 3);
        assert_eq!(fx.balance(fx.central, lot), Quantity::units(1));
        assert_eq!(fx.engine.movements(fx.tenant_id, None).unwrap().len(), 4);
    }

    #[test]
    fn tenants_are_isolated() {
        let fx = setup();
        let lot = fx.batch("L-1", Some(60));
        fx.receive(lot, fx.central, 10);
        let intruder = TenantId::new();

        let err = fx
            .engine
            .apply_movement(intruder, draft(MovementType::Out, fx.product, Some(lot), Some(fx.central), None, 1))
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert!(fx.engine.stock_at(intruder, fx.central, None).unwrap().is_empty());
        assert_eq!(fx.engine.stock_at(fx.tenant_id, fx.central, None).unwrap().len(), 1);
    }
}
