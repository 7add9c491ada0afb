// tests/conversion_scenarios.rs

//! End-to-end conversion scenarios through `ConversionService`

mod common;

use common::{NURSE, RECEPTIONIST, create_ticket, ids, setup_service, setup_test_db};
use fiche_packages::db;
use fiche_packages::{
    ConversionExecutor, ConversionOutcome, ConversionService, EngineConfig, Error,
    ExecutionRequest, LineItemId, LineItemKind, MatchSemantics, Package, PrestationId,
    SqliteCatalog, SupersededDependencies, TicketLineStore,
};

#[test]
fn test_empty_ticket_converts_to_simple_package() {
    let (_dir, service, catalog) = setup_service();
    let ticket_id = create_ticket(&service);

    let plan = service.plan(RECEPTIONIST, ticket_id, &ids(&[5, 87]), &[]).unwrap();
    assert!(plan.should_convert);
    assert_eq!(plan.package_id(), catalog.simple.id);

    let request = ExecutionRequest::from_plan(&plan).unwrap();
    let ticket = service.execute(RECEPTIONIST, &request).unwrap();

    assert_eq!(ticket.lines.len(), 1);
    let item = &ticket.lines[0].item;
    assert_eq!(
        item.kind,
        LineItemKind::Package {
            package_id: catalog.simple.id.unwrap()
        }
    );
    assert_eq!(item.final_price, 500);
    assert_eq!(ticket.ticket.total_amount, 500);
}

#[test]
fn test_cascading_upgrade_to_larger_package() {
    let (_dir, service, catalog) = setup_service();
    let ticket_id = create_ticket(&service);

    service
        .convert(RECEPTIONIST, ticket_id, &ids(&[5, 87]), &[])
        .unwrap();
    let before = service.load_ticket(ticket_id).unwrap();
    let simple_line = before.lines[0].item.id.unwrap();

    let plan = service.plan(NURSE, ticket_id, &ids(&[88]), &[]).unwrap();
    assert!(plan.should_convert);
    assert!(plan.is_cascading);
    assert_eq!(plan.package_id(), catalog.complet.id);
    assert_eq!(plan.line_item_ids_to_remove, vec![simple_line]);

    let ticket = service
        .execute(NURSE, &ExecutionRequest::from_plan(&plan).unwrap())
        .unwrap();
    assert_eq!(ticket.lines.len(), 1);
    assert_eq!(ticket.lines[0].item.package_id(), catalog.complet.id);
    assert_eq!(ticket.lines[0].item.final_price, 800);
    assert!(ticket.find_line(simple_line).is_none());
    assert_eq!(ticket.ticket.total_amount, 800);

    let history = service.history(ticket_id).unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[0].is_cascading);
    assert!(history[1].is_cascading);
    assert_eq!(history[1].removed_line_item_ids, vec![simple_line]);
    assert_eq!(history[1].actor_id, NURSE);
}

#[test]
fn test_standalone_lines_are_absorbed() {
    let (_dir, service, catalog) = setup_service();
    let ticket_id = create_ticket(&service);
    {
        let conn = service.open().unwrap();
        let store = TicketLineStore::new(&conn);
        store.add_prestation(RECEPTIONIST, ticket_id, PrestationId(5), 300, false).unwrap();
        store.add_prestation(RECEPTIONIST, ticket_id, PrestationId(87), 250, false).unwrap();
    }

    let outcome = service
        .convert(RECEPTIONIST, ticket_id, &ids(&[88]), &ids(&[5, 87]))
        .unwrap();
    let ConversionOutcome::Converted { plan, ticket } = outcome else {
        panic!("expected a conversion");
    };
    assert!(!plan.is_cascading);
    assert_eq!(plan.line_item_ids_to_remove.len(), 2);
    assert_eq!(ticket.lines.len(), 1);
    assert_eq!(ticket.lines[0].item.package_id(), catalog.complet.id);
    assert_eq!(ticket.ticket.total_amount, 800);
}

#[test]
fn test_preserved_items_survive_conversion() {
    let (_dir, service, catalog) = setup_service();
    let ticket_id = create_ticket(&service);
    let (convention, convention_dep, standard) = {
        let conn = service.open().unwrap();
        let store = TicketLineStore::new(&conn);
        let convention = store
            .add_prestation(RECEPTIONIST, ticket_id, PrestationId(87), 120, true)
            .unwrap();
        let convention_dep = store
            .add_dependency(ticket_id, convention.id.unwrap(), PrestationId(400), 35)
            .unwrap();
        let standard = store
            .add_prestation(RECEPTIONIST, ticket_id, PrestationId(5), 300, false)
            .unwrap();
        (convention, convention_dep, standard)
    };
    let before = service.load_ticket(ticket_id).unwrap();
    let convention_before = before.find_line(convention.id.unwrap()).unwrap().clone();

    // The convention 87 is not a candidate: 5 + new 87 make the bundle
    let outcome = service.convert(RECEPTIONIST, ticket_id, &ids(&[87]), &[]).unwrap();
    let ConversionOutcome::Converted { plan, ticket } = outcome else {
        panic!("expected a conversion");
    };
    assert_eq!(plan.package_id(), catalog.simple.id);
    assert_eq!(plan.line_item_ids_to_remove, vec![standard.id.unwrap()]);

    let convention_after = ticket.find_line(convention.id.unwrap()).unwrap();
    assert_eq!(*convention_after, convention_before);
    assert_eq!(convention_after.dependencies[0].id, convention_dep.id);
    let line_sum: i64 = ticket.lines.iter().map(|line| line.item.final_price).sum();
    assert_eq!(ticket.ticket.total_amount, line_sum);
    assert_eq!(ticket.ticket.total_amount, 500 + 120);
}

#[test]
fn test_stale_execution_leaves_ticket_identical() {
    let (_dir, service, catalog) = setup_service();
    let ticket_id = create_ticket(&service);
    let line = {
        let conn = service.open().unwrap();
        TicketLineStore::new(&conn)
            .add_prestation(RECEPTIONIST, ticket_id, PrestationId(5), 300, false)
            .unwrap()
    };
    let before = service.load_ticket(ticket_id).unwrap();

    let request = ExecutionRequest::new(
        ticket_id,
        catalog.simple.id.unwrap(),
        vec![line.id.unwrap(), LineItemId(9_999)],
        ids(&[87]),
    );
    let err = service.execute(RECEPTIONIST, &request).unwrap_err();
    assert!(matches!(err, Error::StalePlan { .. }));
    assert!(err.is_retryable_by_replanning());

    assert_eq!(service.load_ticket(ticket_id).unwrap(), before);
    assert!(service.history(ticket_id).unwrap().is_empty());
}

#[test]
fn test_plan_goes_stale_after_concurrent_removal() {
    let (_dir, service, _catalog) = setup_service();
    let ticket_id = create_ticket(&service);
    let line = {
        let conn = service.open().unwrap();
        TicketLineStore::new(&conn)
            .add_prestation(RECEPTIONIST, ticket_id, PrestationId(5), 300, false)
            .unwrap()
    };

    let plan = service.plan(RECEPTIONIST, ticket_id, &ids(&[87]), &[]).unwrap();
    assert!(plan.should_convert);

    // Someone removes the line between planning and execution
    {
        let conn = service.open().unwrap();
        TicketLineStore::new(&conn)
            .remove_line_item(ticket_id, line.id.unwrap())
            .unwrap();
    }

    let err = service
        .execute(RECEPTIONIST, &ExecutionRequest::from_plan(&plan).unwrap())
        .unwrap_err();
    assert!(err.is_retryable_by_replanning());

    // Re-planning reflects the new state
    let plan = service.plan(RECEPTIONIST, ticket_id, &ids(&[87]), &[]).unwrap();
    assert!(!plan.should_convert);
}

#[test]
fn test_package_removed_from_catalog_before_execution() {
    let (_dir, service, catalog) = setup_service();
    let ticket_id = create_ticket(&service);

    let plan = service.plan(RECEPTIONIST, ticket_id, &ids(&[5, 87]), &[]).unwrap();
    {
        let conn = service.open().unwrap();
        Package::delete(&conn, catalog.simple.id.unwrap()).unwrap();
    }

    let err = service
        .execute(RECEPTIONIST, &ExecutionRequest::from_plan(&plan).unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::PackageNotFound(id) if Some(id) == catalog.simple.id));
    assert!(service.load_ticket(ticket_id).unwrap().lines.is_empty());
}

#[test]
fn test_planning_is_idempotent() {
    let (_dir, service, _catalog) = setup_service();
    let ticket_id = create_ticket(&service);
    service
        .convert(RECEPTIONIST, ticket_id, &ids(&[5, 87]), &[])
        .unwrap();

    let first = service.plan(RECEPTIONIST, ticket_id, &ids(&[88]), &[]).unwrap();
    let second = service.plan(RECEPTIONIST, ticket_id, &ids(&[88]), &[]).unwrap();
    assert_eq!(first, second);

    let json = serde_json::to_string(&first).unwrap();
    assert_eq!(serde_json::from_str::<fiche_packages::ConversionPlan>(&json).unwrap(), first);
}

#[test]
fn test_no_match_leaves_ticket_alone() {
    let (_dir, service, _catalog) = setup_service();
    let ticket_id = create_ticket(&service);

    let outcome = service
        .convert(RECEPTIONIST, ticket_id, &ids(&[5, 87, 12]), &[])
        .unwrap();
    assert!(!outcome.is_converted());
    assert_eq!(
        outcome.plan().message,
        "no package matches the current combination"
    );
    assert_eq!(service.load_ticket(ticket_id).unwrap().ticket.version, 0);
}

#[test]
fn test_set_semantics_from_config() {
    let (_dir, db_path, catalog) = setup_test_db();
    let mut config = EngineConfig::for_database(db_path);
    config.matching.semantics = MatchSemantics::Set;
    let service = ConversionService::new(config);
    let ticket_id = create_ticket(&service);
    {
        let conn = service.open().unwrap();
        let store = TicketLineStore::new(&conn);
        store.add_prestation(RECEPTIONIST, ticket_id, PrestationId(5), 300, false).unwrap();
        store.add_prestation(RECEPTIONIST, ticket_id, PrestationId(5), 300, false).unwrap();
    }

    let outcome = service.convert(RECEPTIONIST, ticket_id, &ids(&[87]), &[]).unwrap();
    assert!(outcome.is_converted());
    assert_eq!(outcome.plan().package_id(), catalog.simple.id);

    let ticket = service.load_ticket(ticket_id).unwrap();
    assert_eq!(ticket.lines.len(), 1);
    assert_eq!(ticket.ticket.total_amount, 500);
}

#[test]
fn test_set_semantics_keeps_held_package() {
    let (_dir, db_path, catalog) = setup_test_db();
    let mut config = EngineConfig::for_database(db_path);
    config.matching.semantics = MatchSemantics::Set;
    let service = ConversionService::new(config);
    let ticket_id = create_ticket(&service);

    service.convert(RECEPTIONIST, ticket_id, &ids(&[5, 87]), &[]).unwrap();
    let before = service.load_ticket(ticket_id).unwrap();

    let outcome = service.convert(NURSE, ticket_id, &ids(&[5]), &[]).unwrap();
    assert!(!outcome.is_converted());
    assert!(!outcome.plan().is_cascading);
    assert_eq!(outcome.plan().message, "ticket already holds package 'Bilan simple'");

    let after = service.load_ticket(ticket_id).unwrap();
    assert_eq!(after, before);
    assert_eq!(after.lines[0].item.package_id(), catalog.simple.id);
    assert_eq!(service.history(ticket_id).unwrap().len(), 1);
}

#[test]
fn test_reattach_policy_keeps_dependencies() {
    let (_dir, db_path, catalog) = setup_test_db();
    let mut conn = db::open(&db_path).unwrap();
    let store = TicketLineStore::new(&conn);
    let ticket_id = store.create_ticket(RECEPTIONIST, None).unwrap().id.unwrap();
    let line = store
        .add_prestation(RECEPTIONIST, ticket_id, PrestationId(87), 250, false)
        .unwrap();
    store
        .add_dependency(ticket_id, line.id.unwrap(), PrestationId(400), 40)
        .unwrap();

    let request = ExecutionRequest::new(
        ticket_id,
        catalog.simple.id.unwrap(),
        vec![line.id.unwrap()],
        ids(&[5]),
    );
    let executor = ConversionExecutor::new(MatchSemantics::Multiset, SupersededDependencies::Reattach);
    let ticket = db::immediate_transaction(&mut conn, |tx| {
        executor.execute(tx, &SqliteCatalog::new(tx), RECEPTIONIST, &request)
    })
    .unwrap();

    assert_eq!(ticket.lines.len(), 1);
    assert_eq!(ticket.lines[0].dependencies.len(), 1);
    assert_eq!(ticket.lines[0].dependencies[0].dependent_prestation_id, PrestationId(400));
    assert_eq!(ticket.ticket.total_amount, 500);
}
