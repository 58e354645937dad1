use std::sync::Arc;
use std::thread;

use formswap::{
    FormId, FormKind, InMemoryHost, InMemorySource, KeywordRef, Manager, ManagerConfig, ObjectRef, Placement,
    TableKind, Vec3, WorldContext,
};

const BASE: FormId = FormId::new(0x0001_2345);
const TARGET: FormId = FormId::new(0x0005_4321);
const ALT_A: FormId = FormId::new(0x0000_0A01);
const ALT_B: FormId = FormId::new(0x0000_0A02);
const ALT_C: FormId = FormId::new(0x0000_0A03);

const SKYRIM: FormId = FormId::new(0x0001_6BB4);
const WHITERUN: FormId = FormId::new(0x0001_8A56);
const DUNGEON: FormId = FormId::new(0x0001_30DB);

fn host() -> Arc<InMemoryHost> {
    let host = Arc::new(InMemoryHost::new());
    host.add_form(BASE, FormKind::Other, Some("ChairCommon"));
    host.add_form(TARGET, FormKind::Other, Some("ChairNoble"));
    host.add_form(ALT_A, FormKind::Other, Some("ChairA"));
    host.add_form(ALT_B, FormKind::Other, Some("ChairB"));
    host.add_form(ALT_C, FormKind::Other, Some("ChairC"));
    host.add_form(SKYRIM, FormKind::Location, Some("SkyrimLocation"));
    host.add_form(WHITERUN, FormKind::Location, Some("WhiterunLocation"));
    host.add_form(DUNGEON, FormKind::Keyword, Some("LocTypeDungeon"));
    host
}

fn manager(host: &Arc<InMemoryHost>, files: &[(&str, &str)]) -> Manager {
    let source = files
        .iter()
        .fold(InMemorySource::new(), |source, (path, text)| source.with_file(*path, *text));
    Manager::with_host(ManagerConfig::default(), Arc::new(source), host.clone())
}

fn placed(id: u32) -> ObjectRef {
    ObjectRef::placed(FormId::new(0x0010_0000 + id), BASE)
}

#[test]
fn half_chance_swaps_roughly_half_and_is_stable() {
    let host = host();
    let m = manager(&host, &[("a_SWAP.ini", "[Forms]\n00012345|00054321|chance(50)\n")]);

    let mut swapped = 0;
    for id in 0..1000 {
        let reference = placed(id);
        let first = m.resolve(&reference, BASE, None).swap;
        assert!(first.is_none() || first == Some(TARGET));
        assert_eq!(m.resolve(&reference, BASE, None).swap, first);
        if first.is_some() {
            swapped += 1;
        }
    }
    assert!((350..=650).contains(&swapped), "swapped {swapped} of 1000");
    assert!(!m.has_conflicts());
}

#[test]
fn seeded_results_match_across_managers() {
    let rules = "[Forms]\nChairCommon|ChairA,ChairB,ChairC|pos(-50/50,-50/50,0R)|chance(70)\n";
    let first = manager(&host(), &[("a.ini", rules)]);
    let second = manager(&host(), &[("a.ini", rules)]);

    for id in 0..64 {
        let reference = placed(id);
        assert_eq!(first.resolve(&reference, BASE, None), second.resolve(&reference, BASE, None));
    }
}

#[test]
fn pool_picks_stay_in_pool_and_spread() {
    let host = host();
    let m = manager(&host, &[("a.ini", "[Forms]\nChairCommon|ChairA,ChairB,ChairC\n")]);

    let mut seen = std::collections::HashSet::new();
    for id in 0..200 {
        let swap = m.resolve(&placed(id), BASE, None).swap.unwrap();
        assert!([ALT_A, ALT_B, ALT_C].contains(&swap));
        seen.insert(swap);
    }
    assert_eq!(seen.len(), 3);
}

#[test]
fn later_file_wins_and_is_reported() {
    let host = host();
    let m = manager(
        &host,
        &[
            ("a_SWAP.ini", "[Forms]\nChairCommon|ChairA\n"),
            ("b_SWAP.ini", "[Forms]\nChairCommon|ChairB\n"),
        ],
    );
    assert_eq!(m.resolve(&placed(1), BASE, None).swap, Some(ALT_B));

    let report = m.conflict_report();
    let conflicts: Vec<_> = report.for_table(TableKind::Forms).collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].winner.payload, "ChairB");
    assert_eq!(conflicts[0].winner.path, "b_SWAP.ini");
    assert_eq!(conflicts[0].losers[0].payload, "ChairA");
    assert!(report.to_string().contains("winning record : ChairB (b_SWAP.ini)"));
}

#[test]
fn self_swap_needs_properties() {
    let host = host();
    let m = manager(&host, &[("a.ini", "[Forms]\nChairCommon|ChairCommon\n")]);
    assert!(m.tables().is_empty());
    assert!(m.resolve(&placed(1), BASE, None).is_empty());

    let m = manager(&host, &[("a.ini", "[Forms]\nChairCommon|ChairCommon|scale(2)\n")]);
    let resolution = m.resolve(&placed(1), BASE, None);
    assert_eq!(resolution.swap, Some(BASE));
    assert!(resolution.properties.is_some());
}

#[test]
fn conditional_matches_location_descendants_and_honours_not() {
    let host = host();
    let m = manager(
        &host,
        &[("a.ini", "[Forms|SkyrimLocation,-LocTypeDungeon]\nChairCommon|ChairNoble\n")],
    );

    let in_city = placed(1);
    host.set_context(in_city.id, WorldContext::default().at_location(WHITERUN, vec![SKYRIM]));
    assert_eq!(m.resolve(&in_city, BASE, None).swap, Some(TARGET));

    let in_dungeon = placed(2);
    host.set_context(
        in_dungeon.id,
        WorldContext::default()
            .at_location(WHITERUN, vec![SKYRIM])
            .with_location_keyword(KeywordRef::new(DUNGEON, "LocTypeDungeon")),
    );
    assert_eq!(m.resolve(&in_dungeon, BASE, None).swap, None);

    let nowhere = placed(3);
    assert_eq!(m.resolve(&nowhere, BASE, None).swap, None);
}

#[test]
fn conditional_sections_newest_matching_group_wins() {
    let host = host();
    let m = manager(
        &host,
        &[(
            "a.ini",
            "[Forms|SkyrimLocation]\nChairCommon|ChairA\n[Forms|WhiterunLocation]\nChairCommon|ChairB\n",
        )],
    );
    let reference = placed(1);
    host.set_context(reference.id, WorldContext::default().at_location(WHITERUN, vec![SKYRIM]));
    assert_eq!(m.resolve(&reference, BASE, None).swap, Some(ALT_B));

    let elsewhere = placed(2);
    host.set_context(elsewhere.id, WorldContext::default().at_location(SKYRIM, vec![]));
    assert_eq!(m.resolve(&elsewhere, BASE, None).swap, Some(ALT_A));
}

#[test]
fn unresolved_filter_token_matches_base_keyword() {
    let host = host();
    let m = manager(&host, &[("a.ini", "[Properties|FurnitureWood]\nChairCommon|scale(3)\n")]);

    let wooden = placed(1);
    host.set_context(wooden.id, WorldContext::default().with_base_keyword("FurnitureWood"));
    assert!(m.resolve(&wooden, BASE, None).properties.is_some());
    assert!(m.object_properties_conditional(&placed(2), BASE, None).is_none());
}

#[test]
fn relative_position_adds_to_placement() {
    let host = host();
    let m = manager(&host, &[("a.ini", "[Properties]\nChairCommon|pos(0,0,10R)\n")]);

    let mut reference = placed(1).with_placement(Placement {
        position: Vec3::new(100.0, 200.0, 300.0),
        rotation: Vec3::ZERO,
        scale: 1.0,
    });
    let resolution = m.resolve(&reference, BASE, None);
    assert_eq!(resolution.swap, None);
    resolution.apply_properties(&mut reference);
    assert_eq!(reference.placement.position, Vec3::new(100.0, 200.0, 310.0));
}

#[test]
fn created_instances_skip_reference_rules() {
    let host = host();
    let rules = format!("[Forms]\nChairCommon|ChairB\n[References]\n{:08X}|ChairA\n", 0x0010_0007);
    let m = manager(&host, &[("a.ini", rules.as_str())]);

    assert_eq!(m.resolve(&placed(7), BASE, None).swap, Some(ALT_A));
    let spawned = ObjectRef::created(FormId::new(0x0010_0007), BASE);
    assert_eq!(m.resolve(&spawned, BASE, None).swap, Some(ALT_B));
}

#[test]
fn leveled_targets_expand_once() {
    let host = host();
    host.add_leveled_list(FormId::new(0x0000_0E01), Some("LItemChairs"), vec![ALT_A, ALT_B]);
    let m = manager(&host, &[("a.ini", "[Forms]\nChairCommon|LItemChairs|scale(2)\n")]);

    let reference = placed(1);
    let first = m.resolve(&reference, BASE, None);
    assert!(matches!(first.swap, Some(id) if id == ALT_A || id == ALT_B));
    assert!(m.is_leveled_resolved(&reference));

    let second = m.resolve(&reference, BASE, None);
    assert_eq!(second.swap, None);
    assert_eq!(second.properties, first.properties);
}

#[test]
fn concurrent_queries_share_one_load() {
    let host = host();
    let m = Arc::new(manager(
        &host,
        &[("a.ini", "[Forms]\nChairCommon|ChairA,ChairB,ChairC|chance(60)\n")],
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let m = Arc::clone(&m);
            thread::spawn(move || (0..100).map(|id| m.resolve(&placed(id), BASE, None).swap).collect::<Vec<_>>())
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(m.tables().len(TableKind::Forms), 1);
}

#[test]
fn true_random_rules_reroll_for_the_same_reference() {
    let host = host();
    let m = manager(
        &host,
        &[(
            "a.ini",
            "[Forms]\n00012345|00054321|chance(R,50)\n[References]\n00100009|ChairA,ChairB,ChairC|R\n",
        )],
    );

    let reference = placed(1);
    let outcomes: std::collections::HashSet<_> =
        (0..200).map(|_| m.resolve(&reference, BASE, None).swap).collect();
    assert_eq!(outcomes, [None, Some(TARGET)].into_iter().collect());

    let pooled = placed(9);
    let picks: std::collections::HashSet<_> =
        (0..200).map(|_| m.resolve(&pooled, BASE, None).swap.unwrap()).collect();
    assert!(picks.len() > 1);
    assert!(picks.iter().all(|pick| [ALT_A, ALT_B, ALT_C].contains(pick)));
}
