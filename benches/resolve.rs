use std::fmt::Write as _;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use formswap::{
    FormId, FormKind, InMemoryHost, InMemorySource, KeywordRef, Manager, ManagerConfig, ObjectRef, WorldContext,
};

const BASES: u32 = 512;
const CITY: FormId = FormId::new(0x0001_3168);
const WHITERUN: FormId = FormId::new(0x0001_8A56);

fn base(i: u32) -> FormId {
    FormId::new(0x0010_0000 + i)
}

fn target(i: u32) -> FormId {
    FormId::new(0x0020_0000 + i)
}

fn make_host() -> Arc<InMemoryHost> {
    let host = Arc::new(InMemoryHost::new());
    for i in 0..BASES {
        host.add_form(base(i), FormKind::Other, None);
        host.add_form(target(i), FormKind::Other, None);
    }
    host.add_form(CITY, FormKind::Keyword, Some("LocTypeCity"));
    host.add_form(WHITERUN, FormKind::Location, Some("WhiterunLocation"));
    host
}

// A realistic mix: plain, pooled with chance, conditional and property rules.
fn make_rules() -> String {
    let mut text = String::from("[Forms]\n");
    for i in 0..BASES {
        let _ = writeln!(text, "{}|{}|chance(75)", base(i), target(i));
        let _ = writeln!(text, "{}|{},{}|pos(-5/5,-5/5,0R)", base(i), target(i), target((i + 1) % BASES));
    }
    text.push_str("[Forms|LocTypeCity]\n");
    for i in (0..BASES).step_by(4) {
        let _ = writeln!(text, "{}|{}", base(i), target((i + 7) % BASES));
    }
    text.push_str("[Properties]\n");
    for i in (0..BASES).step_by(2) {
        let _ = writeln!(text, "{}|rot(0,0,0/360),scale(0.9/1.1)", base(i));
    }
    text
}

fn make_manager(host: &Arc<InMemoryHost>) -> Manager {
    let source = InMemorySource::new().with_file("bench_SWAP.ini", make_rules());
    let config = ManagerConfig {
        report_conflicts: false,
        ..ManagerConfig::default()
    };
    Manager::with_host(config, Arc::new(source), host.clone())
}

fn bench_load(c: &mut Criterion) {
    let host = make_host();
    c.bench_function("resolve/load", |b| {
        b.iter_batched(|| make_manager(&host), |manager| manager.load_once(), BatchSize::SmallInput);
    });
}

fn bench_resolve(c: &mut Criterion) {
    let host = make_host();
    let manager = make_manager(&host);
    manager.load_once();

    for i in 0..64 {
        host.set_context(
            FormId::new(0x0030_0000 + i),
            WorldContext::default()
                .at_location(WHITERUN, vec![])
                .with_location_keyword(KeywordRef::new(CITY, "LocTypeCity")),
        );
    }

    let references: Vec<ObjectRef> = (0..1024u32)
        .map(|i| ObjectRef::placed(FormId::new(0x0030_0000 + i), base(i % BASES)))
        .collect();

    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(references.len() as u64));
    group.bench_function("mixed_1024", |b| {
        b.iter(|| {
            for reference in &references {
                black_box(manager.resolve(reference, reference.base, None));
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_load, bench_resolve);
criterion_main!(benches);
