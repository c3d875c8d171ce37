use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pollkb::{
    DeviceIdentity, KeyCode, LineDescriptor, LineTable, LogSink, PollLoop, ReportingSink,
    SimulatedLines, SleepBand,
};

fn table_of(lines: u32, sim: &SimulatedLines) -> LineTable<SimulatedLines> {
    let mut table = LineTable::new(
        sim.clone(),
        (0..lines).map(|line| LineDescriptor::new(format!("L{line}"), line, KeyCode::KEY_A)),
    );
    table.claim_all().expect("claim lines");
    table
}

fn bench_quiescent_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_and_diff");

    for &lines in &[4u32, 16, 64] {
        let sim = SimulatedLines::new();
        let mut table = table_of(lines, &sim);

        group.bench_with_input(BenchmarkId::new("quiescent", lines), &lines, |b, _| {
            b.iter(|| black_box(table.sample_and_diff().count()))
        });
    }

    group.finish();
}

fn bench_toggling_cycle(c: &mut Criterion) {
    let sim = SimulatedLines::new();
    let mut sink = LogSink::new();
    sink.declare_capability(KeyCode::KEY_A);
    sink.register(&DeviceIdentity::default()).expect("register");
    let mut poll = PollLoop::new(
        table_of(4, &sim),
        sink,
        SleepBand::for_frequency(5000).expect("valid frequency"),
    );

    let mut pressed = false;
    c.bench_function("run_cycle_toggling_line", |b| {
        b.iter(|| {
            pressed = !pressed;
            sim.set_pressed(0, pressed);
            black_box(poll.run_cycle())
        })
    });
}

criterion_group!(benches, bench_quiescent_sampling, bench_toggling_cycle);
criterion_main!(benches);
