use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pocketboy_core::{Emulator, EmulatorOptionsBuilder};

fn frame_benchmark(c: &mut Criterion) {
    // A 32KB ROM of NOPs is enough to drive the full PPU/APU pipeline.
    let rom = vec![0u8; 0x8000];
    let mut emulator = Emulator::new(&rom, EmulatorOptionsBuilder::new().build()).unwrap();

    c.bench_function("run_iteration", |b| {
        b.iter(|| {
            black_box(emulator.run());
            emulator.clear_audio_buffer();
        })
    });

    let mut single_step = Emulator::new(&rom, EmulatorOptionsBuilder::new().build()).unwrap();
    c.bench_function("emulate_cycle", |b| b.iter(|| black_box(single_step.emulate_cycle())));
}

criterion_group!(benches, frame_benchmark);

criterion_main!(benches);
