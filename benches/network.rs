use criterion::{Criterion, black_box, criterion_group, criterion_main};

use mnist_mlp::{Gradients, Network};

fn network_forward_bench(c: &mut Criterion) {
    let net = Network::new(&[784, 32, 16, 10], Some(0)).unwrap();
    let input = vec![0.1_f64; net.input_dim()];

    c.bench_function("network_forward_784_32_16_10", |b| {
        b.iter(|| {
            let trace = net.forward(black_box(&input)).unwrap();
            black_box(trace);
        })
    });
}

fn network_backward_bench(c: &mut Criterion) {
    let net = Network::new(&[784, 32, 16, 10], Some(0)).unwrap();
    let input = vec![0.1_f64; net.input_dim()];
    let mut target = vec![0.0_f64; net.output_dim()];
    target[3] = 1.0;

    c.bench_function("network_backward_784_32_16_10", |b| {
        b.iter(|| {
            let grads = net.backward(black_box(&input), black_box(&target)).unwrap();
            black_box(grads);
        })
    });
}

fn network_batch_step_bench(c: &mut Criterion) {
    let mut net = Network::new(&[784, 32, 16, 10], Some(0)).unwrap();
    let input = vec![0.1_f64; net.input_dim()];
    let mut target = vec![0.0_f64; net.output_dim()];
    target[7] = 1.0;

    c.bench_function("network_batch16_step_784_32_16_10", |b| {
        b.iter(|| {
            let mut batch = Gradients::zeros_like(&net);
            for _ in 0..16 {
                batch.accumulate(&net.backward(&input, &target).unwrap()).unwrap();
            }
            batch.scale(1.0 / 16.0);
            net.update(&batch, 0.6).unwrap();
        })
    });
}

criterion_group!(
    benches,
    network_forward_bench,
    network_backward_bench,
    network_batch_step_bench
);
criterion_main!(benches);
