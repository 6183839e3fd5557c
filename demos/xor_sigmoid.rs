use mnist_mlp::{Activation, Dataset, Network, Sample, TrainConfig};

fn main() -> mnist_mlp::Result<()> {
    // XOR as a 2-class problem: class 1 when exactly one input is set.
    let xs = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
    let labels = [0, 1, 1, 0];
    let samples = xs
        .iter()
        .zip(labels)
        .map(|(x, label)| Sample::new(x.to_vec(), label, 2))
        .collect::<mnist_mlp::Result<Vec<_>>>()?;
    let train = Dataset::from_samples(samples)?;

    // 2 -> 4 -> 2 sigmoid network.
    let cfg = TrainConfig {
        layer_sizes: vec![2, 4, 2],
        activation: Activation::Sigmoid,
        learning_rate: 2.0,
        epochs: 3_000,
        batch_size: 4,
        seed: Some(0),
    };
    let mut net = Network::with_activation(&cfg.layer_sizes, cfg.activation, cfg.seed)?;
    let report = net.fit(&train, None, &cfg)?;

    if let Some(last) = report.last() {
        println!(
            "final avg_loss={:.4} train_accuracy={:.1}%",
            last.avg_loss, last.train_accuracy
        );
    }
    for x in xs {
        let trace = net.forward(&x)?;
        println!("x={x:?} y={:?} class={}", trace.output(), net.predict(&x)?);
    }

    Ok(())
}
