#![cfg(feature = "serde")]

use std::io::Write;

use tempfile::NamedTempFile;

use mnist_mlp::{Activation, Dataset, Network, TrainConfig, evaluate, train};

#[test]
fn save_and_load_preserve_predictions() {
    let net = Network::with_activation(&[6, 5, 4], Activation::Sigmoid, Some(31)).unwrap();
    let file = NamedTempFile::new().unwrap();
    net.save_json(file.path()).unwrap();

    let loaded = Network::load_json(file.path()).unwrap();
    assert_eq!(loaded, net);

    let input = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];
    assert_eq!(
        loaded.forward(&input).unwrap().output(),
        net.forward(&input).unwrap().output()
    );
}

#[test]
fn load_rejects_garbage() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "not json").unwrap();
    assert!(Network::load_json(file.path()).is_err());
}

#[test]
fn csv_to_trained_model_to_disk() {
    // Label = index of the bright pixel, for three classes in a 3-pixel image.
    let mut csv = NamedTempFile::new().unwrap();
    for i in 0..30 {
        let label = i % 3;
        let mut px = [0u8; 3];
        px[label] = 255;
        writeln!(csv, "{label},{},{},{}", px[0], px[1], px[2]).unwrap();
    }
    csv.flush().unwrap();

    let data = Dataset::from_csv_path(csv.path()).unwrap();
    assert_eq!(data.len(), 30);
    assert_eq!(data.input_dim(), Some(3));

    let cfg = TrainConfig {
        layer_sizes: vec![3, 6, 10],
        activation: Activation::Sigmoid,
        learning_rate: 3.0,
        epochs: 150,
        batch_size: 5,
        seed: Some(3),
    };
    let (net, report) = train(&cfg, &data, Some(&data)).unwrap();
    assert_eq!(report.epochs.len(), 150);

    let out = NamedTempFile::new().unwrap();
    net.save_json(out.path()).unwrap();
    let loaded = Network::load_json(out.path()).unwrap();
    assert_eq!(
        evaluate(&loaded, &data).unwrap(),
        report.final_test_accuracy().unwrap()
    );
    assert!(report.final_test_accuracy().unwrap() > 90.0);
}
