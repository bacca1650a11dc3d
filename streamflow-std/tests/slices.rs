//! Retiming transparency: stages change latency, never content.

use streamflow::{Fabric, Item, Layout};
use streamflow_std::{frames, PipeReady, PipeValid, StreamReceiver, StreamSender};

#[derive(Debug, Clone, Copy)]
enum Stage {
    None,
    Valid,
    Ready,
    Both,
}

fn run_staged(stage: Stage, items: Vec<Item>, send_speed: f64, recv_speed: f64, seed: u64) -> Vec<Item> {
    let mut fabric = Fabric::new();
    let domain = fabric.domain("sync", 1);
    let layout = items[0].payload.layout().clone();

    let a = fabric.channel(&layout, domain);
    let tail = match stage {
        Stage::None => a,
        Stage::Valid => {
            let b = fabric.channel(&layout, domain);
            let pipe = PipeValid::new(&fabric, a, b).unwrap();
            fabric.add(pipe).unwrap();
            b
        }
        Stage::Ready => {
            let b = fabric.channel(&layout, domain);
            let pipe = PipeReady::new(&fabric, a, b).unwrap();
            fabric.add(pipe).unwrap();
            b
        }
        Stage::Both => {
            let b = fabric.channel(&layout, domain);
            let c = fabric.channel(&layout, domain);
            let fwd = PipeValid::new(&fabric, a, b).unwrap();
            fabric.add(fwd).unwrap();
            let bwd = PipeReady::new(&fabric, b, c).unwrap();
            fabric.add(bwd).unwrap();
            c
        }
    };

    let sender = StreamSender::new(&fabric, a, items, send_speed, seed).unwrap();
    fabric.add(sender).unwrap();
    let receiver = StreamReceiver::new(&fabric, tail, recv_speed, seed ^ 0xdead_beef);
    let log = receiver.log();
    fabric.add(receiver).unwrap();

    fabric.run(20_000).unwrap();
    log.items()
}

#[test]
fn retiming_stages_are_transparent_under_random_stalls() {
    let layout = Layout::data(16);
    let items = frames(&layout, "data", &[
        &(0..40).collect::<Vec<u64>>(),
        &[100, 101],
        &[200],
        &(300..333).collect::<Vec<u64>>(),
    ]);

    for &(send_speed, recv_speed) in &[(1.0, 1.0), (1.0, 0.3), (0.3, 1.0), (0.5, 0.5), (0.9, 0.1)] {
        for seed in 0..6 {
            let reference = run_staged(Stage::None, items.clone(), send_speed, recv_speed, seed);
            assert_eq!(reference, items, "direct wiring must be lossless");
            for stage in [Stage::Valid, Stage::Ready, Stage::Both] {
                let staged = run_staged(stage, items.clone(), send_speed, recv_speed, seed);
                assert_eq!(staged, items, "{:?} stage altered the sequence", stage);
            }
        }
    }
}

#[test]
fn store_and_forward_hop_is_lossless() {
    let mut fabric = Fabric::new();
    let domain = fabric.domain("sync", 1);
    let layout = Layout::data(16);
    let a = fabric.channel(&layout, domain);
    let b = fabric.channel(&layout, domain);

    let hop = streamflow_std::StreamForward::new(&fabric, a, b, 0.4, 77).unwrap();
    fabric.add(hop).unwrap();

    let items = frames(&layout, "data", &[&(0..64).collect::<Vec<u64>>()]);
    let sender = StreamSender::new(&fabric, a, items.clone(), 0.8, 78).unwrap();
    fabric.add(sender).unwrap();
    let receiver = StreamReceiver::new(&fabric, b, 0.6, 79);
    let log = receiver.log();
    fabric.add(receiver).unwrap();

    fabric.run(10_000).unwrap();
    assert_eq!(log.items(), items);
}

#[test]
fn pipe_valid_adds_one_step_of_latency() {
    let layout = Layout::data(8);
    let items = frames(&layout, "data", &[&[1]]);

    let direct = steps_to_first(Stage::None, items.clone());
    let staged = steps_to_first(Stage::Valid, items);
    assert_eq!(staged, direct + 1);
}

fn steps_to_first(stage: Stage, items: Vec<Item>) -> usize {
    let mut fabric = Fabric::new();
    let domain = fabric.domain("sync", 1);
    let layout = items[0].payload.layout().clone();
    let a = fabric.channel(&layout, domain);
    let tail = match stage {
        Stage::None => a,
        Stage::Valid => {
            let b = fabric.channel(&layout, domain);
            let pipe = PipeValid::new(&fabric, a, b).unwrap();
            fabric.add(pipe).unwrap();
            b
        }
        _ => unreachable!(),
    };

    let sender = StreamSender::new(&fabric, a, items, 1.0, 1).unwrap();
    fabric.add(sender).unwrap();
    let receiver = StreamReceiver::new(&fabric, tail, 1.0, 2);
    let log = receiver.log();
    fabric.add(receiver).unwrap();

    let mut steps = 0;
    while log.is_empty() {
        fabric.step().unwrap();
        steps += 1;
        assert!(steps < 100, "item never delivered");
    }
    steps
}
