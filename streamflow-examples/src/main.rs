//! Register-loader demo: replay an init sequence through a queue, narrow it
//! onto a byte bus, and cross it into the device clock domain.

use streamflow::{Fabric, Item, Layout, Record};
use streamflow_std::{insert_converter, ConverterOptions, Queue, StreamReceiver, StreamSender};

const INIT_SEQUENCE: [(u64, u64); 6] =
    [(0x00, 0x8f), (0x01, 0xd5), (0x02, 0x3a), (0x10, 0x01), (0x11, 0x7f), (0x3f, 0xc0)];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let mut fabric = Fabric::new();
    let host = fabric.domain("host", 3);
    let device = fabric.domain("device", 7);

    let reg = Layout::new([("addr", 8), ("data", 8)])?;
    let bus = Layout::data(8);

    let writes = fabric.channel(&reg, host);
    let staged = fabric.channel(&reg, host);
    let bytes = fabric.channel(&bus, device);

    // A depth of 4 is below the floor; watch the warning.
    let queue = Queue::new(&fabric, writes, staged, 4)?;
    fabric.add(queue)?;
    insert_converter(&mut fabric, staged, bytes, ConverterOptions::default())?;

    // One frame per register write.
    let items = INIT_SEQUENCE
        .iter()
        .map(|&(addr, data)| {
            let mut record = Record::new(&reg);
            record.set("addr", addr).set("data", data);
            Item::with_flags(record, true, true)
        })
        .collect::<Vec<_>>();
    let sender = StreamSender::new(&fabric, writes, items, 0.8, 1)?;
    fabric.add(sender)?;

    let receiver = StreamReceiver::new(&fabric, bytes, 0.6, 2);
    let log = receiver.log();
    fabric.add(receiver)?;

    fabric.run(2_000)?;

    let expected = INIT_SEQUENCE.iter().flat_map(|&(addr, data)| [addr, data]).collect::<Vec<_>>();
    log.verify("data", &expected);

    for pair in log.items().chunks(2) {
        println!("wrote 0x{:02x} to register 0x{:02x}", pair[1].payload.get("data"), pair[0].payload.get("data"));
    }
    println!("replayed {} register writes across the domain crossing", log.len() / 2);
    Ok(())
}
