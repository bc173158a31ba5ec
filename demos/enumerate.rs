//! List the devices visible to the scripted demo backend.
//!
//! Usage: cargo run --example enumerate

use depthstream::testing::ScriptedSdk;
use depthstream::{Capabilities, DeviceRegistry};

fn main() {
    env_logger::init();

    let sdk = ScriptedSdk::new()
        .with_device(
            0,
            "D435i (scripted)",
            Capabilities::COLOR | Capabilities::DEPTH | Capabilities::IMU,
        )
        .with_device(1, "T265 (scripted)", Capabilities::POSE | Capabilities::IMU);
    let registry = DeviceRegistry::new(sdk);

    let count = match registry.count() {
        Ok(count) => count,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Found {} device(s):", count);
    for index in 0..count {
        match registry.resolve(index) {
            Ok(device) => println!(
                "  [{}] id={}  name={}  capabilities={:?}",
                index, device.id, device.name, device.capabilities
            ),
            Err(e) => eprintln!("  [{}] error: {}", index, e),
        }
    }
}
